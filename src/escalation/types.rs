//! Contacts, attempts, sessions and the audit timeline

use crate::risk::RiskTier;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type SessionId = u64;
pub type AttemptId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactRole {
    Primary,
    Medical,
    Secondary,
    Backup,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactChannel {
    Sms,
    Call,
    Email,
    Push,
    Other(String),
}

impl fmt::Display for ContactChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContactChannel::Sms => write!(f, "sms"),
            ContactChannel::Call => write!(f, "call"),
            ContactChannel::Email => write!(f, "email"),
            ContactChannel::Push => write!(f, "push"),
            ContactChannel::Other(name) => write!(f, "{}", name),
        }
    }
}

/// Emergency contact from the external profile store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub id: String,
    pub name: String,
    pub channel: ContactChannel,
    pub role: ContactRole,
    /// 1 is the highest priority
    pub priority: u8,
    /// The single contact used for low-tier notifications
    #[serde(default)]
    pub is_default: bool,
}

impl EmergencyContact {
    pub fn new(id: &str, channel: ContactChannel, role: ContactRole, priority: u8) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            channel,
            role,
            priority,
            is_default: false,
        }
    }

    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Pending,
    Delivered,
    Failed,
    Acknowledged,
    /// Still in flight when the session closed
    Abandoned,
}

/// One notification to one contact, including its retries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactAttempt {
    pub id: AttemptId,
    pub contact_id: String,
    pub channel: ContactChannel,
    pub status: AttemptStatus,
    /// Retries dispatched so far, never above the configured maximum
    pub retry_count: u32,
    /// Set once no further send will be made for this attempt
    pub terminal: bool,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Standby,
    Escalating,
    Active,
    Resolved,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// Risk tier crossed the configured threshold
    RiskThreshold,
    ManualSos,
}

/// Append-only record of everything that happened in a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum TimelineEvent {
    Triggered { tier: RiskTier, kind: TriggerKind, reason: String },
    CountdownStarted { secs: u64 },
    Activated { tier: RiskTier },
    Merged { tier: RiskTier, kind: TriggerKind },
    SeverityRaised { from: RiskTier, to: RiskTier },
    ContactsSelected { tier: RiskTier, immediate: Vec<String>, deferred: Vec<String> },
    NoContacts { tier: RiskTier },
    StepUp { tier: RiskTier, contact_ids: Vec<String> },
    ManualEscalation { contact_ids: Vec<String> },
    AttemptStarted { attempt_id: AttemptId, contact_id: String, retry_count: u32 },
    AttemptDelivered { attempt_id: AttemptId, contact_id: String },
    AttemptFailed { attempt_id: AttemptId, contact_id: String, reason: String, retry_in_secs: u64 },
    HardFailure { attempt_id: AttemptId, contact_id: String, reason: String },
    AttemptAbandoned { attempt_id: AttemptId, contact_id: String },
    Acknowledged { attempt_id: AttemptId, contact_id: String },
    Cancelled { timers_cancelled: usize },
    Resolved { timers_cancelled: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub timestamp_ms: u64,
    #[serde(flatten)]
    pub event: TimelineEvent,
}

/// One trigger-to-resolution lifecycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationSession {
    pub id: SessionId,
    pub state: EngineState,
    pub severity: RiskTier,
    pub trigger: TriggerKind,
    pub started_at_ms: u64,
    pub activated_at_ms: Option<u64>,
    pub closed_at_ms: Option<u64>,
    pub attempts: Vec<ContactAttempt>,
    timeline: Vec<TimelineEntry>,
}

impl EscalationSession {
    pub fn new(id: SessionId, severity: RiskTier, trigger: TriggerKind, started_at_ms: u64) -> Self {
        Self {
            id,
            state: EngineState::Escalating,
            severity,
            trigger,
            started_at_ms,
            activated_at_ms: None,
            closed_at_ms: None,
            attempts: Vec::new(),
            timeline: Vec::new(),
        }
    }

    pub fn record(&mut self, timestamp_ms: u64, event: TimelineEvent) {
        self.timeline.push(TimelineEntry { timestamp_ms, event });
    }

    pub fn timeline(&self) -> &[TimelineEntry] {
        &self.timeline
    }

    pub fn attempt(&self, id: AttemptId) -> Option<&ContactAttempt> {
        self.attempts.iter().find(|a| a.id == id)
    }

    pub fn attempt_mut(&mut self, id: AttemptId) -> Option<&mut ContactAttempt> {
        self.attempts.iter_mut().find(|a| a.id == id)
    }

    pub fn has_attempted(&self, contact_id: &str) -> bool {
        self.attempts.iter().any(|a| a.contact_id == contact_id)
    }

    pub fn hard_failures(&self) -> usize {
        self.attempts
            .iter()
            .filter(|a| a.terminal && a.status == AttemptStatus::Failed)
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    /// Cancelled during the countdown
    FalseAlarm,
    Resolved,
}

/// Read-only history entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedSession {
    pub session: EscalationSession,
    pub outcome: SessionOutcome,
    pub archived_at_ms: u64,
}
