//! Escalation state machine running as a single actor task
//!
//! All state lives inside the actor. Callers talk to it through an
//! [`EscalationHandle`] and observe it through immutable snapshots.

use crate::config::escalation_config::EscalationConfig;
use crate::escalation::dispatcher::{DispatchError, NotificationDispatcher, NotificationMessage};
use crate::escalation::protocol::{plan_for, ContactPlan};
use crate::escalation::timers::{PendingTimer, TimerId, TimerKind, TimerStats, TimerTable};
use crate::escalation::types::*;
use crate::risk::RiskTier;
use crate::utils::time::TimeProvider;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Escalation error types
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EscalationError {
    #[error("cannot {action} while {state}")]
    InvalidTransition { state: EngineState, action: &'static str },

    #[error("unknown contact {0}")]
    UnknownContact(String),

    #[error("contact {0} has no delivered notification to acknowledge")]
    NothingToAcknowledge(String),

    #[error("escalation engine has stopped")]
    EngineStopped,

    #[error("timeline export failed: {0}")]
    Export(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// A new session started its countdown
    CountdownStarted(SessionId),
    /// A new session went straight to active
    Activated(SessionId),
    /// Folded into the running session
    Merged(SessionId),
    /// Below the trigger threshold
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    Resolved { timers_cancelled: usize },
    AlreadyResolved,
}

/// Immutable view of the engine published after every change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub state: EngineState,
    pub session: Option<EscalationSession>,
    pub history: Vec<ArchivedSession>,
    pub pending_timers: Vec<PendingTimer>,
    pub timer_stats: TimerStats,
    pub contact_count: usize,
}

impl EngineSnapshot {
    fn initial(contact_count: usize) -> Self {
        Self {
            state: EngineState::Standby,
            session: None,
            history: Vec::new(),
            pending_timers: Vec::new(),
            timer_stats: TimerStats::default(),
            contact_count,
        }
    }

    /// JSON export of the current session and history for audit consumers
    pub fn timeline_json(&self) -> Result<String, EscalationError> {
        #[derive(Serialize)]
        struct Export<'a> {
            state: EngineState,
            session: Option<&'a EscalationSession>,
            history: &'a [ArchivedSession],
        }

        serde_json::to_string_pretty(&Export {
            state: self.state,
            session: self.session.as_ref(),
            history: &self.history,
        })
        .map_err(|e| EscalationError::Export(e.to_string()))
    }
}

type Reply<T> = oneshot::Sender<Result<T, EscalationError>>;

enum EngineCommand {
    Trigger {
        tier: RiskTier,
        kind: TriggerKind,
        reason: String,
        reply: Reply<TriggerOutcome>,
    },
    Cancel { reply: Reply<()> },
    Resolve { reply: Reply<ResolveOutcome> },
    Reset { reply: Reply<()> },
    Acknowledge { contact_id: String, reply: Reply<()> },
    EscalateNext { reply: Reply<usize> },
    UpdateContacts { contacts: Vec<EmergencyContact> },
    Shutdown,
}

struct DispatchOutcome {
    session_id: SessionId,
    attempt_id: AttemptId,
    result: Result<(), DispatchError>,
}

#[derive(Debug, Clone, PartialEq)]
enum QueuedDispatch {
    First(EmergencyContact),
    Retry(AttemptId),
}

/// Cloneable handle to a running engine
#[derive(Clone)]
pub struct EscalationHandle {
    commands: mpsc::Sender<EngineCommand>,
    snapshots: watch::Receiver<Arc<EngineSnapshot>>,
}

impl EscalationHandle {
    pub async fn trigger(&self, tier: RiskTier, kind: TriggerKind, reason: &str) -> Result<TriggerOutcome, EscalationError> {
        self.request(|reply| EngineCommand::Trigger {
            tier,
            kind,
            reason: reason.to_string(),
            reply,
        })
        .await
    }

    /// Critical trigger that skips the countdown
    pub async fn manual_sos(&self, reason: &str) -> Result<TriggerOutcome, EscalationError> {
        self.trigger(RiskTier::Critical, TriggerKind::ManualSos, reason).await
    }

    /// False-alarm cancel during the countdown
    pub async fn cancel(&self) -> Result<(), EscalationError> {
        self.request(|reply| EngineCommand::Cancel { reply }).await
    }

    pub async fn resolve(&self) -> Result<ResolveOutcome, EscalationError> {
        self.request(|reply| EngineCommand::Resolve { reply }).await
    }

    /// Return a resolved engine to standby
    pub async fn reset(&self) -> Result<(), EscalationError> {
        self.request(|reply| EngineCommand::Reset { reply }).await
    }

    pub async fn acknowledge(&self, contact_id: &str) -> Result<(), EscalationError> {
        self.request(|reply| EngineCommand::Acknowledge {
            contact_id: contact_id.to_string(),
            reply,
        })
        .await
    }

    /// Queue every contact not yet notified; returns how many were queued
    pub async fn escalate_next(&self) -> Result<usize, EscalationError> {
        self.request(|reply| EngineCommand::EscalateNext { reply }).await
    }

    pub async fn update_contacts(&self, contacts: Vec<EmergencyContact>) -> Result<(), EscalationError> {
        self.commands
            .send(EngineCommand::UpdateContacts { contacts })
            .await
            .map_err(|_| EscalationError::EngineStopped)
    }

    pub async fn shutdown(&self) {
        let _ = self.commands.send(EngineCommand::Shutdown).await;
    }

    /// False once the engine task has exited
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    pub fn snapshot(&self) -> Arc<EngineSnapshot> {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<EngineSnapshot>> {
        self.snapshots.clone()
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> EngineCommand) -> Result<T, EscalationError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .await
            .map_err(|_| EscalationError::EngineStopped)?;
        rx.await.map_err(|_| EscalationError::EngineStopped)?
    }
}

/// The escalation actor
pub struct EscalationEngine {
    config: EscalationConfig,
    contacts: Vec<EmergencyContact>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    time: Arc<dyn TimeProvider>,

    state: EngineState,
    session: Option<EscalationSession>,
    history: Vec<ArchivedSession>,
    next_session_id: SessionId,
    next_attempt_id: AttemptId,

    timers: TimerTable,
    dispatch_queue: VecDeque<QueuedDispatch>,
    last_dispatch_at: Option<Instant>,

    outcome_tx: mpsc::UnboundedSender<DispatchOutcome>,
    snapshot_tx: watch::Sender<Arc<EngineSnapshot>>,
}

impl EscalationEngine {
    /// Spawn the engine task and return its handle
    pub fn spawn(
        config: EscalationConfig,
        contacts: Vec<EmergencyContact>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        time: Arc<dyn TimeProvider>,
    ) -> (EscalationHandle, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(config.command_queue_size.max(1));
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(EngineSnapshot::initial(contacts.len())));

        let engine = Self {
            config,
            contacts,
            dispatcher,
            time,
            state: EngineState::Standby,
            session: None,
            history: Vec::new(),
            next_session_id: 1,
            next_attempt_id: 1,
            timers: TimerTable::new(timer_tx),
            dispatch_queue: VecDeque::new(),
            last_dispatch_at: None,
            outcome_tx,
            snapshot_tx,
        };

        let task = tokio::spawn(engine.run(command_rx, timer_rx, outcome_rx));
        let handle = EscalationHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
        };
        (handle, task)
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<EngineCommand>,
        mut timers: mpsc::UnboundedReceiver<TimerId>,
        mut outcomes: mpsc::UnboundedReceiver<DispatchOutcome>,
    ) {
        info!("escalation engine started");

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(EngineCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(timer_id) = timers.recv() => self.handle_timer(timer_id),
                Some(outcome) = outcomes.recv() => self.handle_outcome(outcome),
            }
            self.publish();
        }

        let cancelled = self.timers.pending_count();
        info!(pending_timers = cancelled, "escalation engine stopped");
    }

    /// Replies are sent after the snapshot is published so callers never
    /// observe a stale snapshot once their request returns.
    fn handle_command(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::Trigger { tier, kind, reason, reply } => {
                let outcome = self.trigger(tier, kind, &reason);
                self.publish();
                let _ = reply.send(Ok(outcome));
            }
            EngineCommand::Cancel { reply } => {
                let result = self.cancel();
                self.publish();
                let _ = reply.send(result);
            }
            EngineCommand::Resolve { reply } => {
                let result = self.resolve();
                self.publish();
                let _ = reply.send(result);
            }
            EngineCommand::Reset { reply } => {
                let result = self.reset();
                self.publish();
                let _ = reply.send(result);
            }
            EngineCommand::Acknowledge { contact_id, reply } => {
                let result = self.acknowledge(&contact_id);
                self.publish();
                let _ = reply.send(result);
            }
            EngineCommand::EscalateNext { reply } => {
                let result = self.escalate_next();
                self.publish();
                let _ = reply.send(result);
            }
            EngineCommand::UpdateContacts { contacts } => {
                debug!(count = contacts.len(), "contacts updated");
                self.contacts = contacts;
            }
            EngineCommand::Shutdown => {}
        }
    }

    // ---- transitions ----

    fn trigger(&mut self, tier: RiskTier, kind: TriggerKind, reason: &str) -> TriggerOutcome {
        let now = self.time.now_millis();

        if kind != TriggerKind::ManualSos && tier < self.config.trigger_threshold {
            return TriggerOutcome::Ignored;
        }

        if self.state == EngineState::Resolved {
            self.enter_standby();
        }

        let skip_countdown = kind == TriggerKind::ManualSos || tier == RiskTier::Critical;

        match self.state {
            EngineState::Standby => {
                let id = self.next_session_id;
                self.next_session_id += 1;

                let mut session = EscalationSession::new(id, tier, kind, now);
                session.record(now, TimelineEvent::Triggered { tier, kind, reason: reason.to_string() });
                self.session = Some(session);
                self.set_state(EngineState::Escalating);
                info!(session_id = id, tier = ?tier, kind = ?kind, "escalation triggered");

                if skip_countdown || self.config.countdown_secs == 0 {
                    self.activate();
                    TriggerOutcome::Activated(id)
                } else {
                    self.timers.schedule(id, TimerKind::Countdown, self.config.countdown());
                    self.record(TimelineEvent::CountdownStarted { secs: self.config.countdown_secs });
                    TriggerOutcome::CountdownStarted(id)
                }
            }
            EngineState::Escalating | EngineState::Active => self.merge(tier, kind),
            EngineState::Resolved => TriggerOutcome::Ignored,
        }
    }

    /// Fold a second trigger into the running session
    fn merge(&mut self, tier: RiskTier, kind: TriggerKind) -> TriggerOutcome {
        let Some(session) = self.session.as_mut() else {
            return TriggerOutcome::Ignored;
        };
        let id = session.id;
        let previous = session.severity;
        let now = self.time.now_millis();

        session.record(now, TimelineEvent::Merged { tier, kind });
        if tier > previous {
            session.severity = tier;
            session.record(now, TimelineEvent::SeverityRaised { from: previous, to: tier });
        }
        info!(session_id = id, tier = ?tier, kind = ?kind, "trigger merged into running session");

        match self.state {
            EngineState::Escalating if kind == TriggerKind::ManualSos || tier == RiskTier::Critical => {
                // Countdown superseded
                self.timers.cancel_where(id, |k| *k == TimerKind::Countdown);
                self.activate();
            }
            EngineState::Active if tier > previous => {
                let plan = plan_for(tier, &self.contacts);
                self.apply_plan(tier, plan);
            }
            _ => {}
        }

        TriggerOutcome::Merged(id)
    }

    fn activate(&mut self) {
        let now = self.time.now_millis();
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let tier = session.severity;
        session.activated_at_ms = Some(now);
        session.record(now, TimelineEvent::Activated { tier });
        let id = session.id;

        self.set_state(EngineState::Active);
        info!(session_id = id, tier = ?tier, "escalation active");

        let plan = plan_for(tier, &self.contacts);
        self.apply_plan(tier, plan);
    }

    /// Queue immediate contacts not yet notified and schedule the step-up
    fn apply_plan(&mut self, tier: RiskTier, plan: ContactPlan) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let id = session.id;
        let now = self.time.now_millis();

        if plan.is_empty() {
            warn!(session_id = id, tier = ?tier, "no contacts available for escalation");
            session.record(now, TimelineEvent::NoContacts { tier });
            return;
        }

        session.record(
            now,
            TimelineEvent::ContactsSelected {
                tier,
                immediate: plan.immediate_ids(),
                deferred: plan.deferred_ids(),
            },
        );

        for contact in plan.immediate {
            self.enqueue_contact(contact);
        }

        if !plan.deferred.is_empty() {
            let kind = TimerKind::StepUp { tier };
            if !self.timers.has_pending(id, &kind) {
                self.timers.schedule(id, kind, self.config.step_up_delay(tier));
            }
        }

        self.pump_queue();
    }

    fn cancel(&mut self) -> Result<(), EscalationError> {
        if self.state != EngineState::Escalating {
            return Err(EscalationError::InvalidTransition {
                state: self.state,
                action: "cancel",
            });
        }

        let timers_cancelled = self.close_session(SessionOutcome::FalseAlarm);
        info!(timers_cancelled, "escalation cancelled as false alarm");
        self.enter_standby();
        Ok(())
    }

    fn resolve(&mut self) -> Result<ResolveOutcome, EscalationError> {
        match self.state {
            EngineState::Resolved => Ok(ResolveOutcome::AlreadyResolved),
            EngineState::Active => {
                let timers_cancelled = self.close_session(SessionOutcome::Resolved);
                self.set_state(EngineState::Resolved);
                info!(timers_cancelled, "escalation resolved");
                Ok(ResolveOutcome::Resolved { timers_cancelled })
            }
            state => Err(EscalationError::InvalidTransition { state, action: "resolve" }),
        }
    }

    fn reset(&mut self) -> Result<(), EscalationError> {
        match self.state {
            EngineState::Resolved | EngineState::Standby => {
                self.enter_standby();
                Ok(())
            }
            state => Err(EscalationError::InvalidTransition { state, action: "reset" }),
        }
    }

    /// Cancel the session's timers, drop queued dispatches and archive it
    fn close_session(&mut self, outcome: SessionOutcome) -> usize {
        let now = self.time.now_millis();
        let Some(session) = self.session.as_mut() else {
            return 0;
        };

        let timers_cancelled = self.timers.cancel_session(session.id);
        self.dispatch_queue.clear();

        // In-flight sends report into a closed session, settle them here
        let mut abandoned = Vec::new();
        for attempt in session.attempts.iter_mut() {
            match attempt.status {
                AttemptStatus::Pending => {
                    attempt.status = AttemptStatus::Abandoned;
                    attempt.terminal = true;
                    attempt.updated_at_ms = now;
                    abandoned.push((attempt.id, attempt.contact_id.clone()));
                }
                AttemptStatus::Failed => attempt.terminal = true,
                _ => {}
            }
        }
        for (attempt_id, contact_id) in abandoned {
            debug!(session_id = session.id, attempt_id, contact_id = %contact_id, "in-flight attempt abandoned");
            session.record(now, TimelineEvent::AttemptAbandoned { attempt_id, contact_id });
        }

        let event = match outcome {
            SessionOutcome::FalseAlarm => TimelineEvent::Cancelled { timers_cancelled },
            SessionOutcome::Resolved => TimelineEvent::Resolved { timers_cancelled },
        };
        session.record(now, event);
        session.closed_at_ms = Some(now);
        session.state = match outcome {
            SessionOutcome::FalseAlarm => EngineState::Standby,
            SessionOutcome::Resolved => EngineState::Resolved,
        };

        self.history.push(ArchivedSession {
            session: session.clone(),
            outcome,
            archived_at_ms: now,
        });
        timers_cancelled
    }

    fn enter_standby(&mut self) {
        self.session = None;
        self.dispatch_queue.clear();
        self.state = EngineState::Standby;
    }

    fn set_state(&mut self, state: EngineState) {
        self.state = state;
        if let Some(session) = self.session.as_mut() {
            session.state = state;
        }
    }

    fn acknowledge(&mut self, contact_id: &str) -> Result<(), EscalationError> {
        if self.state != EngineState::Active {
            return Err(EscalationError::InvalidTransition {
                state: self.state,
                action: "acknowledge",
            });
        }
        let now = self.time.now_millis();
        let session = self
            .session
            .as_mut()
            .ok_or(EscalationError::InvalidTransition { state: self.state, action: "acknowledge" })?;

        if !session.has_attempted(contact_id) {
            return Err(EscalationError::UnknownContact(contact_id.to_string()));
        }

        let attempt = session
            .attempts
            .iter_mut()
            .rev()
            .find(|a| a.contact_id == contact_id && a.status == AttemptStatus::Delivered)
            .ok_or_else(|| EscalationError::NothingToAcknowledge(contact_id.to_string()))?;

        attempt.status = AttemptStatus::Acknowledged;
        attempt.updated_at_ms = now;
        let attempt_id = attempt.id;
        session.record(
            now,
            TimelineEvent::Acknowledged {
                attempt_id,
                contact_id: contact_id.to_string(),
            },
        );
        info!(session_id = session.id, contact_id, "notification acknowledged");
        Ok(())
    }

    fn escalate_next(&mut self) -> Result<usize, EscalationError> {
        if self.state != EngineState::Active {
            return Err(EscalationError::InvalidTransition {
                state: self.state,
                action: "escalate",
            });
        }
        let Some(session) = self.session.as_ref() else {
            return Ok(0);
        };
        let id = session.id;

        let mut remaining: Vec<EmergencyContact> = self
            .contacts
            .iter()
            .filter(|c| !session.has_attempted(&c.id) && !self.is_queued(&c.id))
            .cloned()
            .collect();
        remaining.sort_by_key(|c| c.priority);

        let contact_ids: Vec<String> = remaining.iter().map(|c| c.id.clone()).collect();
        let count = remaining.len();

        // Everyone is being notified now, step-ups have nothing left to do
        self.timers.cancel_where(id, |k| matches!(k, TimerKind::StepUp { .. }));
        self.record(TimelineEvent::ManualEscalation { contact_ids });
        for contact in remaining {
            self.enqueue_contact(contact);
        }
        self.pump_queue();

        info!(session_id = id, count, "manual escalation to remaining contacts");
        Ok(count)
    }

    // ---- timers ----

    fn handle_timer(&mut self, timer_id: TimerId) {
        let Some((session_id, kind)) = self.timers.take_fired(timer_id) else {
            return;
        };
        if self.session.as_ref().map(|s| s.id) != Some(session_id) {
            debug!(timer_id, session_id, "timer for a closed session ignored");
            return;
        }

        match kind {
            TimerKind::Countdown if self.state == EngineState::Escalating => self.activate(),
            TimerKind::StepUp { tier } if self.state == EngineState::Active => self.step_up(tier),
            TimerKind::Retry { attempt_id } if self.state == EngineState::Active => {
                self.dispatch_queue.push_back(QueuedDispatch::Retry(attempt_id));
                self.pump_queue();
            }
            TimerKind::Stagger if self.state == EngineState::Active => self.pump_queue(),
            _ => {}
        }
    }

    fn step_up(&mut self, tier: RiskTier) {
        let plan = plan_for(tier, &self.contacts);
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let deferred: Vec<EmergencyContact> = plan
            .deferred
            .into_iter()
            .filter(|c| !session.has_attempted(&c.id) && !self.is_queued(&c.id))
            .collect();

        let contact_ids: Vec<String> = deferred.iter().map(|c| c.id.clone()).collect();
        info!(session_id = session.id, tier = ?tier, contacts = contact_ids.len(), "stepping up to deferred contacts");
        self.record(TimelineEvent::StepUp { tier, contact_ids });

        for contact in deferred {
            self.enqueue_contact(contact);
        }
        self.pump_queue();
    }

    // ---- dispatch ----

    fn is_queued(&self, contact_id: &str) -> bool {
        self.dispatch_queue
            .iter()
            .any(|q| matches!(q, QueuedDispatch::First(c) if c.id == contact_id))
    }

    fn enqueue_contact(&mut self, contact: EmergencyContact) {
        let attempted = self
            .session
            .as_ref()
            .map(|s| s.has_attempted(&contact.id))
            .unwrap_or(true);
        if attempted || self.is_queued(&contact.id) {
            return;
        }
        self.dispatch_queue.push_back(QueuedDispatch::First(contact));
    }

    /// Start the next queued dispatch if the stagger gap allows it
    fn pump_queue(&mut self) {
        let Some(session_id) = self.session.as_ref().map(|s| s.id) else {
            return;
        };
        if self.state != EngineState::Active
            || self.dispatch_queue.is_empty()
            || self.timers.has_pending(session_id, &TimerKind::Stagger)
        {
            return;
        }

        let stagger = self.config.stagger();
        if let Some(last) = self.last_dispatch_at {
            let elapsed = last.elapsed();
            if elapsed < stagger {
                self.timers.schedule(session_id, TimerKind::Stagger, stagger - elapsed);
                return;
            }
        }

        if let Some(next) = self.dispatch_queue.pop_front() {
            self.start_dispatch(next);
        }

        if !self.dispatch_queue.is_empty() {
            self.timers.schedule(session_id, TimerKind::Stagger, stagger);
        }
    }

    fn start_dispatch(&mut self, queued: QueuedDispatch) {
        let now = self.time.now_millis();
        let Some(session) = self.session.as_mut() else {
            return;
        };

        let (attempt_id, contact) = match queued {
            QueuedDispatch::First(contact) => {
                let id = self.next_attempt_id;
                self.next_attempt_id += 1;
                session.attempts.push(ContactAttempt {
                    id,
                    contact_id: contact.id.clone(),
                    channel: contact.channel.clone(),
                    status: AttemptStatus::Pending,
                    retry_count: 0,
                    terminal: false,
                    created_at_ms: now,
                    updated_at_ms: now,
                });
                (id, contact)
            }
            QueuedDispatch::Retry(attempt_id) => {
                let session_id = session.id;
                let Some(attempt) = session.attempt_mut(attempt_id) else {
                    return;
                };
                if attempt.terminal || attempt.status != AttemptStatus::Failed {
                    return;
                }
                attempt.updated_at_ms = now;
                let contact_id = attempt.contact_id.clone();
                let Some(contact) = self.contacts.iter().find(|c| c.id == contact_id).cloned() else {
                    // Nobody left to retry, the attempt stays failed for good
                    attempt.terminal = true;
                    warn!(session_id, contact_id = %contact_id, attempt_id, "retry for a contact no longer listed");
                    session.record(
                        now,
                        TimelineEvent::HardFailure {
                            attempt_id,
                            contact_id,
                            reason: "contact removed".to_string(),
                        },
                    );
                    return;
                };
                attempt.retry_count += 1;
                attempt.status = AttemptStatus::Pending;
                (attempt_id, contact)
            }
        };

        let retry = session.attempt(attempt_id).map(|a| a.retry_count).unwrap_or(0);
        session.record(
            now,
            TimelineEvent::AttemptStarted {
                attempt_id,
                contact_id: contact.id.clone(),
                retry_count: retry,
            },
        );

        let message = NotificationMessage {
            session_id: session.id,
            tier: session.severity,
            text: format!("{} alert: emergency escalation in progress", session.severity),
            retry,
        };
        let session_id = session.id;
        info!(session_id, contact_id = %contact.id, attempt_id, retry, "dispatching notification");

        self.last_dispatch_at = Some(Instant::now());

        let dispatcher = Arc::clone(&self.dispatcher);
        let outcomes = self.outcome_tx.clone();
        let timeout = self.config.dispatch_timeout();
        let timeout_secs = self.config.dispatch_timeout_secs;
        tokio::spawn(async move {
            let result = match tokio::time::timeout(timeout, dispatcher.send(&contact, &message)).await {
                Ok(result) => result,
                Err(_) => Err(DispatchError::Timeout(timeout_secs)),
            };
            let _ = outcomes.send(DispatchOutcome {
                session_id,
                attempt_id,
                result,
            });
        });
    }

    fn handle_outcome(&mut self, outcome: DispatchOutcome) {
        let now = self.time.now_millis();
        let max_retries = self.config.max_retries;
        let backoff = self.config.retry_backoff();
        let backoff_secs = self.config.retry_backoff_secs;

        let Some(session) = self.session.as_mut() else {
            debug!(session_id = outcome.session_id, "dispatch result for a closed session ignored");
            return;
        };
        if session.id != outcome.session_id || self.state != EngineState::Active {
            debug!(session_id = outcome.session_id, "dispatch result for a closed session ignored");
            return;
        }
        let session_id = session.id;

        let Some(attempt) = session.attempt_mut(outcome.attempt_id) else {
            return;
        };
        if attempt.status != AttemptStatus::Pending {
            return;
        }
        attempt.updated_at_ms = now;
        let contact_id = attempt.contact_id.clone();
        let attempt_id = attempt.id;

        match outcome.result {
            Ok(()) => {
                attempt.status = AttemptStatus::Delivered;
                session.record(now, TimelineEvent::AttemptDelivered { attempt_id, contact_id });
            }
            Err(error) => {
                attempt.status = AttemptStatus::Failed;
                if attempt.retry_count < max_retries {
                    warn!(session_id, contact_id = %contact_id, attempt_id, error = %error, "dispatch failed, retry scheduled");
                    session.record(
                        now,
                        TimelineEvent::AttemptFailed {
                            attempt_id,
                            contact_id,
                            reason: error.to_string(),
                            retry_in_secs: backoff_secs,
                        },
                    );
                    self.timers.schedule(session_id, TimerKind::Retry { attempt_id }, backoff);
                } else {
                    attempt.terminal = true;
                    warn!(session_id, contact_id = %contact_id, attempt_id, error = %error, "dispatch retries exhausted");
                    session.record(
                        now,
                        TimelineEvent::HardFailure {
                            attempt_id,
                            contact_id,
                            reason: error.to_string(),
                        },
                    );
                }
            }
        }
    }

    // ---- snapshots ----

    fn record(&mut self, event: TimelineEvent) {
        let now = self.time.now_millis();
        if let Some(session) = self.session.as_mut() {
            session.record(now, event);
        }
    }

    fn publish(&self) {
        let snapshot = EngineSnapshot {
            state: self.state,
            session: self.session.clone(),
            history: self.history.clone(),
            pending_timers: self.timers.pending(),
            timer_stats: self.timers.stats(),
            contact_count: self.contacts.len(),
        };
        self.snapshot_tx.send_replace(Arc::new(snapshot));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::time::TokioTimeProvider;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingDispatcher {
        sent: Mutex<Vec<(String, Instant)>>,
        fail: bool,
    }

    #[async_trait]
    impl NotificationDispatcher for RecordingDispatcher {
        async fn send(&self, contact: &EmergencyContact, _message: &NotificationMessage) -> Result<(), DispatchError> {
            self.sent.lock().push((contact.id.clone(), Instant::now()));
            if self.fail {
                Err(DispatchError::Unavailable("offline".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn contacts() -> Vec<EmergencyContact> {
        vec![
            EmergencyContact::new("partner", ContactChannel::Call, ContactRole::Primary, 1).as_default(),
            EmergencyContact::new("gp", ContactChannel::Call, ContactRole::Medical, 2),
            EmergencyContact::new("sibling", ContactChannel::Sms, ContactRole::Secondary, 3),
        ]
    }

    fn spawn(dispatcher: Arc<RecordingDispatcher>) -> EscalationHandle {
        let (handle, _task) = EscalationEngine::spawn(
            EscalationConfig::default(),
            contacts(),
            dispatcher,
            Arc::new(TokioTimeProvider::new()),
        );
        handle
    }

    #[tokio::test(start_paused = true)]
    async fn test_threshold_trigger_runs_countdown() {
        let handle = spawn(Arc::new(RecordingDispatcher::default()));

        let outcome = handle.trigger(RiskTier::High, TriggerKind::RiskThreshold, "hr").await.unwrap();
        assert!(matches!(outcome, TriggerOutcome::CountdownStarted(_)));
        assert_eq!(handle.snapshot().state, EngineState::Escalating);

        tokio::time::sleep(Duration::from_millis(10_100)).await;
        assert_eq!(handle.snapshot().state, EngineState::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_low_tier_is_ignored() {
        let handle = spawn(Arc::new(RecordingDispatcher::default()));
        let outcome = handle.trigger(RiskTier::Low, TriggerKind::RiskThreshold, "noise").await.unwrap();
        assert_eq!(outcome, TriggerOutcome::Ignored);
        assert_eq!(handle.snapshot().state, EngineState::Standby);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_countdown_is_false_alarm() {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let handle = spawn(dispatcher.clone());

        handle.trigger(RiskTier::Medium, TriggerKind::RiskThreshold, "spo2").await.unwrap();
        handle.cancel().await.unwrap();

        tokio::time::sleep(Duration::from_secs(30)).await;
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.state, EngineState::Standby);
        assert_eq!(snapshot.history.len(), 1);
        assert_eq!(snapshot.history[0].outcome, SessionOutcome::FalseAlarm);
        assert!(dispatcher.sent.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_outside_countdown_is_rejected() {
        let handle = spawn(Arc::new(RecordingDispatcher::default()));
        let err = handle.cancel().await.unwrap_err();
        assert_eq!(
            err,
            EscalationError::InvalidTransition {
                state: EngineState::Standby,
                action: "cancel"
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_trigger_merges() {
        let handle = spawn(Arc::new(RecordingDispatcher::default()));
        let first = handle.trigger(RiskTier::Medium, TriggerKind::RiskThreshold, "a").await.unwrap();
        let second = handle.trigger(RiskTier::High, TriggerKind::RiskThreshold, "b").await.unwrap();

        let TriggerOutcome::CountdownStarted(id) = first else {
            panic!("expected countdown");
        };
        assert_eq!(second, TriggerOutcome::Merged(id));

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.session.as_ref().unwrap().severity, RiskTier::High);
        assert_eq!(snapshot.state, EngineState::Escalating);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_sos_supersedes_countdown() {
        let handle = spawn(Arc::new(RecordingDispatcher::default()));
        handle.trigger(RiskTier::Medium, TriggerKind::RiskThreshold, "a").await.unwrap();
        handle.manual_sos("button").await.unwrap();

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.state, EngineState::Active);
        assert!(!snapshot
            .pending_timers
            .iter()
            .any(|t| t.kind == TimerKind::Countdown));
        assert_eq!(snapshot.timer_stats.cancelled, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acknowledge_delivered_contact() {
        let handle = spawn(Arc::new(RecordingDispatcher::default()));
        handle.manual_sos("button").await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        handle.acknowledge("partner").await.unwrap();
        let snapshot = handle.snapshot();
        let session = snapshot.session.as_ref().unwrap();
        let attempt = session.attempts.iter().find(|a| a.contact_id == "partner").unwrap();
        assert_eq!(attempt.status, AttemptStatus::Acknowledged);

        let err = handle.acknowledge("stranger").await.unwrap_err();
        assert_eq!(err, EscalationError::UnknownContact("stranger".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_after_resolve() {
        let handle = spawn(Arc::new(RecordingDispatcher::default()));
        handle.manual_sos("button").await.unwrap();
        handle.resolve().await.unwrap();
        assert_eq!(handle.snapshot().state, EngineState::Resolved);

        handle.reset().await.unwrap();
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.state, EngineState::Standby);
        assert!(snapshot.session.is_none());
        assert_eq!(snapshot.history.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeline_export() {
        let handle = spawn(Arc::new(RecordingDispatcher::default()));
        handle.manual_sos("button").await.unwrap();
        let json = handle.snapshot().timeline_json().unwrap();
        assert!(json.contains("\"activated\""));
        assert!(json.contains("\"manual_sos\""));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_engine_reports_error() {
        let handle = spawn(Arc::new(RecordingDispatcher::default()));
        assert!(handle.is_running());
        handle.shutdown().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!handle.is_running());
        assert_eq!(handle.resolve().await.unwrap_err(), EscalationError::EngineStopped);
    }
}
