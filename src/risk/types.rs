//! Risk tiers, inputs and the scored result

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordinal severity tier; `Ord` follows severity
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl RiskTier {
    pub const ALL: [RiskTier; 4] = [RiskTier::Low, RiskTier::Medium, RiskTier::High, RiskTier::Critical];

    /// Representative 0-100 score used by the trend scalar
    pub fn score(&self) -> f32 {
        match self {
            RiskTier::Low => 0.0,
            RiskTier::Medium => 40.0,
            RiskTier::High => 70.0,
            RiskTier::Critical => 100.0,
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskTier::Low => write!(f, "low"),
            RiskTier::Medium => write!(f, "medium"),
            RiskTier::High => write!(f, "high"),
            RiskTier::Critical => write!(f, "critical"),
        }
    }
}

/// Tier attached to an environmental reading by the external feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentalTier {
    Safe,
    Elevated,
    High,
    Critical,
}

impl From<EnvironmentalTier> for RiskTier {
    fn from(tier: EnvironmentalTier) -> Self {
        match tier {
            EnvironmentalTier::Safe => RiskTier::Low,
            EnvironmentalTier::Elevated => RiskTier::Medium,
            EnvironmentalTier::High => RiskTier::High,
            EnvironmentalTier::Critical => RiskTier::Critical,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentalKind {
    Gas,
    Temperature,
    Wind,
    Seismic,
    AirQuality,
    Other(String),
}

impl fmt::Display for EnvironmentalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvironmentalKind::Gas => write!(f, "gas"),
            EnvironmentalKind::Temperature => write!(f, "temperature"),
            EnvironmentalKind::Wind => write!(f, "wind"),
            EnvironmentalKind::Seismic => write!(f, "seismic"),
            EnvironmentalKind::AirQuality => write!(f, "air quality"),
            EnvironmentalKind::Other(name) => write!(f, "{}", name),
        }
    }
}

/// Pre-tiered environmental reading, read-only to the scorer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentalFactor {
    pub kind: EnvironmentalKind,
    pub value: f32,
    pub tier: EnvironmentalTier,
}

impl EnvironmentalFactor {
    pub fn new(kind: EnvironmentalKind, value: f32, tier: EnvironmentalTier) -> Self {
        Self { kind, value, tier }
    }
}

/// Discrete trigger codes from the triage collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum EventCode {
    Fall,
    ManualSos,
    Symptom { code: String, severity: RiskTier },
}

impl EventCode {
    pub fn tier(&self) -> RiskTier {
        match self {
            EventCode::Fall => RiskTier::High,
            EventCode::ManualSos => RiskTier::Critical,
            EventCode::Symptom { severity, .. } => *severity,
        }
    }
}

impl fmt::Display for EventCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventCode::Fall => write!(f, "fall"),
            EventCode::ManualSos => write!(f, "manual SOS"),
            EventCode::Symptom { code, severity } => write!(f, "symptom {} ({})", code, severity),
        }
    }
}

/// Event with the time it was reported
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskEvent {
    pub code: EventCode,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    Vitals,
    Environment,
    Events,
}

/// One input that raised a category above `Low`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributingFactor {
    pub category: RiskCategory,
    pub description: String,
    pub tier: RiskTier,
}

/// Scored risk snapshot
///
/// `tier` is the maximum of the category tiers; `scalar` is a weighted
/// 0-100 trend value that never affects `tier`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskScore {
    pub scalar: f32,
    pub tier: RiskTier,
    pub vitals_tier: RiskTier,
    pub environment_tier: RiskTier,
    pub event_tier: RiskTier,
    pub contributing_factors: Vec<ContributingFactor>,
    pub timestamp_ms: u64,
}

impl RiskScore {
    /// Score with no inputs at all
    pub fn baseline(timestamp_ms: u64) -> Self {
        Self {
            scalar: 0.0,
            tier: RiskTier::Low,
            vitals_tier: RiskTier::Low,
            environment_tier: RiskTier::Low,
            event_tier: RiskTier::Low,
            contributing_factors: Vec::new(),
            timestamp_ms,
        }
    }

    pub fn is_critical(&self) -> bool {
        self.tier == RiskTier::Critical
    }

    pub fn factors_in(&self, category: RiskCategory) -> impl Iterator<Item = &ContributingFactor> {
        self.contributing_factors.iter().filter(move |f| f.category == category)
    }
}
