// src/config/risk_config.rs
//! Risk scoring thresholds and weights

use crate::config::constants::risk;
use crate::risk::RiskTier;
use serde::{Deserialize, Serialize};

/// Normal interval for one vital at one tier
///
/// The tier applies when a value falls strictly outside `[low, high]`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct VitalBand {
    pub low: f32,
    pub high: f32,
}

impl VitalBand {
    pub const fn new(low: f32, high: f32) -> Self {
        Self { low, high }
    }

    pub fn breached_by(&self, value: f32) -> bool {
        value < self.low || value > self.high
    }
}

/// Bands for one vital, from mildest to most severe
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VitalThresholds {
    pub medium: VitalBand,
    pub high: VitalBand,
    pub critical: Option<VitalBand>,
}

impl VitalThresholds {
    /// Most severe tier whose band the value breaches
    pub fn classify(&self, value: f32) -> RiskTier {
        if self.critical.map(|b| b.breached_by(value)).unwrap_or(false) {
            RiskTier::Critical
        } else if self.high.breached_by(value) {
            RiskTier::High
        } else if self.medium.breached_by(value) {
            RiskTier::Medium
        } else {
            RiskTier::Low
        }
    }
}

/// Category weights for the trend scalar
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RiskWeights {
    pub vitals: f32,
    pub environment: f32,
    pub events: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RiskConfig {
    /// Vitals below this confidence count as absent
    #[serde(default = "defaults::min_vitals_confidence")]
    pub min_vitals_confidence: f32,

    /// Simulated readings never raise the vitals tier unless set
    #[serde(default)]
    pub score_simulated_vitals: bool,

    #[serde(default = "defaults::event_retention_secs")]
    pub event_retention_secs: u64,

    #[serde(default)]
    pub weights: RiskWeights,

    #[serde(default = "defaults::heart_rate")]
    pub heart_rate: VitalThresholds,

    #[serde(default = "defaults::spo2")]
    pub spo2: VitalThresholds,

    #[serde(default = "defaults::respiratory_rate")]
    pub respiratory_rate: VitalThresholds,

    #[serde(default = "defaults::temperature")]
    pub temperature: VitalThresholds,

    #[serde(default = "defaults::irregular_rhythm_tier")]
    pub irregular_rhythm_tier: RiskTier,

    #[serde(default = "defaults::premature_beat_tier")]
    pub premature_beat_tier: RiskTier,
}

mod defaults {
    use super::*;

    pub fn min_vitals_confidence() -> f32 { risk::DEFAULT_MIN_VITALS_CONFIDENCE }
    pub fn event_retention_secs() -> u64 { risk::DEFAULT_EVENT_RETENTION_SECS }
    pub fn irregular_rhythm_tier() -> RiskTier { RiskTier::Medium }
    pub fn premature_beat_tier() -> RiskTier { RiskTier::Low }

    // 41 bpm as the critical floor so the processor's 40 bpm clamp counts
    pub fn heart_rate() -> VitalThresholds {
        VitalThresholds {
            medium: VitalBand::new(60.0, 100.0),
            high: VitalBand::new(50.0, 120.0),
            critical: Some(VitalBand::new(41.0, 160.0)),
        }
    }

    pub fn spo2() -> VitalThresholds {
        VitalThresholds {
            medium: VitalBand::new(95.0, 100.0),
            high: VitalBand::new(92.0, 100.0),
            critical: Some(VitalBand::new(88.0, 100.0)),
        }
    }

    pub fn respiratory_rate() -> VitalThresholds {
        VitalThresholds {
            medium: VitalBand::new(10.0, 24.0),
            high: VitalBand::new(8.0, 30.0),
            critical: None,
        }
    }

    pub fn temperature() -> VitalThresholds {
        VitalThresholds {
            medium: VitalBand::new(35.5, 38.0),
            high: VitalBand::new(35.1, 39.4),
            critical: None,
        }
    }
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            vitals: risk::VITALS_WEIGHT,
            environment: risk::ENVIRONMENT_WEIGHT,
            events: risk::EVENT_WEIGHT,
        }
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            min_vitals_confidence: defaults::min_vitals_confidence(),
            score_simulated_vitals: false,
            event_retention_secs: defaults::event_retention_secs(),
            weights: RiskWeights::default(),
            heart_rate: defaults::heart_rate(),
            spo2: defaults::spo2(),
            respiratory_rate: defaults::respiratory_rate(),
            temperature: defaults::temperature(),
            irregular_rhythm_tier: defaults::irregular_rhythm_tier(),
            premature_beat_tier: defaults::premature_beat_tier(),
        }
    }
}

impl RiskConfig {
    /// Problems with the threshold layout, empty when consistent
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for (name, t) in [
            ("heart_rate", &self.heart_rate),
            ("spo2", &self.spo2),
            ("respiratory_rate", &self.respiratory_rate),
            ("temperature", &self.temperature),
        ] {
            let mut bands = vec![t.medium, t.high];
            bands.extend(t.critical);
            if bands.iter().any(|b| b.low > b.high) {
                errors.push(format!("{} band has low above high", name));
            }
            // Each more severe band must enclose the milder one
            if bands.windows(2).any(|w| w[1].low > w[0].low || w[1].high < w[0].high) {
                errors.push(format!("{} bands must widen with severity", name));
            }
        }

        if !(0.0..=1.0).contains(&self.min_vitals_confidence) {
            errors.push(format!(
                "min_vitals_confidence must be within 0..=1, got {}",
                self.min_vitals_confidence
            ));
        }

        let w = &self.weights;
        if w.vitals < 0.0 || w.environment < 0.0 || w.events < 0.0 {
            errors.push("risk weights must be non-negative".to_string());
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds_are_consistent() {
        assert!(RiskConfig::default().validate().is_empty());
    }

    #[test]
    fn test_heart_rate_classification() {
        let t = RiskConfig::default().heart_rate;
        assert_eq!(t.classify(72.0), RiskTier::Low);
        assert_eq!(t.classify(105.0), RiskTier::Medium);
        assert_eq!(t.classify(45.0), RiskTier::High);
        assert_eq!(t.classify(40.0), RiskTier::Critical);
        assert_eq!(t.classify(170.0), RiskTier::Critical);
    }

    #[test]
    fn test_spo2_classification() {
        let t = RiskConfig::default().spo2;
        assert_eq!(t.classify(99.0), RiskTier::Low);
        assert_eq!(t.classify(94.0), RiskTier::Medium);
        assert_eq!(t.classify(90.0), RiskTier::High);
        assert_eq!(t.classify(86.0), RiskTier::Critical);
    }

    #[test]
    fn test_inverted_bands_rejected() {
        let mut config = RiskConfig::default();
        config.heart_rate.high = VitalBand::new(70.0, 90.0);
        let errors = config.validate();
        assert!(errors.iter().any(|e| e.contains("widen")));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: RiskConfig = toml::from_str("min_vitals_confidence = 0.5").unwrap();
        assert_eq!(config.min_vitals_confidence, 0.5);
        assert_eq!(config.event_retention_secs, 300);
        assert_eq!(config.irregular_rhythm_tier, RiskTier::Medium);
    }
}
