// src/config/mod.rs
//! Layered configuration for sampling, processing, risk and escalation

pub mod constants;
pub mod escalation_config;
pub mod loader;
pub mod processing_config;
pub mod risk_config;
pub mod source_config;

pub use constants::*;
pub use escalation_config::EscalationConfig;
pub use loader::{ConfigError, ConfigLoader};
pub use processing_config::*;
pub use risk_config::*;
pub use source_config::*;

use serde::{Deserialize, Serialize};

/// Complete system configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct SystemConfig {
    #[serde(default)]
    pub sampling: SamplingSettings,
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub escalation: EscalationConfig,
    #[serde(default)]
    pub source: SourceSettings,
}

impl SystemConfig {
    /// Validate configuration consistency across sections
    pub fn validate_consistency(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        let rate = self.sampling.sample_rate_hz;
        if !(sampling::MIN_SAMPLE_RATE_HZ..=sampling::MAX_SAMPLE_RATE_HZ).contains(&rate) {
            errors.push(format!(
                "sample_rate_hz ({}) must be within {}..={}",
                rate,
                sampling::MIN_SAMPLE_RATE_HZ,
                sampling::MAX_SAMPLE_RATE_HZ
            ));
        }

        let capacity = self.sampling.buffer_capacity();
        if self.sampling.min_samples > capacity {
            errors.push(format!(
                "min_samples ({}) exceeds the window capacity ({} samples)",
                self.sampling.min_samples, capacity
            ));
        }
        if self.sampling.recompute_every == 0 {
            errors.push("recompute_every must be greater than 0".to_string());
        }

        let processing = &self.processing;
        if processing.min_heart_rate_bpm >= processing.max_heart_rate_bpm {
            errors.push(format!(
                "min_heart_rate_bpm ({}) must be below max_heart_rate_bpm ({})",
                processing.min_heart_rate_bpm, processing.max_heart_rate_bpm
            ));
        }

        // Fastest pulse must stay below Nyquist
        let nyquist = rate / 2.0;
        if processing.max_heart_rate_bpm / 60.0 >= nyquist {
            errors.push(format!(
                "max_heart_rate_bpm ({}) is not resolvable at {} Hz",
                processing.max_heart_rate_bpm, rate
            ));
        }
        if !(0.0..=1.0).contains(&processing.peak_threshold_fraction) {
            errors.push("peak_threshold_fraction must be within 0.0..=1.0".to_string());
        }
        if !(0.0..=1.0).contains(&processing.confidence_decay) {
            errors.push("confidence_decay must be within 0.0..=1.0".to_string());
        }

        // Substituted frames feed the same window
        if (self.source.synthetic.sample_rate_hz - rate).abs() > f32::EPSILON {
            errors.push(format!(
                "source.synthetic.sample_rate_hz ({}) must match sampling.sample_rate_hz ({})",
                self.source.synthetic.sample_rate_hz, rate
            ));
        }

        errors.extend(self.risk.validate());
        errors.extend(self.escalation.validate());
        if let Err(e) = validate_source_settings(&self.source) {
            errors.push(e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Get configuration summary
    pub fn get_summary(&self) -> ConfigSummary {
        ConfigSummary {
            sample_rate_hz: self.sampling.sample_rate_hz,
            window_samples: self.sampling.buffer_capacity(),
            preferred_source: self.source.preferred,
            trigger_threshold: self.escalation.trigger_threshold,
            countdown_secs: self.escalation.countdown_secs,
        }
    }
}

/// Configuration summary for display/logging
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    pub sample_rate_hz: f32,
    pub window_samples: usize,
    pub preferred_source: crate::hal::SourceKind,
    pub trigger_threshold: crate::risk::RiskTier,
    pub countdown_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_creation() {
        let config = SystemConfig::default();
        assert_eq!(config.sampling.sample_rate_hz, sampling::DEFAULT_SAMPLE_RATE_HZ);
        assert_eq!(config.sampling.buffer_capacity(), 300);
        assert!(config.validate_consistency().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = SystemConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: SystemConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.sampling.sample_rate_hz, deserialized.sampling.sample_rate_hz);
        assert_eq!(config.risk, deserialized.risk);
        assert_eq!(config.escalation, deserialized.escalation);
    }

    #[test]
    fn test_empty_document_is_default() {
        let config: SystemConfig = toml::from_str("").unwrap();
        assert_eq!(config.escalation.countdown_secs, 10);
        assert!(config.validate_consistency().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = SystemConfig::default();
        config.sampling.min_samples = 10_000;
        config.processing.min_heart_rate_bpm = 200.0;

        let errors = config.validate_consistency().unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_heart_rate_above_nyquist_rejected() {
        let mut config = SystemConfig::default();
        config.sampling.sample_rate_hz = 10.0;
        config.sampling.min_samples = 50;
        config.processing.max_heart_rate_bpm = 400.0;

        let errors = config.validate_consistency().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("not resolvable")));
    }
}
