// src/config/source_config.rs
//! Sample source selection configuration

use crate::config::constants::source;
use crate::hal::{SourceKind, SyntheticConfig};
use serde::{Deserialize, Serialize};

/// Which source to probe first and when to give up on it
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SourceSettings {
    #[serde(default = "defaults::preferred")]
    pub preferred: SourceKind,

    /// Substitute the synthetic generator when the preferred source fails
    #[serde(default = "defaults::allow_synthetic_fallback")]
    pub allow_synthetic_fallback: bool,

    /// Consecutive read failures tolerated before substitution
    #[serde(default = "defaults::max_consecutive_read_failures")]
    pub max_consecutive_read_failures: u32,

    /// Read timeout as a multiple of the sample period
    #[serde(default = "defaults::read_timeout_periods")]
    pub read_timeout_periods: u32,

    #[serde(default)]
    pub synthetic: SyntheticConfig,
}

mod defaults {
    use super::*;

    pub fn preferred() -> SourceKind { SourceKind::Camera }
    pub fn allow_synthetic_fallback() -> bool { true }
    pub fn max_consecutive_read_failures() -> u32 { source::DEFAULT_MAX_CONSECUTIVE_READ_FAILURES }
    pub fn read_timeout_periods() -> u32 { source::DEFAULT_READ_TIMEOUT_PERIODS }
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            preferred: defaults::preferred(),
            allow_synthetic_fallback: defaults::allow_synthetic_fallback(),
            max_consecutive_read_failures: defaults::max_consecutive_read_failures(),
            read_timeout_periods: defaults::read_timeout_periods(),
            synthetic: SyntheticConfig::default(),
        }
    }
}

/// Source settings validation
pub fn validate_source_settings(settings: &SourceSettings) -> Result<(), String> {
    if settings.max_consecutive_read_failures == 0 {
        return Err("max_consecutive_read_failures must be greater than 0".to_string());
    }
    if settings.read_timeout_periods == 0 {
        return Err("read_timeout_periods must be greater than 0".to_string());
    }
    if settings.preferred.is_simulated() && !settings.allow_synthetic_fallback {
        return Err("preferred source is synthetic but synthetic frames are disallowed".to_string());
    }
    settings.synthetic.validate().map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        assert!(validate_source_settings(&SourceSettings::default()).is_ok());
    }

    #[test]
    fn test_zero_failure_budget_rejected() {
        let settings = SourceSettings {
            max_consecutive_read_failures: 0,
            ..Default::default()
        };
        assert!(validate_source_settings(&settings).is_err());
    }

    #[test]
    fn test_invalid_synthetic_config_rejected() {
        let mut settings = SourceSettings::default();
        settings.synthetic.profile_match = 2.0;
        assert!(validate_source_settings(&settings).unwrap_err().contains("profile_match"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let settings: SourceSettings = toml::from_str("preferred = \"microphone\"").unwrap();
        assert_eq!(settings.preferred, SourceKind::Microphone);
        assert!(settings.allow_synthetic_fallback);
        assert_eq!(settings.max_consecutive_read_failures, 5);
    }
}
