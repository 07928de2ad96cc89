// src/config/escalation_config.rs
//! Escalation timing and threshold configuration

use crate::config::constants::escalation;
use crate::risk::RiskTier;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EscalationConfig {
    /// Lowest risk tier that starts an escalation
    #[serde(default = "defaults::trigger_threshold")]
    pub trigger_threshold: RiskTier,

    /// Cancellable countdown before activation; skipped for critical and manual triggers
    #[serde(default = "defaults::countdown_secs")]
    pub countdown_secs: u64,

    /// Minimum gap between two dispatch starts
    #[serde(default = "defaults::stagger_secs")]
    pub stagger_secs: u64,

    #[serde(default = "defaults::critical_step_up_secs")]
    pub critical_step_up_secs: u64,

    #[serde(default = "defaults::high_step_up_secs")]
    pub high_step_up_secs: u64,

    #[serde(default = "defaults::retry_backoff_secs")]
    pub retry_backoff_secs: u64,

    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    #[serde(default = "defaults::dispatch_timeout_secs")]
    pub dispatch_timeout_secs: u64,

    #[serde(default = "defaults::command_queue_size")]
    pub command_queue_size: usize,
}

mod defaults {
    use super::*;

    pub fn trigger_threshold() -> RiskTier { RiskTier::Medium }
    pub fn countdown_secs() -> u64 { escalation::DEFAULT_COUNTDOWN_SECS }
    pub fn stagger_secs() -> u64 { escalation::DEFAULT_STAGGER_SECS }
    pub fn critical_step_up_secs() -> u64 { escalation::DEFAULT_CRITICAL_STEP_UP_SECS }
    pub fn high_step_up_secs() -> u64 { escalation::DEFAULT_HIGH_STEP_UP_SECS }
    pub fn retry_backoff_secs() -> u64 { escalation::DEFAULT_RETRY_BACKOFF_SECS }
    pub fn max_retries() -> u32 { escalation::MAX_RETRIES }
    pub fn dispatch_timeout_secs() -> u64 { escalation::DEFAULT_DISPATCH_TIMEOUT_SECS }
    pub fn command_queue_size() -> usize { escalation::COMMAND_QUEUE_SIZE }
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            trigger_threshold: defaults::trigger_threshold(),
            countdown_secs: defaults::countdown_secs(),
            stagger_secs: defaults::stagger_secs(),
            critical_step_up_secs: defaults::critical_step_up_secs(),
            high_step_up_secs: defaults::high_step_up_secs(),
            retry_backoff_secs: defaults::retry_backoff_secs(),
            max_retries: defaults::max_retries(),
            dispatch_timeout_secs: defaults::dispatch_timeout_secs(),
            command_queue_size: defaults::command_queue_size(),
        }
    }
}

impl EscalationConfig {
    pub fn countdown(&self) -> Duration {
        Duration::from_secs(self.countdown_secs)
    }

    pub fn stagger(&self) -> Duration {
        Duration::from_secs(self.stagger_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
    }

    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_secs(self.dispatch_timeout_secs)
    }

    /// Delay before deferred contacts of `tier` are notified
    pub fn step_up_delay(&self, tier: RiskTier) -> Duration {
        match tier {
            RiskTier::Critical => Duration::from_secs(self.critical_step_up_secs),
            _ => Duration::from_secs(self.high_step_up_secs),
        }
    }

    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_retries > escalation::MAX_RETRIES {
            errors.push(format!(
                "max_retries ({}) may not exceed {}",
                self.max_retries,
                escalation::MAX_RETRIES
            ));
        }
        if self.dispatch_timeout_secs == 0 {
            errors.push("dispatch_timeout_secs must be greater than 0".to_string());
        }
        if self.command_queue_size == 0 {
            errors.push("command_queue_size must be greater than 0".to_string());
        }
        if self.trigger_threshold == RiskTier::Low {
            errors.push("trigger_threshold low would escalate on every reading".to_string());
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EscalationConfig::default();
        assert_eq!(config.countdown(), Duration::from_secs(10));
        assert_eq!(config.step_up_delay(RiskTier::Critical), Duration::from_secs(30));
        assert_eq!(config.step_up_delay(RiskTier::High), Duration::from_secs(60));
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_retry_cap_enforced() {
        let config = EscalationConfig {
            max_retries: 5,
            ..EscalationConfig::default()
        };
        assert_eq!(config.validate().len(), 1);
    }

    #[test]
    fn test_threshold_from_toml() {
        let config: EscalationConfig = toml::from_str("trigger_threshold = \"high\"\ncountdown_secs = 5").unwrap();
        assert_eq!(config.trigger_threshold, RiskTier::High);
        assert_eq!(config.countdown_secs, 5);
        assert_eq!(config.stagger_secs, 2);
    }
}
