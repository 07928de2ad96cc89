//! Vital-Guard: vital-sign extraction and emergency escalation core
//!
//! This library turns a stream of raw optical or audio sample frames into
//! vital-sign estimates, scores them together with discrete events and
//! environmental readings, and drives a timed, retried notification
//! workflow when the risk tier crosses a threshold. It features:
//!
//! - A sample source abstraction with a clearly flagged synthetic fallback
//! - A signal processor that degrades through confidence instead of failing
//! - A risk scorer where the most severe category always dominates
//! - An escalation state machine with owned, cancellable timers
//!
//! Every estimate is a non-diagnostic heuristic.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vital_guard::config::SystemConfig;
//! use vital_guard::escalation::{ContactChannel, ContactRole, EmergencyContact, LoggingDispatcher};
//! use vital_guard::monitor::VitalMonitor;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let contacts = vec![
//!         EmergencyContact::new("partner", ContactChannel::Call, ContactRole::Primary, 1).as_default(),
//!     ];
//!
//!     // No capture source: the synthetic generator is substituted and flagged
//!     let (monitor, _task) =
//!         VitalMonitor::spawn(SystemConfig::default(), None, Arc::new(LoggingDispatcher), contacts).await?;
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(10)).await;
//!     let reading = monitor.latest_reading();
//!     println!("HR {:.0} bpm (simulated: {})", reading.heart_rate, reading.simulated);
//!
//!     monitor.shutdown().await;
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod acquisition;
pub mod config;
pub mod error;
pub mod escalation;
pub mod hal;
pub mod monitor;
pub mod processing;
pub mod risk;
pub mod utils;

// Re-export commonly used types for convenience
pub use error::{VitalError, VitalResult};

pub use hal::{SampleFrame, SampleSource, SourceError, SourceFactory, SourceInfo, SourceKind};

pub use processing::{SignalProcessor, VitalReading};

pub use risk::{EnvironmentalFactor, EventCode, RiskScore, RiskScorer, RiskTier};

pub use escalation::{
    EmergencyContact, EngineState, EscalationEngine, EscalationHandle, NotificationDispatcher,
};

pub use monitor::{MonitorHandle, VitalMonitor};

pub use utils::time::{current_timestamp_millis, TimeProvider};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: "Vital-sign extraction and emergency escalation core".to_string(),
        features: vec![
            "Sample source abstraction with synthetic fallback".to_string(),
            "Confidence-tagged vital-sign estimation".to_string(),
            "Tier-dominant risk scoring".to_string(),
            "Timer-driven escalation state machine".to_string(),
            "Layered configuration with hot reload".to_string(),
        ],
    }
}

/// Library version information
#[derive(Debug, Clone)]
pub struct VersionInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    pub features: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info() {
        let info = version_info();
        assert_eq!(info.name, NAME);
        assert_eq!(info.version, VERSION);
        assert!(!info.features.is_empty());
    }

    #[test]
    fn test_constants() {
        assert!(!VERSION.is_empty());
        assert_eq!(NAME, "vital-guard");
    }
}
