//! Common utility functions for the vital-guard core
//!
//! - Time providers with a tokio-clock variant for deterministic timers
//! - Descriptive statistics over sample and interval windows

pub mod time;
pub mod stats;

pub use time::{
    current_timestamp_millis,
    sample_period_millis,
    MockTimeProvider,
    SystemTimeProvider,
    TimeProvider,
    TokioTimeProvider,
};
