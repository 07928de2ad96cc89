//! Time providers for timestamping readings, events and timeline entries

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Time provider trait for dependency injection and testing
pub trait TimeProvider: Send + Sync {
    fn now_millis(&self) -> u64;
}

/// System time provider using the wall clock
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now_millis(&self) -> u64 {
        current_timestamp_millis()
    }
}

/// Wall-clock anchored provider that advances with the tokio clock.
///
/// Under `tokio::time::pause()` the returned timestamps follow the paused
/// clock, which keeps escalation timelines deterministic in tests.
pub struct TokioTimeProvider {
    epoch_millis: u64,
    origin: tokio::time::Instant,
}

impl TokioTimeProvider {
    pub fn new() -> Self {
        Self {
            epoch_millis: current_timestamp_millis(),
            origin: tokio::time::Instant::now(),
        }
    }

    /// Anchor the provider at an explicit epoch instead of the wall clock
    pub fn anchored_at(epoch_millis: u64) -> Self {
        Self {
            epoch_millis,
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioTimeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeProvider for TokioTimeProvider {
    fn now_millis(&self) -> u64 {
        self.epoch_millis + self.origin.elapsed().as_millis() as u64
    }
}

/// Mock time provider for deterministic testing
pub struct MockTimeProvider {
    current_time: AtomicU64,
}

impl MockTimeProvider {
    pub fn new(initial_time_millis: u64) -> Self {
        Self {
            current_time: AtomicU64::new(initial_time_millis),
        }
    }

    pub fn advance_by(&self, millis: u64) {
        self.current_time.fetch_add(millis, Ordering::Relaxed);
    }

    pub fn set_time(&self, millis: u64) {
        self.current_time.store(millis, Ordering::Relaxed);
    }
}

impl TimeProvider for MockTimeProvider {
    fn now_millis(&self) -> u64 {
        self.current_time.load(Ordering::Relaxed)
    }
}

pub fn current_timestamp_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Sample period in milliseconds for a sampling rate
pub fn sample_period_millis(sample_rate_hz: f32) -> f32 {
    if sample_rate_hz <= 0.0 {
        return 0.0;
    }
    1000.0 / sample_rate_hz
}
