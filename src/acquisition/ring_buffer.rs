//! Fixed-capacity rolling window of scalar samples

use std::collections::VecDeque;
use thiserror::Error;

/// One reduced sample with its acquisition time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedSample {
    pub timestamp_ms: u64,
    pub value: f32,
}

/// Buffer error types
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BufferError {
    #[error("invalid buffer capacity {0} (must be non-zero)")]
    InvalidCapacity(usize),
}

/// Rolling FIFO window owned by the signal processor
///
/// Length never exceeds capacity; pushing into a full buffer evicts the
/// oldest sample first.
#[derive(Debug, Clone)]
pub struct SignalBuffer {
    samples: VecDeque<TimedSample>,
    capacity: usize,
    evicted: u64,
}

impl SignalBuffer {
    /// Create a buffer holding at most `capacity` samples
    pub fn new(capacity: usize) -> Result<Self, BufferError> {
        if capacity == 0 {
            return Err(BufferError::InvalidCapacity(capacity));
        }

        Ok(Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            evicted: 0,
        })
    }

    /// Create a buffer sized for a time window at a sampling rate
    pub fn for_window(window_secs: f32, sample_rate_hz: f32) -> Result<Self, BufferError> {
        let capacity = (window_secs * sample_rate_hz).round().max(0.0) as usize;
        Self::new(capacity)
    }

    /// Push a sample, returning the evicted one if the buffer was full
    pub fn push(&mut self, timestamp_ms: u64, value: f32) -> Option<TimedSample> {
        let evicted = if self.samples.len() == self.capacity {
            self.evicted += 1;
            self.samples.pop_front()
        } else {
            None
        };

        self.samples.push_back(TimedSample { timestamp_ms, value });
        evicted
    }

    /// Sample values, oldest first
    pub fn values(&self) -> Vec<f32> {
        self.samples.iter().map(|s| s.value).collect()
    }

    /// Sample timestamps, oldest first
    pub fn timestamps(&self) -> Vec<u64> {
        self.samples.iter().map(|s| s.timestamp_ms).collect()
    }

    /// The most recent `count` values, oldest first
    pub fn latest_values(&self, count: usize) -> Vec<f32> {
        let skip = self.samples.len().saturating_sub(count);
        self.samples.iter().skip(skip).map(|s| s.value).collect()
    }

    pub fn latest(&self) -> Option<TimedSample> {
        self.samples.back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimedSample> {
        self.samples.iter()
    }

    /// Time covered by the buffered samples
    pub fn span_ms(&self) -> u64 {
        match (self.samples.front(), self.samples.back()) {
            (Some(first), Some(last)) => last.timestamp_ms.saturating_sub(first.timestamp_ms),
            _ => 0,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current buffer utilization (0.0 to 1.0)
    pub fn utilization(&self) -> f32 {
        self.samples.len() as f32 / self.capacity as f32
    }

    /// Total number of samples evicted since creation
    pub fn evicted_count(&self) -> u64 {
        self.evicted
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
