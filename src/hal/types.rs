//! Core types for sample source abstraction

use serde::{Deserialize, Serialize};

/// One acquisition tick from a capture device
///
/// `channels` holds per-channel mean intensities on a 0-255 scale (for the
/// optical path: red, green, blue). `profile_match` is the fraction of the
/// frame that matches the expected fingertip reflectance profile.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleFrame {
    pub timestamp_ms: u64,
    pub channels: Vec<f32>,
    pub profile_match: f32,
}

impl SampleFrame {
    pub fn new(timestamp_ms: u64, channels: Vec<f32>, profile_match: f32) -> Self {
        Self {
            timestamp_ms,
            channels,
            profile_match,
        }
    }

    /// Brightness of the given channel, zero when the channel is missing
    pub fn channel(&self, index: usize) -> f32 {
        self.channels.get(index).copied().unwrap_or(0.0)
    }
}

/// Source information and capabilities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub name: String,
    pub kind: SourceKind,
    pub capabilities: SourceCapabilities,
}

/// Source capability flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceCapabilities {
    pub channel_count: usize,
    pub sample_rate_hz: f32,
    pub reports_profile_match: bool,
}

/// Kind of sample source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Camera,
    Microphone,
    Synthetic,
}

impl SourceKind {
    pub fn is_simulated(&self) -> bool {
        matches!(self, SourceKind::Synthetic)
    }
}

impl Default for SourceCapabilities {
    fn default() -> Self {
        Self {
            channel_count: 3,
            sample_rate_hz: crate::config::constants::sampling::DEFAULT_SAMPLE_RATE_HZ,
            reports_profile_match: true,
        }
    }
}
