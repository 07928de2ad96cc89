// src/config/processing_config.rs
//! Sampling and signal processing configuration structures

use crate::config::constants::{filters, physiology, quality, rhythm, sampling};
use crate::processing::calibration::Calibration;
use serde::{Deserialize, Serialize};

/// Sampling window settings
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SamplingSettings {
    #[serde(default = "defaults::sample_rate_hz")]
    pub sample_rate_hz: f32,

    /// Length of the rolling window in seconds
    #[serde(default = "defaults::window_secs")]
    pub window_secs: f32,

    /// Samples required before a full recompute is attempted
    #[serde(default = "defaults::min_samples")]
    pub min_samples: usize,

    /// Recompute cadence in ingested frames
    #[serde(default = "defaults::recompute_every")]
    pub recompute_every: usize,
}

/// Complete processing pipeline configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProcessingConfig {
    /// Index of the channel carrying the pulse (red for the optical path)
    #[serde(default)]
    pub dominant_channel: usize,

    /// Fraction of the other channels' mean subtracted from the dominant one
    #[serde(default = "defaults::compensation_factor")]
    pub compensation_factor: f32,

    #[serde(default = "defaults::peak_threshold_fraction")]
    pub peak_threshold_fraction: f32,

    #[serde(default = "defaults::min_heart_rate_bpm")]
    pub min_heart_rate_bpm: f32,

    #[serde(default = "defaults::max_heart_rate_bpm")]
    pub max_heart_rate_bpm: f32,

    #[serde(default = "defaults::default_heart_rate_bpm")]
    pub default_heart_rate_bpm: f32,

    /// Multiplier applied to confidence on every degraded recompute
    #[serde(default = "defaults::confidence_decay")]
    pub confidence_decay: f32,

    #[serde(default)]
    pub rhythm: RhythmConfig,

    #[serde(default)]
    pub quality: QualityConfig,

    #[serde(default)]
    pub calibration: Calibration,
}

/// Arrhythmia and HRV thresholds
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct RhythmConfig {
    pub irregular_cv_threshold: f32,
    pub bradycardia_bpm: f32,
    pub tachycardia_bpm: f32,
    pub premature_beat_deviation: f32,
    pub min_rr_for_hrv: usize,
}

/// Placement quality thresholds
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct QualityConfig {
    pub brightness_min: f32,
    pub brightness_max: f32,
    pub ideal_brightness: f32,
    pub min_profile_match: f32,
    pub poor_score: f32,
    pub excellent_score: f32,
    pub stability_window_secs: f32,
}

mod defaults {
    use super::*;

    pub fn sample_rate_hz() -> f32 { sampling::DEFAULT_SAMPLE_RATE_HZ }
    pub fn window_secs() -> f32 { sampling::DEFAULT_WINDOW_SECS }
    pub fn min_samples() -> usize { sampling::DEFAULT_MIN_SAMPLES }
    pub fn recompute_every() -> usize { sampling::DEFAULT_RECOMPUTE_EVERY }

    pub fn compensation_factor() -> f32 { 0.3 }
    pub fn peak_threshold_fraction() -> f32 { filters::DEFAULT_PEAK_THRESHOLD_FRACTION }
    pub fn min_heart_rate_bpm() -> f32 { physiology::MIN_HEART_RATE_BPM }
    pub fn max_heart_rate_bpm() -> f32 { physiology::MAX_HEART_RATE_BPM }
    pub fn default_heart_rate_bpm() -> f32 { physiology::DEFAULT_HEART_RATE_BPM }
    pub fn confidence_decay() -> f32 { quality::DEFAULT_CONFIDENCE_DECAY }
}

impl SamplingSettings {
    /// Buffer capacity implied by the window and rate
    pub fn buffer_capacity(&self) -> usize {
        (self.window_secs * self.sample_rate_hz).round().max(0.0) as usize
    }
}

impl Default for SamplingSettings {
    fn default() -> Self {
        Self {
            sample_rate_hz: defaults::sample_rate_hz(),
            window_secs: defaults::window_secs(),
            min_samples: defaults::min_samples(),
            recompute_every: defaults::recompute_every(),
        }
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            dominant_channel: 0,
            compensation_factor: defaults::compensation_factor(),
            peak_threshold_fraction: defaults::peak_threshold_fraction(),
            min_heart_rate_bpm: defaults::min_heart_rate_bpm(),
            max_heart_rate_bpm: defaults::max_heart_rate_bpm(),
            default_heart_rate_bpm: defaults::default_heart_rate_bpm(),
            confidence_decay: defaults::confidence_decay(),
            rhythm: RhythmConfig::default(),
            quality: QualityConfig::default(),
            calibration: Calibration::default(),
        }
    }
}

impl Default for RhythmConfig {
    fn default() -> Self {
        Self {
            irregular_cv_threshold: rhythm::IRREGULAR_CV_THRESHOLD,
            bradycardia_bpm: rhythm::BRADYCARDIA_BPM,
            tachycardia_bpm: rhythm::TACHYCARDIA_BPM,
            premature_beat_deviation: rhythm::PREMATURE_BEAT_DEVIATION,
            min_rr_for_hrv: rhythm::MIN_RR_FOR_HRV,
        }
    }
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            brightness_min: quality::BRIGHTNESS_RANGE.0,
            brightness_max: quality::BRIGHTNESS_RANGE.1,
            ideal_brightness: quality::IDEAL_BRIGHTNESS,
            min_profile_match: quality::MIN_PROFILE_MATCH,
            poor_score: quality::POOR_SCORE,
            excellent_score: quality::EXCELLENT_SCORE,
            stability_window_secs: quality::STABILITY_WINDOW_SECS,
        }
    }
}
