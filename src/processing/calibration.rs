//! Heuristic calibration for the indirect vital proxies
//!
//! None of these constants are clinically derived. They keep the estimates
//! in a plausible range and are kept together so a validated model can
//! replace them without touching the pipeline.

use crate::config::constants::physiology;
use crate::processing::vitals::BloodPressureEstimate;
use serde::{Deserialize, Serialize};

/// Non-diagnostic calibration constants
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Calibration {
    /// `spo2 = spo2_intercept - spo2_slope * (AC / DC)`
    pub spo2_intercept: f32,
    pub spo2_slope: f32,

    pub systolic_base: f32,
    pub systolic_per_bpm: f32,
    pub systolic_per_ptt_ms: f32,
    pub diastolic_base: f32,
    pub diastolic_per_bpm: f32,
    pub diastolic_per_ptt_ms: f32,
    /// Pulse rise time treated as neutral, in ms
    pub reference_ptt_ms: f32,

    pub temperature_base_c: f32,
    pub temperature_per_bpm: f32,
    pub temperature_per_perfusion: f32,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            spo2_intercept: 100.0,
            spo2_slope: 150.0,
            systolic_base: 120.0,
            systolic_per_bpm: 0.5,
            systolic_per_ptt_ms: -0.1,
            diastolic_base: 80.0,
            diastolic_per_bpm: 0.3,
            diastolic_per_ptt_ms: -0.05,
            reference_ptt_ms: 250.0,
            temperature_base_c: 36.6,
            temperature_per_bpm: 0.01,
            temperature_per_perfusion: 0.05,
        }
    }
}

impl Calibration {
    /// These constants never come from a clinical study
    pub fn is_clinically_validated(&self) -> bool {
        false
    }

    /// SpO2 from the AC/DC ratio, clamped to the reportable range
    pub fn spo2(&self, ac: f32, dc: f32) -> f32 {
        if dc <= f32::EPSILON || !ac.is_finite() {
            return physiology::SPO2_MIN;
        }
        let ratio = ac / dc;
        (self.spo2_intercept - self.spo2_slope * ratio).clamp(physiology::SPO2_MIN, physiology::SPO2_MAX)
    }

    /// Blood pressure from heart rate and a pulse-transit-time proxy
    pub fn blood_pressure(&self, heart_rate: f32, ptt_ms: f32, confidence: f32) -> BloodPressureEstimate {
        let hr_delta = heart_rate - physiology::DEFAULT_HEART_RATE_BPM;
        let ptt_delta = ptt_ms - self.reference_ptt_ms;

        let systolic = (self.systolic_base + self.systolic_per_bpm * hr_delta + self.systolic_per_ptt_ms * ptt_delta)
            .clamp(physiology::SYSTOLIC_RANGE.0, physiology::SYSTOLIC_RANGE.1);
        let diastolic = (self.diastolic_base + self.diastolic_per_bpm * hr_delta + self.diastolic_per_ptt_ms * ptt_delta)
            .clamp(physiology::DIASTOLIC_RANGE.0, physiology::DIASTOLIC_RANGE.1)
            .min(systolic - physiology::MIN_PULSE_PRESSURE);

        BloodPressureEstimate {
            systolic,
            diastolic,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Skin temperature proxy from heart rate and perfusion
    pub fn temperature(&self, heart_rate: f32, perfusion_index: f32) -> f32 {
        let hr_delta = heart_rate - physiology::DEFAULT_HEART_RATE_BPM;
        let perfusion_delta = perfusion_index - 2.0;
        (self.temperature_base_c + self.temperature_per_bpm * hr_delta + self.temperature_per_perfusion * perfusion_delta)
            .clamp(physiology::TEMPERATURE_RANGE_C.0, physiology::TEMPERATURE_RANGE_C.1)
    }
}
