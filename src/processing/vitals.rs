//! Vital reading snapshot produced by the signal processor

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How a derived value was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateKind {
    /// Derived directly from detected pulse timing
    Measured,
    /// Non-diagnostic proxy from an uncalibrated formula
    Heuristic,
}

/// A derived value with its own confidence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub value: f32,
    pub confidence: f32,
    pub kind: EstimateKind,
}

impl Estimate {
    pub fn heuristic(value: f32, confidence: f32) -> Self {
        Self {
            value,
            confidence: confidence.clamp(0.0, 1.0),
            kind: EstimateKind::Heuristic,
        }
    }

    pub fn measured(value: f32, confidence: f32) -> Self {
        Self {
            value,
            confidence: confidence.clamp(0.0, 1.0),
            kind: EstimateKind::Measured,
        }
    }

    fn with_confidence_cap(self, cap: f32) -> Self {
        Self {
            confidence: self.confidence.min(cap),
            ..self
        }
    }
}

/// Heart-rate variability summary
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HrvMetrics {
    pub rmssd_ms: f32,
    pub sdnn_ms: f32,
    /// 0 (relaxed) to 100 (stressed)
    pub stress_index: f32,
}

/// Heuristic blood-pressure proxy; never equivalent to a cuff reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BloodPressureEstimate {
    pub systolic: f32,
    pub diastolic: f32,
    pub confidence: f32,
}

/// Rhythm findings
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrhythmiaFlag {
    IrregularRhythm,
    Bradycardia,
    Tachycardia,
    PossiblePrematureBeat,
}

impl std::fmt::Display for ArrhythmiaFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArrhythmiaFlag::IrregularRhythm => write!(f, "irregular rhythm"),
            ArrhythmiaFlag::Bradycardia => write!(f, "bradycardia"),
            ArrhythmiaFlag::Tachycardia => write!(f, "tachycardia"),
            ArrhythmiaFlag::PossiblePrematureBeat => write!(f, "possible premature beat"),
        }
    }
}

/// Sensor placement quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementQuality {
    None,
    Poor,
    Good,
    Excellent,
}

impl PlacementQuality {
    /// Upper bound on any confidence reported at this quality
    pub fn confidence_cap(&self) -> f32 {
        use crate::config::constants::quality;
        match self {
            PlacementQuality::None => quality::CONFIDENCE_CAP_NONE,
            PlacementQuality::Poor => quality::CONFIDENCE_CAP_POOR,
            PlacementQuality::Good => quality::CONFIDENCE_CAP_GOOD,
            PlacementQuality::Excellent => 1.0,
        }
    }
}

/// Immutable vital-sign snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalReading {
    pub heart_rate: f32,
    pub spo2: Estimate,
    pub temperature: Estimate,
    pub respiratory_rate: Estimate,
    pub perfusion_index: Estimate,
    /// Present once enough RR intervals have been collected
    pub hrv: Option<HrvMetrics>,
    pub blood_pressure: BloodPressureEstimate,
    pub arrhythmia_flags: BTreeSet<ArrhythmiaFlag>,
    pub placement_quality: PlacementQuality,
    pub confidence: f32,
    /// Set when the frames came from the synthetic generator
    pub simulated: bool,
    /// Set when this reading was carried over from an earlier cycle
    pub stale: bool,
    pub timestamp_ms: u64,
}

impl VitalReading {
    /// Reading reported before any usable signal has been seen
    pub fn initial(default_heart_rate: f32, timestamp_ms: u64, simulated: bool) -> Self {
        use crate::config::constants::physiology;
        Self {
            heart_rate: default_heart_rate,
            spo2: Estimate::heuristic(physiology::SPO2_MAX - 2.0, 0.0),
            temperature: Estimate::heuristic(36.6, 0.0),
            respiratory_rate: Estimate::heuristic(physiology::DEFAULT_RESPIRATORY_RATE, 0.0),
            perfusion_index: Estimate::heuristic(0.0, 0.0),
            hrv: None,
            blood_pressure: BloodPressureEstimate {
                systolic: 120.0,
                diastolic: 80.0,
                confidence: 0.0,
            },
            arrhythmia_flags: BTreeSet::new(),
            placement_quality: PlacementQuality::None,
            confidence: 0.0,
            simulated,
            stale: true,
            timestamp_ms,
        }
    }

    /// Cap every confidence in the reading
    pub fn cap_confidence(mut self, cap: f32) -> Self {
        self.confidence = self.confidence.min(cap);
        self.spo2 = self.spo2.with_confidence_cap(cap);
        self.temperature = self.temperature.with_confidence_cap(cap);
        self.respiratory_rate = self.respiratory_rate.with_confidence_cap(cap);
        self.perfusion_index = self.perfusion_index.with_confidence_cap(cap);
        self.blood_pressure.confidence = self.blood_pressure.confidence.min(cap);
        self
    }

    /// Carry the reading forward with confidence scaled by `decay`
    pub fn decayed(&self, decay: f32, timestamp_ms: u64) -> Self {
        let mut reading = self.clone();
        let scale = decay.clamp(0.0, 1.0);
        reading.confidence *= scale;
        reading.spo2.confidence *= scale;
        reading.temperature.confidence *= scale;
        reading.respiratory_rate.confidence *= scale;
        reading.perfusion_index.confidence *= scale;
        reading.blood_pressure.confidence *= scale;
        reading.stale = true;
        reading.timestamp_ms = timestamp_ms;
        reading
    }

    pub fn has_flag(&self, flag: ArrhythmiaFlag) -> bool {
        self.arrhythmia_flags.contains(&flag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_reading_is_not_zero() {
        let reading = VitalReading::initial(70.0, 5, true);
        assert_eq!(reading.heart_rate, 70.0);
        assert_eq!(reading.confidence, 0.0);
        assert!(reading.simulated);
        assert_eq!(reading.placement_quality, PlacementQuality::None);
    }

    #[test]
    fn test_decay_scales_every_confidence() {
        let mut reading = VitalReading::initial(70.0, 0, false);
        reading.confidence = 0.8;
        reading.spo2.confidence = 0.5;
        reading.blood_pressure.confidence = 0.4;

        let decayed = reading.decayed(0.5, 100);
        assert_eq!(decayed.confidence, 0.4);
        assert_eq!(decayed.spo2.confidence, 0.25);
        assert_eq!(decayed.blood_pressure.confidence, 0.2);
        assert_eq!(decayed.heart_rate, 70.0);
        assert!(decayed.stale);
        assert_eq!(decayed.timestamp_ms, 100);
    }

    #[test]
    fn test_quality_caps_are_ordered() {
        assert!(PlacementQuality::None.confidence_cap() < PlacementQuality::Poor.confidence_cap());
        assert!(PlacementQuality::Poor.confidence_cap() < PlacementQuality::Good.confidence_cap());
        assert!(PlacementQuality::Good < PlacementQuality::Excellent);
    }

    #[test]
    fn test_flags_deduplicate() {
        let mut reading = VitalReading::initial(70.0, 0, false);
        reading.arrhythmia_flags.insert(ArrhythmiaFlag::Bradycardia);
        reading.arrhythmia_flags.insert(ArrhythmiaFlag::Bradycardia);
        assert_eq!(reading.arrhythmia_flags.len(), 1);
        assert!(reading.has_flag(ArrhythmiaFlag::Bradycardia));
    }
}
