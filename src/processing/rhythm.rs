//! Heart-rate variability and arrhythmia screening over RR intervals

use crate::config::constants::rhythm;
use crate::config::processing_config::RhythmConfig;
use crate::processing::vitals::{ArrhythmiaFlag, HrvMetrics};
use crate::utils::stats;
use std::collections::BTreeSet;

/// RMSSD, SDNN and the derived stress index, once enough intervals exist
pub fn hrv_metrics(rr_ms: &[f32], min_intervals: usize) -> Option<HrvMetrics> {
    if rr_ms.len() < min_intervals.max(2) {
        return None;
    }

    let successive: Vec<f32> = rr_ms.windows(2).map(|w| (w[1] - w[0]).powi(2)).collect();
    let rmssd_ms = stats::mean(&successive).sqrt();
    let sdnn_ms = stats::std_dev(rr_ms);
    let stress_index = (100.0 * (1.0 - rmssd_ms / rhythm::STRESS_RMSSD_REFERENCE_MS)).clamp(0.0, 100.0);

    Some(HrvMetrics {
        rmssd_ms,
        sdnn_ms,
        stress_index,
    })
}

/// Rate and rhythm flags
///
/// Rate flags come from `heart_rate`; rhythm flags need at least three
/// recent intervals.
pub fn classify(rr_ms: &[f32], heart_rate: f32, config: &RhythmConfig) -> BTreeSet<ArrhythmiaFlag> {
    let mut flags = BTreeSet::new();

    if heart_rate < config.bradycardia_bpm {
        flags.insert(ArrhythmiaFlag::Bradycardia);
    }
    if heart_rate > config.tachycardia_bpm {
        flags.insert(ArrhythmiaFlag::Tachycardia);
    }

    let recent = &rr_ms[rr_ms.len().saturating_sub(rhythm::RECENT_RR_WINDOW)..];
    if recent.len() < rhythm::MIN_RR_FOR_RHYTHM {
        return flags;
    }

    if stats::coefficient_of_variation(recent) > config.irregular_cv_threshold {
        flags.insert(ArrhythmiaFlag::IrregularRhythm);
    }
    if has_premature_beat(recent, config.premature_beat_deviation) {
        flags.insert(ArrhythmiaFlag::PossiblePrematureBeat);
    }

    flags
}

/// True when any interval deviates from its neighbours' mean by more than `deviation`
fn has_premature_beat(rr_ms: &[f32], deviation: f32) -> bool {
    let reach = rhythm::PREMATURE_BEAT_NEIGHBOURHOOD;

    (0..rr_ms.len()).any(|i| {
        let lo = i.saturating_sub(reach);
        let hi = (i + reach + 1).min(rr_ms.len());
        let neighbours: Vec<f32> = (lo..hi).filter(|&j| j != i).map(|j| rr_ms[j]).collect();
        let local = stats::mean(&neighbours);
        local > 0.0 && ((rr_ms[i] - local) / local).abs() > deviation
    })
}
