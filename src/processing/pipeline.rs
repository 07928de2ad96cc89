//! Signal processor turning sample frames into vital readings

use crate::acquisition::SignalBuffer;
use crate::config::constants::{physiology, quality};
use crate::config::processing_config::{ProcessingConfig, SamplingSettings};
use crate::error::{VitalError, VitalErrorBuilder};
use crate::hal::SampleFrame;
use crate::processing::filters::FilterChain;
use crate::processing::peaks::{self, PeakDetector};
use crate::processing::quality_monitor::{QualityAssessment, QualityMonitor};
use crate::processing::respiratory::RespiratoryEstimator;
use crate::processing::rhythm;
use crate::processing::vitals::{Estimate, VitalReading};
use crate::utils::stats;
use std::collections::VecDeque;
use tracing::debug;

/// RR intervals kept across overlapping windows for HRV
const RR_HISTORY_LEN: usize = 60;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct PerformanceMetrics {
    pub frames_ingested: u64,
    /// Frames with no usable channel value
    pub frames_dropped: u64,
    pub recomputes: u64,
    pub degraded_recomputes: u64,
    pub last_peak_count: usize,
}

/// Owns the rolling buffer and derives vital readings from it
///
/// Only the owning task calls `ingest` and `recompute`; readers get cloned
/// `VitalReading` snapshots.
pub struct SignalProcessor {
    sampling: SamplingSettings,
    config: ProcessingConfig,
    buffer: SignalBuffer,
    quality_monitor: QualityMonitor,
    filter_chain: FilterChain,
    peak_detector: PeakDetector,
    respiratory: RespiratoryEstimator,
    rr_history: VecDeque<(u64, f32)>,
    last_reading: Option<VitalReading>,
    simulated: bool,
    frames_since_recompute: usize,
    latest_timestamp_ms: u64,
    performance_metrics: PerformanceMetrics,
}

impl SignalProcessor {
    pub fn new(sampling: SamplingSettings, config: ProcessingConfig) -> Result<Self, VitalError> {
        if sampling.sample_rate_hz.is_nan() || sampling.sample_rate_hz <= 0.0 {
            return Err(VitalErrorBuilder::new("processor", "new")
                .configuration(&format!("sample rate must be positive, got {}", sampling.sample_rate_hz)));
        }
        if config.min_heart_rate_bpm >= config.max_heart_rate_bpm {
            return Err(VitalErrorBuilder::new("processor", "new")
                .configuration("min_heart_rate_bpm must be below max_heart_rate_bpm"));
        }

        let buffer = SignalBuffer::new(sampling.buffer_capacity())?;
        let rate = sampling.sample_rate_hz;

        Ok(Self {
            quality_monitor: QualityMonitor::new(config.quality.clone(), rate),
            filter_chain: FilterChain::cardiac_band(rate),
            peak_detector: PeakDetector::new(rate, config.max_heart_rate_bpm, config.peak_threshold_fraction),
            respiratory: RespiratoryEstimator::new(rate),
            rr_history: VecDeque::with_capacity(RR_HISTORY_LEN),
            last_reading: None,
            simulated: false,
            frames_since_recompute: 0,
            latest_timestamp_ms: 0,
            performance_metrics: PerformanceMetrics::default(),
            sampling,
            config,
            buffer,
        })
    }

    /// Mark subsequent readings as coming from a synthetic source
    pub fn set_simulated(&mut self, simulated: bool) {
        self.simulated = simulated;
    }

    pub fn is_simulated(&self) -> bool {
        self.simulated
    }

    /// Reduce a frame to one scalar and push it into the window
    pub fn ingest(&mut self, frame: &SampleFrame) {
        self.performance_metrics.frames_ingested += 1;
        self.frames_since_recompute += 1;
        self.latest_timestamp_ms = self.latest_timestamp_ms.max(frame.timestamp_ms);
        self.quality_monitor.observe(frame);

        match self.reduce(frame) {
            Some(value) => {
                self.buffer.push(frame.timestamp_ms, value);
            }
            None => self.performance_metrics.frames_dropped += 1,
        }
    }

    /// True once `recompute_every` frames have arrived since the last recompute
    pub fn recompute_due(&self) -> bool {
        self.frames_since_recompute >= self.sampling.recompute_every.max(1)
    }

    /// Derive a new reading from the current window
    ///
    /// Never fails: an underfilled window carries the previous reading
    /// forward with decayed confidence.
    pub fn recompute(&mut self) -> VitalReading {
        self.frames_since_recompute = 0;
        self.performance_metrics.recomputes += 1;

        let reading = if self.buffer.len() < self.sampling.min_samples.max(2) {
            self.performance_metrics.degraded_recomputes += 1;
            self.degraded_reading()
        } else {
            self.full_reading()
        };

        self.last_reading = Some(reading.clone());
        reading
    }

    pub fn latest_reading(&self) -> Option<&VitalReading> {
        self.last_reading.as_ref()
    }

    pub fn buffer(&self) -> &SignalBuffer {
        &self.buffer
    }

    pub fn get_performance_metrics(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    /// Drop buffered samples and history, keeping configuration
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.quality_monitor.reset();
        self.rr_history.clear();
        self.last_reading = None;
        self.frames_since_recompute = 0;
    }

    fn reduce(&self, frame: &SampleFrame) -> Option<f32> {
        let dominant = frame.channels.get(self.config.dominant_channel).copied()?;
        if !dominant.is_finite() {
            return None;
        }

        let others: Vec<f32> = frame
            .channels
            .iter()
            .enumerate()
            .filter(|(i, v)| *i != self.config.dominant_channel && v.is_finite())
            .map(|(_, v)| *v)
            .collect();

        if others.is_empty() {
            Some(dominant)
        } else {
            Some(dominant - self.config.compensation_factor * stats::mean(&others))
        }
    }

    fn degraded_reading(&self) -> VitalReading {
        match &self.last_reading {
            Some(last) => {
                let mut reading = last.decayed(self.config.confidence_decay, self.latest_timestamp_ms);
                reading.simulated |= self.simulated;
                reading
            }
            None => VitalReading::initial(
                self.config.default_heart_rate_bpm.clamp(self.config.min_heart_rate_bpm, self.config.max_heart_rate_bpm),
                self.latest_timestamp_ms,
                self.simulated,
            ),
        }
    }

    fn full_reading(&mut self) -> VitalReading {
        let values = self.buffer.values();
        let timestamps = self.buffer.timestamps();
        let rate = self.sampling.sample_rate_hz;

        let stability_len = (self.config.quality.stability_window_secs * rate).round().max(2.0) as usize;
        let assessment = self.quality_monitor.assess(&self.buffer.latest_values(stability_len));

        let filtered = self.filter_chain.process(&values);
        let valid = filtered.valid_range();
        let peak_indices = self.peak_detector.detect(&filtered.pulsatile, valid.clone());
        self.performance_metrics.last_peak_count = peak_indices.len();

        let rr_bounds = (
            0.8 * 60_000.0 / self.config.max_heart_rate_bpm,
            1.2 * 60_000.0 / self.config.min_heart_rate_bpm,
        );
        let rr = peaks::rr_intervals(&peak_indices, &timestamps, rr_bounds);
        self.record_rr(&rr);
        let window_rr: Vec<f32> = rr.iter().map(|(_, v)| *v).collect();

        let measured = !window_rr.is_empty();
        let heart_rate = if measured {
            (60_000.0 / stats::mean(&window_rr))
                .clamp(self.config.min_heart_rate_bpm, self.config.max_heart_rate_bpm)
        } else {
            self.fallback_heart_rate()
        };

        let rhythm_consistency = if window_rr.len() >= 2 {
            (1.0 - stats::coefficient_of_variation(&window_rr)).clamp(0.0, 1.0)
        } else {
            0.5
        };
        let confidence = if measured {
            (assessment.score * rhythm_consistency).clamp(0.0, 1.0)
        } else {
            quality::CONFIDENCE_CAP_NONE
        };

        let dc = stats::mean(&values);
        let ac = stats::mean_absolute_deviation(&values);
        let spo2 = Estimate::heuristic(self.config.calibration.spo2(ac, dc), confidence * 0.6);

        let perfusion = if valid.is_empty() || dc.abs() <= f32::EPSILON {
            0.0
        } else {
            let pulse = &filtered.pulsatile[valid.clone()];
            let max = pulse.iter().cloned().fold(f32::MIN, f32::max);
            let min = pulse.iter().cloned().fold(f32::MAX, f32::min);
            ((max - min) / dc.abs() * 100.0)
                .clamp(physiology::PERFUSION_INDEX_RANGE.0, physiology::PERFUSION_INDEX_RANGE.1)
        };
        let perfusion_index = Estimate::measured(perfusion, confidence * 0.7);

        let respiratory_rate = match self.respiratory.estimate(&filtered.baseline) {
            Some(resp) => Estimate::heuristic(resp.breaths_per_minute, confidence * 0.5 * resp.concentration),
            None => Estimate::heuristic(self.fallback_respiratory_rate(), 0.0),
        };

        let temperature = Estimate::heuristic(self.config.calibration.temperature(heart_rate, perfusion), confidence * 0.2);

        let rise_time = peaks::mean_rise_time_ms(
            &filtered.pulsatile,
            &peak_indices,
            &timestamps,
            self.peak_detector.min_spacing() * 3,
        );
        let blood_pressure = self.config.calibration.blood_pressure(
            heart_rate,
            rise_time.unwrap_or(self.config.calibration.reference_ptt_ms),
            (confidence * 0.5).min(quality::CONFIDENCE_CAP_POOR),
        );

        let history: Vec<f32> = self.rr_history.iter().map(|(_, v)| *v).collect();
        let hrv = rhythm::hrv_metrics(&history, self.config.rhythm.min_rr_for_hrv);
        let arrhythmia_flags = if measured {
            rhythm::classify(&history, heart_rate, &self.config.rhythm)
        } else {
            self.last_reading
                .as_ref()
                .map(|r| r.arrhythmia_flags.clone())
                .unwrap_or_default()
        };

        let reading = VitalReading {
            heart_rate,
            spo2,
            temperature,
            respiratory_rate,
            perfusion_index,
            hrv,
            blood_pressure,
            arrhythmia_flags,
            placement_quality: assessment.level,
            confidence,
            simulated: self.simulated,
            stale: !measured,
            timestamp_ms: self.latest_timestamp_ms,
        };

        self.trace_recompute(&assessment, peak_indices.len(), &reading);
        reading.cap_confidence(self.confidence_cap(&assessment))
    }

    fn confidence_cap(&self, assessment: &QualityAssessment) -> f32 {
        let cap = assessment.level.confidence_cap();
        if self.simulated {
            cap.min(quality::CONFIDENCE_CAP_SIMULATED)
        } else {
            cap
        }
    }

    fn fallback_heart_rate(&self) -> f32 {
        let hr = self
            .last_reading
            .as_ref()
            .map(|r| r.heart_rate)
            .filter(|hr| hr.is_finite() && *hr > 0.0)
            .unwrap_or(self.config.default_heart_rate_bpm);
        hr.clamp(self.config.min_heart_rate_bpm, self.config.max_heart_rate_bpm)
    }

    fn fallback_respiratory_rate(&self) -> f32 {
        self.last_reading
            .as_ref()
            .map(|r| r.respiratory_rate.value)
            .unwrap_or(physiology::DEFAULT_RESPIRATORY_RATE)
    }

    /// Append intervals closed after the newest one already recorded
    fn record_rr(&mut self, rr: &[(u64, f32)]) {
        let newest = self.rr_history.back().map(|(ts, _)| *ts).unwrap_or(0);
        for &(ts, value) in rr.iter().filter(|(ts, _)| *ts > newest) {
            self.rr_history.push_back((ts, value));
        }
        while self.rr_history.len() > RR_HISTORY_LEN {
            self.rr_history.pop_front();
        }
    }

    fn trace_recompute(&self, assessment: &QualityAssessment, peak_count: usize, reading: &VitalReading) {
        debug!(
            heart_rate = reading.heart_rate,
            peaks = peak_count,
            quality = ?assessment.level,
            quality_score = assessment.score,
            rr_history = self.rr_history.len(),
            simulated = self.simulated,
            "vitals recomputed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn processor() -> SignalProcessor {
        SignalProcessor::new(SamplingSettings::default(), ProcessingConfig::default()).unwrap()
    }

    fn pulse_frame(i: usize, freq_hz: f32) -> SampleFrame {
        let t = i as f32 / 30.0;
        let red = 150.0 + 3.0 * (2.0 * PI * freq_hz * t).sin();
        SampleFrame::new((i as f32 * 1000.0 / 30.0).round() as u64, vec![red, 60.0, 40.0], 0.9)
    }

    #[test]
    fn test_reduction_compensates_other_channels() {
        let p = processor();
        let frame = SampleFrame::new(0, vec![150.0, 60.0, 40.0], 0.9);
        assert_eq!(p.reduce(&frame), Some(150.0 - 0.3 * 50.0));
        assert_eq!(p.reduce(&SampleFrame::new(0, vec![], 0.9)), None);
        assert_eq!(p.reduce(&SampleFrame::new(0, vec![f32::NAN, 1.0], 0.9)), None);
    }

    #[test]
    fn test_underfilled_buffer_returns_default() {
        let mut p = processor();
        for i in 0..10 {
            p.ingest(&pulse_frame(i, 1.2));
        }
        let reading = p.recompute();
        assert_eq!(reading.heart_rate, 70.0);
        assert!(reading.stale);
        assert_eq!(p.get_performance_metrics().degraded_recomputes, 1);
    }

    #[test]
    fn test_recompute_cadence() {
        let mut p = processor();
        for i in 0..14 {
            p.ingest(&pulse_frame(i, 1.2));
        }
        assert!(!p.recompute_due());
        p.ingest(&pulse_frame(14, 1.2));
        assert!(p.recompute_due());
        p.recompute();
        assert!(!p.recompute_due());
    }

    #[test]
    fn test_heart_rate_from_sine() {
        let mut p = processor();
        for i in 0..300 {
            p.ingest(&pulse_frame(i, 1.2));
        }
        let reading = p.recompute();
        assert!((reading.heart_rate - 72.0).abs() <= 3.0, "hr {}", reading.heart_rate);
        assert!(!reading.stale);
        assert!(reading.confidence > 0.1);
    }

    #[test]
    fn test_empty_frames_are_counted_as_dropped() {
        let mut p = processor();
        p.ingest(&SampleFrame::new(0, vec![], 0.0));
        assert_eq!(p.get_performance_metrics().frames_dropped, 1);
        assert!(p.buffer().is_empty());
    }

    #[test]
    fn test_simulated_flag_caps_confidence() {
        let mut p = processor();
        p.set_simulated(true);
        for i in 0..300 {
            p.ingest(&pulse_frame(i, 1.2));
        }
        let reading = p.recompute();
        assert!(reading.simulated);
        assert!(reading.confidence <= quality::CONFIDENCE_CAP_SIMULATED);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut p = processor();
        for i in 0..300 {
            p.ingest(&pulse_frame(i, 1.2));
        }
        p.recompute();
        p.reset();
        assert!(p.latest_reading().is_none());
        assert!(p.buffer().is_empty());
    }
}
