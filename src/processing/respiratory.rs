//! Respiratory rate from the slow baseline of the pulse signal

use crate::config::constants::physiology;
use rustfft::{num_complex::Complex32, FftPlanner};
use std::f32::consts::PI;

/// Dominant respiratory frequency with a spectral-concentration confidence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RespiratoryEstimate {
    pub breaths_per_minute: f32,
    /// Share of band power in the winning bin and its neighbours
    pub concentration: f32,
}

/// FFT-based respiratory rate estimator
pub struct RespiratoryEstimator {
    sample_rate_hz: f32,
    band_hz: (f32, f32),
    planner: FftPlanner<f32>,
}

impl RespiratoryEstimator {
    pub fn new(sample_rate_hz: f32) -> Self {
        Self {
            sample_rate_hz,
            band_hz: physiology::RESPIRATORY_BAND_HZ,
            planner: FftPlanner::new(),
        }
    }

    /// Estimate from the baseline component; `None` when the band holds no energy
    pub fn estimate(&mut self, baseline: &[f32]) -> Option<RespiratoryEstimate> {
        if baseline.len() < 8 {
            return None;
        }

        let n = baseline.len();
        let mean = baseline.iter().sum::<f32>() / n as f32;
        // Zero padding refines the bin spacing for short windows
        let fft_size = (n * 4).next_power_of_two();

        let mut buffer: Vec<Complex32> = baseline
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                let hann = 0.5 - 0.5 * (2.0 * PI * i as f32 / (n - 1) as f32).cos();
                Complex32::new((v - mean) * hann, 0.0)
            })
            .collect();
        buffer.resize(fft_size, Complex32::ZERO);

        let fft = self.planner.plan_fft_forward(fft_size);
        fft.process(&mut buffer);

        let bin_hz = self.sample_rate_hz / fft_size as f32;
        let lo = (self.band_hz.0 / bin_hz).ceil() as usize;
        let hi = ((self.band_hz.1 / bin_hz).floor() as usize).min(fft_size / 2);
        if lo > hi {
            return None;
        }

        let power: Vec<f32> = buffer[lo..=hi].iter().map(|c| c.norm_sqr()).collect();
        let total: f32 = power.iter().sum();
        if total <= f32::EPSILON {
            return None;
        }

        let (best, _) = power
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))?;

        // One unpadded bin either side of the peak
        let lobe = (fft_size / n).max(1);
        let lobe_power: f32 = power[best.saturating_sub(lobe)..(best + lobe + 1).min(power.len())].iter().sum();

        let frequency = (lo + best) as f32 * bin_hz;
        Some(RespiratoryEstimate {
            breaths_per_minute: (frequency * 60.0)
                .clamp(physiology::MIN_RESPIRATORY_RATE, physiology::MAX_RESPIRATORY_RATE),
            concentration: (lobe_power / total).clamp(0.0, 1.0),
        })
    }
}
