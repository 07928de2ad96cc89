//! Window filters for the optical pulse signal
//!
//! The processor re-filters the whole rolling window on every recompute, so
//! these filters are stateless over a slice rather than sample-by-sample.

use crate::config::constants::filters;

pub trait Filter: Send {
    fn process(&self, input: &[f32]) -> Vec<f32>;
    fn get_name(&self) -> &str;
}

/// Centered moving average; the window shrinks at the slice edges
#[derive(Debug, Clone, Copy)]
pub struct MovingAverage {
    half_width: usize,
}

impl MovingAverage {
    pub fn new(half_width: usize) -> Self {
        Self { half_width }
    }

    /// Window covering roughly `window_secs` at `sample_rate_hz`
    pub fn for_window(window_secs: f32, sample_rate_hz: f32) -> Self {
        let half = (window_secs * sample_rate_hz / 2.0).round().max(0.0) as usize;
        Self::new(half)
    }

    pub fn half_width(&self) -> usize {
        self.half_width
    }
}

impl Filter for MovingAverage {
    fn process(&self, input: &[f32]) -> Vec<f32> {
        if input.is_empty() || self.half_width == 0 {
            return input.to_vec();
        }

        let mut prefix = Vec::with_capacity(input.len() + 1);
        prefix.push(0.0f64);
        for &x in input {
            let last = prefix[prefix.len() - 1];
            prefix.push(last + x as f64);
        }

        (0..input.len())
            .map(|i| {
                let start = i.saturating_sub(self.half_width);
                let end = (i + self.half_width + 1).min(input.len());
                ((prefix[end] - prefix[start]) / (end - start) as f64) as f32
            })
            .collect()
    }

    fn get_name(&self) -> &str {
        "moving_average"
    }
}

/// Removes the slow baseline by subtracting a wide moving average
#[derive(Debug, Clone, Copy)]
pub struct Detrend {
    baseline: MovingAverage,
}

impl Detrend {
    pub fn new(baseline: MovingAverage) -> Self {
        Self { baseline }
    }
}

impl Filter for Detrend {
    fn process(&self, input: &[f32]) -> Vec<f32> {
        let baseline = self.baseline.process(input);
        input.iter().zip(baseline).map(|(x, b)| x - b).collect()
    }

    fn get_name(&self) -> &str {
        "detrend"
    }
}

/// Output of the cardiac band approximation
#[derive(Debug, Clone)]
pub struct FilteredSignal {
    /// Slow component, carries respiration
    pub baseline: Vec<f32>,
    /// Detrended and smoothed pulse waveform
    pub pulsatile: Vec<f32>,
    /// Samples at each end distorted by the shrinking baseline window
    pub edge: usize,
}

impl FilteredSignal {
    /// Index range free of edge distortion
    pub fn valid_range(&self) -> std::ops::Range<usize> {
        let len = self.pulsatile.len();
        if len <= 2 * self.edge {
            return 0..0;
        }
        self.edge..len - self.edge
    }
}

/// Chain of window filters approximating a cardiac band-pass
pub struct FilterChain {
    baseline: MovingAverage,
    filters: Vec<Box<dyn Filter>>,
}

impl FilterChain {
    /// Detrend over the baseline window, then smooth away content above the cardiac band
    pub fn cardiac_band(sample_rate_hz: f32) -> Self {
        let baseline = MovingAverage::for_window(filters::BASELINE_WINDOW_SECS, sample_rate_hz);
        let smooth_half = (sample_rate_hz / (4.0 * filters::CARDIAC_HIGH_CUTOFF_HZ)).round().max(1.0) as usize;

        let filters: Vec<Box<dyn Filter>> = vec![
            Box::new(Detrend::new(baseline)),
            Box::new(MovingAverage::new(smooth_half)),
        ];

        Self { baseline, filters }
    }

    pub fn process(&self, input: &[f32]) -> FilteredSignal {
        let mut current = input.to_vec();
        for filter in &self.filters {
            current = filter.process(&current);
        }

        FilteredSignal {
            baseline: self.baseline.process(input),
            pulsatile: current,
            edge: self.baseline.half_width(),
        }
    }

    pub fn filter_names(&self) -> Vec<&str> {
        self.filters.iter().map(|f| f.get_name()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moving_average_constant_signal() {
        let ma = MovingAverage::new(3);
        let out = ma.process(&[5.0; 20]);
        assert!(out.iter().all(|&x| (x - 5.0).abs() < 1e-6));
    }

    #[test]
    fn test_moving_average_edges_shrink() {
        let ma = MovingAverage::new(1);
        let out = ma.process(&[0.0, 3.0, 6.0]);
        assert_eq!(out, vec![1.5, 3.0, 4.5]);
    }

    #[test]
    fn test_detrend_removes_offset_and_ramp() {
        let input: Vec<f32> = (0..200).map(|i| 100.0 + 0.1 * i as f32).collect();
        let detrend = Detrend::new(MovingAverage::new(10));
        let out = detrend.process(&input);
        for &x in &out[10..190] {
            assert!(x.abs() < 1e-3);
        }
    }

    #[test]
    fn test_cardiac_band_keeps_pulse() {
        let fs = 30.0;
        let input: Vec<f32> = (0..300)
            .map(|i| {
                let t = i as f32 / fs;
                150.0 + 3.0 * (2.0 * std::f32::consts::PI * 1.2 * t).sin()
            })
            .collect();

        let chain = FilterChain::cardiac_band(fs);
        let out = chain.process(&input);
        assert_eq!(out.pulsatile.len(), 300);
        assert_eq!(chain.filter_names(), vec!["detrend", "moving_average"]);

        let range = out.valid_range();
        let peak = out.pulsatile[range].iter().cloned().fold(f32::MIN, f32::max);
        assert!(peak > 1.5 && peak < 4.0, "peak amplitude {}", peak);
        assert!((out.baseline[150] - 150.0).abs() < 0.5);
    }

    #[test]
    fn test_short_input_has_empty_valid_range() {
        let chain = FilterChain::cardiac_band(30.0);
        let out = chain.process(&[1.0; 10]);
        assert!(out.valid_range().is_empty());
    }
}
