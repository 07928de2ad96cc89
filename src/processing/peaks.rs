//! Adaptive-threshold pulse peak detection and beat interval extraction

use crate::config::constants::filters;
use std::ops::Range;

/// Peak detector tuned for the plausible heart-rate range
#[derive(Debug, Clone)]
pub struct PeakDetector {
    threshold_fraction: f32,
    min_spacing: usize,
    local_half_window: usize,
}

impl PeakDetector {
    pub fn new(sample_rate_hz: f32, max_heart_rate_bpm: f32, threshold_fraction: f32) -> Self {
        // 10% slack so jitter at the highest rate does not drop beats
        let min_spacing = (60.0 * sample_rate_hz * 0.9 / max_heart_rate_bpm).floor().max(1.0) as usize;
        let local_half_window = (filters::LOCAL_MAX_HALF_WINDOW_SECS * sample_rate_hz).round().max(1.0) as usize;

        Self {
            threshold_fraction,
            min_spacing,
            local_half_window,
        }
    }

    pub fn min_spacing(&self) -> usize {
        self.min_spacing
    }

    /// Indices of pulse peaks inside `range`
    ///
    /// A peak is a positive local maximum reaching `threshold_fraction` of the
    /// largest value within the local window. Peaks closer than the minimum
    /// spacing collapse onto the taller one.
    pub fn detect(&self, signal: &[f32], range: Range<usize>) -> Vec<usize> {
        let n = signal.len();
        let start = range.start.max(1);
        let end = range.end.min(n.saturating_sub(1));
        let mut peaks: Vec<usize> = Vec::new();

        for i in start..end {
            let value = signal[i];
            if value <= 0.0 || value <= signal[i - 1] || value < signal[i + 1] {
                continue;
            }

            let lo = i.saturating_sub(self.local_half_window);
            let hi = (i + self.local_half_window + 1).min(n);
            let local_max = signal[lo..hi].iter().cloned().fold(f32::MIN, f32::max);
            if value < self.threshold_fraction * local_max {
                continue;
            }

            match peaks.last_mut() {
                Some(last) if i - *last < self.min_spacing => {
                    if value > signal[*last] {
                        *last = i;
                    }
                }
                _ => peaks.push(i),
            }
        }

        peaks
    }
}

/// Beat-to-beat intervals in ms, keeping only those within `bounds_ms`
///
/// Each interval is paired with the timestamp of the peak that closes it.
pub fn rr_intervals(peaks: &[usize], timestamps: &[u64], bounds_ms: (f32, f32)) -> Vec<(u64, f32)> {
    peaks
        .windows(2)
        .filter_map(|pair| {
            let (a, b) = (timestamps.get(pair[0])?, timestamps.get(pair[1])?);
            let rr = b.saturating_sub(*a) as f32;
            (rr >= bounds_ms.0 && rr <= bounds_ms.1).then_some((*b, rr))
        })
        .collect()
}

/// Mean foot-to-peak rise time in ms, used as a pulse-transit-time proxy
pub fn mean_rise_time_ms(signal: &[f32], peaks: &[usize], timestamps: &[u64], max_lookback: usize) -> Option<f32> {
    let mut total = 0.0f32;
    let mut count = 0usize;

    for (k, &peak) in peaks.iter().enumerate() {
        let floor = match k {
            0 => peak.saturating_sub(max_lookback),
            _ => peaks[k - 1].max(peak.saturating_sub(max_lookback)),
        };
        if floor >= peak {
            continue;
        }

        let foot = (floor..peak)
            .min_by(|&a, &b| signal[a].total_cmp(&signal[b]))
            .unwrap_or(floor);
        // A foot on the window edge is not a trough
        if foot == floor {
            continue;
        }

        if let (Some(&tf), Some(&tp)) = (timestamps.get(foot), timestamps.get(peak)) {
            total += tp.saturating_sub(tf) as f32;
            count += 1;
        }
    }

    (count > 0).then(|| total / count as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn sine(freq_hz: f32, fs: f32, n: usize) -> Vec<f32> {
        (0..n).map(|i| (2.0 * PI * freq_hz * i as f32 / fs).sin()).collect()
    }

    fn timestamps(fs: f32, n: usize) -> Vec<u64> {
        (0..n).map(|i| (i as f32 * 1000.0 / fs).round() as u64).collect()
    }

    #[test]
    fn test_detects_one_peak_per_cycle() {
        let detector = PeakDetector::new(30.0, 180.0, 0.6);
        let signal = sine(1.0, 30.0, 300);
        let peaks = detector.detect(&signal, 0..300);
        assert_eq!(peaks.len(), 10);
    }

    #[test]
    fn test_small_bumps_are_rejected() {
        let detector = PeakDetector::new(30.0, 180.0, 0.6);
        let mut signal = sine(1.0, 30.0, 150);
        // Small bump in a trough region
        signal[20] = 0.3;
        signal[21] = 0.1;
        signal[19] = 0.1;
        let peaks = detector.detect(&signal, 0..150);
        assert!(!peaks.contains(&20));
    }

    #[test]
    fn test_min_spacing_keeps_taller_peak() {
        let detector = PeakDetector::new(30.0, 180.0, 0.6);
        assert_eq!(detector.min_spacing(), 9);

        let mut signal = vec![0.0; 40];
        signal[10] = 0.8;
        signal[14] = 1.0;
        let peaks = detector.detect(&signal, 0..40);
        assert_eq!(peaks, vec![14]);
    }

    #[test]
    fn test_rr_intervals_filter_bounds() {
        let ts = timestamps(30.0, 300);
        let peaks = vec![0, 30, 60, 65, 120];
        let rr = rr_intervals(&peaks, &ts, (333.0, 1500.0));
        let values: Vec<f32> = rr.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![1000.0, 1000.0]);
        assert_eq!(rr[0].0, 1000);
    }

    #[test]
    fn test_rise_time() {
        let fs = 30.0;
        let signal = sine(1.0, fs, 90);
        let ts = timestamps(fs, 90);
        let detector = PeakDetector::new(fs, 180.0, 0.6);
        let peaks = detector.detect(&signal, 0..90);
        let rise = mean_rise_time_ms(&signal, &peaks, &ts, 30).unwrap();
        // Trough to crest of a 1 Hz sine is half a period
        assert!((rise - 500.0).abs() < 60.0, "rise {}", rise);
    }
}
