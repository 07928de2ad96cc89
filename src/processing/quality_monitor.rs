// src/processing/quality_monitor.rs
//! Sensor placement quality monitoring

use crate::config::processing_config::QualityConfig;
use crate::hal::SampleFrame;
use crate::processing::vitals::PlacementQuality;
use crate::utils::stats;
use std::collections::VecDeque;

/// Placement quality monitor
pub struct QualityMonitor {
    config: QualityConfig,
    brightness_history: VecDeque<f32>,
    match_history: VecDeque<f32>,
    window_size: usize,
}

/// Quality assessment for the current window
#[derive(Debug, Clone, PartialEq)]
pub struct QualityAssessment {
    pub brightness: f32,
    pub profile_match: f32,
    /// 1.0 for a perfectly steady signal
    pub stability: f32,
    pub score: f32,
    pub level: PlacementQuality,
}

impl QualityMonitor {
    /// Create quality monitor keeping roughly one stability window of history
    pub fn new(config: QualityConfig, sample_rate_hz: f32) -> Self {
        let window_size = (config.stability_window_secs * sample_rate_hz).round().max(2.0) as usize;
        Self {
            config,
            brightness_history: VecDeque::with_capacity(window_size),
            match_history: VecDeque::with_capacity(window_size),
            window_size,
        }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Record brightness and profile match of one frame
    pub fn observe(&mut self, frame: &SampleFrame) {
        let brightness = if frame.channels.is_empty() {
            0.0
        } else {
            stats::mean(&frame.channels)
        };

        self.brightness_history.push_back(brightness);
        self.match_history.push_back(frame.profile_match.clamp(0.0, 1.0));

        while self.brightness_history.len() > self.window_size {
            self.brightness_history.pop_front();
        }
        while self.match_history.len() > self.window_size {
            self.match_history.pop_front();
        }
    }

    /// Assess placement from recent frames and the most recent reduced samples
    pub fn assess(&self, recent_values: &[f32]) -> QualityAssessment {
        let brightness = history_mean(&self.brightness_history);
        let profile_match = history_mean(&self.match_history);
        let stability = self.stability(recent_values);

        let brightness_score = self.brightness_score(brightness);
        let score = 0.3 * brightness_score + 0.4 * profile_match + 0.3 * stability;
        let level = self.determine_level(brightness, profile_match, score);

        QualityAssessment {
            brightness,
            profile_match,
            stability,
            score,
            level,
        }
    }

    pub fn reset(&mut self) {
        self.brightness_history.clear();
        self.match_history.clear();
    }

    fn brightness_score(&self, brightness: f32) -> f32 {
        if brightness < self.config.brightness_min || brightness > self.config.brightness_max {
            return 0.0;
        }
        let half_range = ((self.config.brightness_max - self.config.brightness_min) / 2.0).max(f32::EPSILON);
        (1.0 - (brightness - self.config.ideal_brightness).abs() / half_range).clamp(0.0, 1.0)
    }

    fn stability(&self, recent_values: &[f32]) -> f32 {
        if recent_values.len() < 2 {
            return 0.0;
        }
        // 10% variation counts as fully unstable
        let cv = stats::coefficient_of_variation(recent_values);
        (1.0 - cv / 0.1).clamp(0.0, 1.0)
    }

    fn determine_level(&self, brightness: f32, profile_match: f32, score: f32) -> PlacementQuality {
        if self.brightness_history.is_empty()
            || brightness < self.config.brightness_min
            || brightness > self.config.brightness_max
            || profile_match < self.config.min_profile_match
        {
            return PlacementQuality::None;
        }

        if score < self.config.poor_score {
            PlacementQuality::Poor
        } else if score < self.config.excellent_score {
            PlacementQuality::Good
        } else {
            PlacementQuality::Excellent
        }
    }
}

fn history_mean(history: &VecDeque<f32>) -> f32 {
    if history.is_empty() {
        return 0.0;
    }
    history.iter().sum::<f32>() / history.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(brightness: f32, profile_match: f32) -> SampleFrame {
        SampleFrame::new(0, vec![brightness, brightness, brightness], profile_match)
    }

    fn steady_values(n: usize) -> Vec<f32> {
        (0..n).map(|i| 150.0 + (i as f32 * 0.7).sin()).collect()
    }

    #[test]
    fn test_quality_monitor_creation() {
        let monitor = QualityMonitor::new(QualityConfig::default(), 30.0);
        assert_eq!(monitor.window_size(), 30);
        assert_eq!(monitor.assess(&[]).level, PlacementQuality::None);
    }

    #[test]
    fn test_good_placement_is_excellent() {
        let mut monitor = QualityMonitor::new(QualityConfig::default(), 30.0);
        for _ in 0..30 {
            monitor.observe(&frame(150.0, 0.95));
        }

        let assessment = monitor.assess(&steady_values(30));
        assert!(assessment.stability > 0.8);
        assert_eq!(assessment.level, PlacementQuality::Excellent);
    }

    #[test]
    fn test_dark_frames_mean_no_placement() {
        let mut monitor = QualityMonitor::new(QualityConfig::default(), 30.0);
        for _ in 0..30 {
            monitor.observe(&frame(5.0, 0.95));
        }
        assert_eq!(monitor.assess(&steady_values(30)).level, PlacementQuality::None);
    }

    #[test]
    fn test_profile_mismatch_means_no_placement() {
        let mut monitor = QualityMonitor::new(QualityConfig::default(), 30.0);
        for _ in 0..30 {
            monitor.observe(&frame(150.0, 0.05));
        }
        assert_eq!(monitor.assess(&steady_values(30)).level, PlacementQuality::None);
    }

    #[test]
    fn test_unstable_signal_degrades_quality() {
        let mut monitor = QualityMonitor::new(QualityConfig::default(), 30.0);
        for _ in 0..30 {
            monitor.observe(&frame(200.0, 0.3));
        }
        let shaky: Vec<f32> = (0..30).map(|i| if i % 2 == 0 { 100.0 } else { 200.0 }).collect();
        let assessment = monitor.assess(&shaky);
        assert_eq!(assessment.stability, 0.0);
        assert_eq!(assessment.level, PlacementQuality::Poor);
    }

    #[test]
    fn test_reset_clears_history() {
        let mut monitor = QualityMonitor::new(QualityConfig::default(), 30.0);
        monitor.observe(&frame(150.0, 0.9));
        monitor.reset();
        assert_eq!(monitor.assess(&steady_values(10)).level, PlacementQuality::None);
    }
}
