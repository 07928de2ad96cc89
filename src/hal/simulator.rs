//! Synthetic PPG source used when no capture device is available
//!
//! Frames produced here are plausible but always flagged as simulated; the
//! processor caps the confidence of any reading derived from them.

use crate::config::constants::{physiology, sampling};
use crate::hal::{SampleFrame, SampleSource, SourceCapabilities, SourceError, SourceInfo, SourceKind};
use crate::utils::time::current_timestamp_millis;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Synthetic generator configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SyntheticConfig {
    #[serde(default = "defaults::sample_rate_hz")]
    pub sample_rate_hz: f32,
    #[serde(default = "defaults::heart_rate_bpm")]
    pub heart_rate_bpm: f32,
    #[serde(default = "defaults::respiratory_rate")]
    pub respiratory_rate: f32,
    #[serde(default = "defaults::base_brightness")]
    pub base_brightness: f32,
    #[serde(default = "defaults::pulse_amplitude")]
    pub pulse_amplitude: f32,
    #[serde(default = "defaults::respiratory_amplitude")]
    pub respiratory_amplitude: f32,
    #[serde(default = "defaults::noise_level")]
    pub noise_level: f32,
    #[serde(default = "defaults::profile_match")]
    pub profile_match: f32,
    /// Fixed seed for reproducible frames; `None` seeds from entropy
    #[serde(default)]
    pub seed: Option<u64>,
    /// Timestamp of the first frame; `None` uses the wall clock at start
    #[serde(default)]
    pub start_timestamp_ms: Option<u64>,
}

mod defaults {
    use super::*;

    pub fn sample_rate_hz() -> f32 { sampling::DEFAULT_SAMPLE_RATE_HZ }
    pub fn heart_rate_bpm() -> f32 { 72.0 }
    pub fn respiratory_rate() -> f32 { physiology::DEFAULT_RESPIRATORY_RATE }
    pub fn base_brightness() -> f32 { 160.0 }
    pub fn pulse_amplitude() -> f32 { 3.0 }
    pub fn respiratory_amplitude() -> f32 { 0.8 }
    pub fn noise_level() -> f32 { 0.2 }
    pub fn profile_match() -> f32 { 0.9 }
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: defaults::sample_rate_hz(),
            heart_rate_bpm: defaults::heart_rate_bpm(),
            respiratory_rate: defaults::respiratory_rate(),
            base_brightness: defaults::base_brightness(),
            pulse_amplitude: defaults::pulse_amplitude(),
            respiratory_amplitude: defaults::respiratory_amplitude(),
            noise_level: defaults::noise_level(),
            profile_match: defaults::profile_match(),
            seed: None,
            start_timestamp_ms: None,
        }
    }
}

impl SyntheticConfig {
    /// Validate generator parameters
    pub fn validate(&self) -> Result<(), SourceError> {
        if !(sampling::MIN_SAMPLE_RATE_HZ..=sampling::MAX_SAMPLE_RATE_HZ).contains(&self.sample_rate_hz) {
            return Err(SourceError::Configuration(format!(
                "sample_rate_hz {} outside {}..={}",
                self.sample_rate_hz, sampling::MIN_SAMPLE_RATE_HZ, sampling::MAX_SAMPLE_RATE_HZ
            )));
        }

        if self.heart_rate_bpm <= 0.0 {
            return Err(SourceError::Configuration("heart_rate_bpm must be positive".to_string()));
        }

        // The pulse must stay below Nyquist
        if self.heart_rate_bpm / 60.0 >= self.sample_rate_hz / 2.0 {
            return Err(SourceError::Configuration(format!(
                "heart_rate_bpm {} too fast for {} Hz sampling",
                self.heart_rate_bpm, self.sample_rate_hz
            )));
        }

        if !(0.0..=1.0).contains(&self.profile_match) {
            return Err(SourceError::Configuration("profile_match must be within 0.0..=1.0".to_string()));
        }

        if self.noise_level < 0.0 {
            return Err(SourceError::Configuration("noise_level must not be negative".to_string()));
        }

        Ok(())
    }
}

/// Deterministic synthetic PPG generator
pub struct SyntheticSource {
    config: SyntheticConfig,
    rng: StdRng,
    sequence: u64,
    start_timestamp_ms: u64,
    is_running: bool,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Result<Self, SourceError> {
        config.validate()?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            start_timestamp_ms: config.start_timestamp_ms.unwrap_or(0),
            config,
            rng,
            sequence: 0,
            is_running: false,
        })
    }

    /// Resting adult preset
    pub fn resting_adult() -> Result<Self, SourceError> {
        Self::new(SyntheticConfig::default())
    }

    pub fn config(&self) -> &SyntheticConfig {
        &self.config
    }

    /// Generate the next frame without acquisition state checks
    pub fn generate_frame(&mut self) -> SampleFrame {
        let t = self.sequence as f32 / self.config.sample_rate_hz;
        let timestamp_ms = self.start_timestamp_ms
            + (self.sequence as f64 * 1000.0 / self.config.sample_rate_hz as f64).round() as u64;
        self.sequence += 1;

        let cardiac_phase = 2.0 * PI * (self.config.heart_rate_bpm / 60.0) * t;
        // Fundamental plus a small second harmonic to roughen the pulse shape
        let pulse = cardiac_phase.sin() + 0.2 * (2.0 * cardiac_phase).sin();

        let respiratory_phase = 2.0 * PI * (self.config.respiratory_rate / 60.0) * t;
        let baseline = self.config.respiratory_amplitude * respiratory_phase.sin();

        let noise = if self.config.noise_level > 0.0 {
            self.rng.gen_range(-1.0f32..1.0) * self.config.noise_level
        } else {
            0.0
        };

        let red = self.config.base_brightness + self.config.pulse_amplitude * pulse + baseline + noise;
        // Green and blue carry mostly ambient light, with a faint pulse on green
        let green = self.config.base_brightness * 0.35 + 0.2 * self.config.pulse_amplitude * pulse;
        let blue = self.config.base_brightness * 0.2;

        SampleFrame {
            timestamp_ms,
            channels: vec![red.clamp(0.0, 255.0), green.clamp(0.0, 255.0), blue.clamp(0.0, 255.0)],
            profile_match: self.config.profile_match,
        }
    }
}

#[async_trait]
impl SampleSource for SyntheticSource {
    async fn initialize(&mut self) -> Result<(), SourceError> {
        self.config.validate()?;
        self.sequence = 0;
        if self.config.start_timestamp_ms.is_none() {
            self.start_timestamp_ms = current_timestamp_millis();
        }
        Ok(())
    }

    async fn start_acquisition(&mut self) -> Result<(), SourceError> {
        self.is_running = true;
        Ok(())
    }

    async fn stop_acquisition(&mut self) -> Result<(), SourceError> {
        self.is_running = false;
        Ok(())
    }

    async fn read_frame(&mut self) -> Result<SampleFrame, SourceError> {
        if !self.is_running {
            return Err(SourceError::NotRunning);
        }
        Ok(self.generate_frame())
    }

    fn source_info(&self) -> SourceInfo {
        SourceInfo {
            name: "Synthetic PPG".to_string(),
            kind: SourceKind::Synthetic,
            capabilities: SourceCapabilities {
                channel_count: 3,
                sample_rate_hz: self.config.sample_rate_hz,
                reports_profile_match: true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> SyntheticConfig {
        SyntheticConfig {
            seed: Some(7),
            start_timestamp_ms: Some(1_000),
            ..Default::default()
        }
    }

    #[test]
    fn test_configuration_validation() {
        let mut config = SyntheticConfig::default();
        assert!(config.validate().is_ok());

        config.sample_rate_hz = 1.0;
        assert!(config.validate().is_err());

        config.sample_rate_hz = 30.0;
        config.heart_rate_bpm = 1200.0;
        assert!(config.validate().is_err());

        config.heart_rate_bpm = 70.0;
        config.profile_match = 1.5;
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_read_requires_acquisition() {
        let mut source = SyntheticSource::new(seeded()).unwrap();
        source.initialize().await.unwrap();
        assert!(matches!(source.read_frame().await, Err(SourceError::NotRunning)));

        source.start_acquisition().await.unwrap();
        assert!(source.read_frame().await.is_ok());

        source.stop_acquisition().await.unwrap();
        assert!(matches!(source.read_frame().await, Err(SourceError::NotRunning)));
    }

    #[tokio::test]
    async fn test_frames_are_reproducible_and_monotonic() {
        let mut a = SyntheticSource::new(seeded()).unwrap();
        let mut b = SyntheticSource::new(seeded()).unwrap();
        for source in [&mut a, &mut b] {
            source.initialize().await.unwrap();
            source.start_acquisition().await.unwrap();
        }

        let mut last_timestamp = 0;
        for _ in 0..60 {
            let fa = a.read_frame().await.unwrap();
            let fb = b.read_frame().await.unwrap();
            assert_eq!(fa, fb);
            assert_eq!(fa.channels.len(), 3);
            assert!(fa.timestamp_ms >= 1_000);
            assert!(fa.timestamp_ms >= last_timestamp);
            last_timestamp = fa.timestamp_ms;
        }
    }

    #[test]
    fn test_source_is_flagged_simulated() {
        let source = SyntheticSource::new(seeded()).unwrap();
        assert!(source.is_simulated());
        assert_eq!(source.source_info().kind, SourceKind::Synthetic);
    }
}
