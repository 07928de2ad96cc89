//! System-wide configuration constants

/// Sampling and buffering constants
pub mod sampling {
    pub const DEFAULT_SAMPLE_RATE_HZ: f32 = 30.0;
    pub const MIN_SAMPLE_RATE_HZ: f32 = 10.0;
    pub const MAX_SAMPLE_RATE_HZ: f32 = 1000.0;
    pub const DEFAULT_WINDOW_SECS: f32 = 10.0;
    pub const DEFAULT_MIN_SAMPLES: usize = 100;
    pub const DEFAULT_RECOMPUTE_EVERY: usize = 15;
}

/// Physiological bounds used for clamping and peak spacing
pub mod physiology {
    pub const MIN_HEART_RATE_BPM: f32 = 40.0;
    pub const MAX_HEART_RATE_BPM: f32 = 180.0;
    pub const DEFAULT_HEART_RATE_BPM: f32 = 70.0;

    pub const SPO2_MIN: f32 = 85.0;
    pub const SPO2_MAX: f32 = 100.0;

    pub const MIN_RESPIRATORY_RATE: f32 = 6.0;
    pub const MAX_RESPIRATORY_RATE: f32 = 40.0;
    pub const DEFAULT_RESPIRATORY_RATE: f32 = 16.0;
    pub const RESPIRATORY_BAND_HZ: (f32, f32) = (0.1, 0.7);

    pub const TEMPERATURE_RANGE_C: (f32, f32) = (35.0, 39.5);
    pub const PERFUSION_INDEX_RANGE: (f32, f32) = (0.0, 20.0);

    pub const SYSTOLIC_RANGE: (f32, f32) = (80.0, 200.0);
    pub const DIASTOLIC_RANGE: (f32, f32) = (50.0, 120.0);
    pub const MIN_PULSE_PRESSURE: f32 = 20.0;
}

/// Filtering and peak detection constants
pub mod filters {
    /// Upper edge of the cardiac band handled by the smoothing stage
    pub const CARDIAC_HIGH_CUTOFF_HZ: f32 = 4.0;
    /// Baseline window used for detrending, in seconds
    pub const BASELINE_WINDOW_SECS: f32 = 1.5;
    pub const DEFAULT_PEAK_THRESHOLD_FRACTION: f32 = 0.6;
    /// Half width of the window used to find the local maximum, in seconds
    pub const LOCAL_MAX_HALF_WINDOW_SECS: f32 = 0.75;
}

/// Heart-rate variability and rhythm constants
pub mod rhythm {
    pub const MIN_RR_FOR_HRV: usize = 10;
    pub const MIN_RR_FOR_RHYTHM: usize = 3;
    pub const RECENT_RR_WINDOW: usize = 20;
    pub const IRREGULAR_CV_THRESHOLD: f32 = 0.15;
    pub const BRADYCARDIA_BPM: f32 = 50.0;
    pub const TACHYCARDIA_BPM: f32 = 100.0;
    pub const PREMATURE_BEAT_DEVIATION: f32 = 0.2;
    pub const PREMATURE_BEAT_NEIGHBOURHOOD: usize = 2;
    /// RMSSD in ms at which the stress index reaches zero
    pub const STRESS_RMSSD_REFERENCE_MS: f32 = 100.0;
}

/// Placement quality constants
pub mod quality {
    pub const BRIGHTNESS_RANGE: (f32, f32) = (40.0, 245.0);
    pub const IDEAL_BRIGHTNESS: f32 = 150.0;
    pub const MIN_PROFILE_MATCH: f32 = 0.2;
    pub const STABILITY_WINDOW_SECS: f32 = 1.0;
    pub const POOR_SCORE: f32 = 0.5;
    pub const EXCELLENT_SCORE: f32 = 0.8;

    pub const CONFIDENCE_CAP_NONE: f32 = 0.1;
    pub const CONFIDENCE_CAP_POOR: f32 = 0.4;
    pub const CONFIDENCE_CAP_GOOD: f32 = 0.85;
    pub const CONFIDENCE_CAP_SIMULATED: f32 = 0.3;
    pub const DEFAULT_CONFIDENCE_DECAY: f32 = 0.8;
}

/// Risk scoring constants
pub mod risk {
    pub const DEFAULT_MIN_VITALS_CONFIDENCE: f32 = 0.3;
    pub const DEFAULT_EVENT_RETENTION_SECS: u64 = 300;
    pub const VITALS_WEIGHT: f32 = 0.5;
    pub const ENVIRONMENT_WEIGHT: f32 = 0.3;
    pub const EVENT_WEIGHT: f32 = 0.2;
}

/// Escalation timing constants
pub mod escalation {
    pub const DEFAULT_COUNTDOWN_SECS: u64 = 10;
    pub const DEFAULT_STAGGER_SECS: u64 = 2;
    pub const DEFAULT_CRITICAL_STEP_UP_SECS: u64 = 30;
    pub const DEFAULT_HIGH_STEP_UP_SECS: u64 = 60;
    pub const DEFAULT_RETRY_BACKOFF_SECS: u64 = 30;
    pub const MAX_RETRIES: u32 = 2;
    pub const DEFAULT_DISPATCH_TIMEOUT_SECS: u64 = 15;
    pub const COMMAND_QUEUE_SIZE: usize = 64;
}

/// Source selection constants
pub mod source {
    pub const DEFAULT_MAX_CONSECUTIVE_READ_FAILURES: u32 = 5;
    pub const DEFAULT_READ_TIMEOUT_PERIODS: u32 = 10;
    pub const CAPTURE_SHIM_QUEUE_SIZE: usize = 256;
}

/// Configuration file locations
pub mod paths {
    pub const SYSTEM_CONFIG_PATH: &str = "/etc/vital-guard/config.toml";
    pub const USER_CONFIG_DIR: &str = ".vital-guard";
    pub const DEFAULT_CONFIG_FILE: &str = "vital-guard.toml";
    pub const LOCAL_CONFIG_FILE: &str = "config/local.toml";
    pub const ENV_PREFIX: &str = "VITALS_";
}
