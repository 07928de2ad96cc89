//! End-to-end tests for the signal processor

use proptest::prelude::*;
use std::f32::consts::PI;
use vital_guard::config::constants::quality;
use vital_guard::config::{ProcessingConfig, SamplingSettings};
use vital_guard::hal::{SampleFrame, SampleSource, SyntheticConfig, SyntheticSource};
use vital_guard::processing::{ArrhythmiaFlag, PlacementQuality, SignalProcessor};

const RATE_HZ: f32 = 30.0;

fn processor() -> SignalProcessor {
    SignalProcessor::new(SamplingSettings::default(), ProcessingConfig::default())
        .expect("default processor should build")
}

fn timestamp(i: usize) -> u64 {
    (i as f32 * 1000.0 / RATE_HZ).round() as u64
}

fn pulse_frame(i: usize, freq_hz: f32) -> SampleFrame {
    let t = i as f32 / RATE_HZ;
    let red = 150.0 + 3.0 * (2.0 * PI * freq_hz * t).sin();
    SampleFrame::new(timestamp(i), vec![red, 60.0, 40.0], 0.9)
}

fn feed(p: &mut SignalProcessor, range: std::ops::Range<usize>, freq_hz: f32) {
    for i in range {
        p.ingest(&pulse_frame(i, freq_hz));
    }
}

#[test]
fn test_heart_rate_tracks_pulse_frequency() {
    for (freq_hz, expected_bpm) in [(1.0, 60.0), (1.2, 72.0), (1.5, 90.0)] {
        let mut p = processor();
        feed(&mut p, 0..300, freq_hz);
        let reading = p.recompute();

        assert!(
            (reading.heart_rate - expected_bpm).abs() <= 3.0,
            "expected ~{} bpm, got {}",
            expected_bpm,
            reading.heart_rate
        );
        assert!(!reading.stale);
        assert!(!reading.simulated);
    }
}

#[test]
fn test_slow_pulse_is_flagged_bradycardia() {
    let mut p = processor();
    feed(&mut p, 0..300, 0.75);
    let reading = p.recompute();

    assert!((reading.heart_rate - 45.0).abs() <= 3.0, "hr {}", reading.heart_rate);
    assert!(reading.has_flag(ArrhythmiaFlag::Bradycardia));
}

#[test]
fn test_flat_window_keeps_previous_heart_rate() {
    let mut p = processor();
    feed(&mut p, 0..300, 1.2);
    let good = p.recompute();
    assert!(!good.stale);

    // Finger lifted: the signal goes flat but stays in range
    for i in 300..600 {
        p.ingest(&SampleFrame::new(timestamp(i), vec![150.0, 60.0, 40.0], 0.9));
    }
    let reading = p.recompute();

    assert_eq!(reading.heart_rate, good.heart_rate);
    assert!(reading.stale);
    assert!(reading.confidence <= quality::CONFIDENCE_CAP_NONE);
}

#[test]
fn test_missing_placement_caps_confidence() {
    let mut p = processor();
    for i in 0..300 {
        let mut frame = pulse_frame(i, 1.2);
        frame.profile_match = 0.0;
        p.ingest(&frame);
    }
    let reading = p.recompute();

    assert_eq!(reading.placement_quality, PlacementQuality::None);
    assert!(reading.confidence <= quality::CONFIDENCE_CAP_NONE);
    assert!(reading.spo2.confidence <= quality::CONFIDENCE_CAP_NONE);
}

#[test]
fn test_underfilled_window_degrades_gracefully() {
    let mut p = processor();
    feed(&mut p, 0..300, 1.2);
    let full = p.recompute();

    p.reset();
    feed(&mut p, 0..20, 1.2);
    let first = p.recompute();
    assert!(first.stale);
    assert_eq!(first.heart_rate, 70.0);

    // Carry-forward decays confidence on every degraded cycle
    let second = p.recompute();
    assert!(second.confidence <= first.confidence);
    assert!(full.confidence > first.confidence);
}

#[tokio::test]
async fn test_synthetic_source_reading_is_flagged() {
    let mut source = SyntheticSource::new(SyntheticConfig {
        seed: Some(11),
        start_timestamp_ms: Some(0),
        ..Default::default()
    })
    .expect("synthetic config should be valid");
    source.initialize().await.expect("initialize");
    source.start_acquisition().await.expect("start");

    let mut p = processor();
    p.set_simulated(source.is_simulated());
    for _ in 0..300 {
        let frame = source.read_frame().await.expect("synthetic read");
        p.ingest(&frame);
    }
    let reading = p.recompute();

    assert!(reading.simulated);
    assert!(reading.confidence <= quality::CONFIDENCE_CAP_SIMULATED);
    assert!((reading.heart_rate - 72.0).abs() <= 5.0, "hr {}", reading.heart_rate);
}

proptest! {
    #[test]
    fn prop_heart_rate_is_always_usable(
        values in prop::collection::vec(0.0f32..255.0, 0..400),
        profile_match in 0.0f32..1.0,
    ) {
        let mut p = processor();
        for (i, v) in values.iter().enumerate() {
            p.ingest(&SampleFrame::new(timestamp(i), vec![*v, 60.0, 40.0], profile_match));
        }
        let reading = p.recompute();
        let config = ProcessingConfig::default();

        prop_assert!(reading.heart_rate.is_finite());
        prop_assert!(reading.heart_rate >= config.min_heart_rate_bpm);
        prop_assert!(reading.heart_rate <= config.max_heart_rate_bpm);
        prop_assert!((0.0..=1.0).contains(&reading.confidence));
        prop_assert!(reading.spo2.value.is_finite());
    }
}
