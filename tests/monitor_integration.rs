//! Monitor wiring: source selection, substitution and escalation forwarding

use std::f32::consts::PI;
use std::sync::Arc;
use std::time::Duration;
use vital_guard::config::constants::quality;
use vital_guard::config::SystemConfig;
use vital_guard::escalation::{
    ContactChannel, ContactRole, EmergencyContact, EngineState, EscalationError, LoggingDispatcher, TriggerOutcome,
};
use vital_guard::hal::{CaptureShimSource, SampleFrame, SampleSource, SourceCapabilities, SourceKind};
use vital_guard::monitor::{MonitorHandle, VitalMonitor};
use vital_guard::risk::{EnvironmentalFactor, EnvironmentalKind, EnvironmentalTier, EventCode, RiskTier};
use vital_guard::VitalError;

fn contacts() -> Vec<EmergencyContact> {
    vec![
        EmergencyContact::new("partner", ContactChannel::Call, ContactRole::Primary, 1).as_default(),
        EmergencyContact::new("gp", ContactChannel::Call, ContactRole::Medical, 2),
    ]
}

async fn spawn_monitor(source: Option<Box<dyn SampleSource>>) -> MonitorHandle {
    let (handle, _task) = VitalMonitor::spawn(SystemConfig::default(), source, Arc::new(LoggingDispatcher), contacts())
        .await
        .expect("monitor should start");
    handle
}

#[tokio::test(start_paused = true)]
async fn test_missing_source_yields_flagged_synthetic_readings() {
    let monitor = spawn_monitor(None).await;
    assert!(monitor.status().simulated);
    assert_eq!(monitor.status().source.kind, SourceKind::Synthetic);

    tokio::time::sleep(Duration::from_secs(12)).await;

    let reading = monitor.latest_reading();
    assert!(reading.simulated);
    assert!(reading.confidence <= quality::CONFIDENCE_CAP_SIMULATED);
    assert!(reading.heart_rate.is_finite() && reading.heart_rate > 0.0);
    assert!(monitor.status().frames_read >= 300);

    // Simulated vitals never drive escalation on their own
    assert_eq!(monitor.latest_score().vitals_tier, RiskTier::Low);
    assert_eq!(monitor.escalation_snapshot().state, EngineState::Standby);

    monitor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_capture_frames_produce_real_readings() {
    let (tx, source) = CaptureShimSource::channel(SourceKind::Camera, SourceCapabilities::default());

    // Stand-in for the platform capture shim
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(33));
        for i in 0..600usize {
            ticker.tick().await;
            let t = i as f32 / 30.0;
            let red = 150.0 + 3.0 * (2.0 * PI * 1.2 * t).sin();
            let frame = SampleFrame::new((i as f32 * 1000.0 / 30.0).round() as u64, vec![red, 60.0, 40.0], 0.9);
            if tx.send(frame).await.is_err() {
                break;
            }
        }
    });

    let monitor = spawn_monitor(Some(Box::new(source))).await;
    tokio::time::sleep(Duration::from_secs(15)).await;

    let status = monitor.status();
    assert!(!status.simulated);
    assert_eq!(status.substitutions, 0);

    let reading = monitor.latest_reading();
    assert!(!reading.simulated);
    assert!((reading.heart_rate - 72.0).abs() <= 5.0, "hr {}", reading.heart_rate);
}

#[tokio::test(start_paused = true)]
async fn test_disconnected_source_is_substituted() {
    let (tx, source) = CaptureShimSource::channel(SourceKind::Camera, SourceCapabilities::default());
    let monitor = spawn_monitor(Some(Box::new(source))).await;
    assert!(!monitor.status().simulated);

    drop(tx);
    tokio::time::sleep(Duration::from_secs(1)).await;

    let status = monitor.status();
    assert_eq!(status.substitutions, 1);
    assert!(status.simulated);
    assert!(status.read_failures >= 5);
    assert_eq!(status.source.kind, SourceKind::Synthetic);

    tokio::time::sleep(Duration::from_secs(12)).await;
    assert!(monitor.latest_reading().simulated);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_source_times_out_and_is_substituted() {
    let (_tx, source) = CaptureShimSource::channel(SourceKind::Camera, SourceCapabilities::default());
    let monitor = spawn_monitor(Some(Box::new(source))).await;

    // Five reads of ten sample periods each
    tokio::time::sleep(Duration::from_secs(3)).await;

    let status = monitor.status();
    assert_eq!(status.substitutions, 1);
    assert!(status.simulated);
}

#[tokio::test(start_paused = true)]
async fn test_fall_event_starts_countdown() {
    let monitor = spawn_monitor(None).await;

    let score = monitor.report_event(EventCode::Fall).await.expect("report event");
    assert_eq!(score.tier, RiskTier::High);
    assert_eq!(monitor.escalation_snapshot().state, EngineState::Escalating);

    tokio::time::sleep(Duration::from_secs(11)).await;
    assert_eq!(monitor.escalation_snapshot().state, EngineState::Active);
}

#[tokio::test(start_paused = true)]
async fn test_manual_sos_activates_immediately() {
    let monitor = spawn_monitor(None).await;

    let outcome = monitor.manual_sos("button held").await.expect("manual sos");
    assert!(matches!(outcome, TriggerOutcome::Activated(_)));
    assert_eq!(monitor.escalation_snapshot().state, EngineState::Active);
    assert_eq!(monitor.latest_score().tier, RiskTier::Critical);

    monitor.resolve().await.expect("resolve");
    assert_eq!(monitor.escalation_snapshot().state, EngineState::Resolved);
}

#[tokio::test(start_paused = true)]
async fn test_critical_environment_skips_countdown() {
    let monitor = spawn_monitor(None).await;

    let score = monitor
        .update_environment(vec![EnvironmentalFactor::new(
            EnvironmentalKind::Seismic,
            7.2,
            EnvironmentalTier::Critical,
        )])
        .await
        .expect("update environment");

    assert_eq!(score.tier, RiskTier::Critical);
    assert_eq!(monitor.escalation_snapshot().state, EngineState::Active);
}

#[tokio::test(start_paused = true)]
async fn test_fallback_disabled_without_source_fails() {
    let mut config = SystemConfig::default();
    config.source.allow_synthetic_fallback = false;

    let result = VitalMonitor::spawn(config, None, Arc::new(LoggingDispatcher), contacts()).await;
    assert!(matches!(result, Err(VitalError::Configuration { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_invalid_config_is_rejected() {
    let mut config = SystemConfig::default();
    config.sampling.recompute_every = 0;

    let result = VitalMonitor::spawn(config, None, Arc::new(LoggingDispatcher), contacts()).await;
    assert!(matches!(result, Err(VitalError::Configuration { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_the_task() {
    let (monitor, task) = VitalMonitor::spawn(SystemConfig::default(), None, Arc::new(LoggingDispatcher), contacts())
        .await
        .expect("monitor should start");

    monitor.shutdown().await;
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("monitor task should stop")
        .expect("monitor task should not panic");

    assert!(monitor.report_event(EventCode::Fall).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_monitor_task_outlives_the_engine() {
    let (monitor, task) = VitalMonitor::spawn(SystemConfig::default(), None, Arc::new(LoggingDispatcher), contacts())
        .await
        .expect("monitor should start");
    monitor.manual_sos("button held").await.expect("manual sos");

    monitor.shutdown().await;
    task.await.expect("monitor task should not panic");

    assert!(!monitor.escalation().is_running());
    assert_eq!(monitor.escalation().resolve().await, Err(EscalationError::EngineStopped));
    assert_eq!(monitor.escalation().cancel().await, Err(EscalationError::EngineStopped));
}
