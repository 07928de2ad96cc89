// demos/monitor_demo.rs
//! Runs the monitor on the synthetic source, raises an SOS and resolves it

use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use vital_guard::config::ConfigLoader;
use vital_guard::escalation::{ContactChannel, ContactRole, EmergencyContact, LoggingDispatcher};
use vital_guard::monitor::VitalMonitor;
use vital_guard::risk::{EnvironmentalFactor, EnvironmentalKind, EnvironmentalTier};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    println!("Vital Guard Monitor Demo");
    println!("========================");

    let mut loader = ConfigLoader::new();
    let config = loader.load_system_config()?;
    let summary = config.get_summary();
    println!("Configuration loaded");
    println!("  - Sample rate: {} Hz", summary.sample_rate_hz);
    println!("  - Window: {} samples", summary.window_samples);
    println!("  - Trigger threshold: {}", summary.trigger_threshold);
    println!("  - Countdown: {} s", summary.countdown_secs);

    let contacts = vec![
        EmergencyContact::new("partner", ContactChannel::Call, ContactRole::Primary, 1).as_default(),
        EmergencyContact::new("gp", ContactChannel::Sms, ContactRole::Medical, 2),
        EmergencyContact::new("neighbour", ContactChannel::Push, ContactRole::Backup, 3),
    ];

    // No capture shim on this machine: the synthetic generator stands in
    let (monitor, task) = VitalMonitor::spawn(config, None, Arc::new(LoggingDispatcher), contacts).await?;
    let status = monitor.status();
    println!("\nSource: {} (simulated: {})", status.source.name, status.simulated);

    println!("\nCollecting readings...");
    let mut readings = monitor.subscribe_readings();
    for _ in 0..6 {
        readings.changed().await?;
        let reading = readings.borrow_and_update().clone();
        println!(
            "  HR {:>5.1} bpm | SpO2 {:>5.1}% | RR {:>4.1}/min | confidence {:.2} | quality {:?}{}",
            reading.heart_rate,
            reading.spo2.value,
            reading.respiratory_rate.value,
            reading.confidence,
            reading.placement_quality,
            if reading.stale { " (stale)" } else { "" }
        );
    }

    println!("\nReporting an elevated gas reading...");
    let score = monitor
        .upsert_environment(EnvironmentalFactor::new(EnvironmentalKind::Gas, 450.0, EnvironmentalTier::Elevated))
        .await?;
    println!("  Risk tier: {} (scalar {:.0})", score.tier, score.scalar);
    println!("  Escalation: {}", monitor.escalation_snapshot().state);

    monitor.cancel().await?;
    println!("  Cancelled as false alarm: {}", monitor.escalation_snapshot().state);

    println!("\nRaising a manual SOS...");
    let outcome = monitor.manual_sos("demo button").await?;
    println!("  Outcome: {:?}", outcome);

    sleep(Duration::from_secs(5)).await;
    let snapshot = monitor.escalation_snapshot();
    if let Some(session) = &snapshot.session {
        for attempt in &session.attempts {
            println!("  {} via {}: {:?}", attempt.contact_id, attempt.channel, attempt.status);
        }
    }

    monitor.acknowledge("partner").await?;
    let resolved = monitor.resolve().await?;
    println!("  Resolve: {:?}", resolved);

    println!("\nTimeline:");
    println!("{}", monitor.escalation_snapshot().timeline_json()?);

    monitor.shutdown().await;
    task.await?;
    println!("\nDemo completed");
    Ok(())
}
