//! Coordinating actor: source, processor, risk scorer and escalation engine
//!
//! One task owns the sample source, the signal processor and the risk
//! scorer. It runs the fixed-period sampling loop and forwards risk tier
//! increases to the escalation engine. Everything else sees immutable
//! snapshots through `watch` channels.

use crate::config::{validate_source_settings, SystemConfig};
use crate::error::{VitalError, VitalErrorBuilder, VitalResult};
use crate::escalation::{
    EmergencyContact, EngineSnapshot, EscalationEngine, EscalationHandle, NotificationDispatcher, ResolveOutcome,
    TriggerKind, TriggerOutcome,
};
use crate::hal::{SampleSource, SourceFactory, SourceInfo};
use crate::processing::{PerformanceMetrics, SignalProcessor, VitalReading};
use crate::risk::{EnvironmentalFactor, EventCode, RiskScore, RiskScorer, RiskTier};
use crate::utils::time::{TimeProvider, TokioTimeProvider};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// How often expired risk events are swept
const EVENT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);
const COMMAND_QUEUE_SIZE: usize = 32;

/// Source and processor health published by the monitor
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorStatus {
    pub source: SourceInfo,
    pub simulated: bool,
    /// Times the synthetic generator replaced a failing source
    pub substitutions: u32,
    pub frames_read: u64,
    pub read_failures: u64,
    pub consecutive_failures: u32,
    pub processing: PerformanceMetrics,
}

enum MonitorCommand {
    ReportEvent {
        code: EventCode,
        reply: oneshot::Sender<RiskScore>,
    },
    ClearEvents {
        reply: oneshot::Sender<RiskScore>,
    },
    UpdateEnvironment {
        factors: Vec<EnvironmentalFactor>,
        reply: oneshot::Sender<RiskScore>,
    },
    UpsertEnvironment {
        factor: EnvironmentalFactor,
        reply: oneshot::Sender<RiskScore>,
    },
    ManualSos {
        reason: String,
        reply: oneshot::Sender<VitalResult<TriggerOutcome>>,
    },
    Shutdown,
}

/// Cloneable handle to a running monitor
#[derive(Clone)]
pub struct MonitorHandle {
    commands: mpsc::Sender<MonitorCommand>,
    escalation: EscalationHandle,
    readings: watch::Receiver<Arc<VitalReading>>,
    scores: watch::Receiver<Arc<RiskScore>>,
    status: watch::Receiver<Arc<MonitorStatus>>,
}

impl MonitorHandle {
    /// Record a discrete event (fall, SOS, symptom) and return the new score
    pub async fn report_event(&self, code: EventCode) -> VitalResult<RiskScore> {
        self.request(|reply| MonitorCommand::ReportEvent { code, reply }).await
    }

    pub async fn clear_events(&self) -> VitalResult<RiskScore> {
        self.request(|reply| MonitorCommand::ClearEvents { reply }).await
    }

    /// Replace the whole environmental factor set
    pub async fn update_environment(&self, factors: Vec<EnvironmentalFactor>) -> VitalResult<RiskScore> {
        self.request(|reply| MonitorCommand::UpdateEnvironment { factors, reply }).await
    }

    pub async fn upsert_environment(&self, factor: EnvironmentalFactor) -> VitalResult<RiskScore> {
        self.request(|reply| MonitorCommand::UpsertEnvironment { factor, reply }).await
    }

    /// Record an SOS event and start an escalation without countdown
    pub async fn manual_sos(&self, reason: &str) -> VitalResult<TriggerOutcome> {
        self.request(|reply| MonitorCommand::ManualSos {
            reason: reason.to_string(),
            reply,
        })
        .await?
    }

    pub async fn cancel(&self) -> VitalResult<()> {
        Ok(self.escalation.cancel().await?)
    }

    pub async fn resolve(&self) -> VitalResult<ResolveOutcome> {
        Ok(self.escalation.resolve().await?)
    }

    pub async fn acknowledge(&self, contact_id: &str) -> VitalResult<()> {
        Ok(self.escalation.acknowledge(contact_id).await?)
    }

    pub async fn escalate_next(&self) -> VitalResult<usize> {
        Ok(self.escalation.escalate_next().await?)
    }

    pub async fn update_contacts(&self, contacts: Vec<EmergencyContact>) -> VitalResult<()> {
        Ok(self.escalation.update_contacts(contacts).await?)
    }

    /// Stop the sampling loop and the escalation engine
    pub async fn shutdown(&self) {
        let _ = self.commands.send(MonitorCommand::Shutdown).await;
    }

    pub fn latest_reading(&self) -> Arc<VitalReading> {
        self.readings.borrow().clone()
    }

    pub fn latest_score(&self) -> Arc<RiskScore> {
        self.scores.borrow().clone()
    }

    pub fn status(&self) -> Arc<MonitorStatus> {
        self.status.borrow().clone()
    }

    pub fn escalation_snapshot(&self) -> Arc<EngineSnapshot> {
        self.escalation.snapshot()
    }

    pub fn subscribe_readings(&self) -> watch::Receiver<Arc<VitalReading>> {
        self.readings.clone()
    }

    pub fn subscribe_risk(&self) -> watch::Receiver<Arc<RiskScore>> {
        self.scores.clone()
    }

    pub fn subscribe_escalation(&self) -> watch::Receiver<Arc<EngineSnapshot>> {
        self.escalation.subscribe()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<Arc<MonitorStatus>> {
        self.status.clone()
    }

    pub fn escalation(&self) -> &EscalationHandle {
        &self.escalation
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> MonitorCommand) -> VitalResult<T> {
        let stopped = || VitalErrorBuilder::new("monitor", "request").system("monitor has stopped");
        let (tx, rx) = oneshot::channel();
        self.commands.send(build(tx)).await.map_err(|_| stopped())?;
        rx.await.map_err(|_| stopped())
    }
}

/// The monitor actor
pub struct VitalMonitor {
    config: SystemConfig,
    source: Box<dyn SampleSource>,
    processor: SignalProcessor,
    scorer: RiskScorer,
    escalation: EscalationHandle,
    engine_task: JoinHandle<()>,
    time: Arc<dyn TimeProvider>,
    last_tier: RiskTier,
    status: MonitorStatus,

    reading_tx: watch::Sender<Arc<VitalReading>>,
    score_tx: watch::Sender<Arc<RiskScore>>,
    status_tx: watch::Sender<Arc<MonitorStatus>>,
}

impl VitalMonitor {
    /// Validate the configuration, select a source and start the monitor
    ///
    /// With no `source`, or one that fails its probe, the synthetic
    /// generator is used when `source.allow_synthetic_fallback` is set.
    pub async fn spawn(
        config: SystemConfig,
        source: Option<Box<dyn SampleSource>>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        contacts: Vec<EmergencyContact>,
    ) -> VitalResult<(MonitorHandle, JoinHandle<()>)> {
        config.validate_consistency().map_err(|errors| {
            VitalErrorBuilder::new("monitor", "spawn").configuration(&errors.join("; "))
        })?;

        let source = Self::select_source(&config, source).await?;
        let simulated = source.is_simulated();
        let time: Arc<dyn TimeProvider> = Arc::new(TokioTimeProvider::new());

        let mut processor = SignalProcessor::new(config.sampling.clone(), config.processing.clone())?;
        processor.set_simulated(simulated);

        let (escalation, engine_task) =
            EscalationEngine::spawn(config.escalation.clone(), contacts, dispatcher, time.clone());

        let now = time.now_millis();
        let status = MonitorStatus {
            source: source.source_info(),
            simulated,
            substitutions: 0,
            frames_read: 0,
            read_failures: 0,
            consecutive_failures: 0,
            processing: PerformanceMetrics::default(),
        };
        let initial = VitalReading::initial(config.processing.default_heart_rate_bpm, now, simulated);

        let (reading_tx, reading_rx) = watch::channel(Arc::new(initial));
        let (score_tx, score_rx) = watch::channel(Arc::new(RiskScore::baseline(now)));
        let (status_tx, status_rx) = watch::channel(Arc::new(status.clone()));
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_SIZE);

        info!(
            source = %status.source.name,
            simulated,
            sample_rate_hz = config.sampling.sample_rate_hz,
            "vital monitor starting"
        );

        let monitor = Self {
            scorer: RiskScorer::new(config.risk.clone()),
            config,
            source,
            processor,
            escalation: escalation.clone(),
            engine_task,
            time,
            last_tier: RiskTier::Low,
            status,
            reading_tx,
            score_tx,
            status_tx,
        };

        let task = tokio::spawn(monitor.run(command_rx));
        let handle = MonitorHandle {
            commands: command_tx,
            escalation,
            readings: reading_rx,
            scores: score_rx,
            status: status_rx,
        };
        Ok((handle, task))
    }

    async fn select_source(
        config: &SystemConfig,
        source: Option<Box<dyn SampleSource>>,
    ) -> VitalResult<Box<dyn SampleSource>> {
        validate_source_settings(&config.source)
            .map_err(|e| VitalErrorBuilder::new("monitor", "select_source").configuration(&e))?;

        if config.source.allow_synthetic_fallback {
            let selected = SourceFactory::select(source, config.source.synthetic.clone()).await?;
            return Ok(selected.source);
        }

        let mut source = source.ok_or_else(|| {
            VitalErrorBuilder::new("monitor", "select_source")
                .configuration("no sample source supplied and synthetic fallback is disabled")
        })?;
        let kind = source.source_info().kind;
        let probe = async {
            source.initialize().await?;
            source.start_acquisition().await
        };
        probe
            .await
            .map_err(|e| VitalErrorBuilder::new("monitor", "select_source").source(kind, e))?;
        Ok(source)
    }

    async fn run(mut self, mut commands: mpsc::Receiver<MonitorCommand>) {
        let mut sampler = tokio::time::interval(self.sample_period());
        sampler.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut sweeper = tokio::time::interval(EVENT_SWEEP_INTERVAL);
        sweeper.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(MonitorCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command).await,
                },
                _ = sampler.tick() => self.sample().await,
                _ = sweeper.tick() => self.sweep_events().await,
            }
        }

        if let Err(e) = self.source.stop_acquisition().await {
            warn!(error = %e, "failed to stop sample source");
        }
        self.escalation.shutdown().await;
        if let Err(e) = (&mut self.engine_task).await {
            error!(error = %e, "escalation engine task failed");
        }
        info!(
            frames = self.status.frames_read,
            substitutions = self.status.substitutions,
            "vital monitor stopped"
        );
    }

    fn sample_period(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.config.sampling.sample_rate_hz)
    }

    async fn handle_command(&mut self, command: MonitorCommand) {
        let now = self.time.now_millis();
        match command {
            MonitorCommand::ReportEvent { code, reply } => {
                let score = self.scorer.record_event(code, now).clone();
                self.publish_score(score.clone()).await;
                let _ = reply.send(score);
            }
            MonitorCommand::ClearEvents { reply } => {
                let score = self.scorer.clear_events(now).clone();
                self.publish_score(score.clone()).await;
                let _ = reply.send(score);
            }
            MonitorCommand::UpdateEnvironment { factors, reply } => {
                let score = self.scorer.update_environment(factors, now).clone();
                self.publish_score(score.clone()).await;
                let _ = reply.send(score);
            }
            MonitorCommand::UpsertEnvironment { factor, reply } => {
                let score = self.scorer.upsert_environment(factor, now).clone();
                self.publish_score(score.clone()).await;
                let _ = reply.send(score);
            }
            MonitorCommand::ManualSos { reason, reply } => {
                let score = self.scorer.record_event(EventCode::ManualSos, now).clone();
                // The SOS trigger below covers this tier rise
                self.last_tier = score.tier;
                self.score_tx.send_replace(Arc::new(score));
                let outcome = self.escalation.manual_sos(&reason).await.map_err(VitalError::from);
                let _ = reply.send(outcome);
            }
            MonitorCommand::Shutdown => {}
        }
    }

    async fn sample(&mut self) {
        let timeout = self.sample_period() * self.config.source.read_timeout_periods;
        let result = match tokio::time::timeout(timeout, self.source.read_frame()).await {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(_) => Err(format!("no frame within {:?}", timeout)),
        };

        match result {
            Ok(frame) => {
                self.status.frames_read += 1;
                self.status.consecutive_failures = 0;
                self.processor.ingest(&frame);
                if self.processor.recompute_due() {
                    self.recompute().await;
                }
            }
            Err(reason) => self.read_failed(&reason).await,
        }
    }

    async fn recompute(&mut self) {
        let reading = self.processor.recompute();
        debug!(
            heart_rate = reading.heart_rate,
            confidence = reading.confidence,
            quality = ?reading.placement_quality,
            stale = reading.stale,
            "vital reading"
        );

        let now = self.time.now_millis();
        let score = self.scorer.update_vitals(reading.clone(), now).clone();
        self.reading_tx.send_replace(Arc::new(reading));
        self.publish_score(score).await;
        self.publish_status();
    }

    async fn read_failed(&mut self, reason: &str) {
        self.status.read_failures += 1;
        self.status.consecutive_failures += 1;
        debug!(reason, consecutive = self.status.consecutive_failures, "source read failed");

        let limit = self.config.source.max_consecutive_read_failures;
        if self.status.consecutive_failures >= limit && !self.status.simulated {
            if self.config.source.allow_synthetic_fallback {
                self.substitute_synthetic(reason).await;
            } else if self.status.consecutive_failures == limit {
                error!(reason, "sample source failing and synthetic fallback is disabled");
            }
        }
        self.publish_status();
    }

    async fn substitute_synthetic(&mut self, reason: &str) {
        match SourceFactory::create_synthetic(self.config.source.synthetic.clone()).await {
            Ok(synthetic) => {
                warn!(
                    failed_source = %self.status.source.name,
                    reason,
                    "sample source failing - substituting synthetic generator"
                );
                let mut previous = std::mem::replace(&mut self.source, synthetic);
                let _ = previous.stop_acquisition().await;

                // Real and synthetic samples must not share a window
                self.processor.reset();
                self.processor.set_simulated(true);
                self.status.source = self.source.source_info();
                self.status.simulated = true;
                self.status.substitutions += 1;
                self.status.consecutive_failures = 0;
            }
            Err(e) => error!(error = %e, "synthetic source could not be created"),
        }
    }

    async fn sweep_events(&mut self) {
        let now = self.time.now_millis();
        if self.scorer.expire_events(now) {
            let score = self.scorer.score().clone();
            self.publish_score(score).await;
        }
    }

    /// Publish a score and forward tier increases to the escalation engine
    async fn publish_score(&mut self, score: RiskScore) {
        let tier = score.tier;
        let previous = std::mem::replace(&mut self.last_tier, tier);
        let reason = score
            .contributing_factors
            .first()
            .map(|f| f.description.clone())
            .unwrap_or_else(|| format!("risk tier {}", tier));
        self.score_tx.send_replace(Arc::new(score));

        if tier <= previous || tier < self.config.escalation.trigger_threshold {
            return;
        }

        info!(from = ?previous, to = ?tier, reason = %reason, "risk tier rose");
        match self.escalation.trigger(tier, TriggerKind::RiskThreshold, &reason).await {
            Ok(outcome) => debug!(?outcome, "escalation trigger forwarded"),
            Err(e) => warn!(error = %e, "escalation trigger failed"),
        }
    }

    fn publish_status(&mut self) {
        self.status.processing = self.processor.get_performance_metrics().clone();
        self.status_tx.send_replace(Arc::new(self.status.clone()));
    }
}
