//! Reduces vitals, events and environmental readings to one risk score

use crate::config::risk_config::RiskConfig;
use crate::processing::vitals::{ArrhythmiaFlag, VitalReading};
use crate::risk::types::*;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Owns the current inputs and the score derived from them
///
/// Every mutation recomputes the whole score before returning, so a score
/// never mixes old and new category tiers.
pub struct RiskScorer {
    config: RiskConfig,
    vitals: Option<VitalReading>,
    environment: BTreeMap<EnvironmentalKind, EnvironmentalFactor>,
    events: Vec<RiskEvent>,
    current: RiskScore,
}

impl RiskScorer {
    pub fn new(config: RiskConfig) -> Self {
        Self {
            config,
            vitals: None,
            environment: BTreeMap::new(),
            events: Vec::new(),
            current: RiskScore::baseline(0),
        }
    }

    pub fn score(&self) -> &RiskScore {
        &self.current
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    pub fn update_vitals(&mut self, reading: VitalReading, now_ms: u64) -> &RiskScore {
        self.vitals = Some(reading);
        self.recompute(now_ms)
    }

    /// Replace the whole environmental factor set
    pub fn update_environment(&mut self, factors: Vec<EnvironmentalFactor>, now_ms: u64) -> &RiskScore {
        self.environment = factors.into_iter().map(|f| (f.kind.clone(), f)).collect();
        self.recompute(now_ms)
    }

    /// Insert or replace one environmental factor by kind
    pub fn upsert_environment(&mut self, factor: EnvironmentalFactor, now_ms: u64) -> &RiskScore {
        self.environment.insert(factor.kind.clone(), factor);
        self.recompute(now_ms)
    }

    pub fn record_event(&mut self, code: EventCode, now_ms: u64) -> &RiskScore {
        info!(event = %code, tier = ?code.tier(), "risk event recorded");
        self.events.push(RiskEvent {
            code,
            timestamp_ms: now_ms,
        });
        self.recompute(now_ms)
    }

    pub fn clear_events(&mut self, now_ms: u64) -> &RiskScore {
        self.events.clear();
        self.recompute(now_ms)
    }

    /// Drop events past their retention; true when the score changed
    pub fn expire_events(&mut self, now_ms: u64) -> bool {
        let retention_ms = self.config.event_retention_secs.saturating_mul(1000);
        let before = self.events.len();
        self.events
            .retain(|e| now_ms.saturating_sub(e.timestamp_ms) < retention_ms);

        if self.events.len() == before {
            return false;
        }

        debug!(expired = before - self.events.len(), "risk events expired");
        let previous_tier = self.current.tier;
        self.recompute(now_ms);
        self.current.tier != previous_tier
    }

    pub fn active_events(&self) -> &[RiskEvent] {
        &self.events
    }

    fn recompute(&mut self, now_ms: u64) -> &RiskScore {
        let environment: Vec<&EnvironmentalFactor> = self.environment.values().collect();
        self.current = evaluate(&self.config, self.vitals.as_ref(), &environment, &self.events, now_ms);
        &self.current
    }
}

/// Pure scoring function behind `RiskScorer`
pub fn evaluate(
    config: &RiskConfig,
    vitals: Option<&VitalReading>,
    environment: &[&EnvironmentalFactor],
    events: &[RiskEvent],
    now_ms: u64,
) -> RiskScore {
    let mut factors = Vec::new();

    let vitals_tier = match vitals {
        Some(reading) if vitals_usable(config, reading) => vitals_tier(config, reading, &mut factors),
        _ => RiskTier::Low,
    };

    let mut environment_tier = RiskTier::Low;
    for factor in environment {
        let tier = RiskTier::from(factor.tier);
        if tier > RiskTier::Low {
            factors.push(ContributingFactor {
                category: RiskCategory::Environment,
                description: format!("{} at {}", factor.kind, factor.value),
                tier,
            });
        }
        environment_tier = environment_tier.max(tier);
    }

    let mut event_tier = RiskTier::Low;
    for event in events {
        let tier = event.code.tier();
        if tier > RiskTier::Low {
            factors.push(ContributingFactor {
                category: RiskCategory::Events,
                description: event.code.to_string(),
                tier,
            });
        }
        event_tier = event_tier.max(tier);
    }

    let tier = vitals_tier.max(environment_tier).max(event_tier);

    let w = &config.weights;
    let weight_sum = w.vitals + w.environment + w.events;
    let scalar = if weight_sum > 0.0 {
        (w.vitals * vitals_tier.score() + w.environment * environment_tier.score() + w.events * event_tier.score())
            / weight_sum
    } else {
        0.0
    };

    factors.sort_by(|a, b| b.tier.cmp(&a.tier));

    RiskScore {
        scalar: scalar.clamp(0.0, 100.0),
        tier,
        vitals_tier,
        environment_tier,
        event_tier,
        contributing_factors: factors,
        timestamp_ms: now_ms,
    }
}

fn vitals_usable(config: &RiskConfig, reading: &VitalReading) -> bool {
    if reading.simulated && !config.score_simulated_vitals {
        return false;
    }
    reading.confidence >= config.min_vitals_confidence
}

fn vitals_tier(config: &RiskConfig, reading: &VitalReading, factors: &mut Vec<ContributingFactor>) -> RiskTier {
    let mut tier = RiskTier::Low;
    let mut push = |description: String, t: RiskTier, tier: &mut RiskTier| {
        if t > RiskTier::Low {
            factors.push(ContributingFactor {
                category: RiskCategory::Vitals,
                description,
                tier: t,
            });
        }
        *tier = (*tier).max(t);
    };

    if reading.heart_rate.is_finite() {
        let t = config.heart_rate.classify(reading.heart_rate);
        push(format!("heart rate {:.0} bpm", reading.heart_rate), t, &mut tier);
    }

    // Proxies with no confidence were never estimated
    if reading.spo2.confidence > 0.0 {
        let t = config.spo2.classify(reading.spo2.value);
        push(format!("SpO2 {:.0}%", reading.spo2.value), t, &mut tier);
    }
    if reading.respiratory_rate.confidence > 0.0 {
        let t = config.respiratory_rate.classify(reading.respiratory_rate.value);
        push(format!("respiratory rate {:.0}/min", reading.respiratory_rate.value), t, &mut tier);
    }
    if reading.temperature.confidence > 0.0 {
        let t = config.temperature.classify(reading.temperature.value);
        push(format!("temperature {:.1} C", reading.temperature.value), t, &mut tier);
    }

    if reading.has_flag(ArrhythmiaFlag::IrregularRhythm) {
        push(ArrhythmiaFlag::IrregularRhythm.to_string(), config.irregular_rhythm_tier, &mut tier);
    }
    if reading.has_flag(ArrhythmiaFlag::PossiblePrematureBeat) {
        push(ArrhythmiaFlag::PossiblePrematureBeat.to_string(), config.premature_beat_tier, &mut tier);
    }

    tier
}
