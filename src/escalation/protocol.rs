//! Contact selection by severity tier

use crate::escalation::types::{ContactRole, EmergencyContact};
use crate::risk::RiskTier;

/// Contacts to notify now and, if still active later, after a step-up delay
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContactPlan {
    pub immediate: Vec<EmergencyContact>,
    pub deferred: Vec<EmergencyContact>,
}

impl ContactPlan {
    pub fn is_empty(&self) -> bool {
        self.immediate.is_empty() && self.deferred.is_empty()
    }

    pub fn immediate_ids(&self) -> Vec<String> {
        self.immediate.iter().map(|c| c.id.clone()).collect()
    }

    pub fn deferred_ids(&self) -> Vec<String> {
        self.deferred.iter().map(|c| c.id.clone()).collect()
    }
}

/// Select and order contacts for `tier`
///
/// - critical: medical and top-priority contacts now, everyone else deferred
/// - high: every non-backup contact now, backups deferred
/// - medium: the primary contact
/// - low: the default contact
pub fn plan_for(tier: RiskTier, contacts: &[EmergencyContact]) -> ContactPlan {
    let mut ordered: Vec<EmergencyContact> = contacts.to_vec();
    // Priority first, medical ahead of others at equal priority
    ordered.sort_by_key(|c| (c.priority, c.role != ContactRole::Medical));

    match tier {
        RiskTier::Critical => {
            let top = ordered.first().map(|c| c.priority).unwrap_or(u8::MAX);
            let (immediate, deferred): (Vec<_>, Vec<_>) = ordered
                .into_iter()
                .partition(|c| c.role == ContactRole::Medical || c.priority == top);
            ContactPlan { immediate, deferred }
        }
        RiskTier::High => {
            let (deferred, immediate): (Vec<_>, Vec<_>) = ordered.into_iter().partition(|c| c.role == ContactRole::Backup);
            ContactPlan { immediate, deferred }
        }
        RiskTier::Medium => {
            let primary = ordered
                .iter()
                .find(|c| c.role == ContactRole::Primary)
                .or_else(|| ordered.first())
                .cloned();
            ContactPlan {
                immediate: primary.into_iter().collect(),
                deferred: Vec::new(),
            }
        }
        RiskTier::Low => {
            let default = ordered
                .iter()
                .find(|c| c.is_default)
                .or_else(|| ordered.first())
                .cloned();
            ContactPlan {
                immediate: default.into_iter().collect(),
                deferred: Vec::new(),
            }
        }
    }
}
