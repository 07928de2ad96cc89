//! Opaque notification capability used by the escalation engine

use crate::escalation::types::{EmergencyContact, SessionId};
use crate::risk::RiskTier;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Dispatch error types
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    #[error("dispatcher unavailable: {0}")]
    Unavailable(String),

    #[error("notification rejected: {0}")]
    Rejected(String),

    #[error("dispatch timed out after {0}s")]
    Timeout(u64),
}

/// Message handed to the dispatcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub session_id: SessionId,
    pub tier: RiskTier,
    pub text: String,
    /// 0 for the first try
    pub retry: u32,
}

/// Sends one notification to one contact
///
/// Implementations own the transport; the engine only observes the result.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn send(&self, contact: &EmergencyContact, message: &NotificationMessage) -> Result<(), DispatchError>;
}

/// Dispatcher that only logs, for demos and dry runs
#[derive(Debug, Default, Clone)]
pub struct LoggingDispatcher;

#[async_trait]
impl NotificationDispatcher for LoggingDispatcher {
    async fn send(&self, contact: &EmergencyContact, message: &NotificationMessage) -> Result<(), DispatchError> {
        info!(
            contact_id = %contact.id,
            channel = %contact.channel,
            session_id = message.session_id,
            retry = message.retry,
            "notification: {}",
            message.text
        );
        Ok(())
    }
}
