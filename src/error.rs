//! Unified error handling for the vital-guard core
//!
//! Leaf modules define small `thiserror` enums (`SourceError`,
//! `BufferError`, `DispatchError`, `EscalationError`, `ConfigError`). They
//! are converted into [`VitalError`] at the crate's public seams, where the
//! error gains a component/operation context for logging.

use crate::acquisition::BufferError;
use crate::config::loader::ConfigError;
use crate::escalation::{DispatchError, EscalationError};
use crate::hal::{SourceError, SourceKind};
use serde::Serialize;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

/// Unified error type for the monitor, processor and escalation surfaces
#[derive(Debug, Clone)]
pub enum VitalError {
    /// Sample source failures
    Source {
        kind: Option<SourceKind>,
        error: Arc<dyn Error + Send + Sync>,
        context: ErrorContext,
    },

    /// Configuration and setup errors
    Configuration {
        component: String,
        reason: String,
        context: ErrorContext,
    },

    /// Rolling window errors
    Buffer {
        reason: String,
        context: ErrorContext,
    },

    /// Escalation state machine errors
    Escalation {
        error: EscalationError,
        context: ErrorContext,
    },

    /// Notification transport errors
    Dispatch {
        contact_id: Option<String>,
        error: DispatchError,
        context: ErrorContext,
    },

    /// Runtime and task errors
    System {
        subsystem: String,
        reason: String,
        context: ErrorContext,
    },
}

/// Error context for debugging and analysis
#[derive(Debug, Clone, Serialize)]
pub struct ErrorContext {
    pub timestamp: SystemTime,
    pub thread_id: Option<String>,
    pub component: String,
    pub operation: String,
    pub file: Option<&'static str>,
    pub line: Option<u32>,
    pub additional_info: HashMap<String, String>,
}

impl ErrorContext {
    pub fn new(component: &str, operation: &str) -> Self {
        Self {
            timestamp: SystemTime::now(),
            thread_id: std::thread::current().name().map(|s| s.to_string()),
            component: component.to_string(),
            operation: operation.to_string(),
            file: None,
            line: None,
            additional_info: HashMap::new(),
        }
    }

    /// Create error context with file and line information
    pub fn with_location(component: &str, operation: &str, file: &'static str, line: u32) -> Self {
        let mut context = Self::new(component, operation);
        context.file = Some(file);
        context.line = Some(line);
        context
    }

    pub fn add_info<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.additional_info.insert(key.into(), value.into());
        self
    }
}

/// Error context carrying the call site
#[macro_export]
macro_rules! error_context {
    ($component:expr, $operation:expr) => {
        $crate::error::ErrorContext::with_location($component, $operation, file!(), line!())
    };
}

impl VitalError {
    pub fn context(&self) -> &ErrorContext {
        match self {
            VitalError::Source { context, .. }
            | VitalError::Configuration { context, .. }
            | VitalError::Buffer { context, .. }
            | VitalError::Escalation { context, .. }
            | VitalError::Dispatch { context, .. }
            | VitalError::System { context, .. } => context,
        }
    }

    /// Whether the monitor can keep running after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, VitalError::Source { .. } | VitalError::Dispatch { .. })
    }
}

impl fmt::Display for VitalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VitalError::Source { kind, error, context } => {
                let kind = kind.map(|k| format!("{:?}", k)).unwrap_or_else(|| "unknown".to_string());
                write!(
                    f,
                    "[SOURCE-{}] {} in {} (at {}:{})",
                    kind,
                    error,
                    context.component,
                    context.file.unwrap_or("unknown"),
                    context.line.unwrap_or(0)
                )
            }
            VitalError::Configuration { component, reason, context } => {
                write!(f, "[CONFIG] Configuration error in {}: {} ({})", component, reason, context.operation)
            }
            VitalError::Buffer { reason, context } => {
                write!(f, "[BUFFER] {} ({})", reason, context.operation)
            }
            VitalError::Escalation { error, context } => {
                write!(f, "[ESCALATION] {} ({})", error, context.operation)
            }
            VitalError::Dispatch { contact_id, error, context } => match contact_id {
                Some(id) => write!(f, "[DISPATCH] {} for contact {} ({})", error, id, context.operation),
                None => write!(f, "[DISPATCH] {} ({})", error, context.operation),
            },
            VitalError::System { subsystem, reason, context } => {
                write!(f, "[SYSTEM] {} error: {} ({})", subsystem, reason, context.operation)
            }
        }
    }
}

impl Error for VitalError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            VitalError::Source { error, .. } => Some(error.as_ref()),
            VitalError::Escalation { error, .. } => Some(error),
            VitalError::Dispatch { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<SourceError> for VitalError {
    fn from(err: SourceError) -> Self {
        VitalError::Source {
            kind: None,
            error: Arc::new(err),
            context: error_context!("source", "source_operation"),
        }
    }
}

impl From<BufferError> for VitalError {
    fn from(err: BufferError) -> Self {
        VitalError::Buffer {
            reason: err.to_string(),
            context: error_context!("buffer", "buffer_operation"),
        }
    }
}

impl From<EscalationError> for VitalError {
    fn from(err: EscalationError) -> Self {
        VitalError::Escalation {
            error: err,
            context: error_context!("escalation", "engine_request"),
        }
    }
}

impl From<DispatchError> for VitalError {
    fn from(err: DispatchError) -> Self {
        VitalError::Dispatch {
            contact_id: None,
            error: err,
            context: error_context!("dispatcher", "send"),
        }
    }
}

impl From<ConfigError> for VitalError {
    fn from(err: ConfigError) -> Self {
        VitalError::Configuration {
            component: "config".to_string(),
            reason: err.to_string(),
            context: error_context!("config", "load"),
        }
    }
}

/// Result type alias for vital-guard operations
pub type VitalResult<T> = Result<T, VitalError>;

/// Error builder for convenient error construction
pub struct VitalErrorBuilder {
    component: String,
    operation: String,
}

impl VitalErrorBuilder {
    pub fn new(component: &str, operation: &str) -> Self {
        Self {
            component: component.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn configuration(self, reason: &str) -> VitalError {
        let context = ErrorContext::new(&self.component, &self.operation);
        VitalError::Configuration {
            component: self.component,
            reason: reason.to_string(),
            context,
        }
    }

    pub fn source(self, kind: SourceKind, error: SourceError) -> VitalError {
        VitalError::Source {
            kind: Some(kind),
            error: Arc::new(error),
            context: ErrorContext::new(&self.component, &self.operation),
        }
    }

    pub fn dispatch(self, contact_id: &str, error: DispatchError) -> VitalError {
        VitalError::Dispatch {
            contact_id: Some(contact_id.to_string()),
            error,
            context: ErrorContext::new(&self.component, &self.operation),
        }
    }

    pub fn system(self, reason: &str) -> VitalError {
        VitalError::System {
            subsystem: self.component.clone(),
            reason: reason.to_string(),
            context: ErrorContext::new(&self.component, &self.operation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_context_creation() {
        let context = ErrorContext::new("processor", "recompute").add_info("samples", "12");
        assert_eq!(context.component, "processor");
        assert_eq!(context.operation, "recompute");
        assert_eq!(context.additional_info.get("samples").map(String::as_str), Some("12"));
        assert!(context.timestamp <= SystemTime::now());
    }

    #[test]
    fn test_error_context_macro_records_location() {
        let context = error_context!("monitor", "tick");
        assert!(context.file.unwrap().ends_with("error.rs"));
        assert!(context.line.unwrap() > 0);
    }

    #[test]
    fn test_error_builder() {
        let err = VitalErrorBuilder::new("processor", "new").configuration("sample rate must be positive");
        match err {
            VitalError::Configuration { component, reason, .. } => {
                assert_eq!(component, "processor");
                assert_eq!(reason, "sample rate must be positive");
            }
            _ => panic!("Expected configuration error"),
        }
    }

    #[test]
    fn test_source_conversion_keeps_cause() {
        let err: VitalError = SourceError::PermissionDenied.into();
        assert!(err.is_recoverable());
        assert!(err.source().is_some());
        assert!(err.to_string().contains("permission denied"));
    }

    #[test]
    fn test_escalation_conversion() {
        let err: VitalError = EscalationError::EngineStopped.into();
        assert!(!err.is_recoverable());
        assert!(err.to_string().starts_with("[ESCALATION]"));
    }

    #[test]
    fn test_dispatch_display_names_contact() {
        let err = VitalErrorBuilder::new("dispatcher", "send").dispatch("gp", DispatchError::Timeout(15));
        assert!(err.to_string().contains("contact gp"));
    }

    #[test]
    fn test_error_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<VitalError>();
    }

    #[test]
    fn test_only_source_and_dispatch_are_recoverable() {
        let config = VitalErrorBuilder::new("monitor", "spawn").configuration("recompute_every must be positive");
        let buffer: VitalError = BufferError::InvalidCapacity(0).into();
        let system = VitalErrorBuilder::new("monitor", "request").system("monitor has stopped");
        let dispatch: VitalError = DispatchError::Timeout(15).into();

        assert!(!config.is_recoverable());
        assert!(!buffer.is_recoverable());
        assert!(!system.is_recoverable());
        assert!(dispatch.is_recoverable());
        assert_eq!(config.context().component, "monitor");
        assert!(buffer.context().file.is_some());
    }
}
