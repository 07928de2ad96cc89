//! Emergency escalation: contact protocol, timers and the engine actor

pub mod dispatcher;
pub mod engine;
pub mod protocol;
pub mod timers;
pub mod types;

pub use dispatcher::{DispatchError, LoggingDispatcher, NotificationDispatcher, NotificationMessage};
pub use engine::{EngineSnapshot, EscalationEngine, EscalationError, EscalationHandle, ResolveOutcome, TriggerOutcome};
pub use protocol::{plan_for, ContactPlan};
pub use timers::{PendingTimer, TimerKind, TimerStats};
pub use types::*;
