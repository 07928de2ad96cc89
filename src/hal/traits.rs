//! Core HAL trait for sample source abstraction

use crate::hal::types::{SampleFrame, SourceInfo};
use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by sample sources
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceError {
    #[error("capture device unavailable: {0}")]
    Unavailable(String),
    #[error("capture permission denied")]
    PermissionDenied,
    #[error("source is not running")]
    NotRunning,
    #[error("invalid source configuration: {0}")]
    Configuration(String),
}

/// Main trait for sample source implementations
///
/// The real capture path and the synthetic generator both implement this
/// trait so the processor never needs to know which one it is fed by,
/// except through [`SampleSource::is_simulated`].
#[async_trait]
pub trait SampleSource: Send {
    /// Probe and initialize the source
    async fn initialize(&mut self) -> Result<(), SourceError>;

    /// Start frame acquisition
    async fn start_acquisition(&mut self) -> Result<(), SourceError>;

    /// Stop frame acquisition
    async fn stop_acquisition(&mut self) -> Result<(), SourceError>;

    /// Read the next frame
    async fn read_frame(&mut self) -> Result<SampleFrame, SourceError>;

    /// Get source information
    fn source_info(&self) -> SourceInfo;

    /// Whether frames are synthetic
    fn is_simulated(&self) -> bool {
        self.source_info().kind.is_simulated()
    }
}
