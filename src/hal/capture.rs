//! Source fed by the external capture shim (camera or microphone)

use crate::config::constants::source::CAPTURE_SHIM_QUEUE_SIZE;
use crate::hal::{SampleFrame, SampleSource, SourceCapabilities, SourceError, SourceInfo, SourceKind};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Sending half handed to the capture collaborator
pub type FrameSender = mpsc::Sender<SampleFrame>;

/// Real-sensor source receiving frames pushed by a capture shim
///
/// The shim owns the device; this type only sees the frames. A dropped
/// sender means the device went away and is reported as `Unavailable`.
pub struct CaptureShimSource {
    receiver: mpsc::Receiver<SampleFrame>,
    info: SourceInfo,
    permission_granted: bool,
    is_running: bool,
}

impl CaptureShimSource {
    /// Create a source and the sender the capture shim pushes frames into
    pub fn channel(kind: SourceKind, capabilities: SourceCapabilities) -> (FrameSender, Self) {
        let (tx, rx) = mpsc::channel(CAPTURE_SHIM_QUEUE_SIZE);
        let source = Self {
            receiver: rx,
            info: SourceInfo {
                name: match kind {
                    SourceKind::Microphone => "Microphone capture".to_string(),
                    _ => "Camera capture".to_string(),
                },
                kind,
                capabilities,
            },
            permission_granted: true,
            is_running: false,
        };
        (tx, source)
    }

    /// Mark sensor access as denied by the platform
    pub fn with_permission_denied(mut self) -> Self {
        self.permission_granted = false;
        self
    }
}

#[async_trait]
impl SampleSource for CaptureShimSource {
    async fn initialize(&mut self) -> Result<(), SourceError> {
        if !self.permission_granted {
            return Err(SourceError::PermissionDenied);
        }
        if self.receiver.is_closed() && self.receiver.is_empty() {
            return Err(SourceError::Unavailable("capture shim disconnected".to_string()));
        }
        Ok(())
    }

    async fn start_acquisition(&mut self) -> Result<(), SourceError> {
        self.initialize().await?;
        self.is_running = true;
        Ok(())
    }

    async fn stop_acquisition(&mut self) -> Result<(), SourceError> {
        self.is_running = false;
        Ok(())
    }

    async fn read_frame(&mut self) -> Result<SampleFrame, SourceError> {
        if !self.is_running {
            return Err(SourceError::NotRunning);
        }

        match self.receiver.try_recv() {
            Ok(frame) => Ok(frame),
            Err(mpsc::error::TryRecvError::Empty) => {
                // Wait for the next frame from the shim
                self.receiver
                    .recv()
                    .await
                    .ok_or_else(|| SourceError::Unavailable("capture shim disconnected".to_string()))
            }
            Err(mpsc::error::TryRecvError::Disconnected) => {
                Err(SourceError::Unavailable("capture shim disconnected".to_string()))
            }
        }
    }

    fn source_info(&self) -> SourceInfo {
        self.info.clone()
    }
}
