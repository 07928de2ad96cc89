//! Capability probing and source selection

use crate::hal::simulator::{SyntheticConfig, SyntheticSource};
use crate::hal::{SampleSource, SourceError};

/// Outcome of source selection
pub struct SelectedSource {
    pub source: Box<dyn SampleSource>,
    /// True when the primary source failed its probe and was replaced
    pub substituted: bool,
    /// Why the primary source was rejected, if it was
    pub probe_error: Option<SourceError>,
}

impl std::fmt::Debug for SelectedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectedSource")
            .field("source", &self.source.source_info().name)
            .field("substituted", &self.substituted)
            .field("probe_error", &self.probe_error)
            .finish()
    }
}

/// Factory that picks the real sensor or the synthetic generator at startup
pub struct SourceFactory;

impl SourceFactory {
    /// Create a synthetic source already in acquisition
    pub async fn create_synthetic(config: SyntheticConfig) -> Result<Box<dyn SampleSource>, SourceError> {
        let mut source = SyntheticSource::new(config)?;
        source.initialize().await?;
        source.start_acquisition().await?;
        Ok(Box::new(source))
    }

    /// Probe `primary` and fall back to the synthetic generator
    ///
    /// The returned source is always started. Substitution is logged and
    /// reported through [`SelectedSource::substituted`].
    pub async fn select(
        primary: Option<Box<dyn SampleSource>>,
        synthetic: SyntheticConfig,
    ) -> Result<SelectedSource, SourceError> {
        let probe_error = match primary {
            Some(mut source) => match Self::probe(source.as_mut()).await {
                Ok(()) => {
                    tracing::info!(source = %source.source_info().name, "Using capture source");
                    return Ok(SelectedSource {
                        source,
                        substituted: false,
                        probe_error: None,
                    });
                }
                Err(e) => Some(e),
            },
            None => Some(SourceError::Unavailable("no capture source supplied".to_string())),
        };

        tracing::warn!(
            reason = ?probe_error,
            "Capture source unavailable - substituting synthetic generator"
        );

        Ok(SelectedSource {
            source: Self::create_synthetic(synthetic).await?,
            substituted: true,
            probe_error,
        })
    }

    async fn probe(source: &mut dyn SampleSource) -> Result<(), SourceError> {
        source.initialize().await?;
        source.start_acquisition().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::{CaptureShimSource, SourceCapabilities, SourceKind};

    fn synthetic() -> SyntheticConfig {
        SyntheticConfig {
            seed: Some(1),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_missing_primary_substitutes() {
        let selected = SourceFactory::select(None, synthetic()).await.unwrap();
        assert!(selected.substituted);
        assert!(selected.source.is_simulated());
    }

    #[tokio::test]
    async fn test_denied_primary_substitutes() {
        let (_tx, shim) = CaptureShimSource::channel(SourceKind::Camera, SourceCapabilities::default());
        let shim = shim.with_permission_denied();
        let selected = SourceFactory::select(Some(Box::new(shim)), synthetic()).await.unwrap();
        assert!(selected.substituted);
        assert_eq!(selected.probe_error, Some(SourceError::PermissionDenied));
    }

    #[tokio::test]
    async fn test_working_primary_is_kept() {
        let (_tx, shim) = CaptureShimSource::channel(SourceKind::Camera, SourceCapabilities::default());
        let selected = SourceFactory::select(Some(Box::new(shim)), synthetic()).await.unwrap();
        assert!(!selected.substituted);
        assert!(!selected.source.is_simulated());
    }
}
