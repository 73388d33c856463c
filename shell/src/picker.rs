use std::path::PathBuf;

use async_trait::async_trait;
use derma_core::capabilities::{PickConfig, PickedImage, PickerError, PickerOutput, PickerResult};
use tracing::debug;

#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn pick(&self, config: &PickConfig) -> PickerResult;

    /// Camera capture. Sources without a camera fall back to picking.
    async fn capture(&self, config: &PickConfig) -> PickerResult {
        self.pick(config).await
    }
}

/// Hands over a file from disk, or a cancellation when no path is set.
#[derive(Debug, Clone, Default)]
pub struct FileImageSource {
    path: Option<PathBuf>,
}

impl FileImageSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    #[must_use]
    pub fn cancelled() -> Self {
        Self { path: None }
    }
}

#[async_trait]
impl ImageSource for FileImageSource {
    async fn pick(&self, config: &PickConfig) -> PickerResult {
        let Some(path) = &self.path else {
            debug!("no file chosen");
            return Ok(PickerOutput::Cancelled);
        };

        let data = tokio::fs::read(path)
            .await
            .map_err(|e| PickerError::Unavailable {
                reason: format!("{}: {e}", path.display()),
            })?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let limit = config.clone().validated().max_file_size;
        PickedImage::with_limit(file_name, data, limit).map(PickerOutput::Picked)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoImageSource;

#[async_trait]
impl ImageSource for NoImageSource {
    async fn pick(&self, _config: &PickConfig) -> PickerResult {
        Err(PickerError::Unavailable {
            reason: "no image source on this platform".to_string(),
        })
    }
}
