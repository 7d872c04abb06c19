//! Pipeline error types.

use thiserror::Error;

use crate::ports::{PlatformError, ProviderError, ReviewError};

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Sourcing terminated below the partial-success threshold. Fatal to
    /// the run; the caller must not assemble with too few candidates.
    #[error("only {accepted} of the required {required} candidates were accepted")]
    InsufficientMedia { accepted: usize, required: usize },

    #[error("classifier error: {0}")]
    Classifier(String),

    #[error("preview image was not ready after {attempts} attempts")]
    ThumbnailTimedOut { attempts: u32 },

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("review error: {0}")]
    Review(#[from] ReviewError),

    #[error("media error: {0}")]
    Media(#[from] wildreel_media::MediaError),

    #[error("timeline error: {0}")]
    Timeline(#[from] wildreel_models::TimelineError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("image decode error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn classifier(msg: impl Into<String>) -> Self {
        Self::Classifier(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Whether this run failed for lack of accepted candidates.
    pub fn is_insufficient_media(&self) -> bool {
        matches!(self, Self::InsufficientMedia { .. })
    }

    /// Whether the hosting platform reported the failure.
    pub fn is_platform(&self) -> bool {
        matches!(self, Self::Platform(_))
    }
}
