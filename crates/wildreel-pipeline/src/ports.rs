//! Contracts for external collaborators.
//!
//! The pipeline consumes a stock-media provider, a video-hosting
//! platform, and (for subjects outside the classifier vocabulary) a
//! human reviewer. All three are injected as trait objects so a
//! production run can be driven against stubs in tests; no global
//! client is constructed at load time.

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hosting-platform category for wildlife content.
pub const DEFAULT_CATEGORY_ID: u32 = 15;

/// Errors surfaced by a stock-media provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("provider transport error: {0}")]
    Transport(String),

    #[error("provider returned an invalid response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Whether this error means further queries will not succeed for a
    /// while. Rate limits and transport failures both count.
    pub fn is_quota_signal(&self) -> bool {
        matches!(self, Self::QuotaExhausted(_) | Self::Transport(_))
    }
}

/// Errors surfaced by the hosting platform. Always propagated; a
/// partially published video with no captions or thumbnail is a
/// user-visible defect.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("upload failed: {0}")]
    UploadFailed(String),

    #[error("caption insert failed: {0}")]
    CaptionFailed(String),

    #[error("thumbnail operation failed: {0}")]
    ThumbnailFailed(String),

    #[error("platform request failed: {0}")]
    RequestFailed(String),
}

/// Errors from the human-review fallback.
#[derive(Debug, Error)]
#[error("review failed: {0}")]
pub struct ReviewError(pub String);

/// One sourced image: raw bytes plus the locator that identifies its
/// origin. Locators are the dedup key for the accepted set.
#[derive(Debug, Clone)]
pub struct SourcedMedia {
    pub bytes: Vec<u8>,
    pub locator: String,
}

/// One sourced video segment with its native geometry.
#[derive(Debug, Clone)]
pub struct SourcedSegment {
    pub bytes: Vec<u8>,
    pub locator: String,
    pub width: u32,
    pub height: u32,
    pub duration_secs: f64,
}

/// Opaque identifier the platform assigns at publish time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything the platform needs to publish a finished clip.
#[derive(Debug, Clone)]
pub struct VideoUpload {
    pub path: PathBuf,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category_id: u32,
    pub language: String,
}

/// A stock-media provider queried for still images.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Fetch one candidate image matching `subject`. May fail with a
    /// rate-limit or transport error at any call.
    async fn fetch_image(
        &self,
        subject: &str,
        width: u32,
        height: u32,
    ) -> Result<SourcedMedia, ProviderError>;
}

/// A stock-media provider queried for short video segments.
#[async_trait]
pub trait SegmentProvider: Send + Sync {
    /// Fetch up to `count` candidate segments matching `subject`.
    async fn fetch_segments(
        &self,
        subject: &str,
        count: usize,
    ) -> Result<Vec<SourcedSegment>, ProviderError>;
}

/// The video-hosting platform.
#[async_trait]
pub trait VideoPlatform: Send + Sync {
    /// Upload a finished clip; returns the platform's identifier for it.
    async fn publish(&self, upload: &VideoUpload) -> Result<VideoId, PlatformError>;

    /// URL of the maximal-resolution generated preview, or `None` while
    /// the platform is still processing. `None` is an expected transient
    /// state, not an error.
    async fn thumbnail_url(&self, id: &VideoId) -> Result<Option<String>, PlatformError>;

    /// Replace the video's thumbnail with the given JPEG bytes.
    async fn set_thumbnail(&self, id: &VideoId, jpeg: Vec<u8>) -> Result<(), PlatformError>;

    /// Attach the narration script as captions.
    async fn insert_captions(
        &self,
        id: &VideoId,
        script: &str,
        language: &str,
    ) -> Result<(), PlatformError>;
}

/// Human confirmation for subjects the classifier vocabulary cannot
/// represent.
#[async_trait]
pub trait CandidateReviewer: Send + Sync {
    /// Present the candidate's locator to a reviewer; `true` accepts it.
    async fn confirm(&self, subject: &str, locator: &str) -> Result<bool, ReviewError>;
}
