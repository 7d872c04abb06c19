//! Thumbnail curation: poll for the platform-generated preview, then
//! normalize it and composite the title and logo overlays.
//!
//! The stages run in a fixed order (retrieve, contrast, sharpness,
//! title, logo); each stage consumes an owned image and produces the
//! next one.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use image::{RgbImage, RgbaImage};
use rusttype::Font;
use tokio::time::sleep;
use tracing::{debug, info};

use wildreel_media::enhance::{
    normalize_contrast, normalize_sharpness, TARGET_CONTRAST_STDDEV, TARGET_SHARPNESS_VARIANCE,
};
use wildreel_media::overlay::{composite_logo, draw_title, LogoSpec, TitleStyle};
use wildreel_models::Subject;

use crate::error::{PipelineError, PipelineResult};
use crate::ports::{VideoId, VideoPlatform};

/// Seconds between preview polls; platform processing time is
/// unpredictable.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
/// Default poll ceiling. `None` would poll forever.
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 40;
/// JPEG quality for the uploaded thumbnail.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Fallback locations checked for overlay assets during development.
const DEV_FONT_PATHS: &[&str] = &["assets/fonts/title.ttf", "../assets/fonts/title.ttf"];
const DEV_LOGO_PATHS: &[&str] = &["assets/media/logo.png", "../assets/media/logo.png"];

/// Curator configuration.
#[derive(Debug, Clone)]
pub struct ThumbnailConfig {
    pub poll_interval: Duration,
    /// Poll ceiling; `None` retries indefinitely.
    pub max_poll_attempts: Option<u32>,
    pub jpeg_quality: u8,
    pub font_path: PathBuf,
    pub logo_path: PathBuf,
    pub title_style: TitleStyle,
    pub logo_spec: LogoSpec,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            max_poll_attempts: Some(DEFAULT_MAX_POLL_ATTEMPTS),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            font_path: resolve_asset_path("WILDREEL_FONT", DEV_FONT_PATHS),
            logo_path: resolve_asset_path("WILDREEL_LOGO", DEV_LOGO_PATHS),
            title_style: TitleStyle::default(),
            logo_spec: LogoSpec::default(),
        }
    }
}

impl ThumbnailConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            poll_interval: Duration::from_secs(
                std::env::var("WILDREEL_THUMB_POLL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
            ),
            max_poll_attempts: std::env::var("WILDREEL_THUMB_MAX_POLLS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Some)
                .unwrap_or(defaults.max_poll_attempts),
            ..defaults
        }
    }

    /// Set the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set or clear the poll ceiling.
    pub fn with_max_poll_attempts(mut self, attempts: Option<u32>) -> Self {
        self.max_poll_attempts = attempts;
        self
    }
}

/// Resolve an asset path from an env var, falling back to dev locations.
fn resolve_asset_path(env_var: &str, fallbacks: &[&str]) -> PathBuf {
    if let Ok(path) = std::env::var(env_var) {
        return PathBuf::from(path);
    }
    for path in fallbacks {
        if Path::new(path).exists() {
            return PathBuf::from(path);
        }
    }
    PathBuf::from(fallbacks[0])
}

/// Curates one thumbnail per published video.
pub struct ThumbnailCurator {
    platform: Arc<dyn VideoPlatform>,
    http: reqwest::Client,
    config: ThumbnailConfig,
}

impl ThumbnailCurator {
    pub fn new(platform: Arc<dyn VideoPlatform>, config: ThumbnailConfig) -> Self {
        Self {
            platform,
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Poll the platform until a maximal-resolution preview exists.
    ///
    /// `None` from the platform is the expected not-ready state; the
    /// loop sleeps and retries until the configured ceiling.
    pub async fn poll_preview(&self, id: &VideoId) -> PipelineResult<String> {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            debug!(video_id = %id, attempts, "attempting to retrieve preview image");

            if let Some(url) = self.platform.thumbnail_url(id).await? {
                info!(video_id = %id, url = %url, "preview image available");
                return Ok(url);
            }

            if let Some(max) = self.config.max_poll_attempts {
                if attempts >= max {
                    return Err(PipelineError::ThumbnailTimedOut { attempts });
                }
            }
            debug!(video_id = %id, "preview not ready, waiting to retry");
            sleep(self.config.poll_interval).await;
        }
    }

    /// Download and decode the preview image.
    pub async fn fetch_preview(&self, url: &str) -> PipelineResult<RgbImage> {
        let bytes = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(image::load_from_memory(&bytes)?.to_rgb8())
    }

    fn load_font(&self) -> PipelineResult<Font<'static>> {
        let path = &self.config.font_path;
        let bytes = std::fs::read(path)
            .map_err(|e| PipelineError::config(format!("title font {}: {e}", path.display())))?;
        Font::try_from_vec(bytes)
            .ok_or_else(|| PipelineError::config(format!("unreadable font: {}", path.display())))
    }

    fn load_logo(&self) -> PipelineResult<RgbaImage> {
        let path = &self.config.logo_path;
        let logo = image::open(path)
            .map_err(|e| PipelineError::config(format!("logo {}: {e}", path.display())))?;
        Ok(logo.to_rgba8())
    }

    /// Run the full curation pipeline for a published video.
    pub async fn curate(&self, id: &VideoId, subject: &Subject) -> PipelineResult<RgbImage> {
        let url = self.poll_preview(id).await?;
        let retrieved = self.fetch_preview(&url).await?;

        let enhanced = normalize_sharpness(
            &normalize_contrast(&retrieved, TARGET_CONTRAST_STDDEV),
            TARGET_SHARPNESS_VARIANCE,
        );

        let font = self.load_font()?;
        let labeled = draw_title(
            &enhanced,
            &subject.title_text(),
            &font,
            &self.config.title_style,
        );

        let logo = self.load_logo()?;
        let finalized = composite_logo(&labeled, &logo, &self.config.logo_spec);

        info!(video_id = %id, subject = %subject, "thumbnail curated");
        Ok(finalized)
    }

    /// Curate and push the result to the platform.
    pub async fn curate_and_set(&self, id: &VideoId, subject: &Subject) -> PipelineResult<()> {
        let thumbnail = self.curate(id, subject).await?;
        let jpeg = encode_jpeg(&thumbnail, self.config.jpeg_quality)?;
        self.platform.set_thumbnail(id, jpeg).await?;
        info!(video_id = %id, "thumbnail published");
        Ok(())
    }
}

/// Encode an image as JPEG bytes.
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> PipelineResult<Vec<u8>> {
    let mut bytes = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut bytes, quality);
    encoder.encode(
        image.as_raw(),
        image.width(),
        image.height(),
        image::ColorType::Rgb8,
    )?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::ports::{PlatformError, VideoUpload};

    /// Platform stub that reports the preview ready after a set number
    /// of polls.
    struct DelayedPlatform {
        polls_until_ready: Mutex<u32>,
        url: String,
    }

    impl DelayedPlatform {
        fn new(polls_until_ready: u32, url: impl Into<String>) -> Arc<Self> {
            Arc::new(Self {
                polls_until_ready: Mutex::new(polls_until_ready),
                url: url.into(),
            })
        }
    }

    #[async_trait]
    impl VideoPlatform for DelayedPlatform {
        async fn publish(&self, _upload: &VideoUpload) -> Result<VideoId, PlatformError> {
            Ok(VideoId::new("vid-1"))
        }

        async fn thumbnail_url(&self, _id: &VideoId) -> Result<Option<String>, PlatformError> {
            let mut remaining = self.polls_until_ready.lock().unwrap();
            if *remaining == 0 {
                Ok(Some(self.url.clone()))
            } else {
                *remaining -= 1;
                Ok(None)
            }
        }

        async fn set_thumbnail(&self, _id: &VideoId, _jpeg: Vec<u8>) -> Result<(), PlatformError> {
            Ok(())
        }

        async fn insert_captions(
            &self,
            _id: &VideoId,
            _script: &str,
            _language: &str,
        ) -> Result<(), PlatformError> {
            Ok(())
        }
    }

    fn fast_config() -> ThumbnailConfig {
        ThumbnailConfig::default()
            .with_poll_interval(Duration::from_millis(1))
            .with_max_poll_attempts(Some(5))
    }

    #[tokio::test]
    async fn test_poll_retries_until_preview_ready() {
        let platform = DelayedPlatform::new(2, "https://example.com/maxres.jpg");
        let curator = ThumbnailCurator::new(platform, fast_config());

        let url = curator.poll_preview(&VideoId::new("vid-1")).await.unwrap();
        assert_eq!(url, "https://example.com/maxres.jpg");
    }

    #[tokio::test]
    async fn test_poll_ceiling_times_out() {
        let platform = DelayedPlatform::new(u32::MAX, "unused");
        let config = fast_config().with_max_poll_attempts(Some(2));
        let curator = ThumbnailCurator::new(platform, config);

        let err = curator
            .poll_preview(&VideoId::new("vid-1"))
            .await
            .unwrap_err();
        match err {
            PipelineError::ThumbnailTimedOut { attempts } => assert_eq!(attempts, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_preview_decodes_served_image() {
        let server = MockServer::start().await;
        let image = image::DynamicImage::new_rgb8(32, 18);
        let mut png = Vec::new();
        image
            .write_to(
                &mut std::io::Cursor::new(&mut png),
                image::ImageOutputFormat::Png,
            )
            .unwrap();
        Mock::given(method("GET"))
            .and(path("/maxres.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(png))
            .mount(&server)
            .await;

        let platform = DelayedPlatform::new(0, format!("{}/maxres.jpg", server.uri()));
        let curator = ThumbnailCurator::new(platform.clone(), fast_config());

        let url = curator.poll_preview(&VideoId::new("vid-1")).await.unwrap();
        let preview = curator.fetch_preview(&url).await.unwrap();
        assert_eq!(preview.dimensions(), (32, 18));
    }

    #[test]
    fn test_encode_jpeg_produces_decodable_bytes() {
        let image = RgbImage::from_pixel(16, 16, image::Rgb([120, 60, 30]));
        let bytes = encode_jpeg(&image, DEFAULT_JPEG_QUALITY).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.width(), 16);
    }
}
