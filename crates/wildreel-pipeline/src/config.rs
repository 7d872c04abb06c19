//! Pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

use wildreel_media::assemble::RenderSettings;
use wildreel_media::geometry::GeometrySpec;
use wildreel_models::policy::DEFAULT_COOLDOWN;
use wildreel_models::{NarrationSpan, QuotaPolicy, SourcingPolicy};

use crate::thumbnail::ThumbnailConfig;

/// Default root for per-subject working directories.
pub const DEFAULT_WORK_ROOT: &str = "videos";
/// Default transition length at interior timeline boundaries.
pub const DEFAULT_CROSSFADE_SECS: f64 = 1.0;
/// Default maximum length a sourced video segment is trimmed to.
pub const DEFAULT_MAX_SEGMENT_SECS: f64 = 10.0;
/// Default caption language tag.
pub const DEFAULT_CAPTION_LANGUAGE: &str = "en-GB";

/// Configuration for one production pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root directory; each subject gets a working directory under it.
    pub work_root: PathBuf,
    pub sourcing: SourcingPolicy,
    pub geometry: GeometrySpec,
    pub thumbnail: ThumbnailConfig,
    pub render: RenderSettings,
    pub crossfade_secs: f64,
    pub narration_span: NarrationSpan,
    pub max_segment_secs: f64,
    pub caption_language: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            work_root: PathBuf::from(DEFAULT_WORK_ROOT),
            sourcing: SourcingPolicy::default(),
            geometry: GeometrySpec::default(),
            thumbnail: ThumbnailConfig::default(),
            render: RenderSettings::default(),
            crossfade_secs: DEFAULT_CROSSFADE_SECS,
            narration_span: NarrationSpan::default(),
            max_segment_secs: DEFAULT_MAX_SEGMENT_SECS,
            caption_language: DEFAULT_CAPTION_LANGUAGE.to_string(),
        }
    }
}

impl PipelineConfig {
    /// Create configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let target_count = std::env::var("WILDREEL_TARGET_COUNT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.sourcing.target_count);
        let min_fraction = std::env::var("WILDREEL_MIN_FRACTION")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.sourcing.min_fraction);
        let quota_policy = match std::env::var("WILDREEL_QUOTA_POLICY").as_deref() {
            Ok("cooldown") => QuotaPolicy::CooldownResume {
                cooldown: Duration::from_secs(
                    std::env::var("WILDREEL_COOLDOWN_SECS")
                        .ok()
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(DEFAULT_COOLDOWN.as_secs()),
                ),
            },
            _ => QuotaPolicy::Abort,
        };
        let sourcing = SourcingPolicy::with_target(target_count)
            .with_min_fraction(min_fraction)
            .with_quota_policy(quota_policy);

        let narration_span = match std::env::var("WILDREEL_NARRATION_SPAN").as_deref() {
            Ok("main_only") => NarrationSpan::MainOnly,
            _ => defaults.narration_span,
        };

        Self {
            work_root: std::env::var("WILDREEL_WORK_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_root),
            sourcing,
            geometry: GeometrySpec::from_env(),
            thumbnail: ThumbnailConfig::from_env(),
            render: RenderSettings::from_env(),
            crossfade_secs: std::env::var("WILDREEL_CROSSFADE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.crossfade_secs),
            narration_span,
            max_segment_secs: std::env::var("WILDREEL_MAX_SEGMENT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_segment_secs),
            caption_language: std::env::var("WILDREEL_CAPTION_LANG")
                .unwrap_or(defaults.caption_language),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.work_root, PathBuf::from("videos"));
        assert_eq!(config.crossfade_secs, 1.0);
        assert_eq!(config.narration_span, NarrationSpan::FullTimeline);
        assert_eq!(config.caption_language, "en-GB");
        config.sourcing.validate().unwrap();
    }
}
