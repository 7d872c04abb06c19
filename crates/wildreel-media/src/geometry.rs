//! Aspect-ratio gated resizing for sourced candidates.
//!
//! A candidate is only force-resized to the target dimensions when the
//! resize would not visibly stretch or squash it, i.e. when the native
//! aspect ratio is already close to the target's.

use image::{imageops::FilterType, DynamicImage};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default target width for accepted candidates.
pub const DEFAULT_TARGET_WIDTH: u32 = 1280;
/// Default target height for accepted candidates.
pub const DEFAULT_TARGET_HEIGHT: u32 = 720;
/// Default maximum allowed aspect-ratio difference before a candidate
/// is rejected. Fairly permissive.
pub const DEFAULT_ASPECT_THRESHOLD: f64 = 0.4;
/// Default resolution floor for sourced video segments.
pub const DEFAULT_MIN_SOURCE_WIDTH: u32 = 640;
pub const DEFAULT_MIN_SOURCE_HEIGHT: u32 = 360;

/// Geometric constraints applied to sourced candidates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeometrySpec {
    /// Width candidates are resized to.
    pub target_width: u32,
    /// Height candidates are resized to.
    pub target_height: u32,
    /// Maximum allowed |native aspect - target aspect|.
    pub aspect_threshold: f64,
    /// Minimum native width for video segments.
    pub min_source_width: u32,
    /// Minimum native height for video segments.
    pub min_source_height: u32,
}

impl Default for GeometrySpec {
    fn default() -> Self {
        Self {
            target_width: DEFAULT_TARGET_WIDTH,
            target_height: DEFAULT_TARGET_HEIGHT,
            aspect_threshold: DEFAULT_ASPECT_THRESHOLD,
            min_source_width: DEFAULT_MIN_SOURCE_WIDTH,
            min_source_height: DEFAULT_MIN_SOURCE_HEIGHT,
        }
    }
}

impl GeometrySpec {
    /// Spec targeting the given dimensions, other fields at defaults.
    pub fn new(target_width: u32, target_height: u32) -> Self {
        Self {
            target_width,
            target_height,
            ..Default::default()
        }
    }

    /// Set the aspect-ratio threshold.
    pub fn with_aspect_threshold(mut self, threshold: f64) -> Self {
        self.aspect_threshold = threshold;
        self
    }

    /// Set the resolution floor for video segments.
    pub fn with_resolution_floor(mut self, min_width: u32, min_height: u32) -> Self {
        self.min_source_width = min_width;
        self.min_source_height = min_height;
        self
    }

    /// Create spec from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            target_width: std::env::var("WILDREEL_TARGET_WIDTH")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.target_width),
            target_height: std::env::var("WILDREEL_TARGET_HEIGHT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.target_height),
            aspect_threshold: std::env::var("WILDREEL_ASPECT_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.aspect_threshold),
            min_source_width: defaults.min_source_width,
            min_source_height: defaults.min_source_height,
        }
    }

    /// Aspect ratio implied by a forced resize to the target dimensions.
    pub fn target_aspect(&self) -> f64 {
        self.target_width as f64 / self.target_height as f64
    }

    /// Whether native dimensions are close enough to the target aspect
    /// for a forced resize to look acceptable.
    pub fn aspect_within_threshold(&self, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 {
            return false;
        }
        let native = width as f64 / height as f64;
        (native - self.target_aspect()).abs() <= self.aspect_threshold
    }
}

/// Resize a candidate to the spec's target dimensions, or reject it.
///
/// Returns `None` when the forced resize would distort the aspect ratio
/// beyond the spec's threshold. The returned image keeps its source
/// color model; conversion to the pipeline's fixed color model happens
/// when the accepted set is finalized.
pub fn fit_to_spec(image: &DynamicImage, spec: &GeometrySpec) -> Option<DynamicImage> {
    let (width, height) = (image.width(), image.height());
    if !spec.aspect_within_threshold(width, height) {
        debug!(
            width,
            height,
            threshold = spec.aspect_threshold,
            "candidate aspect ratio outside threshold"
        );
        return None;
    }
    Some(image.resize_exact(spec.target_width, spec.target_height, FilterType::Lanczos3))
}

/// Resolution floor applied to video segments before the aspect check.
pub fn meets_resolution_floor(width: u32, height: u32, spec: &GeometrySpec) -> bool {
    width >= spec.min_source_width && height >= spec.min_source_height
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::DynamicImage;

    fn blank(width: u32, height: u32) -> DynamicImage {
        DynamicImage::new_rgb8(width, height)
    }

    #[test]
    fn test_identical_aspect_is_accepted() {
        let spec = GeometrySpec::default();
        let image = blank(1920, 1080);
        let fitted = fit_to_spec(&image, &spec).expect("16:9 source should pass");
        assert_eq!(fitted.width(), spec.target_width);
        assert_eq!(fitted.height(), spec.target_height);
    }

    #[test]
    fn test_inverted_dimensions_are_rejected() {
        let spec = GeometrySpec::default();
        // Portrait source against a landscape target: |0.5625 - 1.7778| > 0.4.
        let image = blank(720, 1280);
        assert!(fit_to_spec(&image, &spec).is_none());
    }

    #[test]
    fn test_threshold_is_inclusive() {
        // 4:3 source vs 16:9 target differs by ~0.444.
        let spec = GeometrySpec::default().with_aspect_threshold(0.45);
        assert!(fit_to_spec(&blank(1024, 768), &spec).is_some());

        let spec = GeometrySpec::default().with_aspect_threshold(0.4);
        assert!(fit_to_spec(&blank(1024, 768), &spec).is_none());
    }

    #[test]
    fn test_resolution_floor() {
        let spec = GeometrySpec::default();
        assert!(meets_resolution_floor(1280, 720, &spec));
        assert!(!meets_resolution_floor(320, 240, &spec));
        assert!(!meets_resolution_floor(1280, 240, &spec));
    }
}
