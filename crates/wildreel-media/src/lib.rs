//! Image operations and FFmpeg CLI wrapper for the WildReel pipeline.
//!
//! This crate provides:
//! - Aspect-ratio gated resizing for sourced candidates
//! - Contrast/sharpness normalization and overlay compositing for
//!   thumbnail curation
//! - Type-safe FFmpeg command building with timeout and cancellation
//! - Slideshow assembly (accepted frames + narration audio -> one clip)
//! - Media probing and video-segment trimming

pub mod assemble;
pub mod enhance;
pub mod error;
pub mod ffmpeg;
pub mod geometry;
pub mod overlay;
pub mod probe;
pub mod segments;

pub use assemble::{assemble_slideshow, AssembleRequest, RenderSettings};
pub use enhance::{
    normalize_contrast, normalize_sharpness, TARGET_CONTRAST_STDDEV, TARGET_SHARPNESS_VARIANCE,
};
pub use error::{MediaError, MediaResult};
pub use ffmpeg::{FfmpegJob, FfmpegRunner};
pub use geometry::{fit_to_spec, meets_resolution_floor, GeometrySpec};
pub use overlay::{composite_logo, draw_title, fitted_font_scale, LogoSpec, TitleStyle};
pub use probe::{probe_media, MediaInfo};
pub use segments::{extract_first_frame, trim_segment};
