//! Thumbnail enhancement: contrast and sharpness normalization.
//!
//! Each stage is a pure function returning a new image, so the curation
//! pipeline composes them in a fixed order without hidden aliasing.
//! Normalization is ratio-based: `factor = desired / current`, so a
//! second application at the same target is a near-identity.

use image::RgbImage;
use tracing::debug;

/// Pixel-intensity standard deviation the curated thumbnail is scaled to.
pub const TARGET_CONTRAST_STDDEV: f64 = 60.0;
/// Pixel-intensity variance the curated thumbnail is scaled to after the
/// detail filter.
pub const TARGET_SHARPNESS_VARIANCE: f64 = 4000.0;

/// Below this, an image is treated as degenerate (flat) and ratio
/// correction becomes a no-op instead of a division by zero.
const DEGENERATE_EPS: f64 = 1e-6;

/// 3x3 smoothing kernel used as the low-sharpness reference.
const SMOOTH_KERNEL: [f32; 9] = [
    1.0 / 13.0,
    1.0 / 13.0,
    1.0 / 13.0,
    1.0 / 13.0,
    5.0 / 13.0,
    1.0 / 13.0,
    1.0 / 13.0,
    1.0 / 13.0,
    1.0 / 13.0,
];

/// 3x3 detail-enhancement kernel applied before sharpness measurement.
const DETAIL_KERNEL: [f32; 9] = [
    0.0,
    -1.0 / 6.0,
    0.0,
    -1.0 / 6.0,
    10.0 / 6.0,
    -1.0 / 6.0,
    0.0,
    -1.0 / 6.0,
    0.0,
];

/// Mean over all channel samples.
pub fn pixel_mean(image: &RgbImage) -> f64 {
    let raw = image.as_raw();
    if raw.is_empty() {
        return 0.0;
    }
    raw.iter().map(|&v| v as f64).sum::<f64>() / raw.len() as f64
}

/// Standard deviation over all channel samples.
pub fn pixel_stddev(image: &RgbImage) -> f64 {
    pixel_variance(image).sqrt()
}

/// Variance over all channel samples.
pub fn pixel_variance(image: &RgbImage) -> f64 {
    let raw = image.as_raw();
    if raw.is_empty() {
        return 0.0;
    }
    let mean = pixel_mean(image);
    raw.iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / raw.len() as f64
}

/// Mean luminance (ITU-R 601-2), rounded to the nearest integer level.
fn mean_luminance(image: &RgbImage) -> f64 {
    let mut sum = 0.0;
    for pixel in image.pixels() {
        sum += 0.299 * pixel[0] as f64 + 0.587 * pixel[1] as f64 + 0.114 * pixel[2] as f64;
    }
    let count = (image.width() as u64 * image.height() as u64).max(1);
    (sum / count as f64).round()
}

/// Interpolate each sample between a reference value and the input.
///
/// `factor` 0.0 yields the reference, 1.0 the input; values above 1.0
/// extrapolate past the input.
fn interpolate(reference: f64, value: f64, factor: f64) -> u8 {
    (reference + (value - reference) * factor).round().clamp(0.0, 255.0) as u8
}

/// Scale contrast about the mean luminance.
pub fn enhance_contrast(image: &RgbImage, factor: f64) -> RgbImage {
    let mean = mean_luminance(image);
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        for channel in pixel.0.iter_mut() {
            *channel = interpolate(mean, *channel as f64, factor);
        }
    }
    out
}

/// Scale sharpness by interpolating between a smoothed copy and the input.
pub fn enhance_sharpness(image: &RgbImage, factor: f64) -> RgbImage {
    let smoothed = image::imageops::filter3x3(image, &SMOOTH_KERNEL);
    let mut out = image.clone();
    for (pixel, soft) in out.pixels_mut().zip(smoothed.pixels()) {
        for (channel, &reference) in pixel.0.iter_mut().zip(soft.0.iter()) {
            *channel = interpolate(reference as f64, *channel as f64, factor);
        }
    }
    out
}

/// Detail-enhancement convolution.
pub fn detail_filter(image: &RgbImage) -> RgbImage {
    image::imageops::filter3x3(image, &DETAIL_KERNEL)
}

/// Scale the image so its pixel-intensity standard deviation matches
/// `target_stddev`. A flat image is returned unchanged.
pub fn normalize_contrast(image: &RgbImage, target_stddev: f64) -> RgbImage {
    let current = pixel_stddev(image);
    if current < DEGENERATE_EPS {
        debug!("flat image, skipping contrast normalization");
        return image.clone();
    }
    enhance_contrast(image, target_stddev / current)
}

/// Apply the detail filter, then scale sharpness so the pixel-intensity
/// variance matches `target_variance`. A flat image passes through the
/// detail filter unscaled.
pub fn normalize_sharpness(image: &RgbImage, target_variance: f64) -> RgbImage {
    let detailed = detail_filter(image);
    let current = pixel_variance(&detailed);
    if current < DEGENERATE_EPS {
        debug!("flat image, skipping sharpness normalization");
        return detailed;
    }
    enhance_sharpness(&detailed, target_variance / current)
}
