//! Thumbnail overlay compositing: title text and logo placement.

use image::{imageops, imageops::FilterType, DynamicImage, Rgb, RgbImage, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use rusttype::{Font, Scale};

/// Largest font size the title search starts from.
pub const DEFAULT_MAX_FONT_SIZE: f32 = 150.0;
/// Widest a rendered title may be, in pixels.
pub const DEFAULT_MAX_TEXT_WIDTH: i32 = 850;
/// Nominal title position.
pub const DEFAULT_TITLE_ORIGIN: (i32, i32) = (30, 15);
/// Shadow displacement relative to the nominal position.
pub const DEFAULT_SHADOW_OFFSET: (i32, i32) = (10, 10);
/// Edge length the logo is resized to.
pub const DEFAULT_LOGO_SIZE: u32 = 150;
/// Margin between the logo and the thumbnail's bottom-left corner.
pub const DEFAULT_LOGO_MARGIN: u32 = 25;

/// Title rendering parameters.
#[derive(Debug, Clone)]
pub struct TitleStyle {
    pub max_font_size: f32,
    pub max_text_width: i32,
    pub origin: (i32, i32),
    pub shadow_offset: (i32, i32),
}

impl Default for TitleStyle {
    fn default() -> Self {
        Self {
            max_font_size: DEFAULT_MAX_FONT_SIZE,
            max_text_width: DEFAULT_MAX_TEXT_WIDTH,
            origin: DEFAULT_TITLE_ORIGIN,
            shadow_offset: DEFAULT_SHADOW_OFFSET,
        }
    }
}

impl TitleStyle {
    /// Set the maximum rendered width.
    pub fn with_max_text_width(mut self, width: i32) -> Self {
        self.max_text_width = width;
        self
    }

    /// Set the starting font size for the descending fit search.
    pub fn with_max_font_size(mut self, size: f32) -> Self {
        self.max_font_size = size;
        self
    }
}

/// Logo placement parameters.
#[derive(Debug, Clone)]
pub struct LogoSpec {
    pub size: u32,
    pub margin: u32,
}

impl Default for LogoSpec {
    fn default() -> Self {
        Self {
            size: DEFAULT_LOGO_SIZE,
            margin: DEFAULT_LOGO_MARGIN,
        }
    }
}

/// Find the largest font size at or below the style's maximum whose
/// rendered width fits `max_text_width`.
///
/// The search decrements one point at a time, so the result never
/// overflows regardless of how long the text is.
pub fn fitted_font_scale(font: &Font<'_>, text: &str, style: &TitleStyle) -> Scale {
    let mut size = style.max_font_size;
    while size > 1.0 {
        let (width, _) = text_size(Scale::uniform(size), font, text);
        if width <= style.max_text_width {
            break;
        }
        size -= 1.0;
    }
    Scale::uniform(size.max(1.0))
}

/// Render the title twice, black offset then white at the nominal
/// position, producing a drop-shadow effect.
pub fn draw_title(image: &RgbImage, text: &str, font: &Font<'_>, style: &TitleStyle) -> RgbImage {
    let mut out = image.clone();
    let scale = fitted_font_scale(font, text, style);
    let (x, y) = style.origin;
    let (dx, dy) = style.shadow_offset;
    draw_text_mut(&mut out, Rgb([0u8, 0, 0]), x + dx, y + dy, scale, font, text);
    draw_text_mut(&mut out, Rgb([255u8, 255, 255]), x, y, scale, font, text);
    out
}

/// Where the logo's top-left corner lands on a thumbnail of the given
/// height, anchored to the bottom-left corner.
pub fn logo_position(image_height: u32, logo_height: u32, margin: u32) -> (i64, i64) {
    let y = image_height as i64 - logo_height as i64 - margin as i64;
    (margin as i64, y.max(0))
}

/// Alpha-composite the logo onto the thumbnail.
pub fn composite_logo(image: &RgbImage, logo: &RgbaImage, spec: &LogoSpec) -> RgbImage {
    let logo = imageops::resize(logo, spec.size, spec.size, FilterType::Lanczos3);
    let (x, y) = logo_position(image.height(), logo.height(), spec.margin);
    let mut canvas = DynamicImage::ImageRgb8(image.clone()).to_rgba8();
    imageops::overlay(&mut canvas, &logo, x, y);
    DynamicImage::ImageRgba8(canvas).to_rgb8()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    /// Load a font for rendering tests, if one is present on the host.
    fn test_font() -> Option<Font<'static>> {
        let candidates = [
            std::env::var("WILDREEL_FONT").unwrap_or_default(),
            "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf".to_string(),
            "/usr/share/fonts/TTF/DejaVuSans.ttf".to_string(),
        ];
        for path in candidates.iter().filter(|p| !p.is_empty()) {
            if let Ok(bytes) = std::fs::read(path) {
                if let Some(font) = Font::try_from_vec(bytes) {
                    return Some(font);
                }
            }
        }
        None
    }

    #[test]
    fn test_logo_position_anchors_bottom_left() {
        assert_eq!(logo_position(720, 150, 25), (25, 545));
    }

    #[test]
    fn test_logo_position_clamps_small_canvas() {
        let (_, y) = logo_position(100, 150, 25);
        assert_eq!(y, 0);
    }

    #[test]
    fn test_composite_logo_paints_corner() {
        let image = RgbImage::from_pixel(640, 360, Rgb([0, 0, 0]));
        let logo = RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255]));
        let spec = LogoSpec {
            size: 50,
            margin: 25,
        };
        let out = composite_logo(&image, &logo, &spec);
        // Center of the logo area is solid red; far corner untouched.
        assert_eq!(out.get_pixel(50, 310), &Rgb([255, 0, 0]));
        assert_eq!(out.get_pixel(639, 0), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_fitted_font_scale_shrinks_long_text() {
        let Some(font) = test_font() else {
            return;
        };
        let style = TitleStyle::default();
        let short = fitted_font_scale(&font, "LION", &style);
        let long = fitted_font_scale(&font, "GIANT GALAPAGOS TORTOISE", &style);
        assert!(long.x < short.x);

        let (width, _) = text_size(long, &font, "GIANT GALAPAGOS TORTOISE");
        assert!(width <= style.max_text_width);
    }

    #[test]
    fn test_draw_title_changes_pixels() {
        let Some(font) = test_font() else {
            return;
        };
        let image = RgbImage::from_pixel(1280, 720, Rgb([40, 40, 40]));
        let labeled = draw_title(&image, "LION", &font, &TitleStyle::default());
        assert_ne!(image.as_raw(), labeled.as_raw());
    }
}
