// THEORY:
// The annotated image carries its own result: the percentage is stamped near
// the top-left corner on an opaque box, so it stays legible over bright leaves
// and dark soil alike. The font scale shrinks as the text grows so labels of
// any length stay in the same corner.
//
// Text is rasterized from an embedded TrueType font (DejaVu Sans), so any
// label renders, not just digits. The box is sized from the measured text
// extent and reaches from `padding` above the tallest glyph to `padding`
// below the baseline.

use crate::config::AnnotationConfig;
use crate::error::{CoverageError, Result};
use ab_glyph::{Font, FontRef, PxScale, ScaleFont};
use image::RgbImage;
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

static LABEL_FONT: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");

fn label_font() -> Result<FontRef<'static>> {
    FontRef::try_from_slice(LABEL_FONT)
        .map_err(|e| CoverageError::Internal(format!("label font: {}", e)))
}

/// Pixel geometry of a label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextLayout {
    pub scale: PxScale,
    pub width: u32,
    pub height: u32,
    /// Distance from the top of the line to the baseline.
    pub ascent: f32,
}

pub fn layout(text: &str, font: &impl Font, config: &AnnotationConfig) -> TextLayout {
    let length = text.chars().count().max(1) as f32;
    let font_scale = config.scale_numerator / length;
    let scale = PxScale::from(config.base_font_px * font_scale);
    let (width, height) = text_size(scale, font, text);

    TextLayout {
        scale,
        width,
        height,
        ascent: font.as_scaled(scale).ascent(),
    }
}

/// Returns a copy of `image` with `text` stamped on an opaque box.
pub fn annotate(image: &RgbImage, text: &str, config: &AnnotationConfig) -> Result<RgbImage> {
    let mut canvas = image.clone();
    if text.is_empty() {
        return Ok(canvas);
    }

    let font = label_font()?;
    let TextLayout {
        scale,
        width,
        height,
        ascent,
    } = layout(text, &font, config);
    let origin_x = config.origin_x as i32;
    let baseline = config.origin_y as i32;
    let padding = config.padding as i32;

    draw_filled_rect_mut(
        &mut canvas,
        Rect::at(origin_x, baseline - height as i32 - padding)
            .of_size(width + 1, height + 2 * config.padding + 1),
        config.background_rgb(),
    );
    draw_text_mut(
        &mut canvas,
        config.text_rgb(),
        origin_x,
        baseline - ascent.round() as i32,
        scale,
        &font,
        text,
    );

    Ok(canvas)
}
