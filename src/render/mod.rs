//! Rasterization of a template image plus text overlays at the image's
//! natural resolution, and JPEG serialization of the result.

mod font;
mod text;

use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;
use tiny_skia::{Color, FillRule, IntSize, LineJoin, Paint, Pixmap, Stroke, Transform};

use crate::editor::geometry::anchor_px;
use crate::editor::{FontFamily, FontWeight, ImageSize, Point, Rgb, Size, TextOverlay};

#[cfg(test)]
pub(crate) use font::test_font_book;
pub use font::{FontBook, LoadedFont, measure_text_width_px};
pub use text::{LINE_HEIGHT, text_path};

pub const JPEG_MIME: &str = "image/jpeg";
pub const DEFAULT_JPEG_QUALITY: u8 = 95;
/// Miter limit applied to text outlines; joins are round so this only caps
/// degenerate cases.
pub const STROKE_MITER_LIMIT: f32 = 2.0;

/// One overlay mapped into natural image pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedText {
    pub text: String,
    pub anchor: Point,
    pub font_size: f32,
    /// Full outline width; twice the overlay's stroke width since half of a
    /// centered stroke is hidden under the fill.
    pub line_width: f32,
    pub fill: Rgb,
    pub stroke: Option<Rgb>,
    pub family: FontFamily,
    pub weight: FontWeight,
}

/// Maps an overlay from the displayed container into natural pixel space.
///
/// Position is resolved against the displayed container and then multiplied
/// by `scale`, as are font size and stroke width.
pub fn place_overlay(overlay: &TextOverlay, displayed: Size, scale: f32) -> PlacedText {
    let anchor = anchor_px(overlay.x, overlay.y, displayed);
    PlacedText {
        text: overlay.text.clone(),
        anchor: Point::new(anchor.x * scale, anchor.y * scale),
        font_size: overlay.font_size * scale,
        line_width: overlay.stroke_width * 2.0 * scale,
        fill: overlay.color,
        stroke: overlay.has_stroke().then_some(overlay.stroke_color),
        family: overlay.font_family,
        weight: overlay.font_weight,
    }
}

/// Copies a decoded image into a premultiplied surface of the same size.
pub fn image_to_pixmap(image: &DynamicImage) -> Result<Pixmap> {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let size = IntSize::from_wh(width, height)
        .ok_or_else(|| anyhow!("image has an empty size ({}x{})", width, height))?;
    let mut data = rgba.into_raw();
    for px in data.chunks_exact_mut(4) {
        let alpha = px[3] as u16;
        if alpha < 255 {
            for channel in &mut px[..3] {
                *channel = ((*channel as u16 * alpha + 127) / 255) as u8;
            }
        }
    }
    Pixmap::from_vec(data, size)
        .ok_or_else(|| anyhow!("failed to allocate {}x{} surface", width, height))
}

fn paint_for(color: Rgb) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(Color::from_rgba8(color.r, color.g, color.b, 255));
    paint.anti_alias = true;
    paint
}

/// Draws one placed overlay: outline first, then the fill on top of it.
pub fn draw_text(pixmap: &mut Pixmap, placed: &PlacedText, fonts: &FontBook) -> Result<()> {
    if placed.text.trim().is_empty() {
        return Ok(());
    }
    let font = fonts
        .resolve(placed.family, placed.weight)
        .with_context(|| format!("failed to resolve font '{}'", placed.family.label()))?;
    let Some(path) = text_path(&font, &placed.text, placed.font_size, placed.anchor)? else {
        return Ok(());
    };
    if let Some(stroke_color) = placed.stroke {
        if placed.line_width > 0.0 {
            let stroke = Stroke {
                width: placed.line_width,
                line_join: LineJoin::Round,
                miter_limit: STROKE_MITER_LIMIT,
                ..Stroke::default()
            };
            pixmap.stroke_path(
                &path,
                &paint_for(stroke_color),
                &stroke,
                Transform::identity(),
                None,
            );
        }
    }
    pixmap.fill_path(
        &path,
        &paint_for(placed.fill),
        FillRule::Winding,
        Transform::identity(),
        None,
    );
    Ok(())
}

/// Composites `overlays`, in order, over `image` at the image's natural size.
///
/// `displayed` is the on-screen container size the overlays were laid out in.
pub fn rasterize(
    image: &DynamicImage,
    overlays: &[TextOverlay],
    displayed: Size,
    fonts: &FontBook,
) -> Result<Pixmap> {
    if !displayed.is_drawable() {
        return Err(anyhow!(
            "displayed container size must be positive, got {}x{}",
            displayed.width,
            displayed.height
        ));
    }
    let mut pixmap = image_to_pixmap(image)?;
    let scale = crate::editor::export_scale(pixmap.width(), displayed.width)?;
    for overlay in overlays {
        let placed = place_overlay(overlay, displayed, scale);
        draw_text(&mut pixmap, &placed, fonts)?;
    }
    Ok(pixmap)
}

/// Encodes the surface as baseline JPEG. Transparent regions come out black,
/// as premultiplied color over black.
pub fn encode_jpeg(pixmap: &Pixmap, quality: u8) -> Result<Vec<u8>> {
    let quality = quality.clamp(1, 100);
    let mut rgb = Vec::with_capacity(pixmap.width() as usize * pixmap.height() as usize * 3);
    for px in pixmap.data().chunks_exact(4) {
        rgb.extend_from_slice(&px[..3]);
    }
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality)
        .encode(
            &rgb,
            pixmap.width(),
            pixmap.height(),
            image::ExtendedColorType::Rgb8,
        )
        .with_context(|| "failed to encode JPEG")?;
    Ok(bytes)
}

pub fn jpeg_data_url(bytes: &[u8]) -> String {
    format!("data:{};base64,{}", JPEG_MIME, BASE64.encode(bytes))
}

pub fn pixmap_size(pixmap: &Pixmap) -> ImageSize {
    ImageSize::new(pixmap.width(), pixmap.height())
}
