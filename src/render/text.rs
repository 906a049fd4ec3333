use anyhow::Result;
use tiny_skia::{Path, PathBuilder};
use ttf_parser::{GlyphId, OutlineBuilder};

use super::font::{LoadedFont, measure_text_width_px};
use crate::editor::Point;

/// Line advance relative to font size, matching the preview's `line-height: 1.1`.
pub const LINE_HEIGHT: f32 = 1.1;

/// Collects glyph outlines into one path, flipping the font's y-up space.
struct GlyphSink<'a> {
    builder: &'a mut PathBuilder,
    scale: f32,
    origin_x: f32,
    baseline_y: f32,
}

impl GlyphSink<'_> {
    fn map(&self, x: f32, y: f32) -> (f32, f32) {
        (self.origin_x + x * self.scale, self.baseline_y - y * self.scale)
    }
}

impl OutlineBuilder for GlyphSink<'_> {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x, y) = self.map(x, y);
        self.builder.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x2, y2) = self.map(x2, y2);
        let (x, y) = self.map(x, y);
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

/// Outline of `text` laid out with center alignment and a top baseline:
/// `anchor` is the horizontal center of each line and the top of the first
/// line's em box. Lines split on `\n` advance by [`LINE_HEIGHT`].
///
/// Returns `None` when nothing visible would be drawn.
pub fn text_path(
    font: &LoadedFont,
    text: &str,
    font_size: f32,
    anchor: Point,
) -> Result<Option<Path>> {
    if !(font_size.is_finite() && font_size > 0.0) {
        return Ok(None);
    }
    let face = font.face()?;
    let scale = font_size / font.units_per_em() as f32;
    let ascent_px = font.em_box_ascent() * scale;
    let fallback_advance = font.units_per_em() / 2;
    let mut builder = PathBuilder::new();

    for (line_idx, line) in text.split('\n').enumerate() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        let width = measure_text_width_px(font, line, font_size)?;
        let mut pen_x = anchor.x - width / 2.0;
        let baseline_y = anchor.y + line_idx as f32 * font_size * LINE_HEIGHT + ascent_px;
        for ch in line.chars() {
            let glyph = face.glyph_index(ch).unwrap_or(GlyphId(0));
            let mut sink = GlyphSink {
                builder: &mut builder,
                scale,
                origin_x: pen_x,
                baseline_y,
            };
            let _ = face.outline_glyph(glyph, &mut sink);
            let advance = face.glyph_hor_advance(glyph).unwrap_or(fallback_advance);
            pen_x += advance as f32 * scale;
        }
    }

    Ok(builder.finish())
}
