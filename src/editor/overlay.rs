use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

use super::color::Rgb;
use super::fonts::{FontFamily, FontWeight};
use super::geometry::clamp_percent;

pub const DEFAULT_TEXT: &str = "Text goes here...";
pub const DEFAULT_FONT_SIZE: f32 = 32.0;
pub const DEFAULT_STROKE_WIDTH: f32 = 2.0;
pub const FONT_SIZE_RANGE: RangeInclusive<f32> = 12.0..=80.0;
pub const STROKE_WIDTH_RANGE: RangeInclusive<f32> = 0.0..=8.0;
const STROKE_WIDTH_STEP: f32 = 0.5;

/// Session-scoped overlay identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OverlayId(pub(crate) u64);

impl fmt::Display for OverlayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "overlay-{}", self.0)
    }
}

/// A positioned, styled text block drawn over the template image.
///
/// `x`/`y` are percentages of the container frame and anchor the
/// horizontal center and top edge of the text. `font_size` and
/// `stroke_width` are CSS pixels of the displayed container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextOverlay {
    pub id: OverlayId,
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub font_size: f32,
    pub color: Rgb,
    pub stroke_color: Rgb,
    pub stroke_width: f32,
    pub font_weight: FontWeight,
    pub font_family: FontFamily,
}

impl TextOverlay {
    pub fn new(id: OverlayId, x: f32, y: f32) -> Self {
        Self {
            id,
            text: DEFAULT_TEXT.to_string(),
            x: clamp_percent(x),
            y: clamp_percent(y),
            font_size: DEFAULT_FONT_SIZE,
            color: Rgb::WHITE,
            stroke_color: Rgb::BLACK,
            stroke_width: DEFAULT_STROKE_WIDTH,
            font_weight: FontWeight::Bold,
            font_family: FontFamily::SystemDefault,
        }
    }

    pub fn has_stroke(&self) -> bool {
        self.stroke_width > 0.0
    }

    /// Applies the fields present in `patch`, normalizing them into the
    /// ranges the property panel offers.
    pub fn apply(&mut self, patch: OverlayPatch) {
        let OverlayPatch {
            text,
            x,
            y,
            font_size,
            color,
            stroke_color,
            stroke_width,
            font_weight,
            font_family,
        } = patch;
        if let Some(text) = text {
            self.text = text;
        }
        if let Some(x) = x {
            self.x = clamp_percent(x);
        }
        if let Some(y) = y {
            self.y = clamp_percent(y);
        }
        if let Some(size) = font_size {
            self.font_size = normalize_font_size(size);
        }
        if let Some(color) = color {
            self.color = color;
        }
        if let Some(color) = stroke_color {
            self.stroke_color = color;
        }
        if let Some(width) = stroke_width {
            self.stroke_width = normalize_stroke_width(width);
        }
        if let Some(weight) = font_weight {
            self.font_weight = weight;
        }
        if let Some(family) = font_family {
            self.font_family = family;
        }
    }
}

/// Partial update of an overlay; also the on-disk shape of overlay drafts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OverlayPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Rgb>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke_color: Option<Rgb>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_weight: Option<FontWeight>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_family: Option<FontFamily>,
}

impl OverlayPatch {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn position(x: f32, y: f32) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }
}

fn normalize_font_size(size: f32) -> f32 {
    if !size.is_finite() {
        return DEFAULT_FONT_SIZE;
    }
    size.round().clamp(*FONT_SIZE_RANGE.start(), *FONT_SIZE_RANGE.end())
}

fn normalize_stroke_width(width: f32) -> f32 {
    if !width.is_finite() {
        return 0.0;
    }
    let snapped = (width / STROKE_WIDTH_STEP).round() * STROKE_WIDTH_STEP;
    snapped.clamp(*STROKE_WIDTH_RANGE.start(), *STROKE_WIDTH_RANGE.end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_overlay_uses_editor_defaults() {
        let overlay = TextOverlay::new(OverlayId(1), 50.0, 10.0);
        assert_eq!(overlay.text, "Text goes here...");
        assert_eq!(overlay.font_size, 32.0);
        assert_eq!(overlay.color, Rgb::WHITE);
        assert_eq!(overlay.stroke_color, Rgb::BLACK);
        assert_eq!(overlay.stroke_width, 2.0);
        assert_eq!(overlay.font_weight, FontWeight::Bold);
        assert_eq!(overlay.font_family, FontFamily::SystemDefault);
    }

    #[test]
    fn patch_values_are_normalized() {
        let mut overlay = TextOverlay::new(OverlayId(1), 50.0, 50.0);
        overlay.apply(OverlayPatch {
            x: Some(-20.0),
            y: Some(250.0),
            font_size: Some(200.0),
            stroke_width: Some(1.3),
            ..OverlayPatch::default()
        });
        assert_eq!((overlay.x, overlay.y), (0.0, 100.0));
        assert_eq!(overlay.font_size, 80.0);
        assert_eq!(overlay.stroke_width, 1.5);

        overlay.apply(OverlayPatch {
            font_size: Some(3.0),
            stroke_width: Some(-1.0),
            ..OverlayPatch::default()
        });
        assert_eq!(overlay.font_size, 12.0);
        assert_eq!(overlay.stroke_width, 0.0);
        assert!(!overlay.has_stroke());
    }

    #[test]
    fn patch_deserializes_from_camel_case_json() {
        let patch: OverlayPatch = serde_json::from_str(
            r##"{"text": "top", "fontSize": 40, "strokeColor": "#ff0000", "fontWeight": "normal", "fontFamily": "impact"}"##,
        )
        .expect("patch");
        assert_eq!(patch.text.as_deref(), Some("top"));
        assert_eq!(patch.font_size, Some(40.0));
        assert_eq!(patch.stroke_color, Some(Rgb::new(0xff, 0, 0)));
        assert_eq!(patch.font_weight, Some(FontWeight::Normal));
        assert_eq!(patch.font_family, Some(FontFamily::Impact));
        assert!(patch.x.is_none());
    }
}
