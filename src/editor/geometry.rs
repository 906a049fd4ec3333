//! Conversions between the three coordinate spaces of the editor:
//! percentages of the container frame, CSS pixels of the displayed
//! container, and natural pixels of the template image.

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

/// Aspect ratio used before the template image has loaded.
pub const FALLBACK_ASPECT: (u32, u32) = (4, 3);

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn is_drawable(self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// Intrinsic pixel dimensions of a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// The container's bounding box in client (viewport) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ContainerRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl ContainerRect {
    pub const fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Client-space pointer to container-local pixels.
    pub fn to_local(&self, client: Point) -> Point {
        Point::new(client.x - self.left, client.y - self.top)
    }
}

/// Width over height of the container frame. Falls back to 4:3 until the
/// natural size is known or when it is degenerate.
pub fn frame_aspect_ratio(natural: Option<ImageSize>) -> f32 {
    match natural {
        Some(size) if size.width > 0 && size.height > 0 => size.width as f32 / size.height as f32,
        _ => FALLBACK_ASPECT.0 as f32 / FALLBACK_ASPECT.1 as f32,
    }
}

/// CSS `aspect-ratio` value for the container frame.
pub fn frame_aspect_css(natural: Option<ImageSize>) -> String {
    match natural {
        Some(size) if size.width > 0 && size.height > 0 => {
            format!("{}/{}", size.width, size.height)
        }
        _ => format!("{}/{}", FALLBACK_ASPECT.0, FALLBACK_ASPECT.1),
    }
}

pub fn percent_to_px(percent: f32, extent: f32) -> f32 {
    percent / 100.0 * extent
}

/// Zero or negative extents map everything to 0%.
pub fn px_to_percent(px: f32, extent: f32) -> f32 {
    if extent > 0.0 { px / extent * 100.0 } else { 0.0 }
}

/// Clamps into `[0, 100]`; NaN collapses to 0.
pub fn clamp_percent(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

/// Pixel anchor of a percent position inside a container of `size`.
pub fn anchor_px(x_percent: f32, y_percent: f32, size: Size) -> Point {
    Point::new(
        percent_to_px(x_percent, size.width),
        percent_to_px(y_percent, size.height),
    )
}

/// Ratio of natural image width to displayed container width.
///
/// One factor is reused for both axes, font size and stroke width so that
/// exported text keeps the proportions seen in the preview.
pub fn export_scale(natural_width: u32, displayed_width: f32) -> Result<f32> {
    if !displayed_width.is_finite() || displayed_width <= 0.0 {
        return Err(anyhow!(
            "displayed container width must be positive, got {}",
            displayed_width
        ));
    }
    if natural_width == 0 {
        return Err(anyhow!("image has no width"));
    }
    Ok(natural_width as f32 / displayed_width)
}
