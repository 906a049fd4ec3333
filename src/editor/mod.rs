//! Editor surface model: overlays, their coordinate space and the pointer /
//! inline-edit state machine that mutates them.

pub mod color;
pub mod fonts;
pub mod geometry;
mod overlay;
mod session;

pub use color::Rgb;
pub use fonts::{FontFamily, FontWeight};
pub use geometry::{ContainerRect, ImageSize, Point, Size, export_scale};
pub use overlay::{
    DEFAULT_FONT_SIZE, DEFAULT_STROKE_WIDTH, DEFAULT_TEXT, FONT_SIZE_RANGE, OverlayId,
    OverlayPatch, STROKE_WIDTH_RANGE, TextOverlay,
};
pub use session::{DragState, EditKey, EditorSession, KeyOutcome};
