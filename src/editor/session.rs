use tracing::debug;

use super::geometry::{
    self, ContainerRect, ImageSize, Point, anchor_px, clamp_percent, px_to_percent,
};
use super::overlay::{OverlayId, OverlayPatch, TextOverlay};

/// Positions of the overlays a fresh session starts with.
pub const SEED_POSITIONS: [(f32, f32); 2] = [(50.0, 10.0), (50.0, 85.0)];
/// Where "add text" places a new overlay.
pub const NEW_OVERLAY_POSITION: (f32, f32) = (50.0, 50.0);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragState {
    pub overlay: OverlayId,
    /// Pointer position minus the overlay anchor, in container pixels.
    pub offset: Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKey {
    Enter,
    Escape,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Edit mode was left; the key's default action must be suppressed.
    ExitEdit,
    /// Edit mode was left; the key's default action may proceed.
    ExitEditPassThrough,
    /// Nothing happened; the text field handles the key (Shift+Enter adds a line).
    PassThrough,
}

/// Interaction state of one editor surface.
///
/// Selection, editing and dragging are single slots, so at most one overlay
/// can be dragged and at most one edited at any time.
#[derive(Debug, Clone)]
pub struct EditorSession {
    overlays: Vec<TextOverlay>,
    selected: Option<OverlayId>,
    editing: Option<OverlayId>,
    dragging: Option<DragState>,
    // set when a drag ends so the click that follows does not deselect
    swallow_click: bool,
    natural_size: Option<ImageSize>,
    next_id: u64,
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorSession {
    /// A session seeded with a top and a bottom overlay.
    pub fn new() -> Self {
        let mut session = Self::empty();
        for (x, y) in SEED_POSITIONS {
            session.push_overlay(x, y);
        }
        session
    }

    pub fn empty() -> Self {
        Self {
            overlays: Vec::new(),
            selected: None,
            editing: None,
            dragging: None,
            swallow_click: false,
            natural_size: None,
            next_id: 1,
        }
    }

    /// Builds a session from overlay drafts, in order, without selecting any.
    pub fn from_drafts(drafts: impl IntoIterator<Item = OverlayPatch>) -> Self {
        let mut session = Self::empty();
        for draft in drafts {
            session.insert_overlay(draft);
        }
        session
    }

    pub fn overlays(&self) -> &[TextOverlay] {
        &self.overlays
    }

    pub fn overlay(&self, id: OverlayId) -> Option<&TextOverlay> {
        self.overlays.iter().find(|overlay| overlay.id == id)
    }

    fn overlay_mut(&mut self, id: OverlayId) -> Option<&mut TextOverlay> {
        self.overlays.iter_mut().find(|overlay| overlay.id == id)
    }

    pub fn selected(&self) -> Option<OverlayId> {
        self.selected
    }

    pub fn selected_overlay(&self) -> Option<&TextOverlay> {
        self.selected.and_then(|id| self.overlay(id))
    }

    pub fn editing(&self) -> Option<OverlayId> {
        self.editing
    }

    pub fn dragging(&self) -> Option<DragState> {
        self.dragging
    }

    pub fn natural_size(&self) -> Option<ImageSize> {
        self.natural_size
    }

    /// Records the loaded image's natural size, which fixes the frame's aspect ratio.
    pub fn set_natural_size(&mut self, size: ImageSize) {
        self.natural_size = Some(size);
    }

    pub fn frame_aspect_ratio(&self) -> f32 {
        geometry::frame_aspect_ratio(self.natural_size)
    }

    pub fn frame_aspect_css(&self) -> String {
        geometry::frame_aspect_css(self.natural_size)
    }

    fn allocate_id(&mut self) -> OverlayId {
        let id = OverlayId(self.next_id);
        self.next_id += 1;
        id
    }

    fn push_overlay(&mut self, x: f32, y: f32) -> OverlayId {
        let id = self.allocate_id();
        self.overlays.push(TextOverlay::new(id, x, y));
        id
    }

    /// Appends a default overlay in the middle of the frame and selects it.
    pub fn add_overlay(&mut self) -> OverlayId {
        let (x, y) = NEW_OVERLAY_POSITION;
        let id = self.push_overlay(x, y);
        self.selected = Some(id);
        debug!("added {}", id);
        id
    }

    /// Appends an overlay built from `draft` over the defaults.
    pub fn insert_overlay(&mut self, draft: OverlayPatch) -> OverlayId {
        let (x, y) = NEW_OVERLAY_POSITION;
        let id = self.push_overlay(x, y);
        if let Some(overlay) = self.overlay_mut(id) {
            overlay.apply(draft);
        }
        id
    }

    pub fn update_overlay(&mut self, id: OverlayId, patch: OverlayPatch) -> bool {
        match self.overlay_mut(id) {
            Some(overlay) => {
                overlay.apply(patch);
                true
            }
            None => false,
        }
    }

    /// Removes an overlay and clears every state slot that referred to it.
    pub fn delete_overlay(&mut self, id: OverlayId) -> bool {
        let before = self.overlays.len();
        self.overlays.retain(|overlay| overlay.id != id);
        if self.overlays.len() == before {
            return false;
        }
        if self.selected == Some(id) {
            self.selected = None;
        }
        if self.editing == Some(id) {
            self.editing = None;
        }
        if self.dragging.is_some_and(|drag| drag.overlay == id) {
            self.dragging = None;
        }
        debug!("deleted {}", id);
        true
    }

    /// Selection from the layer list. Unknown ids are ignored.
    pub fn select(&mut self, id: OverlayId) -> bool {
        if self.overlay(id).is_none() {
            return false;
        }
        self.selected = Some(id);
        true
    }

    /// Label shown in the layer list for the overlay at `index`.
    pub fn layer_label(&self, index: usize) -> Option<String> {
        let overlay = self.overlays.get(index)?;
        if overlay.text.is_empty() {
            Some(format!("Text {}", index + 1))
        } else {
            Some(overlay.text.clone())
        }
    }

    /// Starts dragging `id`. Ignored while that overlay is in edit mode.
    pub fn pointer_down(&mut self, id: OverlayId, pointer: Point, rect: ContainerRect) -> bool {
        if self.editing == Some(id) {
            return false;
        }
        let Some(overlay) = self.overlay(id) else {
            return false;
        };
        let anchor = anchor_px(overlay.x, overlay.y, rect.size());
        let local = rect.to_local(pointer);
        self.dragging = Some(DragState {
            overlay: id,
            offset: Point::new(local.x - anchor.x, local.y - anchor.y),
        });
        self.selected = Some(id);
        self.editing = None;
        self.swallow_click = false;
        true
    }

    /// Moves the dragged overlay so that its anchor follows the pointer.
    /// The resulting percentages are clamped to `[0, 100]`.
    pub fn pointer_move(&mut self, pointer: Point, rect: ContainerRect) -> bool {
        let Some(drag) = self.dragging else {
            return false;
        };
        if !rect.size().is_drawable() {
            return false;
        }
        let local = rect.to_local(pointer);
        let x = clamp_percent(px_to_percent(local.x - drag.offset.x, rect.width));
        let y = clamp_percent(px_to_percent(local.y - drag.offset.y, rect.height));
        match self.overlay_mut(drag.overlay) {
            Some(overlay) => {
                overlay.x = x;
                overlay.y = y;
                true
            }
            None => {
                self.dragging = None;
                false
            }
        }
    }

    pub fn pointer_up(&mut self) {
        if self.dragging.take().is_some() {
            self.swallow_click = true;
        }
    }

    /// Click on the empty container: clears selection and edit mode, unless
    /// the click is the tail of a drag.
    pub fn container_click(&mut self) -> bool {
        if std::mem::take(&mut self.swallow_click) || self.dragging.is_some() {
            return false;
        }
        self.selected = None;
        self.editing = None;
        true
    }

    /// Double-click enters inline edit mode for `id` and selects it.
    pub fn double_click(&mut self, id: OverlayId) -> bool {
        if self.overlay(id).is_none() {
            return false;
        }
        self.dragging = None;
        self.editing = Some(id);
        self.selected = Some(id);
        true
    }

    /// Live text change from the inline editor; applied immediately.
    pub fn edit_text(&mut self, text: impl Into<String>) -> bool {
        let Some(id) = self.editing else {
            return false;
        };
        self.update_overlay(id, OverlayPatch::text(text))
    }

    pub fn edit_key(&mut self, key: EditKey, shift: bool) -> KeyOutcome {
        if self.editing.is_none() {
            return KeyOutcome::PassThrough;
        }
        match key {
            EditKey::Enter if !shift => {
                self.editing = None;
                KeyOutcome::ExitEdit
            }
            EditKey::Escape => {
                self.editing = None;
                KeyOutcome::ExitEditPassThrough
            }
            _ => KeyOutcome::PassThrough,
        }
    }

    /// Blur commits by leaving edit mode; text was already applied live.
    pub fn edit_blur(&mut self) {
        self.editing = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::fonts::FontWeight;

    fn rect() -> ContainerRect {
        ContainerRect::new(100.0, 50.0, 400.0, 300.0)
    }

    #[test]
    fn new_session_seeds_top_and_bottom_overlays() {
        let session = EditorSession::new();
        let positions: Vec<_> = session.overlays().iter().map(|o| (o.x, o.y)).collect();
        assert_eq!(positions, vec![(50.0, 10.0), (50.0, 85.0)]);
        assert_ne!(session.overlays()[0].id, session.overlays()[1].id);
        assert!(session.selected().is_none());
    }

    #[test]
    fn add_overlay_appends_and_selects() {
        let mut session = EditorSession::new();
        let id = session.add_overlay();
        assert_eq!(session.overlays().len(), 3);
        assert_eq!(session.overlays()[2].id, id);
        assert_eq!(session.selected(), Some(id));
        assert_eq!((session.overlays()[2].x, session.overlays()[2].y), (50.0, 50.0));
    }

    #[test]
    fn ids_stay_unique_after_deletes() {
        let mut session = EditorSession::new();
        let first = session.overlays()[0].id;
        session.delete_overlay(first);
        let added = session.add_overlay();
        let mut ids: Vec<_> = session.overlays().iter().map(|o| o.id).collect();
        ids.dedup();
        assert_eq!(ids.len(), 2);
        assert_ne!(added, first);
    }

    #[test]
    fn drag_keeps_pointer_offset() {
        let mut session = EditorSession::new();
        let id = session.overlays()[0].id;
        // anchor of (50%, 10%) is (200, 30) local, (300, 80) client
        assert!(session.pointer_down(id, Point::new(310.0, 90.0), rect()));
        assert_eq!(session.selected(), Some(id));
        let drag = session.dragging().expect("dragging");
        assert_eq!(drag.offset, Point::new(10.0, 10.0));

        assert!(session.pointer_move(Point::new(210.0, 140.0), rect()));
        let overlay = session.overlay(id).expect("overlay");
        assert!((overlay.x - 25.0).abs() < 1e-4);
        assert!((overlay.y - 26.666_666).abs() < 1e-3);
    }

    #[test]
    fn drag_outside_container_is_clamped() {
        let mut session = EditorSession::new();
        let id = session.overlays()[1].id;
        session.pointer_down(id, Point::new(300.0, 305.0), rect());
        for pointer in [
            Point::new(-5000.0, -5000.0),
            Point::new(5000.0, 5000.0),
            Point::new(-1.0, 9000.0),
            Point::new(f32::MAX, f32::MIN),
        ] {
            session.pointer_move(pointer, rect());
            let overlay = session.overlay(id).expect("overlay");
            assert!((0.0..=100.0).contains(&overlay.x), "x = {}", overlay.x);
            assert!((0.0..=100.0).contains(&overlay.y), "y = {}", overlay.y);
        }
    }

    #[test]
    fn pointer_move_without_drag_is_ignored() {
        let mut session = EditorSession::new();
        let before = session.overlays().to_vec();
        assert!(!session.pointer_move(Point::new(0.0, 0.0), rect()));
        assert_eq!(session.overlays(), before.as_slice());
    }

    #[test]
    fn click_ending_a_drag_keeps_selection() {
        let mut session = EditorSession::new();
        let id = session.overlays()[0].id;
        session.pointer_down(id, Point::new(300.0, 80.0), rect());
        session.pointer_move(Point::new(320.0, 100.0), rect());
        session.pointer_up();
        assert!(session.dragging().is_none());
        assert!(!session.container_click());
        assert_eq!(session.selected(), Some(id));

        // a later click on empty space deselects
        assert!(session.container_click());
        assert!(session.selected().is_none());
    }

    #[test]
    fn container_click_leaves_edit_mode() {
        let mut session = EditorSession::new();
        let id = session.overlays()[0].id;
        session.double_click(id);
        assert!(session.container_click());
        assert!(session.editing().is_none());
        assert!(session.selected().is_none());
    }

    #[test]
    fn pointer_down_on_edited_overlay_does_not_drag() {
        let mut session = EditorSession::new();
        let id = session.overlays()[0].id;
        session.double_click(id);
        assert!(!session.pointer_down(id, Point::new(300.0, 80.0), rect()));
        assert!(session.dragging().is_none());
        assert_eq!(session.editing(), Some(id));
    }

    #[test]
    fn dragging_another_overlay_exits_edit_mode() {
        let mut session = EditorSession::new();
        let first = session.overlays()[0].id;
        let second = session.overlays()[1].id;
        session.double_click(first);
        assert!(session.pointer_down(second, Point::new(300.0, 305.0), rect()));
        assert!(session.editing().is_none());
        assert_eq!(session.selected(), Some(second));
    }

    #[test]
    fn edits_apply_live_and_survive_escape() {
        let mut session = EditorSession::new();
        let id = session.overlays()[0].id;
        session.double_click(id);
        session.edit_text("W");
        session.edit_text("WHEN");
        assert_eq!(session.overlay(id).expect("overlay").text, "WHEN");
        assert_eq!(session.edit_key(EditKey::Escape, false), KeyOutcome::ExitEditPassThrough);
        assert!(session.editing().is_none());
        assert_eq!(session.overlay(id).expect("overlay").text, "WHEN");
        assert!(!session.edit_text("ignored"));
    }

    #[test]
    fn enter_exits_but_shift_enter_does_not() {
        let mut session = EditorSession::new();
        let id = session.overlays()[0].id;
        session.double_click(id);
        assert_eq!(session.edit_key(EditKey::Enter, true), KeyOutcome::PassThrough);
        assert_eq!(session.editing(), Some(id));
        assert_eq!(session.edit_key(EditKey::Other, false), KeyOutcome::PassThrough);
        assert_eq!(session.edit_key(EditKey::Enter, false), KeyOutcome::ExitEdit);
        assert!(session.editing().is_none());
    }

    #[test]
    fn blur_leaves_edit_mode() {
        let mut session = EditorSession::new();
        let id = session.overlays()[1].id;
        session.double_click(id);
        session.edit_blur();
        assert!(session.editing().is_none());
        assert_eq!(session.selected(), Some(id));
    }

    #[test]
    fn deleting_selected_and_edited_overlay_clears_state() {
        let mut session = EditorSession::new();
        let id = session.overlays()[0].id;
        session.double_click(id);
        assert!(session.delete_overlay(id));
        assert!(session.selected().is_none());
        assert!(session.editing().is_none());
        assert!(session.overlay(id).is_none());
        assert!(!session.delete_overlay(id));
    }

    #[test]
    fn deleting_another_overlay_keeps_selection() {
        let mut session = EditorSession::new();
        let first = session.overlays()[0].id;
        let second = session.overlays()[1].id;
        session.select(first);
        session.delete_overlay(second);
        assert_eq!(session.selected(), Some(first));
    }

    #[test]
    fn layer_labels_fall_back_for_empty_text() {
        let mut session = EditorSession::new();
        let id = session.overlays()[1].id;
        session.update_overlay(id, OverlayPatch::text(""));
        assert_eq!(session.layer_label(0).as_deref(), Some("Text goes here..."));
        assert_eq!(session.layer_label(1).as_deref(), Some("Text 2"));
        assert!(session.layer_label(2).is_none());
    }

    #[test]
    fn drafts_build_an_unselected_session() {
        let session = EditorSession::from_drafts(vec![
            OverlayPatch {
                text: Some("top".to_string()),
                y: Some(5.0),
                font_weight: Some(FontWeight::Normal),
                ..OverlayPatch::default()
            },
            OverlayPatch::position(20.0, 90.0),
        ]);
        assert_eq!(session.overlays().len(), 2);
        assert_eq!(session.overlays()[0].text, "top");
        assert_eq!((session.overlays()[0].x, session.overlays()[0].y), (50.0, 5.0));
        assert_eq!((session.overlays()[1].x, session.overlays()[1].y), (20.0, 90.0));
        assert!(session.selected().is_none());
    }

    #[test]
    fn natural_size_drives_aspect_ratio() {
        let mut session = EditorSession::new();
        assert_eq!(session.frame_aspect_css(), "4/3");
        session.set_natural_size(ImageSize::new(600, 908));
        assert_eq!(session.frame_aspect_css(), "600/908");
        assert!((session.frame_aspect_ratio() - 600.0 / 908.0).abs() < 1e-6);
    }
}
