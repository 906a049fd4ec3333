use anyhow::{Context, Result};
use serde::Serialize;
use tera::{Context as TeraContext, Tera};

use super::meta::{PageMeta, editor_meta, gallery_meta, not_found_meta};
use super::views::{GalleryView, NOT_FOUND_TITLE};
use crate::editor::geometry::frame_aspect_css;
use crate::editor::{EditorSession, ImageSize, TextOverlay};
use crate::export::export_file_name;
use crate::relay::relay_path;
use crate::settings::Settings;
use crate::templates::Template;

const LAYOUT: &str = include_str!("templates/layout.html.tera");
const GALLERY: &str = include_str!("templates/gallery.html.tera");
const EDITOR: &str = include_str!("templates/editor.html.tera");
const NOT_FOUND: &str = include_str!("templates/not_found.html.tera");
const ERROR: &str = include_str!("templates/error.html.tera");

#[derive(Debug, Serialize)]
struct OverlayMarkup {
    dom_id: String,
    text: String,
    label: String,
    style: String,
}

pub fn render_gallery_page(settings: &Settings, view: &GalleryView) -> Result<String> {
    let mut context = TeraContext::new();
    context.insert("view", view);
    let body = render_fragment("gallery", GALLERY, &context)?;
    render_layout(&gallery_meta(settings), &body)
}

/// Editor page for `template` with a freshly seeded session. The page is a
/// static preview; exporting goes through [`crate::export::Exporter`].
pub fn render_editor_page(settings: &Settings, template: &Template) -> Result<String> {
    let mut session = EditorSession::new();
    session.set_natural_size(ImageSize::new(template.width, template.height));

    let overlays: Vec<OverlayMarkup> = session
        .overlays()
        .iter()
        .enumerate()
        .map(|(index, overlay)| OverlayMarkup {
            dom_id: overlay.id.to_string(),
            text: overlay.text.clone(),
            label: session.layer_label(index).unwrap_or_default(),
            style: overlay_style(overlay),
        })
        .collect();
    let image_src = if template.image.is_empty() {
        String::new()
    } else {
        relay_path(&template.image)?
    };

    let mut context = TeraContext::new();
    context.insert("template", template);
    context.insert("aspect", &frame_aspect_css(session.natural_size()));
    context.insert("image_src", &image_src);
    context.insert("overlays", &overlays);
    context.insert("download_name", &export_file_name(&template.id));
    let body = render_fragment("editor", EDITOR, &context)?;
    render_layout(&editor_meta(settings, template), &body)
}

pub fn render_not_found_page(settings: &Settings) -> Result<String> {
    let mut context = TeraContext::new();
    context.insert("title", NOT_FOUND_TITLE);
    let body = render_fragment("not found", NOT_FOUND, &context)?;
    render_layout(&not_found_meta(settings), &body)
}

pub fn render_error_page(settings: &Settings, message: &str) -> Result<String> {
    let mut context = TeraContext::new();
    context.insert("message", message);
    let body = render_fragment("error", ERROR, &context)?;
    render_layout(&gallery_meta(settings), &body)
}

/// Inline CSS mirroring what the rasterizer draws for `overlay`.
fn overlay_style(overlay: &TextOverlay) -> String {
    let stroke = if overlay.has_stroke() {
        format!("{}px {}", overlay.stroke_width, overlay.stroke_color.to_hex())
    } else {
        "0".to_string()
    };
    format!(
        "left: {}%; top: {}%; font-size: {}px; color: {}; -webkit-text-stroke: {}; font-weight: {}; font-family: {};",
        overlay.x,
        overlay.y,
        overlay.font_size,
        overlay.color.to_hex(),
        stroke,
        overlay.font_weight.css_value(),
        overlay.font_family.css_stack()
    )
}

fn render_layout(meta: &PageMeta, body: &str) -> Result<String> {
    let mut context = TeraContext::new();
    context.insert("meta", meta);
    context.insert("body", body);
    render_fragment("layout", LAYOUT, &context)
}

fn render_fragment(name: &str, template: &str, context: &TeraContext) -> Result<String> {
    Tera::one_off(template, context, true)
        .with_context(|| format!("failed to render {} template", name))
}
