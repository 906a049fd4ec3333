//! Meme export: fetch the template image through the relay, composite the
//! overlays at natural resolution and hand back a named JPEG.

use anyhow::{Context, Result, anyhow};
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::editor::geometry::frame_aspect_ratio;
use crate::editor::{ImageSize, OverlayPatch, Size, TextOverlay};
use crate::relay::relay_url;
use crate::render::{self, FontBook};
use crate::templates::Template;

/// The flattened meme, ready to be offered as a download.
#[derive(Debug, Clone)]
pub struct ExportedMeme {
    pub file_name: String,
    pub size: ImageSize,
    pub bytes: Vec<u8>,
}

impl ExportedMeme {
    pub fn data_url(&self) -> String {
        render::jpeg_data_url(&self.bytes)
    }

    /// Writes the JPEG. A directory target receives `file_name` inside it.
    pub fn write_to(&self, target: &Path) -> Result<PathBuf> {
        let path = if target.is_dir() {
            target.join(&self.file_name)
        } else {
            target.to_path_buf()
        };
        std::fs::write(&path, &self.bytes)
            .with_context(|| format!("failed to write export: {}", path.display()))?;
        Ok(path)
    }
}

pub fn export_file_name(template_id: &str) -> String {
    format!("meme-{}.jpg", template_id)
}

/// Reads a JSON array of overlay drafts, each shaped like an overlay with
/// every field optional.
pub fn read_overlay_drafts(path: &Path) -> Result<Vec<OverlayPatch>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read overlays file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse overlays file: {}", path.display()))
}

/// Displayed container size for a container `width` pixels wide, using the
/// frame aspect ratio of the image.
pub fn displayed_size_for_width(width: f32, natural: Option<ImageSize>) -> Size {
    Size::new(width, width / frame_aspect_ratio(natural))
}

/// Synchronous core of the export: decode, composite and encode.
pub fn export_image(
    image: &DynamicImage,
    template_id: &str,
    overlays: &[TextOverlay],
    displayed: Size,
    fonts: &FontBook,
    quality: u8,
) -> Result<ExportedMeme> {
    let pixmap = render::rasterize(image, overlays, displayed, fonts)?;
    let bytes = render::encode_jpeg(&pixmap, quality)?;
    Ok(ExportedMeme {
        file_name: export_file_name(template_id),
        size: render::pixmap_size(&pixmap),
        bytes,
    })
}

/// How the exporter sizes the container the overlays were placed in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Displayed {
    /// Exact container size as measured on screen.
    Size(Size),
    /// Container width; height follows the image's aspect ratio.
    Width(f32),
}

#[derive(Clone)]
pub struct Exporter {
    client: reqwest::Client,
    site_base: String,
    fonts: Arc<FontBook>,
    quality: u8,
}

impl Exporter {
    pub fn new(
        client: reqwest::Client,
        site_base: impl Into<String>,
        fonts: Arc<FontBook>,
    ) -> Self {
        Self {
            client,
            site_base: site_base.into(),
            fonts,
            quality: render::DEFAULT_JPEG_QUALITY,
        }
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality.clamp(1, 100);
        self
    }

    /// Loads the template image via the relay so the pixels are usable for
    /// export. Any failure is returned to the caller; nothing is retried.
    pub async fn fetch_relayed_image(&self, template: &Template) -> Result<DynamicImage> {
        if template.image.trim().is_empty() {
            return Err(anyhow!("template '{}' has no image", template.id));
        }
        let url = relay_url(&self.site_base, &template.image)?;
        debug!("loading template image via {}", url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("failed to reach image relay for '{}'", template.id))?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!(
                "image relay returned {} for template '{}'",
                status,
                template.id
            ));
        }
        let bytes = response
            .bytes()
            .await
            .with_context(|| "failed to read relayed image")?;
        image::load_from_memory(&bytes)
            .with_context(|| format!("failed to decode image for template '{}'", template.id))
    }

    pub async fn export(
        &self,
        template: &Template,
        overlays: &[TextOverlay],
        displayed: Displayed,
    ) -> Result<ExportedMeme> {
        let image = self.fetch_relayed_image(template).await?;
        let natural = ImageSize::new(image.width(), image.height());
        let displayed = match displayed {
            Displayed::Size(size) => size,
            Displayed::Width(width) => displayed_size_for_width(width, Some(natural)),
        };
        let fonts = self.fonts.clone();
        let overlays = overlays.to_vec();
        let template_id = template.id.clone();
        let quality = self.quality;
        let exported = tokio::task::spawn_blocking(move || {
            export_image(&image, &template_id, &overlays, displayed, &fonts, quality)
        })
        .await
        .map_err(|err| anyhow!("export task failed: {}", err))??;
        info!(
            "exported {} ({}x{}, {} bytes)",
            exported.file_name,
            exported.size.width,
            exported.size.height,
            exported.bytes.len()
        );
        Ok(exported)
    }
}
