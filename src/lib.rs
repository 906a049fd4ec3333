use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub mod editor;
pub mod export;
pub mod logging;
pub mod pages;
pub mod relay;
pub mod render;
pub mod server;
pub mod settings;
pub mod templates;

use editor::EditorSession;
use export::{Displayed, Exporter};
use render::FontBook;
use templates::{TemplateRepository, build_store};

/// One-shot command line actions. Serving is handled by [`server::run_server`].
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub settings_path: Option<String>,
    pub list_templates: bool,
    pub sitemap: bool,
    pub export: Option<ExportRequest>,
}

#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub template_id: String,
    pub overlays_path: PathBuf,
    pub container_width: f32,
    pub out: Option<PathBuf>,
}

pub async fn run(config: Config) -> Result<String> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;
    let client = reqwest::Client::builder()
        .build()
        .with_context(|| "failed to build http client")?;
    let repository = TemplateRepository::new(build_store(&settings, client.clone())?);

    if config.list_templates {
        let templates = repository.list_templates().await?;
        return Ok(templates
            .iter()
            .map(|template| {
                format!(
                    "{}\t{}\t{}x{}",
                    template.id, template.name, template.width, template.height
                )
            })
            .collect::<Vec<_>>()
            .join("\n"));
    }
    if config.sitemap {
        let entries = pages::generate_sitemap(
            &repository,
            &settings.site_base_url,
            time::OffsetDateTime::now_utc(),
        )
        .await;
        return pages::render_sitemap(&entries);
    }
    if let Some(request) = config.export {
        let template = repository
            .get_template(&request.template_id)
            .await?
            .ok_or_else(|| anyhow!("template not found: {}", request.template_id))?;
        let drafts = export::read_overlay_drafts(&request.overlays_path)?;
        let session = EditorSession::from_drafts(drafts);
        let fonts = FontBook::from_settings(settings.font_path.as_deref())?;
        let exporter = Exporter::new(client, settings.site_base_url.clone(), Arc::new(fonts))
            .with_quality(settings.jpeg_quality);
        let meme = exporter
            .export(
                &template,
                session.overlays(),
                Displayed::Width(request.container_width),
            )
            .await?;
        let target = request.out.unwrap_or_else(|| PathBuf::from("."));
        let path = meme.write_to(&target)?;
        return Ok(path.display().to_string());
    }
    Err(anyhow!(
        "nothing to do; pass --serve, --list-templates, --sitemap or --export"
    ))
}
