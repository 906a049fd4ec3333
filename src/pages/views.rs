use serde::Serialize;
use tracing::error;

use crate::templates::{Template, TemplateRepository, TemplateStore};

pub const GALLERY_ERROR: &str = "Failed to load templates. Please try again later.";
pub const EDITOR_ERROR: &str = "Failed to load template.";
pub const NOT_FOUND_TITLE: &str = "Template not found";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateCard {
    pub id: String,
    pub name: String,
    pub image: String,
    pub href: String,
}

impl From<&Template> for TemplateCard {
    fn from(template: &Template) -> Self {
        Self {
            id: template.id.clone(),
            name: template.name.clone(),
            image: template.image.clone(),
            href: editor_path(&template.id),
        }
    }
}

/// Site path of the editor for `template_id`, with the id encoded as a single
/// path segment.
pub fn editor_path(template_id: &str) -> String {
    format!("/editor/{}", urlencoding::encode(template_id))
}

/// What the gallery shows. `Loading` is the state before a fetch resolves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum GalleryView {
    Loading,
    Error { message: String },
    Empty,
    Ready { cards: Vec<TemplateCard> },
}

impl GalleryView {
    pub fn from_templates(templates: &[Template]) -> Self {
        if templates.is_empty() {
            GalleryView::Empty
        } else {
            GalleryView::Ready {
                cards: templates.iter().map(TemplateCard::from).collect(),
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum EditorView {
    Loading,
    Error { message: String },
    NotFound,
    Ready { template: Template },
}

/// Fetches the template list once; failures become the error state.
pub async fn load_gallery<S: TemplateStore>(repository: &TemplateRepository<S>) -> GalleryView {
    match repository.list_templates().await {
        Ok(templates) => GalleryView::from_templates(&templates),
        Err(err) => {
            error!("failed to fetch templates: {:#}", err);
            GalleryView::Error {
                message: GALLERY_ERROR.to_string(),
            }
        }
    }
}

pub async fn load_editor<S: TemplateStore>(
    repository: &TemplateRepository<S>,
    template_id: &str,
) -> EditorView {
    match repository.get_template(template_id).await {
        Ok(Some(template)) => EditorView::Ready { template },
        Ok(None) => EditorView::NotFound,
        Err(err) => {
            error!("failed to fetch template: {:#}", err);
            EditorView::Error {
                message: EDITOR_ERROR.to_string(),
            }
        }
    }
}
