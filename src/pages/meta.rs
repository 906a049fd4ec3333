use serde::Serialize;

use super::views::editor_path;
use crate::settings::Settings;
use crate::templates::Template;

/// Title, description and canonical URL of a rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub title: String,
    pub description: String,
    pub canonical_url: String,
    pub theme_color: String,
    pub image: Option<String>,
}

pub fn gallery_meta(settings: &Settings) -> PageMeta {
    PageMeta {
        title: settings.site_title.clone(),
        description: settings.site_description.clone(),
        canonical_url: format!("{}/", settings.site_base_url),
        theme_color: settings.theme_color.clone(),
        image: None,
    }
}

pub fn editor_meta(settings: &Settings, template: &Template) -> PageMeta {
    PageMeta {
        title: format!("{} Meme Generator", template.name),
        description: format!(
            "Create and customize your {} meme. Add text, adjust, and download. Free meme maker with no watermarks.",
            template.name
        ),
        canonical_url: format!("{}{}", settings.site_base_url, editor_path(&template.id)),
        theme_color: settings.theme_color.clone(),
        image: (!template.image.is_empty()).then(|| template.image.clone()),
    }
}

pub fn not_found_meta(settings: &Settings) -> PageMeta {
    PageMeta {
        title: format!("Template not found | {}", settings.site_title),
        description: "The template you are looking for does not exist or could not be loaded."
            .to_string(),
        canonical_url: format!("{}/", settings.site_base_url),
        theme_color: settings.theme_color.clone(),
        image: None,
    }
}
