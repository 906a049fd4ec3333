use anyhow::{Context, Result};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::error;

use super::views::editor_path;
use crate::templates::{Template, TemplateRepository, TemplateStore};

const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeFrequency {
    Daily,
    Weekly,
}

impl ChangeFrequency {
    fn as_str(self) -> &'static str {
        match self {
            ChangeFrequency::Daily => "daily",
            ChangeFrequency::Weekly => "weekly",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SitemapEntry {
    pub url: String,
    pub last_modified: OffsetDateTime,
    pub change_frequency: ChangeFrequency,
    pub priority: f32,
}

/// The gallery root followed by one entry per template.
pub fn sitemap_entries(
    base_url: &str,
    templates: &[Template],
    now: OffsetDateTime,
) -> Vec<SitemapEntry> {
    let base_url = base_url.trim_end_matches('/');
    let mut entries = vec![SitemapEntry {
        url: base_url.to_string(),
        last_modified: now,
        change_frequency: ChangeFrequency::Daily,
        priority: 1.0,
    }];
    entries.extend(templates.iter().map(|template| SitemapEntry {
        url: format!("{}{}", base_url, editor_path(&template.id)),
        last_modified: now,
        change_frequency: ChangeFrequency::Weekly,
        priority: 0.8,
    }));
    entries
}

/// Builds the sitemap from the store. A store failure is logged and only
/// the static root entry is returned.
pub async fn generate_sitemap<S: TemplateStore>(
    repository: &TemplateRepository<S>,
    base_url: &str,
    now: OffsetDateTime,
) -> Vec<SitemapEntry> {
    match repository.list_templates().await {
        Ok(templates) => sitemap_entries(base_url, &templates, now),
        Err(err) => {
            error!("error generating sitemap: {:#}", err);
            sitemap_entries(base_url, &[], now)
        }
    }
}

pub fn render_sitemap(entries: &[SitemapEntry]) -> Result<String> {
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    let mut urlset = BytesStart::new("urlset");
    urlset.push_attribute(("xmlns", SITEMAP_NS));
    writer.write_event(Event::Start(urlset))?;
    for entry in entries {
        let last_modified = entry
            .last_modified
            .format(&Rfc3339)
            .with_context(|| "failed to format sitemap timestamp")?;
        writer.write_event(Event::Start(BytesStart::new("url")))?;
        write_text_element(&mut writer, "loc", &entry.url)?;
        write_text_element(&mut writer, "lastmod", &last_modified)?;
        write_text_element(&mut writer, "changefreq", entry.change_frequency.as_str())?;
        write_text_element(&mut writer, "priority", &format!("{:.1}", entry.priority))?;
        writer.write_event(Event::End(BytesEnd::new("url")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("urlset")))?;
    String::from_utf8(writer.into_inner()).with_context(|| "sitemap is not valid UTF-8")
}

fn write_text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}
