use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use super::{StoreFuture, Template, TemplateFields, TemplateStore, is_valid_template_id};

/// Templates held in memory, usually loaded from a local JSON catalog.
#[derive(Debug, Clone, Default)]
pub struct CatalogStore {
    templates: Arc<Vec<Template>>,
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    id: String,
    #[serde(flatten)]
    fields: TemplateFields,
}

impl CatalogStore {
    pub fn new(templates: Vec<Template>) -> Self {
        Self {
            templates: Arc::new(templates),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog: {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("failed to parse catalog: {}", path.display()))
    }

    /// Parses a JSON array of `{ "id": ..., "name": ..., "image": ..., "width": ..., "height": ... }`.
    pub fn from_json(content: &str) -> Result<Self> {
        let entries: Vec<CatalogEntry> = serde_json::from_str(content)?;
        let mut seen = HashSet::new();
        let mut templates = Vec::with_capacity(entries.len());
        for entry in entries {
            let id = entry.id.trim().to_string();
            if !is_valid_template_id(&id) {
                return Err(anyhow!("invalid template id '{}'", entry.id));
            }
            if !seen.insert(id.clone()) {
                return Err(anyhow!("duplicate template id '{}'", id));
            }
            templates.push(entry.fields.into_template(id));
        }
        Ok(Self::new(templates))
    }
}

impl TemplateStore for CatalogStore {
    fn list(&self) -> StoreFuture<Vec<Template>> {
        let templates = self.templates.clone();
        Box::pin(async move { Ok(templates.as_ref().clone()) })
    }

    fn get(&self, id: &str) -> StoreFuture<Option<Template>> {
        let found = self.templates.iter().find(|t| t.id == id).cloned();
        Box::pin(async move { Ok(found) })
    }
}
