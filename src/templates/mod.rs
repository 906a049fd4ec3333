//! Template records and the repository that reads them from a document store.
//!
//! The store client is constructed once at startup and handed to
//! [`TemplateRepository`]; there is no process-wide store handle.

mod catalog;
mod firestore;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use tracing::debug;

use crate::settings::{Settings, StoreBackend};

pub use catalog::CatalogStore;
pub use firestore::FirestoreStore;

pub(crate) const DEFAULT_TEMPLATE_WIDTH: u32 = 800;
pub(crate) const DEFAULT_TEMPLATE_HEIGHT: u32 = 600;

/// A base image plus display metadata. `width`/`height` are nominal and only
/// used as an aspect-ratio fallback before the real image has loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub image: String,
    pub width: u32,
    pub height: u32,
}

/// Raw document fields as stored; every field may be absent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct TemplateFields {
    pub(crate) name: Option<String>,
    pub(crate) image: Option<String>,
    pub(crate) width: Option<f64>,
    pub(crate) height: Option<f64>,
}

impl TemplateFields {
    pub(crate) fn into_template(self, id: impl Into<String>) -> Template {
        Template {
            id: id.into(),
            name: self.name.unwrap_or_default(),
            image: self.image.unwrap_or_default(),
            width: dimension_or(self.width, DEFAULT_TEMPLATE_WIDTH),
            height: dimension_or(self.height, DEFAULT_TEMPLATE_HEIGHT),
        }
    }
}

fn dimension_or(value: Option<f64>, fallback: u32) -> u32 {
    match value {
        Some(value) if value.is_finite() && value >= 1.0 => {
            value.round().min(u32::MAX as f64) as u32
        }
        _ => fallback,
    }
}

pub type StoreFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

/// Read contract of the template document store.
pub trait TemplateStore: Clone + Send + Sync {
    /// All records, ordered by name ascending where the backend supports it.
    fn list(&self) -> StoreFuture<Vec<Template>>;
    /// One record by id; `Ok(None)` when no such record exists.
    fn get(&self, id: &str) -> StoreFuture<Option<Template>>;
}

#[derive(Debug, Clone)]
pub enum StoreImpl {
    Firestore(FirestoreStore),
    Catalog(CatalogStore),
}

impl TemplateStore for StoreImpl {
    fn list(&self) -> StoreFuture<Vec<Template>> {
        match self {
            StoreImpl::Firestore(store) => store.list(),
            StoreImpl::Catalog(store) => store.list(),
        }
    }

    fn get(&self, id: &str) -> StoreFuture<Option<Template>> {
        match self {
            StoreImpl::Firestore(store) => store.get(id),
            StoreImpl::Catalog(store) => store.get(id),
        }
    }
}

pub fn build_store(settings: &Settings, client: reqwest::Client) -> Result<StoreImpl> {
    match settings.store_backend {
        StoreBackend::Firestore => {
            let project_id = settings
                .firestore_project_id
                .clone()
                .ok_or_else(|| anyhow!("store.project_id is required for the firestore backend"))?;
            let store = FirestoreStore::new(client, project_id, settings.store_collection.clone())
                .with_api_key(settings.firestore_api_key.clone());
            Ok(StoreImpl::Firestore(store))
        }
        StoreBackend::Catalog => {
            let path = settings
                .catalog_path
                .as_deref()
                .ok_or_else(|| anyhow!("store.catalog_path is required for the catalog backend"))?;
            let store = CatalogStore::from_path(std::path::Path::new(path))
                .with_context(|| "failed to load template catalog")?;
            Ok(StoreImpl::Catalog(store))
        }
    }
}

#[derive(Debug, Clone)]
pub struct TemplateRepository<S> {
    store: S,
}

impl<S: TemplateStore> TemplateRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Every template, sorted by name ascending. Transport failures are
    /// returned as errors and never retried.
    pub async fn list_templates(&self) -> Result<Vec<Template>> {
        let mut templates = self
            .store
            .list()
            .await
            .with_context(|| "failed to list templates")?;
        templates.sort_by(|a, b| a.name.cmp(&b.name));
        debug!("listed {} templates", templates.len());
        Ok(templates)
    }

    /// `Ok(None)` is the not-found sentinel; `Err` is reserved for transport
    /// and decoding failures.
    pub async fn get_template(&self, id: &str) -> Result<Option<Template>> {
        let id = id.trim();
        if !is_valid_template_id(id) {
            return Ok(None);
        }
        self.store
            .get(id)
            .await
            .with_context(|| format!("failed to fetch template '{}'", id))
    }
}

/// Document ids are opaque, but never empty and never contain a path separator.
pub fn is_valid_template_id(id: &str) -> bool {
    !id.is_empty() && !id.contains('/') && id != "." && id != ".."
}
