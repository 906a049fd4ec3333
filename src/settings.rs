use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");
const API_KEY_ENV: &str = "DANKDRAFTS_FIRESTORE_API_KEY";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Firestore,
    Catalog,
}

impl StoreBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "firestore" => Some(Self::Firestore),
            "catalog" | "json" => Some(Self::Catalog),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub site_base_url: String,
    pub site_title: String,
    pub site_description: String,
    pub theme_color: String,
    pub server_addr: String,
    pub relay_allowed_prefix: String,
    pub relay_user_agent: String,
    pub relay_max_bytes: usize,
    pub store_backend: StoreBackend,
    pub firestore_project_id: Option<String>,
    pub firestore_api_key: Option<String>,
    pub store_collection: String,
    pub catalog_path: Option<String>,
    pub jpeg_quality: u8,
    pub font_path: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            site_base_url: "https://dankdrafts.com".to_string(),
            site_title: "DankDrafts - Create Memes from Templates".to_string(),
            site_description: "Create hilarious memes from popular templates. Drag text anywhere, customize, and download your creations as JPG.".to_string(),
            theme_color: "#f9f6f1".to_string(),
            server_addr: "127.0.0.1:3000".to_string(),
            relay_allowed_prefix: "https://firebasestorage.googleapis.com/".to_string(),
            relay_user_agent: "dankdrafts-relay".to_string(),
            relay_max_bytes: crate::relay::MAX_IMAGE_BYTES,
            store_backend: StoreBackend::Firestore,
            firestore_project_id: None,
            firestore_api_key: None,
            store_collection: "templates".to_string(),
            catalog_path: None,
            jpeg_quality: 95,
            font_path: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    site: Option<SiteSettings>,
    server: Option<ServerSettings>,
    relay: Option<RelaySettings>,
    store: Option<StoreSettings>,
    export: Option<ExportSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct SiteSettings {
    base_url: Option<String>,
    title: Option<String>,
    description: Option<String>,
    theme_color: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSettings {
    addr: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RelaySettings {
    allowed_prefix: Option<String>,
    user_agent: Option<String>,
    max_bytes: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct StoreSettings {
    backend: Option<String>,
    project_id: Option<String>,
    api_key: Option<String>,
    collection: Option<String>,
    catalog_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ExportSettings {
    jpeg_quality: Option<u8>,
    font_path: Option<String>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    ensure_home_settings_file()?;

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    let mut settings = load_settings_from(&ordered_paths)?;
    if let Ok(key) = std::env::var(API_KEY_ENV) {
        if !key.trim().is_empty() {
            settings.firestore_api_key = Some(key.trim().to_string());
        }
    }
    Ok(settings)
}

/// Merges the given files over the embedded defaults, later files winning.
/// Paths that do not exist are skipped.
pub fn load_settings_from(paths: &[PathBuf]) -> Result<Settings> {
    let mut settings = Settings::default();
    let defaults: SettingsFile =
        toml::from_str(DEFAULT_SETTINGS_TOML).with_context(|| "failed to parse default settings")?;
    settings.merge(defaults)?;

    for path in paths {
        if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings
                .merge(parsed)
                .with_context(|| format!("invalid settings: {}", path.display()))?;
        }
    }

    Ok(settings)
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) -> Result<()> {
        if let Some(site) = incoming.site {
            merge_string(&mut self.site_base_url, site.base_url);
            merge_string(&mut self.site_title, site.title);
            merge_string(&mut self.site_description, site.description);
            merge_string(&mut self.theme_color, site.theme_color);
            self.site_base_url = self.site_base_url.trim_end_matches('/').to_string();
        }
        if let Some(server) = incoming.server {
            merge_string(&mut self.server_addr, server.addr);
        }
        if let Some(relay) = incoming.relay {
            merge_string(&mut self.relay_allowed_prefix, relay.allowed_prefix);
            merge_string(&mut self.relay_user_agent, relay.user_agent);
            if let Some(max_bytes) = relay.max_bytes.filter(|max| *max > 0) {
                self.relay_max_bytes = max_bytes;
            }
        }
        if let Some(store) = incoming.store {
            if let Some(backend) = store.backend {
                if !backend.trim().is_empty() {
                    self.store_backend = StoreBackend::parse(&backend)
                        .ok_or_else(|| anyhow!("unknown store backend '{}'", backend))?;
                }
            }
            merge_optional(&mut self.firestore_project_id, store.project_id);
            merge_optional(&mut self.firestore_api_key, store.api_key);
            merge_string(&mut self.store_collection, store.collection);
            merge_optional(&mut self.catalog_path, store.catalog_path);
        }
        if let Some(export) = incoming.export {
            if let Some(quality) = export.jpeg_quality {
                if (1..=100).contains(&quality) {
                    self.jpeg_quality = quality;
                }
            }
            merge_optional(&mut self.font_path, export.font_path);
        }
        Ok(())
    }
}

fn merge_string(target: &mut String, incoming: Option<String>) {
    if let Some(value) = incoming {
        if !value.trim().is_empty() {
            *target = value.trim().to_string();
        }
    }
}

fn merge_optional(target: &mut Option<String>, incoming: Option<String>) {
    if let Some(value) = incoming {
        if !value.trim().is_empty() {
            *target = Some(value.trim().to_string());
        }
    }
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".dankdrafts"))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn embedded_defaults_are_loaded() {
        let settings = load_settings_from(&[]).expect("settings");
        assert_eq!(settings.site_base_url, "https://dankdrafts.com");
        assert_eq!(
            settings.relay_allowed_prefix,
            "https://firebasestorage.googleapis.com/"
        );
        assert_eq!(settings.store_backend, StoreBackend::Firestore);
        assert_eq!(settings.store_collection, "templates");
        assert_eq!(settings.jpeg_quality, 95);
        assert_eq!(settings.relay_max_bytes, 20 * 1024 * 1024);
        assert!(settings.firestore_project_id.is_none());
        assert!(settings.font_path.is_none());
    }

    #[test]
    fn later_files_override_earlier_ones() {
        let dir = tempdir().expect("tempdir");
        let first = dir.path().join("first.toml");
        let second = dir.path().join("second.toml");
        fs::write(
            &first,
            "[store]\nbackend = \"catalog\"\ncatalog_path = \"a.json\"\n[site]\nbase_url = \"http://localhost:3000/\"\n",
        )
        .expect("write first");
        fs::write(
            &second,
            "[store]\ncatalog_path = \"b.json\"\n[export]\njpeg_quality = 0\n[relay]\nmax_bytes = 4096\n",
        )
        .expect("write second");

        let settings = load_settings_from(&[first, second]).expect("settings");
        assert_eq!(settings.store_backend, StoreBackend::Catalog);
        assert_eq!(settings.catalog_path.as_deref(), Some("b.json"));
        assert_eq!(settings.site_base_url, "http://localhost:3000");
        assert_eq!(settings.jpeg_quality, 95);
        assert_eq!(settings.relay_max_bytes, 4096);
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[store]\nbackend = \"postgres\"\n").expect("write");
        let err = load_settings_from(&[path]).expect_err("should fail");
        assert!(format!("{:#}", err).contains("unknown store backend"));
    }
}
