use anyhow::{Context, Result};

use crate::relay::{ImageRelay, RelayPolicy};
use crate::settings::Settings;
use crate::templates::{StoreImpl, TemplateRepository, build_store};

/// Everything a request handler needs, built once at startup.
#[derive(Debug, Clone)]
pub struct AppState {
    pub settings: Settings,
    pub repository: TemplateRepository<StoreImpl>,
    pub relay: ImageRelay,
}

impl AppState {
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .with_context(|| "failed to build http client")?;
        let store = build_store(&settings, client)?;
        Self::with_store(settings, store)
    }

    pub fn with_store(settings: Settings, store: StoreImpl) -> Result<Self> {
        let relay = ImageRelay::new(
            RelayPolicy::new(settings.relay_allowed_prefix.clone()),
            &settings.relay_user_agent,
        )?
        .with_max_bytes(settings.relay_max_bytes);
        Ok(Self {
            settings,
            repository: TemplateRepository::new(store),
            relay,
        })
    }
}
