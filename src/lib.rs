pub mod config;
pub mod evaluation;
pub mod presentation;
pub mod render;
pub mod routes;
pub mod state;

use anyhow::{Context, Result};
use axum::Router;

use crate::config::{Config, ProviderConfig};
use crate::evaluation::{DevCycleProvider, DevCycleUser, FlagClient, FlagProvider, LocalProvider};
use crate::state::AppState;

/// Build the flag provider named by the config
pub fn build_provider(config: &ProviderConfig) -> Result<FlagProvider> {
    let provider = match config {
        ProviderConfig::DevCycle {
            sdk_key,
            base_url,
            timeout,
        } => FlagProvider::DevCycle(
            DevCycleProvider::new(sdk_key.clone(), base_url.clone(), *timeout)
                .with_context(|| "Failed to create DevCycle provider")?,
        ),
        ProviderConfig::Local { path } => FlagProvider::Local(
            LocalProvider::from_file(path)
                .with_context(|| format!("Failed to load flags from {}", path.display()))?,
        ),
    };

    Ok(provider)
}

pub fn create_app(config: &Config, provider: FlagProvider) -> Router {
    let state = AppState {
        flags: FlagClient::new(provider),
        user: DevCycleUser::new(config.user_id.clone()),
    };

    routes::routes(&config.assets_dir).with_state(state)
}
