use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::evaluation::devcycle::DEFAULT_BUCKETING_API_URL;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_TIMEOUT_MS: u64 = 5000;
const DEFAULT_USER_ID: &str = "my-user";
const DEFAULT_ASSETS_DIR: &str = "public/assets";

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
    #[error("set DEVCYCLE_SERVER_SDK_KEY or LOCAL_FLAGS_FILE")]
    MissingProvider,
}

// Where flag values come from
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderConfig {
    DevCycle {
        sdk_key: String,
        base_url: String,
        timeout: Duration,
    },
    Local {
        path: PathBuf,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub user_id: String,
    pub assets_dir: PathBuf,
    pub provider: ProviderConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenv().is_ok();

        Self::from_vars(|name| env::var(name).ok())
    }

    /// Build the config from any variable lookup. Empty values count as unset.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let port = match var("PORT") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                expected: "a valid u16 number",
                value,
            })?,
            None => DEFAULT_PORT,
        };

        let provider = if let Some(sdk_key) = var("DEVCYCLE_SERVER_SDK_KEY") {
            let timeout_ms = match var("DEVCYCLE_TIMEOUT_MS") {
                Some(value) => match value.parse::<u64>() {
                    Ok(ms) if ms > 0 => ms,
                    _ => {
                        return Err(ConfigError::Invalid {
                            name: "DEVCYCLE_TIMEOUT_MS",
                            expected: "a positive number of milliseconds",
                            value,
                        })
                    }
                },
                None => DEFAULT_TIMEOUT_MS,
            };

            ProviderConfig::DevCycle {
                sdk_key,
                base_url: var("DEVCYCLE_BUCKETING_API_URL")
                    .unwrap_or_else(|| DEFAULT_BUCKETING_API_URL.to_string()),
                timeout: Duration::from_millis(timeout_ms),
            }
        } else if let Some(path) = var("LOCAL_FLAGS_FILE") {
            ProviderConfig::Local {
                path: PathBuf::from(path),
            }
        } else {
            return Err(ConfigError::MissingProvider);
        };

        Ok(Self {
            host: var("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            user_id: var("DEVCYCLE_USER_ID").unwrap_or_else(|| DEFAULT_USER_ID.to_string()),
            assets_dir: var("ASSETS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ASSETS_DIR)),
            provider,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
