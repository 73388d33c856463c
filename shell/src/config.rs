use std::path::{Path, PathBuf};
use std::time::Duration;

use derma_core::config::{parse_static_config, ConfigError};
use derma_core::{SessionConfig, DEFAULT_LOCATION_TIMEOUT_MS};
use thiserror::Error;
use tracing::{debug, info};

use crate::http::DEFAULT_HTTP_TIMEOUT;

pub const API_BASE_VAR: &str = "DERMA_API_BASE";
pub const CONFIG_URL_VAR: &str = "DERMA_CONFIG_URL";
pub const LOCATION_TIMEOUT_VAR: &str = "DERMA_LOCATION_TIMEOUT_MS";
pub const HTTP_TIMEOUT_VAR: &str = "DERMA_HTTP_TIMEOUT_MS";

#[derive(Debug, Error)]
pub enum ShellConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{var} must be a positive number of milliseconds, got '{value}'")]
    InvalidTimeout { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    pub api_base: Option<String>,
    /// Static `config.json` to fetch after mount.
    pub config_url: Option<String>,
    pub location_timeout_ms: u64,
    /// Applied by the transport to every request.
    pub http_timeout: Duration,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            api_base: None,
            config_url: None,
            location_timeout_ms: DEFAULT_LOCATION_TIMEOUT_MS,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

impl ShellConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, ShellConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => debug!(path = %path.display(), "loaded .env"),
            Err(e) if e.not_found() => debug!("no .env file"),
            Err(e) => debug!(error = %e, "ignoring unreadable .env"),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ShellConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let millis = |var: &'static str, default: u64| match read(var) {
            None => Ok(default),
            Some(value) => match value.parse::<u64>() {
                Ok(ms) if ms > 0 => Ok(ms),
                _ => Err(ShellConfigError::InvalidTimeout { var, value }),
            },
        };

        let location_timeout_ms = millis(LOCATION_TIMEOUT_VAR, DEFAULT_LOCATION_TIMEOUT_MS)?;
        let http_timeout_ms = millis(
            HTTP_TIMEOUT_VAR,
            u64::try_from(DEFAULT_HTTP_TIMEOUT.as_millis()).unwrap_or(u64::MAX),
        )?;

        Ok(Self {
            api_base: read(API_BASE_VAR),
            config_url: read(CONFIG_URL_VAR),
            location_timeout_ms,
            http_timeout: Duration::from_millis(http_timeout_ms),
        })
    }

    /// Read the API base from a static `config.json` on disk.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ShellConfigError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ShellConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let api = parse_static_config(&bytes)?;
        info!(path = %path.display(), configured = api.is_configured(), "read config file");

        Ok(Self {
            api_base: api.base().map(ToString::to_string),
            ..Self::default()
        })
    }

    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        let config = SessionConfig::default().with_location_timeout_ms(self.location_timeout_ms);
        match &self.api_base {
            Some(base) => config.with_api_base(base.clone()),
            None => config,
        }
    }
}
