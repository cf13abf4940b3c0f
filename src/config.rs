//! Runtime configuration for the prefetcher
//!
//! Configuration is read from a TOML file with three sections:
//!
//! ```toml
//! [client]
//! request_timeout = "60s"
//! max_requests_per_second = 15
//! cache_dir = "/var/cache/prefetcher"
//!
//! [prefetch]
//! origin = "https://example.com"
//! filters = '{"order": ["main"], "delay": 250}'
//! idle_timeout = "2s"
//! fallback_delay = "500ms"
//!
//! [logging]
//! level = "warn"
//! ```
//!
//! Every field is optional. Lookup order is an explicitly named file, then
//! `./prefetcher.toml`, then `<user config dir>/prefetcher/config.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::client::ClientConfig;
use crate::app::foreground::IdlePolicy;
use crate::constants::{cache, config};
use crate::errors::{ConfigError, ConfigResult};

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP client settings
    pub client: ClientConfig,
    /// Prefetch run defaults
    pub prefetch: PrefetchConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Defaults for prefetch runs started from the command line
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefetchConfig {
    /// Origin used when `--origin` is not given
    pub origin: Option<String>,
    /// Filter configuration string used when `--filters` is not given
    pub filters: Option<String>,
    /// Idle deferral before the request is sent
    #[serde(flatten)]
    pub idle: IdlePolicy,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level used when no verbosity flag is given
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration
    ///
    /// An explicitly named file must exist; otherwise the first file found
    /// in the standard locations is used, falling back to defaults.
    pub async fn load(config_file_override: Option<PathBuf>) -> ConfigResult<Self> {
        let config_path = match config_file_override {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound { path });
                }
                Some(path)
            }
            None => Self::find_config_file(),
        };

        let config = match config_path {
            Some(path) => Self::load_from_file(&path).await?,
            None => {
                debug!("No config file found, using defaults");
                Self::default()
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Check values that parse but cannot be used
    pub fn validate(&self) -> ConfigResult<()> {
        self.client
            .validate()
            .map_err(|reason| ConfigError::InvalidValue {
                field: "client".to_string(),
                reason,
            })?;

        if let Some(origin) = &self.prefetch.origin {
            url::Url::parse(origin).map_err(|e| ConfigError::InvalidValue {
                field: "prefetch.origin".to_string(),
                reason: e.to_string(),
            })?;
        }

        match self.logging.level.to_ascii_lowercase().as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => Ok(()),
            other => Err(ConfigError::InvalidValue {
                field: "logging.level".to_string(),
                reason: format!("unknown level '{}'", other),
            }),
        }
    }

    /// Standard locations searched when no file is named
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(".").join(config::LOCAL_CONFIG_FILE)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(
                dir.join(cache::APP_DIR_NAME)
                    .join(config::USER_CONFIG_FILE),
            );
        }
        paths
    }

    fn find_config_file() -> Option<PathBuf> {
        let found = Self::search_paths().into_iter().find(|path| path.exists());
        if let Some(path) = &found {
            debug!("Found config file: {}", path.display());
        }
        found
    }

    async fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let config = Self::from_toml(&content)?;
        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }
}
