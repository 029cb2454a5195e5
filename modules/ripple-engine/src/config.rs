use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{Result, RippleError};

/// Attribute marking the container element the engine mounts on.
pub const DEFAULT_ROOT_MARKER: &str = "data-ripple";

/// Engine configuration. Loaded from a TOML file or from `RIPPLE_*`
/// environment variables; every field has a default.
///
/// The container's `data-local-storage` attribute takes precedence over
/// `storage_prefix`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RippleConfig {
    pub root_marker: String,
    pub storage_prefix: Option<String>,
    pub storage_path: Option<PathBuf>,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    /// Prepended to relative action URLs.
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for RippleConfig {
    fn default() -> Self {
        Self {
            root_marker: DEFAULT_ROOT_MARKER.to_string(),
            storage_prefix: None,
            storage_path: None,
            http: HttpConfig::default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: 30,
        }
    }
}

impl RippleConfig {
    /// Load and parse a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Build from the environment (`.env` honored).
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let timeout_secs = match std::env::var("RIPPLE_HTTP_TIMEOUT_SECS") {
            Ok(raw) => raw.parse().map_err(|_| {
                RippleError::Config(format!("RIPPLE_HTTP_TIMEOUT_SECS is not a number: {raw}"))
            })?,
            Err(_) => defaults.http.timeout_secs,
        };

        let config = Self {
            root_marker: std::env::var("RIPPLE_ROOT_MARKER").unwrap_or(defaults.root_marker),
            storage_prefix: std::env::var("RIPPLE_STORAGE_PREFIX").ok(),
            storage_path: std::env::var("RIPPLE_STORAGE_PATH").ok().map(PathBuf::from),
            http: HttpConfig {
                base_url: std::env::var("RIPPLE_HTTP_BASE_URL").ok(),
                timeout_secs,
            },
        };

        tracing::debug!(
            root_marker = %config.root_marker,
            storage_prefix = ?config.storage_prefix,
            storage_path = ?config.storage_path,
            "Config loaded from environment"
        );
        Ok(config)
    }

    /// Selector matching the root container.
    pub fn root_selector(&self) -> String {
        format!("[{}]", self.root_marker)
    }
}
