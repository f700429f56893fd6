//! Adapter configuration.
//!
//! Loaded from TOML:
//!
//! ```toml
//! # Top-level folder that is rebased away when it is the only root entry.
//! root_folder = "files"
//!
//! # Log a warning when the root probe fails instead of staying silent.
//! warn_on_probe_failure = true
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Name of the folder an embed step wraps its files in.
pub const DEFAULT_ROOT_FOLDER: &str = "files";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Could not read the config file.
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Could not parse the config file.
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A setting has an unusable value.
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },

    /// A directive was malformed.
    #[error("directive {directive}: {message}")]
    Directive { directive: String, message: String },
}

/// Settings for [`EmbeddedFs`](crate::EmbeddedFs).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmbedConfig {
    /// Folder name compared during root detection.
    pub root_folder: String,
    /// Log swallowed root-probe failures at `warn` rather than `debug`.
    pub warn_on_probe_failure: bool,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            root_folder: DEFAULT_ROOT_FOLDER.to_string(),
            warn_on_probe_failure: true,
        }
    }
}

impl EmbedConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Override the root folder name.
    pub fn with_root_folder(mut self, name: impl Into<String>) -> Self {
        self.root_folder = name.into();
        self
    }

    /// The root folder must be a single path element.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let name = self.root_folder.as_str();
        if name.is_empty() || name == "." || name == ".." || name.contains('/') {
            return Err(ConfigError::InvalidValue {
                key: "root_folder",
                message: format!("{name:?} is not a single folder name"),
            });
        }
        Ok(())
    }
}
