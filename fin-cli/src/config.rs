//! `fin.toml` configuration.
//!
//! ```toml
//! [database]
//! backend = "sqlite"
//! connection_string = "finance.db"
//!
//! [logging]
//! level = "info"
//! file = "fin.log"
//!
//! [tax]
//! personal_allowance = "60000"
//! expense_deduction_rate = "0.5"
//! expense_deduction_cap = "100000"
//!
//! [defaults]
//! currency_code = "THB"
//! ```
//!
//! Every section and key is optional.

use std::path::{Path, PathBuf};

use fin_core::DEFAULT_CURRENCY;
use fin_core::calculations::StandardAllowances;
use fin_core::db::DbConfig;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "fin.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set.
    pub level: Option<String>,
    /// Log file, appended to in addition to stdout.
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub currency_code: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            currency_code: DEFAULT_CURRENCY.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DbConfig,
    pub logging: LoggingConfig,
    pub tax: StandardAllowances,
    pub defaults: Defaults,
}

impl AppConfig {
    pub fn from_toml(
        text: &str,
        path: &Path,
    ) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reads the configuration.
    ///
    /// An explicit `path` must exist. Without one, [`DEFAULT_CONFIG_FILE`]
    /// is read if present and defaults are used otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        if !required && !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Self::from_toml(&text, &path)
    }

    /// Applies `--backend` / `--db` on top of the file's database section.
    pub fn with_database_overrides(
        mut self,
        backend: Option<String>,
        connection_string: Option<String>,
    ) -> Self {
        if let Some(backend) = backend {
            self.database.backend = backend;
        }
        if let Some(connection_string) = connection_string {
            self.database.connection_string = connection_string;
        }
        self
    }
}
