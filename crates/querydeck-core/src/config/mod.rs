//! Configuration types for Querydeck.
//!
//! Configuration is loaded from an optional YAML file (`querydeck.yaml`),
//! then overridden by environment variables. Every section has defaults, so
//! a missing file is equivalent to an empty one.

pub mod database;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub use database::DatabaseConfig;

/// Complete Querydeck configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuerydeckConfig {
    /// Server name reported by `initialize` and the health endpoint.
    #[serde(default = "default_name")]
    pub name: String,

    /// Directory holding tool, prompt and glossary definitions.
    #[serde(default = "default_definitions_dir")]
    pub definitions_dir: PathBuf,

    /// Backing database.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// HTTP health surface.
    #[serde(default)]
    pub health: HealthConfig,

    /// Log filtering.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for QuerydeckConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            definitions_dir: default_definitions_dir(),
            database: DatabaseConfig::default(),
            health: HealthConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Bind address, e.g. "0.0.0.0:8080".
    #[serde(default = "default_health_bind")]
    pub bind: String,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            bind: default_health_bind(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing-subscriber` filter directive. `RUST_LOG` takes precedence.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_name() -> String {
    "querydeck".to_string()
}

fn default_definitions_dir() -> PathBuf {
    PathBuf::from("tools")
}

fn default_health_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_log_filter() -> String {
    "info".to_string()
}

/// Error type for configuration and definition loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid definition in {}: {reason}", path.display())]
    Definition { path: PathBuf, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl QuerydeckConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Load configuration from `path` if it exists, apply environment
    /// overrides, and resolve `definitions_dir` relative to the file.
    ///
    /// Returns the configuration and whether the file was found.
    pub fn load(path: impl AsRef<Path>) -> Result<(Self, bool), ConfigError> {
        let path = path.as_ref();
        let found = path.exists();
        let mut config = if found {
            let mut config = Self::from_file(path)?;
            if config.definitions_dir.is_relative() {
                if let Some(base_dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    config.definitions_dir = base_dir.join(&config.definitions_dir);
                }
            }
            config
        } else {
            Self::default()
        };
        config.apply_env_with(|key| std::env::var(key).ok());
        config.validate()?;
        Ok((config, found))
    }

    /// Apply `DB_*` environment overrides using the given lookup.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(url) = non_empty("DB_CONNECTION_STRING") {
            self.database.url = Some(url);
        }
        if let Some(host) = non_empty("DB_HOST") {
            self.database.host = Some(host);
        }
        if let Some(port) = non_empty("DB_PORT") {
            match port.parse() {
                Ok(port) => self.database.port = Some(port),
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid DB_PORT"),
            }
        }
        if let Some(database) = non_empty("DB_DATABASE") {
            self.database.database = Some(database);
        }
        if let Some(username) = non_empty("DB_USERNAME") {
            self.database.username = Some(username);
        }
        if let Some(password) = non_empty("DB_PASSWORD") {
            self.database.password = Some(password);
        }
    }

    /// Reject configurations that cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Config("name must not be empty".to_string()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Config(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
