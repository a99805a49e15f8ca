//! Application settings loading from config.toml
//!
//! Every section has defaults, so an empty file (or a missing section) yields a
//! usable configuration. `DATABASE_URL` from the environment overrides the file.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::{path::Path, path::PathBuf, time::Duration};

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

/// `[database]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection URL, e.g. `sqlite://data/tani_market.sqlite?mode=rwc`
    pub url: String,
    pub max_connections: u32,
    /// Ceiling for opening or acquiring a connection
    pub connect_timeout_secs: u64,
    /// Ceiling for the database work of one workflow call
    pub query_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/tani_market.sqlite?mode=rwc".to_string(),
            max_connections: 10,
            connect_timeout_secs: 20,
            query_timeout_secs: 20,
        }
    }
}

/// `[storage]` section - where uploaded evidence images go
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory uploaded files are written under
    pub root_dir: PathBuf,
    /// URL prefix returned for stored files
    pub public_base_url: String,
    /// Folder (below `root_dir`) holding harvest evidence
    pub harvest_folder: String,
    /// Ceiling for a single `upload_many` call
    pub upload_timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("data/uploads"),
            public_base_url: "http://localhost:8080/uploads".to_string(),
            harvest_folder: "harvests".to_string(),
            upload_timeout_secs: 20,
        }
    }
}

/// `[workflow]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Ceiling for a single notifier call
    pub notify_timeout_secs: u64,
    /// Lifetime of a forgot-password token
    pub password_reset_ttl_minutes: i64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            notify_timeout_secs: 20,
            password_reset_ttl_minutes: 30,
        }
    }
}

impl DatabaseConfig {
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    #[must_use]
    pub const fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

impl StorageConfig {
    #[must_use]
    pub const fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }
}

impl WorkflowConfig {
    #[must_use]
    pub const fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.notify_timeout_secs)
    }
}

/// Loads the application configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    tracing::debug!("Attempting to load configuration from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;

    let mut config: AppConfig = toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Loads configuration from ./config.toml, falling back to defaults when the
/// file does not exist.
pub fn load_default_config() -> Result<AppConfig> {
    if Path::new("config.toml").exists() {
        return load_config("config.toml");
    }
    tracing::info!("config.toml not found, using default configuration");
    let mut config = AppConfig::default();
    apply_env_overrides(&mut config);
    Ok(config)
}

fn apply_env_overrides(config: &mut AppConfig) {
    if let Ok(url) = std::env::var("DATABASE_URL") {
        config.database.url = url;
    }
}
