//! # configs
//!
//! Layered settings: built-in defaults, then an optional TOML file
//! (`svont.toml`, or the path in `SVONT_CONFIG`), then environment variables
//! of the form `SVONT__SECTION__KEY`. A `.env` file is read first if present.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_CONFIG_FILE: &str = "svont.toml";
pub const CONFIG_PATH_VAR: &str = "SVONT_CONFIG";
const ENV_PREFIX: &str = "SVONT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Snapshot as a JSON file, attachments in a local blob directory.
    Json,
    /// Nothing survives a restart.
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    pub data_dir: PathBuf,
    pub snapshot_file: String,
    pub blob_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreSettings {
    pub default_page_size: usize,
    pub popular_page_size: usize,
    pub tag_page_size: usize,
    pub max_page_size: usize,
    pub popularity_decay_secs: f64,
    pub upvote_weight: f64,
    pub view_weight: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// An `EnvFilter` directive; `RUST_LOG` still wins when set.
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub storage: StorageSettings,
    pub store: StoreSettings,
    pub logging: LoggingSettings,
}

impl Settings {
    /// Reads `.env`, the settings file and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => debug!(path = %path.display(), "loaded .env"),
            Err(err) if err.not_found() => {}
            Err(err) => warn!(error = %err, "ignoring unreadable .env"),
        }
        let file = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::from_sources(Some(Path::new(&file)), None)
    }

    /// `env` replaces the process environment when given, for tests.
    pub fn from_sources(
        file: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("storage.backend", "json")?
            .set_default("storage.data_dir", "./data")?
            .set_default("storage.snapshot_file", "content.json")?
            .set_default("storage.blob_dir", "blobs")?
            .set_default("store.default_page_size", 20)?
            .set_default("store.popular_page_size", 10)?
            .set_default("store.tag_page_size", 10)?
            .set_default("store.max_page_size", 100)?
            .set_default("store.popularity_decay_secs", 45000.0)?
            .set_default("store.upvote_weight", 1.0)?
            .set_default("store.view_weight", 0.1)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?;

        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(false));
        }
        let mut environment = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true);
        if let Some(vars) = env {
            environment = environment.source(Some(vars.into_iter().collect()));
        }

        let settings: Settings = builder.add_source(environment).build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let store = &self.store;
        for (key, value) in [
            ("store.default_page_size", store.default_page_size),
            ("store.popular_page_size", store.popular_page_size),
            ("store.tag_page_size", store.tag_page_size),
            ("store.max_page_size", store.max_page_size),
        ] {
            if value == 0 {
                return Err(ConfigError::invalid(key, "must be at least 1"));
            }
            if value > store.max_page_size {
                return Err(ConfigError::invalid(key, "must not exceed store.max_page_size"));
            }
        }
        if !(store.popularity_decay_secs.is_finite() && store.popularity_decay_secs > 0.0) {
            return Err(ConfigError::invalid("store.popularity_decay_secs", "must be a positive number"));
        }
        // A zero upvote weight would leave popularity blind to votes.
        if !(store.upvote_weight.is_finite() && store.upvote_weight > 0.0) {
            return Err(ConfigError::invalid("store.upvote_weight", "must be a positive number"));
        }
        if !(store.view_weight.is_finite() && store.view_weight >= 0.0) {
            return Err(ConfigError::invalid("store.view_weight", "must be a non-negative number"));
        }
        if self.storage.snapshot_file.trim().is_empty() {
            return Err(ConfigError::invalid("storage.snapshot_file", "must not be empty"));
        }
        if self.storage.blob_dir.trim().is_empty() {
            return Err(ConfigError::invalid("storage.blob_dir", "must not be empty"));
        }
        Ok(())
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.storage.data_dir.join(&self.storage.snapshot_file)
    }

    pub fn blob_path(&self) -> PathBuf {
        self.storage.data_dir.join(&self.storage.blob_dir)
    }
}
