//! Run configuration loaded from a JSON or YAML file.
//!
//! The file uses the same keys as the feeds already deployed:
//!
//! ```json
//! {
//!   "search_query": "kansallispuisto",
//!   "search_service": "uutiset",
//!   "result_type": "article",
//!   "output_file_path": "~/feeds/kansallispuisto.xml",
//!   "useGCS": false,
//!   "GCSBucket": ""
//! }
//! ```
//!
//! A [`Config`] is validated once at startup and then only read; the crawler
//! and feed builder receive the pieces they need from it explicitly.

use crate::scrapers::yle::SearchTarget;
use crate::utils::{expand_home, home_dir, object_name_for};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

/// Errors raised while loading or validating a [`Config`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("missing config parameter: {0}")]
    Missing(&'static str),
    #[error("cannot expand {0}: home directory unknown")]
    HomeUnavailable(String),
}

/// Supported config file syntaxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
}

impl ConfigFormat {
    /// Pick the syntax from a file extension; anything but `.yaml`/`.yml` is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                ConfigFormat::Yaml
            }
            _ => ConfigFormat::Json,
        }
    }
}

/// Parameters of one feed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct Config {
    /// Phrase to search for. Required.
    #[serde(default)]
    pub search_query: String,
    /// Service filter; empty means all services.
    #[serde(default)]
    pub search_service: String,
    /// Result type filter; empty means all types.
    #[serde(default)]
    pub result_type: String,
    /// Where the feed is written. Required; may start with `~`.
    #[serde(default)]
    pub output_file_path: String,
    /// Upload the finished feed to Google Cloud Storage.
    #[serde(rename = "useGCS", default)]
    pub use_gcs: bool,
    /// Destination bucket when `use_gcs` is set.
    #[serde(rename = "GCSBucket", default)]
    pub gcs_bucket: String,
}

impl Config {
    /// Read, parse, and validate a config file.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::parse(&text, ConfigFormat::from_path(path))?;
        info!(query = %config.search_query, service = %config.search_service, "Loaded configuration");
        Ok(config)
    }

    /// Parse and validate config text.
    pub fn parse(text: &str, format: ConfigFormat) -> Result<Self, ConfigError> {
        let config: Config = match format {
            ConfigFormat::Json => serde_json::from_str(text)?,
            ConfigFormat::Yaml => serde_yaml::from_str(text)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check that every required parameter is present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.search_query.trim().is_empty() {
            return Err(ConfigError::Missing("search_query"));
        }
        if self.output_file_path.trim().is_empty() {
            return Err(ConfigError::Missing("output_file_path"));
        }
        if self.use_gcs && self.gcs_bucket.trim().is_empty() {
            return Err(ConfigError::Missing("GCSBucket"));
        }
        Ok(())
    }

    /// The search this config describes.
    pub fn search_target(&self) -> SearchTarget {
        SearchTarget::new(
            self.search_query.clone(),
            self.search_service.clone(),
            self.result_type.clone(),
        )
    }

    /// Output path with `~` expanded against `$HOME`.
    pub fn output_path(&self) -> Result<PathBuf, ConfigError> {
        self.output_path_with_home(home_dir().as_deref())
    }

    fn output_path_with_home(&self, home: Option<&Path>) -> Result<PathBuf, ConfigError> {
        expand_home(&self.output_file_path, home)
            .ok_or_else(|| ConfigError::HomeUnavailable(self.output_file_path.clone()))
    }

    /// Name of the uploaded object.
    pub fn object_name(&self) -> String {
        object_name_for(&self.search_query)
    }
}
