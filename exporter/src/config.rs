//! Exporter configuration
//!
//! Built-in defaults, then an optional TOML file, then `OSPROM_*`
//! environment variables (`__` separates nested keys, e.g.
//! `OSPROM_PROMETHEUS__INDICES=false`).

use crate::catalog::{validate_prefix, CatalogError};
use crate::settings::ExporterSettings;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const ENV_PREFIX: &str = "OSPROM";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid listen address [{0}]")]
    ListenAddr(String),

    #[error("invalid metric prefix")]
    MetricPrefix(#[source] CatalogError),

    #[error("scrape timeout must be at least one second")]
    ScrapeTimeout,

    #[error("basic auth needs both a username and a password")]
    PartialAuth,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExporterConfig {
    /// Listen address for the HTTP server
    pub listen_addr: String,

    /// Base URL of the cluster's REST API
    pub cluster_url: String,

    /// Optional basic auth against the cluster
    pub username: Option<String>,
    pub password: Option<String>,

    /// Prepended to every cluster metric name
    pub metric_prefix: String,

    pub scrape_timeout_secs: u64,

    pub log_format: LogFormat,

    /// Initial values of the dynamic settings
    pub prometheus: ExporterSettings,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:9114".to_string(),
            cluster_url: "http://127.0.0.1:9200".to_string(),
            username: None,
            password: None,
            metric_prefix: "opensearch_".to_string(),
            scrape_timeout_secs: 30,
            log_format: LogFormat::Text,
            prometheus: ExporterSettings::default(),
        }
    }
}

impl ExporterConfig {
    /// Load from `path` (if any) and the `OSPROM_*` environment, then
    /// validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, ENV_PREFIX)
    }

    fn load_with_env(path: Option<&Path>, env_prefix: &str) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }
        let config: Self = builder
            .add_source(
                Environment::with_prefix(env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.socket_addr()?;
        validate_prefix(&self.metric_prefix).map_err(ConfigError::MetricPrefix)?;
        if self.scrape_timeout_secs == 0 {
            return Err(ConfigError::ScrapeTimeout);
        }
        if self.username.is_some() != self.password.is_some() {
            return Err(ConfigError::PartialAuth);
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.listen_addr
            .parse()
            .map_err(|_| ConfigError::ListenAddr(self.listen_addr.clone()))
    }

    pub fn scrape_timeout(&self) -> Duration {
        Duration::from_secs(self.scrape_timeout_secs)
    }

    pub fn basic_auth(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }
}
