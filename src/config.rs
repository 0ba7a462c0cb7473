//! Configuration loader and validator for the WOZ→CMS sync job.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub source: Source,
    pub media: Media,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    #[serde(default)]
    pub force_update: bool,
}

/// Remote article source settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Source {
    pub base_url: String,
    pub page_limit: u32,
}

/// Media server settings for mirrored image uploads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Media {
    pub server_url: String,
    pub token: String,
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.app.data_dir)
    }

    /// SQLite URL for the CMS store, unless `DATABASE_URL` overrides it.
    pub fn database_url(&self) -> String {
        std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| format!("sqlite://{}/wozsync.db", self.app.data_dir))
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }

    if cfg.source.base_url.trim().is_empty() {
        return Err(ConfigError::Invalid("source.base_url must be non-empty"));
    }
    if cfg.source.page_limit == 0 {
        return Err(ConfigError::Invalid("source.page_limit must be > 0"));
    }

    if cfg.media.server_url.trim().is_empty() {
        return Err(ConfigError::Invalid("media.server_url must be non-empty"));
    }
    if cfg.media.token.trim().is_empty() {
        return Err(ConfigError::Invalid("media.token must be non-empty"));
    }

    Ok(())
}

/// Canonical example YAML, kept in sync with the schema above.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  force_update: false

source:
  base_url: "https://www.woz.ch/wepub/1.0/articles"
  page_limit: 10

media:
  server_url: "https://media.example.com"
  token: "MEDIA_SERVER_TOKEN"
"#
}
