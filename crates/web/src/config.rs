//! Application configuration, read from a TOML file.
//!
//! ```toml
//! [server]
//! address = "0.0.0.0:8080"
//!
//! [app]
//! url = "http://localhost:8080/newsdesk"
//! cors_origin = "*"
//!
//! [origin]
//! origin = "http://localhost:8080"
//! referer = "http://localhost:8080/newsdesk/"
//!
//! [jwt]
//! key = "change-me"
//! issuer = "http://localhost:8080"
//! app = "newsdesk"
//!
//! [log]
//! level = "info"
//! ```
//!
//! Every field has a default. `NEWSDESK_ADDRESS` and `NEWSDESK_URL` override
//! the server address and the application URL, `NEWSDESK_JWT_KEY` the api
//! token key.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use newsdesk_http::codec::DEFAULT_MAX_BODY_SIZE;

pub const ADDRESS_ENV: &str = "NEWSDESK_ADDRESS";
pub const URL_ENV: &str = "NEWSDESK_URL";
pub const JWT_KEY_ENV: &str = "NEWSDESK_JWT_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("can't read config file '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("can't parse config: {source}")]
    Parse {
        #[from]
        source: toml::de::Error,
    },

    #[error("unknown log level '{level}'")]
    InvalidLogLevel { level: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub app: AppSection,
    pub origin: OriginConfig,
    pub jwt: JwtConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: String,
    pub max_body_size: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { address: "0.0.0.0:8080".to_owned(), max_body_size: DEFAULT_MAX_BODY_SIZE }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppSection {
    /// Public URL of the application. Its path is the route prefix.
    pub url: String,
    /// Value of `Access-Control-Allow-Origin` on responses that don't set their own.
    pub cors_origin: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self { url: "http://localhost:8080".to_owned(), cors_origin: "*".to_owned() }
    }
}

/// The `Origin` and `Referer` values accepted from the website.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OriginConfig {
    pub origin: String,
    pub referer: String,
}

/// Api token settings. An empty key makes every token check fail with `500`.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    pub key: String,
    pub issuer: String,
    pub app: String,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("key", &if self.key.is_empty() { "" } else { "***" })
            .field("issuer", &self.issuer)
            .field("app", &self.app)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: "info".to_owned() }
    }
}

impl LogConfig {
    pub fn level(&self) -> Result<Level, ConfigError> {
        Level::from_str(self.level.trim()).map_err(|_e| ConfigError::InvalidLogLevel { level: self.level.clone() })
    }

    /// Installs the global `fmt` subscriber. A subscriber set earlier is kept.
    pub fn init(&self) -> Result<(), ConfigError> {
        let subscriber = FmtSubscriber::builder().with_max_level(self.level()?).finish();
        if tracing::subscriber::set_global_default(subscriber).is_err() {
            tracing::debug!("global subscriber already set, keeping it");
        }
        Ok(())
    }
}

impl AppConfig {
    /// Reads `path` and applies the environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let config = Self::from_toml(&content)?;
        Ok(config.with_env_overrides(|name| std::env::var(name).ok()))
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config.log.level()?;
        Ok(config)
    }

    /// Replaces the address, URL and token key with the values `lookup` finds
    /// for [`ADDRESS_ENV`], [`URL_ENV`] and [`JWT_KEY_ENV`].
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(address) = lookup(ADDRESS_ENV).filter(|value| !value.is_empty()) {
            self.server.address = address;
        }
        if let Some(url) = lookup(URL_ENV).filter(|value| !value.is_empty()) {
            self.app.url = url;
        }
        if let Some(key) = lookup(JWT_KEY_ENV).filter(|value| !value.is_empty()) {
            self.jwt.key = key;
        }
        self
    }
}
