//! Client configuration.
//!
//! # Design
//! `Config` is a plain value: built once, moved into `YooKassa::new`, never
//! changed afterwards. Defaults point at the production API. Setters consume
//! and return `self` so a configuration reads as one expression.

use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_BASE_HOST: &str = "https://api.yookassa.ru";
pub const DEFAULT_BASE_PATH: &str = "/v3/";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

pub const ENV_SHOP_ID: &str = "YOOKASSA_SHOP_ID";
pub const ENV_SECRET_KEY: &str = "YOOKASSA_SECRET_KEY";
pub const ENV_BASE_HOST: &str = "YOOKASSA_BASE_HOST";
pub const ENV_BASE_PATH: &str = "YOOKASSA_BASE_PATH";
pub const ENV_TIMEOUT_SECS: &str = "YOOKASSA_TIMEOUT_SECS";
pub const ENV_DEBUG: &str = "YOOKASSA_DEBUG";

/// Errors from `Config::from_env`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    Missing(&'static str),

    #[error("environment variable {var} has invalid value {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Shop credentials and connection settings.
#[derive(Clone)]
pub struct Config {
    pub shop_id: String,
    pub secret_key: String,
    pub base_host: String,
    pub base_path: String,
    pub timeout: Duration,
    /// Log raw requests and responses at `debug` level.
    pub debug: bool,
}

impl Config {
    pub fn new(shop_id: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            shop_id: shop_id.into(),
            secret_key: secret_key.into(),
            base_host: DEFAULT_BASE_HOST.to_string(),
            base_path: DEFAULT_BASE_PATH.to_string(),
            timeout: DEFAULT_TIMEOUT,
            debug: false,
        }
    }

    pub fn with_base_host(mut self, base_host: impl Into<String>) -> Self {
        self.base_host = base_host.into();
        self
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Load configuration from `YOOKASSA_*` environment variables.
    ///
    /// Shop id and secret key are required. Host, path, timeout (whole
    /// seconds) and debug (`1`/`true`/`0`/`false`) fall back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let shop_id = lookup(ENV_SHOP_ID).ok_or(ConfigError::Missing(ENV_SHOP_ID))?;
        let secret_key = lookup(ENV_SECRET_KEY).ok_or(ConfigError::Missing(ENV_SECRET_KEY))?;
        let mut config = Config::new(shop_id, secret_key);

        if let Some(host) = lookup(ENV_BASE_HOST) {
            config.base_host = host;
        }
        if let Some(path) = lookup(ENV_BASE_PATH) {
            config.base_path = path;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            let secs = raw.trim().parse::<u64>().map_err(|_| ConfigError::Invalid {
                var: ENV_TIMEOUT_SECS,
                value: raw.clone(),
            })?;
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(raw) = lookup(ENV_DEBUG) {
            config.debug = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" | "" => false,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: ENV_DEBUG,
                        value: raw,
                    })
                }
            };
        }
        Ok(config)
    }
}

// Keeps the secret key out of logs and panic messages.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("shop_id", &self.shop_id)
            .field("secret_key", &"<redacted>")
            .field("base_host", &self.base_host)
            .field("base_path", &self.base_path)
            .field("timeout", &self.timeout)
            .field("debug", &self.debug)
            .finish()
    }
}
