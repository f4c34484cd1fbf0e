//! Client configuration.
//!
//! `ClientConfig` deserializes from any serde source with defaults for every
//! field, or loads from the process environment:
//!
//! | Variable                | Default                      |
//! |-------------------------|------------------------------|
//! | `BILLWERK_API_URL`      | `https://api.reepay.com/v1`  |
//! | `BILLWERK_TIMEOUT_SECS` | `30`                         |

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "https://api.reepay.com/v1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const ENV_BASE_URL: &str = "BILLWERK_API_URL";
const ENV_TIMEOUT_SECS: &str = "BILLWERK_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Whole-request timeout applied by the transport.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            ..Self::default()
        }
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup, falling back to defaults
    /// for absent keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(base_url) = lookup(ENV_BASE_URL) {
            config.base_url = base_url;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            config.timeout_secs = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_TIMEOUT_SECS,
                value: raw.clone(),
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(self.base_url.clone()));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: ENV_TIMEOUT_SECS,
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}
