//! Connection configuration.
//!
//! Loaded from a YAML file with environment variable overrides on top:
//! `TRUENAS_URL` and `TRUENAS_API_KEY` always win over file values, so a
//! checked-in config never needs to carry the credential.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ConfigError, ProvisionError, Result};

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for a TrueNAS appliance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the appliance, e.g. `https://nas.example.net`.
    pub url: String,
    /// API key used as the bearer credential.
    #[serde(default)]
    pub api_key: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Whether to verify the appliance's TLS certificate.
    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,
}

const fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

const fn default_verify_tls() -> bool {
    true
}

impl Config {
    /// Loads configuration from a YAML file and applies environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unparseable, or the
    /// result fails validation.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(ProvisionError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            ProvisionError::Config(ConfigError::ParseError {
                message: format!("Failed to read {}: {e}", path.display()),
            })
        })?;

        let mut config = Self::parse_yaml(&content)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Builds configuration from environment variables alone.
    ///
    /// # Errors
    ///
    /// Returns an error if `TRUENAS_URL` or `TRUENAS_API_KEY` is unset.
    pub fn from_env() -> Result<Self> {
        let url = require_env("TRUENAS_URL")?;
        let api_key = require_env("TRUENAS_API_KEY")?;
        let config = Self {
            url,
            api_key,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            verify_tls: true,
        };
        config.validate()?;
        Ok(config)
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| {
            ProvisionError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
            })
        })
    }

    /// Applies `TRUENAS_URL` and `TRUENAS_API_KEY` overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("TRUENAS_URL") {
            debug!("Overriding url from environment");
            self.url = url;
        }
        if let Ok(api_key) = std::env::var("TRUENAS_API_KEY") {
            debug!("Overriding api_key from environment");
            self.api_key = api_key;
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(validation_error(
                "url",
                format!("Expected an http(s) URL, got {:?}", self.url),
            ));
        }
        if self.api_key.trim().is_empty() {
            return Err(validation_error("api_key", "API key must not be empty"));
        }
        if self.timeout_secs == 0 {
            return Err(validation_error("timeout_secs", "Timeout must be non-zero"));
        }
        Ok(())
    }
}

/// Loads the `.env` file from the working directory if present.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => info!("Loaded environment from: {}", path.display()),
        Err(_) => debug!(".env file not found"),
    }
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| {
        ProvisionError::Config(ConfigError::MissingEnvVar {
            name: name.to_string(),
        })
    })
}

fn validation_error(field: &str, message: impl Into<String>) -> ProvisionError {
    ProvisionError::Config(ConfigError::validation(message, field))
}
