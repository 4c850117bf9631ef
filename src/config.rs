//! # Verifier Configuration
//!
//! Centralized configuration for the verification engine: API base URL,
//! HTTP timeout and client device class. Loaded from environment variables
//! and validated at startup so misconfiguration fails fast instead of
//! surfacing mid-attempt.

use std::env;

use serde::{Deserialize, Serialize};

/// Errors raised while loading or validating configuration
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A required environment variable is missing
    MissingVar { name: &'static str },
    /// A setting is present but invalid
    Invalid { message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVar { name } => {
                write!(f, "Required environment variable {} is not set", name)
            }
            ConfigError::Invalid { message } => write!(f, "Invalid configuration: {}", message),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Base URL of the verification API
    pub base_url: String,
    /// HTTP client timeout in seconds
    pub http_timeout_secs: u64,
    /// Whether this client counts as mobile for compression policy
    pub is_mobile: bool,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            http_timeout_secs: 30,
            is_mobile: false,
        }
    }
}

impl VerifierConfig {
    /// Load configuration from environment variables.
    ///
    /// `VERIFY_API_BASE_URL` is required. `HTTP_CLIENT_TIMEOUT_SECS` defaults
    /// to 30; `CLIENT_PROFILE=mobile` enables the mobile compression policy.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = env::var("VERIFY_API_BASE_URL")
            .map_err(|_| ConfigError::MissingVar {
                name: "VERIFY_API_BASE_URL",
            })?;

        let http_timeout_secs = match env::var("HTTP_CLIENT_TIMEOUT_SECS") {
            Ok(raw) => raw.parse::<u64>().map_err(|_| ConfigError::Invalid {
                message: "HTTP_CLIENT_TIMEOUT_SECS must be a valid number of seconds".to_string(),
            })?,
            Err(_) => 30,
        };

        let is_mobile = env::var("CLIENT_PROFILE")
            .map(|profile| profile.eq_ignore_ascii_case("mobile"))
            .unwrap_or(false);

        let config = Self {
            base_url,
            http_timeout_secs,
            is_mobile,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                message: "base URL cannot be empty".to_string(),
            });
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ConfigError::Invalid {
                message: "base URL must start with 'http://' or 'https://'".to_string(),
            });
        }

        if self.http_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                message: "HTTP timeout cannot be 0".to_string(),
            });
        }

        if self.http_timeout_secs > 300 {
            return Err(ConfigError::Invalid {
                message: "HTTP timeout cannot be greater than 300 seconds".to_string(),
            });
        }

        Ok(())
    }
}
