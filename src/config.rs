//! Client configuration read from the environment.

use std::time::Duration;

use crate::error::ConfigError;

pub const ACCESS_TOKEN_ENV: &str = "GYAZO_ACCESS_TOKEN";
pub const UPLOAD_URL_ENV: &str = "GYAZO_UPLOAD_URL";
pub const TIMEOUT_ENV: &str = "GYAZO_TIMEOUT_SECS";

pub const DEFAULT_UPLOAD_URL: &str = "https://upload.gyazo.com/api/upload";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub access_token: String,
    pub upload_url: String,
    pub timeout: Duration,
}

impl ClientConfig {
    /// Load from `GYAZO_ACCESS_TOKEN` (required), `GYAZO_UPLOAD_URL` and
    /// `GYAZO_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let access_token = lookup(ACCESS_TOKEN_ENV)
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::MissingToken(ACCESS_TOKEN_ENV))?;

        let upload_url = lookup(UPLOAD_URL_ENV)
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_UPLOAD_URL.to_string());

        let timeout = match lookup(TIMEOUT_ENV).filter(|t| !t.is_empty()) {
            Some(raw) => raw
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| ConfigError::InvalidTimeout(raw))?,
            None => DEFAULT_TIMEOUT,
        };

        Ok(Self {
            access_token,
            upload_url,
            timeout,
        })
    }
}
