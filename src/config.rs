//! Client configuration parsed from environment variables.

use std::path::PathBuf;

pub const DEFAULT_API_URL: &str = "http://localhost:3001/api/v1";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid API URL '{0}': expected http:// or https://")]
    InvalidApiUrl(String),
    #[error("invalid value for {var}: {value}")]
    InvalidNumber { var: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// API base including the version prefix, without a trailing slash.
    pub base_url: String,
    /// Directory for persisted session state. `None` keeps state in memory.
    pub state_dir: Option<PathBuf>,
    pub timeouts: Timeouts,
}

impl ClientConfig {
    /// Build a config for `base_url` with default timeouts and in-memory state.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is not an http(s) URL.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self { base_url: normalize_base_url(base_url)?, state_dir: None, timeouts: Timeouts::default() })
    }

    /// Build typed client config from environment variables.
    ///
    /// Optional:
    /// - `GALLERY_API_URL`: API base, default `http://localhost:3001/api/v1`
    /// - `GALLERY_STATE_DIR`: directory for the persisted session
    /// - `GALLERY_REQUEST_TIMEOUT_SECS`: default 30
    /// - `GALLERY_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns an error if the URL or a timeout value is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw_url = std::env::var("GALLERY_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let base_url = normalize_base_url(&raw_url)?;
        let state_dir = std::env::var("GALLERY_STATE_DIR")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);
        let timeouts = Timeouts {
            request_secs: env_parse_u64("GALLERY_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?,
            connect_secs: env_parse_u64("GALLERY_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)?,
        };
        Ok(Self { base_url, state_dir, timeouts })
    }
}

fn env_parse_u64(var: &'static str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => parse_u64(var, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_u64(var: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidNumber { var, value: raw.to_string() })
}

pub(crate) fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ConfigError::InvalidApiUrl(raw.to_string()));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
