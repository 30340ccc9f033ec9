//! Environment driven configuration.
//!
//! Every setting has a built-in default; the environment variables listed
//! here override it, and the command line overrides the environment.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use log::warn;

/// Backend base URL used when nothing else is configured.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
/// Directory that web-style asset paths such as `/logo.png` resolve against.
pub const DEFAULT_ASSET_ROOT: &str = "public";
/// Request timeout used when nothing else is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub const API_BASE_URL_ENV: &str = "RETURNS_API_BASE_URL";
pub const API_TOKEN_ENV: &str = "RETURNS_API_TOKEN";
pub const API_TIMEOUT_ENV: &str = "RETURNS_API_TIMEOUT_SECS";
pub const ASSET_ROOT_ENV: &str = "REPORT_ASSET_ROOT";

/// Connection settings of the returns backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Scheme, host and port of the backend, without a trailing slash.
    pub base_url: String,
    /// Bearer token sent in the `Authorization` header.
    pub token: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE_URL)
    }
}

impl ClientConfig {
    /// Creates a configuration for the backend at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            token: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Reads the configuration from the environment.
    pub fn from_env() -> Self {
        let mut config = Self::new(
            env_string(API_BASE_URL_ENV).unwrap_or_else(|| DEFAULT_API_BASE_URL.to_owned()),
        );
        config.token = env_string(API_TOKEN_ENV);

        if let Some(raw) = env_string(API_TIMEOUT_ENV) {
            match raw.parse::<u64>() {
                Ok(secs) => config.timeout = Duration::from_secs(secs),
                Err(err) => warn!("Ignoring {API_TIMEOUT_ENV}={raw}: {err}"),
            }
        }

        config
    }

    /// Sets the bearer token and returns the updated configuration.
    pub fn with_token(mut self, token: impl Into<Option<String>>) -> Self {
        self.token = token.into().filter(|token| !token.trim().is_empty());
        self
    }

    /// Sets the request timeout and returns the updated configuration.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Absolute URL of `path` on the backend.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

/// Asset root taken from the environment, or [`DEFAULT_ASSET_ROOT`].
pub fn asset_root_from_env() -> PathBuf {
    env_string(ASSET_ROOT_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ASSET_ROOT))
}

fn env_string(var: &str) -> Option<String> {
    env::var(var)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}
