//! Process configuration.
//!
//! Loaded from environment variables over compiled defaults. Invalid
//! values fall back silently; a missing bearer credential is the one
//! hard error, because the relay is useless without it.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for the relay process.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Host to bind (default `"0.0.0.0"`).
    pub host: String,
    /// Port to bind (default `8080`).
    pub port: u16,
    /// Bearer credential for upstream requests.
    pub api_token: String,
    /// Base URL of the upstream API.
    pub upstream_base_url: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            api_token: String::new(),
            upstream_base_url: "https://api.twitter.com".into(),
        }
    }
}

/// Errors produced while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `API_TOKEN` was not set or was empty.
    #[error("the API_TOKEN environment variable is missing")]
    MissingToken,
}

impl RelayConfig {
    /// Load configuration from the process environment.
    ///
    /// Recognized variables: `HOST`, `PORT`, `API_TOKEN`,
    /// `UPSTREAM_BASE_URL`. An unparseable `PORT` is ignored.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(host) = read_string(&lookup, "HOST") {
            config.host = host;
        }
        if let Some(port) = read_u16(&lookup, "PORT") {
            config.port = port;
        }
        if let Some(base) = read_string(&lookup, "UPSTREAM_BASE_URL") {
            config.upstream_base_url = base.trim_end_matches('/').to_owned();
        }
        match read_string(&lookup, "API_TOKEN") {
            Some(token) => config.api_token = token,
            None => return Err(ConfigError::MissingToken),
        }
        Ok(config)
    }
}

fn read_string(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn read_u16(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u16> {
    let raw = read_string(lookup, key)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            debug!(key, %raw, "ignoring unparseable env var");
            None
        }
    }
}
