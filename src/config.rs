use crate::error::{AppError, Result};
use crate::services::lastfm::DEFAULT_API_URL;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub lastfm_api_key: String,
    pub lastfm_api_secret: String,
    /// Without a session key the relay only queues; drains start once one is set.
    pub lastfm_session_key: Option<String>,
    pub lastfm_api_url: String,
    pub proxy: Option<String>,
    pub drain_interval: Duration,
    pub drain_fail_fast: bool,
    pub server_host: String,
    pub server_port: u16,
    /// Allowed CORS origins (comma-separated). Use "*" for any origin (development only).
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from any variable source; `from_env` reads the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let optional = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |name: &str| {
            optional(name).ok_or_else(|| {
                AppError::Config(format!("{} environment variable must be set", name))
            })
        };

        let lastfm_api_key = required("LASTFM_API_KEY")?;
        let lastfm_api_secret = required("LASTFM_API_SECRET")?;

        let drain_interval_secs: u64 = optional("DRAIN_INTERVAL_SECS")
            .unwrap_or_else(|| "60".to_string())
            .parse()
            .map_err(|e| {
                AppError::Config(format!("DRAIN_INTERVAL_SECS must be a number of seconds: {}", e))
            })?;
        if drain_interval_secs == 0 {
            return Err(AppError::Config(
                "DRAIN_INTERVAL_SECS must be greater than zero".to_string(),
            ));
        }

        let cors_origins = optional("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:3000,http://localhost:8000".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Config {
            lastfm_api_key,
            lastfm_api_secret,
            lastfm_session_key: optional("LASTFM_SESSION_KEY"),
            lastfm_api_url: optional("LASTFM_API_URL")
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            proxy: optional("SCROBBLE_PROXY"),
            drain_interval: Duration::from_secs(drain_interval_secs),
            drain_fail_fast: optional("DRAIN_FAIL_FAST")
                .map(|v| parse_bool(&v))
                .unwrap_or(false),
            server_host: optional("SERVER_HOST")
                .unwrap_or_else(|| "0.0.0.0".to_string()),
            server_port: optional("SERVER_PORT")
                .unwrap_or_else(|| "8000".to_string())
                .parse()
                .unwrap_or(8000),
            cors_origins,
        })
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
