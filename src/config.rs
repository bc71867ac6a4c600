// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.

use std::env;
use std::time::Duration;

/// Default Spotify playback polling interval.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Strava OAuth client ID (public)
    pub strava_client_id: String,
    /// Spotify OAuth client ID (public)
    pub spotify_client_id: String,
    /// SQLite connection string
    pub database_url: String,
    /// Bind host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Seconds between two playback polls for one user
    pub spotify_poll_interval_secs: u64,

    // --- Secrets ---
    /// Strava OAuth client secret
    pub strava_client_secret: String,
    /// Spotify OAuth client secret
    pub spotify_client_secret: String,
    /// Webhook verification token
    pub webhook_verify_token: String,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            strava_client_id: "test_client_id".to_string(),
            spotify_client_id: "test_spotify_client_id".to_string(),
            database_url: "sqlite::memory:".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8080,
            spotify_poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            strava_client_secret: "test_secret".to_string(),
            spotify_client_secret: "test_spotify_secret".to_string(),
            webhook_verify_token: "test_verify_token".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is read first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let spotify_poll_interval_secs = match env::var("SPOTIFY_POLL_INTERVAL_SECS") {
            Ok(raw) => parse_interval(&raw)?,
            Err(_) => DEFAULT_POLL_INTERVAL_SECS,
        };

        Ok(Self {
            strava_client_id: required("STRAVA_CLIENT_ID")?,
            spotify_client_id: required("SPOTIFY_CLIENT_ID")?,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:soundtrack.db?mode=rwc".to_string()),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .map_err(|e| ConfigError::Invalid("PORT", format!("{}", e)))?,
            spotify_poll_interval_secs,

            strava_client_secret: required("STRAVA_CLIENT_SECRET")?,
            spotify_client_secret: required("SPOTIFY_CLIENT_SECRET")?,
            webhook_verify_token: required("WEBHOOK_VERIFY_TOKEN")?,
        })
    }

    /// Address the HTTP server binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Polling interval as a `Duration`.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.spotify_poll_interval_secs)
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .map(|v| v.trim().to_string())
        .map_err(|_| ConfigError::Missing(name))
}

fn parse_interval(raw: &str) -> Result<u64, ConfigError> {
    let secs: u64 = raw
        .trim()
        .parse()
        .map_err(|e| ConfigError::Invalid("SPOTIFY_POLL_INTERVAL_SECS", format!("{}", e)))?;
    if secs == 0 {
        return Err(ConfigError::Invalid(
            "SPOTIFY_POLL_INTERVAL_SECS",
            "must be greater than zero".to_string(),
        ));
    }
    Ok(secs)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        // Set required env vars for test
        env::set_var("STRAVA_CLIENT_ID", "test_id");
        env::set_var("STRAVA_CLIENT_SECRET", " test_secret\n");
        env::set_var("SPOTIFY_CLIENT_ID", "spotify_id");
        env::set_var("SPOTIFY_CLIENT_SECRET", "spotify_secret");
        env::set_var("WEBHOOK_VERIFY_TOKEN", "test_verify");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.strava_client_id, "test_id");
        assert_eq!(config.strava_client_secret, "test_secret");
        assert_eq!(config.spotify_client_id, "spotify_id");
        assert_eq!(config.poll_interval(), Duration::from_secs(config.spotify_poll_interval_secs));
    }

    #[test]
    fn test_parse_interval() {
        assert_eq!(parse_interval("30").unwrap(), 30);
        assert_eq!(parse_interval(" 5 ").unwrap(), 5);
        assert!(matches!(
            parse_interval("0"),
            Err(ConfigError::Invalid("SPOTIFY_POLL_INTERVAL_SECS", _))
        ));
        assert!(parse_interval("soon").is_err());
    }

    #[test]
    fn test_default_bind_address() {
        let config = Config::default();
        assert_eq!(config.bind_address(), "127.0.0.1:8080");
        assert_eq!(config.poll_interval(), Duration::from_secs(60));
    }
}
