// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types.
//!
//! Nothing in the sampler or reconciler propagates these past a log line;
//! the variants exist so callers can tell a skipped tick from an aborted one.

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Strava API error: {0}")]
    StravaApi(String),

    #[error("Spotify API error: {0}")]
    SpotifyApi(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Message used when a provider rejects the access token (HTTP 401).
    pub const TOKEN_ERROR: &'static str = "Token expired or invalid";

    /// Message used when a provider rate limits us (HTTP 429).
    pub const RATE_LIMIT: &'static str = "Rate limit exceeded";

    /// True if a provider rejected the access token, meaning any cached copy
    /// should be dropped before the next call.
    pub fn is_token_error(&self) -> bool {
        match self {
            AppError::StravaApi(msg) | AppError::SpotifyApi(msg) => {
                msg == Self::TOKEN_ERROR || msg.contains("401")
            }
            _ => false,
        }
    }

    /// True for malformed or unexpected-shape provider payloads.
    pub fn is_decode_error(&self) -> bool {
        matches!(self, AppError::Decode(_))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("row".to_string()),
            other => AppError::Database(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::Database(format!("Migration failed: {}", err))
    }
}

/// Result type alias used across the crate.
pub type Result<T> = std::result::Result<T, AppError>;
