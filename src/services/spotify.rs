// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Spotify Web API client for playback state and playlist metadata.

use crate::error::AppError;
use crate::models::{PlaybackState, PlaylistSummary, Provider};
use crate::services::tokens::TokenService;
use crate::services::{http_client, MusicProvider, DEFAULT_HTTP_TIMEOUT};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

pub const SPOTIFY_API_BASE: &str = "https://api.spotify.com/v1";

/// Fields requested when looking up a playlist for an annotation.
const PLAYLIST_FIELDS: &str = "name,owner.display_name";

/// Spotify API client.
#[derive(Clone)]
pub struct SpotifyClient {
    http: reqwest::Client,
    base_url: String,
}

impl SpotifyClient {
    pub fn new() -> Result<Self, AppError> {
        Self::with_base_url(SPOTIFY_API_BASE)
    }

    /// Point the client at a different API root (used by tests).
    pub fn with_base_url(base_url: &str) -> Result<Self, AppError> {
        Self::with_timeout(base_url, DEFAULT_HTTP_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, AppError> {
        Ok(Self {
            http: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Get the user's current playback state.
    ///
    /// Spotify answers 204 No Content when nothing is playing; that maps to
    /// `Ok(None)`.
    pub async fn current_playback(
        &self,
        access_token: &str,
    ) -> Result<Option<PlaybackState>, AppError> {
        let url = format!("{}/me/player", self.base_url);

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&[("additional_types", "track,episode")])
            .send()
            .await
            .map_err(|e| AppError::SpotifyApi(e.to_string()))?;

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        self.check_response_json(response).await.map(Some)
    }

    /// Get a playlist's name and owner.
    ///
    /// `href` is the context's Web API link as returned in the playback
    /// state, so it is used as-is rather than rebuilt from the base URL.
    pub async fn get_playlist(
        &self,
        access_token: &str,
        href: &str,
    ) -> Result<PlaylistSummary, AppError> {
        let response = self
            .http
            .get(href)
            .bearer_auth(access_token)
            .query(&[("fields", PLAYLIST_FIELDS)])
            .send()
            .await
            .map_err(|e| AppError::SpotifyApi(e.to_string()))?;

        self.check_response_json(response).await
    }

    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();

            if status == StatusCode::TOO_MANY_REQUESTS {
                tracing::warn!("Spotify rate limit hit (429)");
                return Err(AppError::SpotifyApi(AppError::RATE_LIMIT.to_string()));
            }
            if status == StatusCode::UNAUTHORIZED {
                return Err(AppError::SpotifyApi(AppError::TOKEN_ERROR.to_string()));
            }
            return Err(AppError::SpotifyApi(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Decode(format!("Spotify JSON parse error: {}", e)))
    }
}

/// Music provider backed by the Spotify Web API.
#[derive(Clone)]
pub struct SpotifyService {
    client: SpotifyClient,
    tokens: TokenService,
}

impl SpotifyService {
    pub fn new(client: SpotifyClient, tokens: TokenService) -> Self {
        Self { client, tokens }
    }

    async fn access_token(&self, user_id: i64) -> Result<String, AppError> {
        self.tokens
            .get_valid_access_token(user_id, Provider::Spotify)
            .await
    }

    fn observe<T>(&self, user_id: i64, result: Result<T, AppError>) -> Result<T, AppError> {
        if matches!(&result, Err(e) if e.is_token_error()) {
            self.tokens.invalidate(user_id, Provider::Spotify);
        }
        result
    }
}

#[async_trait]
impl MusicProvider for SpotifyService {
    async fn current_playback(&self, user_id: i64) -> Result<Option<PlaybackState>, AppError> {
        let token = self.access_token(user_id).await?;
        let result = self.client.current_playback(&token).await;
        self.observe(user_id, result)
    }

    async fn get_playlist(&self, user_id: i64, href: &str) -> Result<PlaylistSummary, AppError> {
        let token = self.access_token(user_id).await?;
        let result = self.client.get_playlist(&token, href).await;
        self.observe(user_id, result)
    }
}
