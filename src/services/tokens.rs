// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth access token lifecycle for Strava and Spotify.
//!
//! Tokens live in the token store; this service hands out a valid access
//! token per call, refreshing through the provider's token endpoint when the
//! stored one is about to expire.

use crate::db::Database;
use crate::error::AppError;
use crate::models::{OAuthToken, Provider};
use crate::services::{http_client, DEFAULT_HTTP_TIMEOUT};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Margin before token expiration when we proactively refresh (5 minutes).
const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

pub const STRAVA_TOKEN_URL: &str = "https://www.strava.com/oauth/token";
pub const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Cached access token with expiry information.
#[derive(Clone)]
pub struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

type CacheKey = (i64, Provider);

/// Shared token cache type.
pub type TokenCache = Arc<DashMap<CacheKey, CachedToken>>;

/// Shared refresh locks type.
pub type RefreshLocks = Arc<DashMap<CacheKey, Arc<Mutex<()>>>>;

/// Client credentials and token endpoint for one provider.
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: String,
}

impl ClientCredentials {
    pub fn new(client_id: String, client_secret: String, token_url: &str) -> Self {
        Self {
            client_id,
            client_secret,
            token_url: token_url.to_string(),
        }
    }
}

/// Token refresh response. Strava sends `expires_at`, Spotify sends
/// `expires_in` and may omit a new refresh token.
#[derive(Debug, Clone, Deserialize)]
struct TokenRefreshResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Hands out valid access tokens for (user, provider) pairs.
///
/// This service encapsulates:
/// - Token lookup in the token store
/// - Automatic refresh when expiring (with 5-minute margin)
/// - In-memory caching shared by every sampler and reconciler task
/// - Per-(user, provider) locking to prevent duplicate refresh calls
#[derive(Clone)]
pub struct TokenService {
    http: reqwest::Client,
    db: Database,
    strava: ClientCredentials,
    spotify: ClientCredentials,
    token_cache: TokenCache,
    refresh_locks: RefreshLocks,
}

impl TokenService {
    pub fn new(
        db: Database,
        strava: ClientCredentials,
        spotify: ClientCredentials,
    ) -> Result<Self, AppError> {
        Ok(Self {
            http: http_client(DEFAULT_HTTP_TIMEOUT)?,
            db,
            strava,
            spotify,
            token_cache: Arc::new(DashMap::new()),
            refresh_locks: Arc::new(DashMap::new()),
        })
    }

    fn credentials(&self, provider: Provider) -> &ClientCredentials {
        match provider {
            Provider::Strava => &self.strava,
            Provider::Spotify => &self.spotify,
        }
    }

    /// Get a valid (non-expired) access token for the given user.
    ///
    /// 1. Check in-memory cache (fast path - no I/O)
    /// 2. Acquire per-key lock so only one task refreshes
    /// 3. Re-check cache after lock (another task may have refreshed)
    /// 4. Load from the token store; return it if still valid
    /// 5. Otherwise refresh with the provider and persist the new token
    pub async fn get_valid_access_token(
        &self,
        user_id: i64,
        provider: Provider,
    ) -> Result<String, AppError> {
        let key = (user_id, provider);
        let now = Utc::now();
        let margin = Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);

        if let Some(cached) = self.token_cache.get(&key) {
            if now + margin < cached.expires_at {
                return Ok(cached.access_token.clone());
            }
        }

        let lock = self
            .refresh_locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let _guard = lock.lock().await;

        if let Some(cached) = self.token_cache.get(&key) {
            if now + margin < cached.expires_at {
                return Ok(cached.access_token.clone());
            }
        }

        let token = self
            .db
            .get_token(user_id, provider)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} token for user {}", provider, user_id)))?;

        if now + margin < token.expires_at {
            self.cache(key, &token);
            return Ok(token.access_token);
        }

        tracing::info!(user_id, %provider, "Access token expired, refreshing");

        let refreshed = self.refresh(&token).await?;
        self.db.update_token(&refreshed).await?;
        self.cache(key, &refreshed);

        tracing::info!(user_id, %provider, "Token refreshed and cached");
        Ok(refreshed.access_token)
    }

    /// Drop a cached token, e.g. after the provider answered 401.
    pub fn invalidate(&self, user_id: i64, provider: Provider) {
        if self.token_cache.remove(&(user_id, provider)).is_some() {
            tracing::debug!(user_id, %provider, "Cached token invalidated");
        }
    }

    fn cache(&self, key: CacheKey, token: &OAuthToken) {
        self.token_cache.insert(
            key,
            CachedToken {
                access_token: token.access_token.clone(),
                expires_at: token.expires_at,
            },
        );
    }

    /// Exchange the stored refresh token for a new access token.
    async fn refresh(&self, token: &OAuthToken) -> Result<OAuthToken, AppError> {
        let creds = self.credentials(token.provider);
        let api_error = |msg: String| match token.provider {
            Provider::Strava => AppError::StravaApi(msg),
            Provider::Spotify => AppError::SpotifyApi(msg),
        };

        let request = self.http.post(&creds.token_url);
        let request = match token.provider {
            Provider::Strava => request.form(&[
                ("client_id", creds.client_id.as_str()),
                ("client_secret", creds.client_secret.as_str()),
                ("refresh_token", token.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ]),
            Provider::Spotify => request
                .basic_auth(&creds.client_id, Some(&creds.client_secret))
                .form(&[
                    ("refresh_token", token.refresh_token.as_str()),
                    ("grant_type", "refresh_token"),
                ]),
        };

        let response = request
            .send()
            .await
            .map_err(|e| api_error(format!("Token refresh request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(user_id = token.user_id, provider = %token.provider, %status, body = %body, "Token refresh failed");
            return Err(api_error(format!("Token refresh failed with HTTP {}: {}", status, body)));
        }

        let body: TokenRefreshResponse = response
            .json()
            .await
            .map_err(|e| AppError::Decode(format!("token refresh response: {}", e)))?;

        let expires_at = match (body.expires_at, body.expires_in) {
            (Some(at), _) => DateTime::from_timestamp(at, 0),
            (None, Some(secs)) => Some(Utc::now() + Duration::seconds(secs)),
            (None, None) => None,
        }
        .ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "Token refresh response for {} carried no expiry",
                token.provider
            ))
        })?;

        Ok(OAuthToken {
            user_id: token.user_id,
            provider: token.provider,
            access_token: body.access_token,
            refresh_token: body
                .refresh_token
                .unwrap_or_else(|| token.refresh_token.clone()),
            token_type: body.token_type.unwrap_or_else(|| token.token_type.clone()),
            expires_at,
        })
    }
}
