// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Token store: users and their OAuth tokens.

use crate::db::Database;
use crate::error::AppError;
use crate::models::{NewUser, OAuthToken, Provider, User};
use chrono::{DateTime, Utc};

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    strava_id: i64,
    spotify_id: Option<String>,
    first_name: String,
    last_name: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            strava_id: row.strava_id,
            spotify_id: row.spotify_id,
            first_name: row.first_name,
            last_name: row.last_name,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TokenRow {
    user_id: i64,
    provider: String,
    access_token: String,
    refresh_token: String,
    token_type: String,
    expires_at: i64,
}

impl TryFrom<TokenRow> for OAuthToken {
    type Error = AppError;

    fn try_from(row: TokenRow) -> Result<Self, Self::Error> {
        let provider = row.provider.parse::<Provider>().map_err(AppError::Database)?;
        let expires_at = DateTime::<Utc>::from_timestamp(row.expires_at, 0).ok_or_else(|| {
            AppError::Database(format!("invalid token expiry: {}", row.expires_at))
        })?;
        Ok(OAuthToken {
            user_id: row.user_id,
            provider,
            access_token: row.access_token,
            refresh_token: row.refresh_token,
            token_type: row.token_type,
            expires_at,
        })
    }
}

impl Database {
    // ─── User Operations ─────────────────────────────────────────

    /// Create a user and return its internal ID.
    pub async fn insert_user(&self, user: &NewUser) -> Result<i64, AppError> {
        let result = sqlx::query(
            "INSERT INTO users (strava_id, first_name, last_name, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(user.strava_id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(Utc::now().timestamp())
        .execute(self.pool())
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Record the Spotify account a user connected.
    pub async fn link_spotify_account(&self, user_id: i64, spotify_id: &str) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE users SET spotify_id = ? WHERE id = ?")
            .bind(spotify_id)
            .bind(user_id)
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User {}", user_id)));
        }
        Ok(())
    }

    /// Get a user by internal ID.
    pub async fn get_user(&self, user_id: i64) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, strava_id, spotify_id, first_name, last_name FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(User::from))
    }

    /// Get a user by their Strava athlete ID.
    pub async fn get_user_by_strava_id(&self, strava_id: i64) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, strava_id, spotify_id, first_name, last_name FROM users WHERE strava_id = ?",
        )
        .bind(strava_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(User::from))
    }

    /// IDs of every user with a Spotify token on file.
    pub async fn get_user_ids_with_active_spotify(&self) -> Result<Vec<i64>, AppError> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT user_id FROM oauth_tokens WHERE provider = ? ORDER BY user_id",
        )
        .bind(Provider::Spotify.as_str())
        .fetch_all(self.pool())
        .await?;
        Ok(ids)
    }

    // ─── Token Operations ────────────────────────────────────────

    /// Get the token record for a user and provider.
    pub async fn get_token(
        &self,
        user_id: i64,
        provider: Provider,
    ) -> Result<Option<OAuthToken>, AppError> {
        let row = sqlx::query_as::<_, TokenRow>(
            "SELECT user_id, provider, access_token, refresh_token, token_type, expires_at \
             FROM oauth_tokens WHERE user_id = ? AND provider = ?",
        )
        .bind(user_id)
        .bind(provider.as_str())
        .fetch_optional(self.pool())
        .await?;
        row.map(OAuthToken::try_from).transpose()
    }

    /// Store a new token record. Fails if one already exists for the
    /// (user, provider) pair.
    pub async fn insert_token(&self, token: &OAuthToken) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO oauth_tokens \
             (user_id, provider, access_token, refresh_token, token_type, expires_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(token.user_id)
        .bind(token.provider.as_str())
        .bind(&token.access_token)
        .bind(&token.refresh_token)
        .bind(&token.token_type)
        .bind(token.expires_at.timestamp())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Replace an existing token record after an exchange or refresh.
    pub async fn update_token(&self, token: &OAuthToken) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE oauth_tokens \
             SET access_token = ?, refresh_token = ?, token_type = ?, expires_at = ? \
             WHERE user_id = ? AND provider = ?",
        )
        .bind(&token.access_token)
        .bind(&token.refresh_token)
        .bind(&token.token_type)
        .bind(token.expires_at.timestamp())
        .bind(token.user_id)
        .bind(token.provider.as_str())
        .execute(self.pool())
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "{} token for user {}",
                token.provider, token.user_id
            )));
        }
        Ok(())
    }
}
