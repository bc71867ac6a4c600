// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava API client for fetching and updating activities.
//!
//! Handles:
//! - Activity detail fetching
//! - Activity description updates
//! - Rate limit and expired-token detection

use crate::error::AppError;
use crate::models::{DetailedActivity, Provider};
use crate::services::tokens::TokenService;
use crate::services::{http_client, FitnessProvider, DEFAULT_HTTP_TIMEOUT};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

pub const STRAVA_API_BASE: &str = "https://www.strava.com/api/v3";

/// Strava API client.
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    base_url: String,
}

impl StravaClient {
    pub fn new() -> Result<Self, AppError> {
        Self::with_base_url(STRAVA_API_BASE)
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

    /// Get a detailed activity by ID.
    pub async fn get_activity(
        &self,
        access_token: &str,
        activity_id: u64,
    ) -> Result<DetailedActivity, AppError> {
        let url = format!("{}/activities/{}", self.base_url, activity_id);

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::StravaApi(e.to_string()))?;

        self.check_response_json(response).await
    }

    /// Replace an activity's description.
    ///
    /// Strava accepts the new description as a query parameter on the PUT.
    pub async fn update_activity_description(
        &self,
        access_token: &str,
        activity_id: u64,
        description: &str,
    ) -> Result<(), AppError> {
        let url = format!("{}/activities/{}", self.base_url, activity_id);

        let response = self
            .http
            .put(&url)
            .bearer_auth(access_token)
            .query(&[("description", description)])
            .send()
            .await
            .map_err(|e| AppError::StravaApi(e.to_string()))?;

        self.check_response(response).await
    }

    /// Check response status and return error if not successful.
    async fn check_response(&self, response: reqwest::Response) -> Result<(), AppError> {
        if response.status().is_success() {
            return Ok(());
        }
        Err(Self::status_error(response).await)
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Decode(format!("Strava JSON parse error: {}", e)))
    }

    async fn status_error(response: reqwest::Response) -> AppError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        match status.as_u16() {
            429 => {
                tracing::warn!("Strava rate limit hit (429)");
                AppError::StravaApi(AppError::RATE_LIMIT.to_string())
            }
            401 => AppError::StravaApi(AppError::TOKEN_ERROR.to_string()),
            404 => AppError::NotFound(format!("Strava resource: {}", body)),
            _ => AppError::StravaApi(format!("HTTP {}: {}", status, body)),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// StravaService - client plus token management
// ─────────────────────────────────────────────────────────────────────────────

/// Fitness provider backed by the Strava API.
#[derive(Clone)]
pub struct StravaService {
    client: StravaClient,
    tokens: TokenService,
}

impl StravaService {
    pub fn new(client: StravaClient, tokens: TokenService) -> Self {
        Self { client, tokens }
    }

    fn observe<T>(&self, user_id: i64, result: Result<T, AppError>) -> Result<T, AppError> {
        if matches!(&result, Err(e) if e.is_token_error()) {
            self.tokens.invalidate(user_id, Provider::Strava);
        }
        result
    }
}

#[async_trait]
impl FitnessProvider for StravaService {
    async fn get_activity(
        &self,
        user_id: i64,
        activity_id: u64,
    ) -> Result<DetailedActivity, AppError> {
        let token = self
            .tokens
            .get_valid_access_token(user_id, Provider::Strava)
            .await?;
        let result = self.client.get_activity(&token, activity_id).await;
        self.observe(user_id, result)
    }

    async fn update_activity_description(
        &self,
        user_id: i64,
        activity_id: u64,
        description: &str,
    ) -> Result<(), AppError> {
        let token = self
            .tokens
            .get_valid_access_token(user_id, Provider::Strava)
            .await?;
        let result = self
            .client
            .update_activity_description(&token, activity_id, description)
            .await;
        self.observe(user_id, result)
    }
}
