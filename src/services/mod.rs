// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod reconciler;
pub mod sampler;
pub mod spotify;
pub mod strava;
pub mod supervisor;
pub mod tokens;

pub use reconciler::{EventReconciler, ReconcileOutcome};
pub use sampler::{PlaybackSampler, PollOutcome};
pub use spotify::{SpotifyClient, SpotifyService};
pub use strava::{StravaClient, StravaService};
pub use supervisor::Supervisor;
pub use tokens::{ClientCredentials, TokenService};

use crate::error::AppError;
use crate::models::{DetailedActivity, PlaybackState, PlaylistSummary};
use anyhow::Context;
use async_trait::async_trait;
use std::time::Duration;

/// Upper bound on a single provider request, connect through body.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client shared by the provider and token clients.
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, AppError> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("failed building provider HTTP client")?;
    Ok(client)
}

/// Source of real-time playback state and playlist metadata.
#[async_trait]
pub trait MusicProvider: Send + Sync {
    /// Current playback for a user; `None` when nothing is playing.
    async fn current_playback(&self, user_id: i64) -> Result<Option<PlaybackState>, AppError>;

    /// Playlist name and owner, looked up by the context's API href.
    async fn get_playlist(&self, user_id: i64, href: &str) -> Result<PlaylistSummary, AppError>;
}

/// Host of the user's workout activities.
#[async_trait]
pub trait FitnessProvider: Send + Sync {
    async fn get_activity(&self, user_id: i64, activity_id: u64)
        -> Result<DetailedActivity, AppError>;

    async fn update_activity_description(
        &self,
        user_id: i64,
        activity_id: u64,
        description: &str,
    ) -> Result<(), AppError>;
}
