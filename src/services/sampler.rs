// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-user playback sampler.
//!
//! Polls the music provider on a fixed interval and appends a history entry
//! only when the playback state differs from what is already recorded. Each
//! tick re-reads the latest entries from the store, so a failed tick never
//! leaves stale in-memory state behind.

use crate::db::Database;
use crate::error::AppError;
use crate::models::{HistoryEntry, PlayContext, PlaybackState};
use crate::services::MusicProvider;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// What a single poll did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// A new playing/paused entry with an item was written.
    Recorded(i64),
    /// State matches the last recorded entry.
    Unchanged,
    /// Nothing is playing and a bare pause entry was written.
    PauseRecorded(i64),
    /// Nothing is playing and the latest entry already says so.
    AlreadyPaused,
    /// Playing, but Spotify reported no item (ads, private session).
    Skipped,
}

/// Samples one user's playback state until cancelled.
pub struct PlaybackSampler {
    user_id: i64,
    db: Database,
    music: Arc<dyn MusicProvider>,
    interval: Duration,
}

impl PlaybackSampler {
    pub fn new(
        user_id: i64,
        db: Database,
        music: Arc<dyn MusicProvider>,
        interval: Duration,
    ) -> Self {
        Self {
            user_id,
            db,
            music,
            interval,
        }
    }

    /// Poll until `cancel` fires.
    ///
    /// The first poll happens one interval after start. Cancellation is
    /// checked before every tick, so once it is observed no further request
    /// is issued; a request already in flight is allowed to finish.
    pub async fn run(self, cancel: CancellationToken) {
        let user_id = self.user_id;
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            user_id,
            interval_ms = self.interval.as_millis() as u64,
            "Playback sampler started"
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    match self.poll_once().await {
                        Ok(outcome) => tracing::debug!(user_id, ?outcome, "Poll complete"),
                        Err(e) if e.is_decode_error() => {
                            tracing::warn!(user_id, error = %e, "Skipping undecodable playback state");
                        }
                        Err(e) => tracing::error!(user_id, error = %e, "Playback poll failed"),
                    }
                }
            }
        }

        tracing::info!(user_id, "Playback sampler stopped");
    }

    /// Run a single sampling step.
    pub async fn poll_once(&self) -> Result<PollOutcome, AppError> {
        match self.music.current_playback(self.user_id).await? {
            None => self.record_pause().await,
            Some(state) => self.record_state(&state).await,
        }
    }

    async fn record_pause(&self) -> Result<PollOutcome, AppError> {
        let latest = self.db.get_last_history_entry(self.user_id).await?;
        if latest.as_ref().is_some_and(|e| !e.is_playing) {
            return Ok(PollOutcome::AlreadyPaused);
        }

        let id = self.db.insert_history(self.user_id, Utc::now(), false).await?;
        tracing::info!(user_id = self.user_id, history_id = id, "Playback stopped");
        Ok(PollOutcome::PauseRecorded(id))
    }

    async fn record_state(&self, state: &PlaybackState) -> Result<PollOutcome, AppError> {
        let item = match state.decode_item()? {
            Some(item) => item,
            None if !state.is_playing => return self.record_pause().await,
            None => {
                tracing::debug!(
                    user_id = self.user_id,
                    playing_type = state.currently_playing_type.as_deref().unwrap_or("unknown"),
                    "Playback has no item"
                );
                return Ok(PollOutcome::Skipped);
            }
        };

        let latest = self.db.get_last_history_entry(self.user_id).await?;
        let last_complete = match &latest {
            Some(entry) if entry.is_complete() => latest.clone(),
            Some(_) => self.db.get_last_complete_history_entry(self.user_id).await?,
            None => None,
        };

        let observed = Observation {
            is_playing: state.is_playing,
            context_uri: state.context_uri(),
            item_uri: item.uri(),
        };
        if !observed.differs_from(latest.as_ref(), last_complete.as_ref()) {
            return Ok(PollOutcome::Unchanged);
        }

        let context = state.context.as_ref().map(PlayContext::from);
        let id = self
            .db
            .record_playback(
                self.user_id,
                state.observed_at(),
                state.is_playing,
                context.as_ref(),
                &item.to_played_item(),
            )
            .await?;

        tracing::info!(
            user_id = self.user_id,
            history_id = id,
            is_playing = state.is_playing,
            item = item.name(),
            context = observed.context_uri.unwrap_or(""),
            "Playback changed"
        );
        Ok(PollOutcome::Recorded(id))
    }
}

/// The fields that define a playback transition.
#[derive(Debug, Clone, Copy)]
struct Observation<'a> {
    is_playing: bool,
    context_uri: Option<&'a str>,
    item_uri: &'a str,
}

impl Observation<'_> {
    /// Whether this observation must be written.
    ///
    /// A bare pause entry newer than the last complete entry means playback
    /// stopped; resuming the same item after it is a transition, while a
    /// paused state with an item is folded into the existing pause.
    fn differs_from(
        &self,
        latest: Option<&HistoryEntry>,
        last_complete: Option<&HistoryEntry>,
    ) -> bool {
        let Some(latest) = latest else {
            return true;
        };

        if !latest.is_complete() && !latest.is_playing {
            return self.is_playing;
        }

        match last_complete {
            None => true,
            Some(last) => {
                last.is_playing != self.is_playing
                    || last.context_uri() != self.context_uri
                    || last.item_uri() != Some(self.item_uri)
            }
        }
    }
}
