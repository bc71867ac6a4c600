// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity reconciliation service.
//!
//! Handles the core workflow for a new activity:
//! 1. Resolve the Strava athlete to a local user
//! 2. Fetch the activity from Strava
//! 3. Skip it if it was already annotated
//! 4. Collect playing contexts from the listening history in its window
//! 5. Annotate the description when exactly one playlist was playing

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{HistoryEntry, PlayContext, PlaylistSummary, WebhookEvent};
use crate::services::{FitnessProvider, MusicProvider};
use crate::time_utils::format_utc_rfc3339;
use std::sync::Arc;

/// Marker used to detect if an activity has already been annotated.
pub const ANNOTATION_MARKER: &str = "-- strava-soundtrack";

/// Result of reconciling one webhook event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Not an activity creation; nothing was read or written.
    Ignored,
    /// The description already carries the marker.
    AlreadyAnnotated { user_id: i64 },
    /// Zero or several contexts played, or the only one was not a playlist.
    NoAnnotation { user_id: i64, distinct_contexts: usize },
    /// The description was rewritten.
    Annotated { user_id: i64, description: String },
}

impl ReconcileOutcome {
    /// The local user the event resolved to, if it got that far.
    pub fn user_id(&self) -> Option<i64> {
        match self {
            ReconcileOutcome::Ignored => None,
            ReconcileOutcome::AlreadyAnnotated { user_id }
            | ReconcileOutcome::NoAnnotation { user_id, .. }
            | ReconcileOutcome::Annotated { user_id, .. } => Some(*user_id),
        }
    }
}

/// Enriches new Strava activities with what the athlete was listening to.
pub struct EventReconciler {
    db: Database,
    music: Arc<dyn MusicProvider>,
    fitness: Arc<dyn FitnessProvider>,
}

impl EventReconciler {
    pub fn new(
        db: Database,
        music: Arc<dyn MusicProvider>,
        fitness: Arc<dyn FitnessProvider>,
    ) -> Self {
        Self { db, music, fitness }
    }

    /// Reconcile one webhook event. Every error is terminal for this event.
    pub async fn reconcile(&self, event: &WebhookEvent) -> Result<ReconcileOutcome> {
        if !event.is_activity_create() {
            tracing::debug!(
                object_type = %event.object_type,
                aspect_type = %event.aspect_type,
                "Ignoring webhook event"
            );
            return Ok(ReconcileOutcome::Ignored);
        }

        let owner_id = event.owner_id;
        let activity_id = event.object_id;
        tracing::info!(owner_id, activity_id, "Reconciling new activity");

        // 1. Resolve user
        let strava_id = i64::try_from(owner_id)
            .map_err(|_| AppError::NotFound(format!("Athlete {}", owner_id)))?;
        let user = self
            .db
            .get_user_by_strava_id(strava_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User for athlete {}", owner_id)))?;
        let user_id = user.id;

        // 2. Fetch activity (token management is handled by the provider)
        let activity = self.fitness.get_activity(user_id, activity_id).await?;

        // 3. Idempotency
        if activity.description_text().contains(ANNOTATION_MARKER) {
            tracing::debug!(user_id, activity_id, "Activity already annotated");
            return Ok(ReconcileOutcome::AlreadyAnnotated { user_id });
        }

        // 4. Listening history inside the activity window
        let window = activity.window();
        let entries = self
            .db
            .get_history_entries_between(user_id, window.start, window.end)
            .await?;
        let contexts = distinct_playing_contexts(&entries);

        tracing::debug!(
            user_id,
            activity_id,
            window_start = %format_utc_rfc3339(window.start),
            window_end = %format_utc_rfc3339(window.end),
            entries = entries.len(),
            contexts = contexts.len(),
            "Collected listening history"
        );

        let context = match contexts.as_slice() {
            [only] if only.is_playlist() => *only,
            _ => {
                tracing::info!(
                    user_id,
                    activity_id,
                    distinct_contexts = contexts.len(),
                    "No single playlist to attribute"
                );
                return Ok(ReconcileOutcome::NoAnnotation {
                    user_id,
                    distinct_contexts: contexts.len(),
                });
            }
        };

        // 5. Build and write the annotation
        let playlist = self.music.get_playlist(user_id, &context.href).await?;
        let annotation = build_annotation(&playlist, context);
        let description = append_annotation(activity.description.as_deref(), &annotation);

        self.fitness
            .update_activity_description(user_id, activity_id, &description)
            .await?;

        tracing::info!(
            user_id,
            activity_id,
            playlist = %playlist.name,
            "Activity annotated"
        );

        Ok(ReconcileOutcome::Annotated {
            user_id,
            description,
        })
    }
}

/// Distinct contexts among playing entries, in first-seen order.
///
/// Entries that were paused or had no context do not count.
pub fn distinct_playing_contexts(entries: &[HistoryEntry]) -> Vec<&PlayContext> {
    let mut seen: Vec<&PlayContext> = Vec::new();
    for context in entries
        .iter()
        .filter(|e| e.is_playing)
        .filter_map(|e| e.context.as_ref())
    {
        if !seen.iter().any(|c| c.uri == context.uri) {
            seen.push(context);
        }
    }
    seen
}

/// Build the annotation text for a playlist.
pub fn build_annotation(playlist: &PlaylistSummary, context: &PlayContext) -> String {
    format!(
        "Playlist: {}\nBy: {}\n{}\n\n{}",
        playlist.name,
        playlist.owner_name(),
        context.external_url,
        ANNOTATION_MARKER
    )
}

/// Append annotation to existing description.
fn append_annotation(existing: Option<&str>, annotation: &str) -> String {
    match existing {
        Some(desc) if !desc.is_empty() => format!("{}\n\n{}", desc, annotation),
        _ => annotation.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::playback::PlaylistOwner;
    use crate::time_utils::from_epoch_millis;

    fn playlist(name: &str, owner: Option<&str>) -> PlaylistSummary {
        PlaylistSummary {
            name: name.to_string(),
            owner: PlaylistOwner {
                display_name: owner.map(str::to_string),
            },
        }
    }

    fn context(kind: &str, uri: &str) -> PlayContext {
        PlayContext {
            kind: kind.to_string(),
            uri: uri.to_string(),
            href: format!("https://api.spotify.com/v1/playlists/{}", uri),
            external_url: format!("https://open.spotify.com/playlist/{}", uri),
        }
    }

    fn entry(id: i64, is_playing: bool, ctx: Option<PlayContext>) -> HistoryEntry {
        HistoryEntry {
            id,
            user_id: 1,
            timestamp: from_epoch_millis(id),
            is_playing,
            context: ctx,
            item: None,
        }
    }

    #[test]
    fn test_build_annotation() {
        let result = build_annotation(
            &playlist("Tempo Mix", Some("Ann")),
            &context("playlist", "37i9dQZF1DX"),
        );
        assert_eq!(
            result,
            "Playlist: Tempo Mix\nBy: Ann\nhttps://open.spotify.com/playlist/37i9dQZF1DX\n\n-- strava-soundtrack"
        );
    }

    #[test]
    fn test_build_annotation_without_owner_name() {
        let result = build_annotation(&playlist("Mix", None), &context("playlist", "x"));
        assert!(result.contains("By: unknown\n"));
        assert!(result.ends_with(ANNOTATION_MARKER));
    }

    #[test]
    fn test_append_annotation_to_none() {
        let result = append_annotation(None, "note");
        assert_eq!(result, "note");
    }

    #[test]
    fn test_append_annotation_to_empty_string() {
        let result = append_annotation(Some(""), "note");
        assert_eq!(result, "note");
    }

    #[test]
    fn test_append_annotation_to_existing_description() {
        let result = append_annotation(Some("Great ride!\nPerfect weather."), "note");
        assert_eq!(result, "Great ride!\nPerfect weather.\n\nnote");
    }

    #[test]
    fn test_distinct_contexts_keep_first_seen_order() {
        let entries = vec![
            entry(1, true, Some(context("playlist", "b"))),
            entry(2, true, Some(context("playlist", "a"))),
            entry(3, true, Some(context("playlist", "b"))),
        ];
        let uris: Vec<&str> = distinct_playing_contexts(&entries)
            .iter()
            .map(|c| c.uri.as_str())
            .collect();
        assert_eq!(uris, vec!["b", "a"]);
    }

    #[test]
    fn test_distinct_contexts_ignore_paused_and_contextless() {
        let entries = vec![
            entry(1, false, Some(context("playlist", "paused"))),
            entry(2, true, None),
            entry(3, true, Some(context("album", "x"))),
        ];
        let contexts = distinct_playing_contexts(&entries);
        assert_eq!(contexts.len(), 1);
        assert_eq!(contexts[0].uri, "x");
    }

    #[test]
    fn test_outcome_user_id() {
        assert_eq!(ReconcileOutcome::Ignored.user_id(), None);
        assert_eq!(
            ReconcileOutcome::NoAnnotation {
                user_id: 4,
                distinct_contexts: 2
            }
            .user_id(),
            Some(4)
        );
    }
}
