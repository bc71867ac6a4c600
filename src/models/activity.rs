// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava activity model.
//!
//! Activities are never stored locally; they are fetched on demand when a
//! webhook arrives and only their time window is used.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

/// Detailed Strava activity response (fields we use).
#[derive(Debug, Clone, Deserialize)]
pub struct DetailedActivity {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    pub start_date: DateTime<Utc>,
    /// Elapsed time in seconds, including pauses
    pub elapsed_time: i64,
    #[serde(default)]
    pub description: Option<String>,
}

impl DetailedActivity {
    /// The activity's time window `[start, start + elapsed]`.
    pub fn window(&self) -> ActivityWindow {
        ActivityWindow::new(self.start_date, self.elapsed_time)
    }

    /// Current description, treating a missing one as empty.
    pub fn description_text(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }
}

/// Closed UTC interval an activity spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ActivityWindow {
    /// Negative elapsed times collapse the window to its start; elapsed
    /// times past the representable range clamp the end to the latest instant.
    pub fn new(start: DateTime<Utc>, elapsed_secs: i64) -> Self {
        let end = Duration::try_seconds(elapsed_secs.max(0))
            .and_then(|elapsed| start.checked_add_signed(elapsed))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self { start, end }
    }
}
