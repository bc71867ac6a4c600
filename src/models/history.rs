// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Listening history model.

use chrono::{DateTime, Utc};
/// One persisted observation of a user's playback state.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub id: i64,
    pub user_id: i64,
    pub timestamp: DateTime<Utc>,
    pub is_playing: bool,
    pub context: Option<PlayContext>,
    pub item: Option<PlayedItem>,
}

impl HistoryEntry {
    /// An entry is complete when it carries a played-item row.
    pub fn is_complete(&self) -> bool {
        self.item.is_some()
    }

    pub fn context_uri(&self) -> Option<&str> {
        self.context.as_ref().map(|c| c.uri.as_str())
    }

    pub fn item_uri(&self) -> Option<&str> {
        self.item.as_ref().map(|i| i.uri.as_str())
    }
}

/// The container a track or episode was played from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayContext {
    /// Resource type, e.g. "playlist" or "album"
    pub kind: String,
    pub uri: String,
    /// Web API href
    pub href: String,
    /// Link to open the context in a browser
    pub external_url: String,
}

impl PlayContext {
    pub fn is_playlist(&self) -> bool {
        self.kind == "playlist"
    }
}

/// The track or episode that was playing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayedItem {
    pub uri: String,
    pub name: String,
    pub href: String,
    pub external_url: String,
    pub details: ItemDetails,
}

/// Type-specific item fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemDetails {
    Track {
        artists: Vec<String>,
        album_name: String,
        album_uri: String,
    },
    Episode {
        description: String,
        show_name: String,
        show_description: String,
        show_uri: String,
    },
}

impl ItemDetails {
    /// Discriminant stored in the `type` column.
    pub fn kind(&self) -> &'static str {
        match self {
            ItemDetails::Track { .. } => "track",
            ItemDetails::Episode { .. } => "episode",
        }
    }
}
