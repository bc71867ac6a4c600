// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Spotify "current playback" payloads.
//!
//! The `item` field is polymorphic: tracks and episodes share a handful of
//! fields but carry different detail objects. It is kept as raw JSON on
//! [`PlaybackState`] and decoded by reading the `type` discriminant first,
//! then deserializing the matching payload.

use crate::error::AppError;
use crate::models::history::{ItemDetails, PlayContext, PlayedItem};
use crate::time_utils::from_epoch_millis;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Response body of `GET /me/player`.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackState {
    /// Epoch milliseconds of the last state change reported by Spotify
    pub timestamp: i64,
    pub is_playing: bool,
    #[serde(default)]
    pub currently_playing_type: Option<String>,
    #[serde(default)]
    pub context: Option<PlayerContext>,
    #[serde(default)]
    pub item: Option<serde_json::Value>,
}

impl PlaybackState {
    /// Instant of this observation in UTC.
    pub fn observed_at(&self) -> DateTime<Utc> {
        from_epoch_millis(self.timestamp)
    }

    /// URI of the playing context, if any.
    pub fn context_uri(&self) -> Option<&str> {
        self.context.as_ref().map(|c| c.uri.as_str())
    }

    /// Decode the polymorphic `item`.
    ///
    /// Returns `Ok(None)` when Spotify sent no item (ads, private sessions).
    pub fn decode_item(&self) -> Result<Option<PlaybackItem>, AppError> {
        self.item
            .as_ref()
            .filter(|v| !v.is_null())
            .map(PlaybackItem::from_value)
            .transpose()
    }
}

/// Where playback was started from (playlist, album, artist, show).
#[derive(Debug, Clone, Deserialize)]
pub struct PlayerContext {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub href: String,
    #[serde(default)]
    pub external_urls: ExternalUrls,
    pub uri: String,
}

impl From<&PlayerContext> for PlayContext {
    fn from(ctx: &PlayerContext) -> Self {
        PlayContext {
            kind: ctx.kind.clone(),
            uri: ctx.uri.clone(),
            href: ctx.href.clone(),
            external_url: ctx.external_urls.spotify.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExternalUrls {
    #[serde(default)]
    pub spotify: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtistObject {
    pub name: String,
    #[serde(default)]
    pub uri: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlbumObject {
    pub name: String,
    #[serde(default)]
    pub uri: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShowObject {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub uri: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackObject {
    pub name: String,
    pub uri: String,
    #[serde(default)]
    pub href: String,
    #[serde(default)]
    pub external_urls: ExternalUrls,
    #[serde(default)]
    pub artists: Vec<ArtistObject>,
    pub album: AlbumObject,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EpisodeObject {
    pub name: String,
    pub uri: String,
    #[serde(default)]
    pub href: String,
    #[serde(default)]
    pub external_urls: ExternalUrls,
    #[serde(default)]
    pub description: String,
    pub show: ShowObject,
}

/// A decoded playback item.
#[derive(Debug, Clone)]
pub enum PlaybackItem {
    Track(TrackObject),
    Episode(EpisodeObject),
}

impl PlaybackItem {
    /// Decode from raw JSON by dispatching on the `type` field.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, AppError> {
        let kind = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| AppError::Decode("playback item has no type".to_string()))?;

        match kind {
            "track" => serde_json::from_value(value.clone())
                .map(PlaybackItem::Track)
                .map_err(|e| AppError::Decode(format!("invalid track: {}", e))),
            "episode" => serde_json::from_value(value.clone())
                .map(PlaybackItem::Episode)
                .map_err(|e| AppError::Decode(format!("invalid episode: {}", e))),
            other => Err(AppError::Decode(format!(
                "expected item type \"track\" or \"episode\", found \"{}\"",
                other
            ))),
        }
    }

    pub fn uri(&self) -> &str {
        match self {
            PlaybackItem::Track(t) => &t.uri,
            PlaybackItem::Episode(e) => &e.uri,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            PlaybackItem::Track(t) => &t.name,
            PlaybackItem::Episode(e) => &e.name,
        }
    }

    /// Flatten into the shape persisted in the history store.
    pub fn to_played_item(&self) -> PlayedItem {
        match self {
            PlaybackItem::Track(t) => PlayedItem {
                uri: t.uri.clone(),
                name: t.name.clone(),
                href: t.href.clone(),
                external_url: t.external_urls.spotify.clone(),
                details: ItemDetails::Track {
                    artists: t.artists.iter().map(|a| a.name.clone()).collect(),
                    album_name: t.album.name.clone(),
                    album_uri: t.album.uri.clone(),
                },
            },
            PlaybackItem::Episode(e) => PlayedItem {
                uri: e.uri.clone(),
                name: e.name.clone(),
                href: e.href.clone(),
                external_url: e.external_urls.spotify.clone(),
                details: ItemDetails::Episode {
                    description: e.description.clone(),
                    show_name: e.show.name.clone(),
                    show_description: e.show.description.clone(),
                    show_uri: e.show.uri.clone(),
                },
            },
        }
    }
}

/// Playlist fields requested with `fields=name,owner.display_name`.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistSummary {
    pub name: String,
    pub owner: PlaylistOwner,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistOwner {
    #[serde(default)]
    pub display_name: Option<String>,
}

impl PlaylistSummary {
    pub fn owner_name(&self) -> &str {
        self.owner.display_name.as_deref().unwrap_or("unknown")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn track_json() -> serde_json::Value {
        json!({
            "type": "track",
            "name": "Heroes",
            "uri": "spotify:track:7Jh1bpe76CNTCgdgAdBw4Z",
            "href": "https://api.spotify.com/v1/tracks/7Jh1bpe76CNTCgdgAdBw4Z",
            "external_urls": {"spotify": "https://open.spotify.com/track/7Jh1bpe76CNTCgdgAdBw4Z"},
            "artists": [{"name": "David Bowie", "uri": "spotify:artist:0oSGxfWSnnOXhD2fKuz2Gy"}],
            "album": {"name": "\"Heroes\"", "uri": "spotify:album:4I5zzKYd2SKDgZ9DRf5LVk"}
        })
    }

    #[test]
    fn test_decode_track() {
        let item = PlaybackItem::from_value(&track_json()).unwrap();
        assert_eq!(item.uri(), "spotify:track:7Jh1bpe76CNTCgdgAdBw4Z");
        match item.to_played_item().details {
            ItemDetails::Track { artists, album_name, .. } => {
                assert_eq!(artists, vec!["David Bowie".to_string()]);
                assert_eq!(album_name, "\"Heroes\"");
            }
            other => panic!("expected track details, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_episode() {
        let value = json!({
            "type": "episode",
            "name": "Tempo runs",
            "uri": "spotify:episode:512ojhOuo1ktJprKbVcKyQ",
            "description": "Intervals explained",
            "show": {"name": "Coach Talk", "description": "Weekly", "uri": "spotify:show:38bS44xjbVVZ3No3ByF1dJ"}
        });
        let item = PlaybackItem::from_value(&value).unwrap();
        assert_eq!(item.name(), "Tempo runs");
        assert!(matches!(
            item.to_played_item().details,
            ItemDetails::Episode { ref show_name, .. } if show_name == "Coach Talk"
        ));
    }

    #[test]
    fn test_decode_unknown_type_is_decode_error() {
        let value = json!({"type": "ad", "name": "Buy now", "uri": "spotify:ad:1"});
        let err = PlaybackItem::from_value(&value).unwrap_err();
        assert!(err.is_decode_error());
    }

    #[test]
    fn test_decode_missing_type() {
        let err = PlaybackItem::from_value(&json!({"name": "?"})).unwrap_err();
        assert!(err.is_decode_error());
    }

    #[test]
    fn test_state_with_null_item() {
        let state: PlaybackState = serde_json::from_value(json!({
            "timestamp": 1_700_000_000_000_i64,
            "is_playing": true,
            "currently_playing_type": "ad",
            "context": null,
            "item": null
        }))
        .unwrap();
        assert!(state.decode_item().unwrap().is_none());
        assert!(state.context_uri().is_none());
        assert_eq!(state.observed_at().timestamp(), 1_700_000_000);
    }
}
