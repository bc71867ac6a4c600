// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod activity;
pub mod history;
pub mod playback;
pub mod user;
pub mod webhook;

pub use activity::{ActivityWindow, DetailedActivity};
pub use history::{HistoryEntry, ItemDetails, PlayContext, PlayedItem};
pub use playback::{PlaybackItem, PlaybackState, PlayerContext, PlaylistSummary};
pub use user::{NewUser, OAuthToken, Provider, User};
pub use webhook::WebhookEvent;
