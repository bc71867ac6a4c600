// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava Soundtrack: annotate Strava activities with the Spotify playlist
//! that was playing.
//!
//! This crate samples each connected user's Spotify playback into a local
//! listening history and, when Strava reports a new activity, writes the
//! playlist heard during it into the activity description.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::Database;
use services::{EventReconciler, Supervisor};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub supervisor: Arc<Supervisor>,
    pub reconciler: Arc<EventReconciler>,
}
