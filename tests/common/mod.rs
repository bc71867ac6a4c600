// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use strava_soundtrack::config::Config;
use strava_soundtrack::db::Database;
use strava_soundtrack::error::AppError;
use strava_soundtrack::models::{
    DetailedActivity, NewUser, OAuthToken, PlayContext, PlaybackState, PlayedItem,
    PlaylistSummary, Provider,
};
use strava_soundtrack::routes::create_router;
use strava_soundtrack::services::{
    EventReconciler, FitnessProvider, MusicProvider, Supervisor,
};
use strava_soundtrack::AppState;

pub const PLAYLIST_URI: &str = "spotify:playlist:37i9dQZF1DX76Wlfdnj7AP";
pub const PLAYLIST_HREF: &str = "https://api.spotify.com/v1/playlists/37i9dQZF1DX76Wlfdnj7AP";
pub const PLAYLIST_URL: &str = "https://open.spotify.com/playlist/37i9dQZF1DX76Wlfdnj7AP";

/// Create an in-memory database with migrations applied.
#[allow(dead_code)]
pub async fn test_db() -> Database {
    Database::in_memory()
        .await
        .expect("Failed to create in-memory database")
}

/// Create a user and, optionally, store a Spotify token for them.
#[allow(dead_code)]
pub async fn seed_user(db: &Database, strava_id: i64, with_spotify: bool) -> i64 {
    let user_id = db
        .insert_user(&NewUser {
            strava_id,
            first_name: "Test".to_string(),
            last_name: "Athlete".to_string(),
        })
        .await
        .unwrap();

    if with_spotify {
        db.link_spotify_account(user_id, &format!("spotify-{}", strava_id))
            .await
            .unwrap();
        db.insert_token(&token(user_id, Provider::Spotify, "spotify_access", 3600))
            .await
            .unwrap();
    }
    user_id
}

/// Accept connections and hold them open without ever replying.
///
/// Returns the base URL of the listener.
#[allow(dead_code)]
pub async fn spawn_stalled_listener() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    format!("http://{}", addr)
}

/// Token record expiring `expires_in_secs` from now.
#[allow(dead_code)]
pub fn token(user_id: i64, provider: Provider, access: &str, expires_in_secs: i64) -> OAuthToken {
    OAuthToken {
        user_id,
        provider,
        access_token: access.to_string(),
        refresh_token: format!("{}_refresh", access),
        token_type: "Bearer".to_string(),
        expires_at: Utc::now() + Duration::seconds(expires_in_secs),
    }
}

/// Playback state JSON with a track item.
#[allow(dead_code)]
pub fn track_state(
    timestamp_ms: i64,
    is_playing: bool,
    context_uri: Option<&str>,
    track_uri: &str,
) -> PlaybackState {
    let context = context_uri.map(|uri| {
        json!({
            "type": "playlist",
            "uri": uri,
            "href": PLAYLIST_HREF,
            "external_urls": {"spotify": PLAYLIST_URL}
        })
    });
    serde_json::from_value(json!({
        "timestamp": timestamp_ms,
        "is_playing": is_playing,
        "currently_playing_type": "track",
        "context": context,
        "item": {
            "type": "track",
            "name": format!("Track {}", track_uri),
            "uri": track_uri,
            "href": "https://api.spotify.com/v1/tracks/x",
            "external_urls": {"spotify": "https://open.spotify.com/track/x"},
            "artists": [{"name": "Artist", "uri": "spotify:artist:1"}],
            "album": {"name": "Album", "uri": "spotify:album:1"}
        }
    }))
    .unwrap()
}

/// Play context of the given type.
#[allow(dead_code)]
pub fn context(kind: &str, uri: &str) -> PlayContext {
    PlayContext {
        kind: kind.to_string(),
        uri: uri.to_string(),
        href: PLAYLIST_HREF.to_string(),
        external_url: PLAYLIST_URL.to_string(),
    }
}

/// Track item with the given URI.
#[allow(dead_code)]
pub fn played_track(uri: &str) -> PlayedItem {
    let state = track_state(0, true, None, uri);
    state.decode_item().unwrap().unwrap().to_played_item()
}

/// Activity starting at `start` lasting `elapsed` seconds.
#[allow(dead_code)]
pub fn activity(id: u64, start: DateTime<Utc>, elapsed: i64, description: Option<&str>) -> DetailedActivity {
    DetailedActivity {
        id,
        name: "Morning Run".to_string(),
        start_date: start,
        elapsed_time: elapsed,
        description: description.map(str::to_string),
    }
}

// ─── Fake providers ──────────────────────────────────────────────────────────

/// Music provider returning whatever playback the test sets.
#[derive(Default)]
pub struct FakeMusic {
    playback: Mutex<Option<PlaybackState>>,
    error: Mutex<Option<String>>,
    playlists: Mutex<HashMap<String, PlaylistSummary>>,
    playback_calls: AtomicUsize,
    playlist_calls: AtomicUsize,
}

#[allow(dead_code)]
impl FakeMusic {
    pub fn set_playback(&self, state: Option<PlaybackState>) {
        *self.playback.lock().unwrap() = state;
    }

    pub fn fail_with(&self, message: Option<&str>) {
        *self.error.lock().unwrap() = message.map(str::to_string);
    }

    pub fn add_playlist(&self, href: &str, name: &str, owner: &str) {
        let summary = serde_json::from_value(json!({
            "name": name,
            "owner": {"display_name": owner}
        }))
        .unwrap();
        self.playlists.lock().unwrap().insert(href.to_string(), summary);
    }

    pub fn playback_calls(&self) -> usize {
        self.playback_calls.load(Ordering::SeqCst)
    }

    pub fn playlist_calls(&self) -> usize {
        self.playlist_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MusicProvider for FakeMusic {
    async fn current_playback(&self, _user_id: i64) -> Result<Option<PlaybackState>, AppError> {
        self.playback_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(msg) = self.error.lock().unwrap().clone() {
            return Err(AppError::SpotifyApi(msg));
        }
        Ok(self.playback.lock().unwrap().clone())
    }

    async fn get_playlist(&self, _user_id: i64, href: &str) -> Result<PlaylistSummary, AppError> {
        self.playlist_calls.fetch_add(1, Ordering::SeqCst);
        self.playlists
            .lock()
            .unwrap()
            .get(href)
            .cloned()
            .ok_or_else(|| AppError::SpotifyApi("HTTP 404 Not Found".to_string()))
    }
}

/// Fitness provider backed by an in-memory activity map.
#[derive(Default)]
pub struct FakeFitness {
    activities: Mutex<HashMap<u64, DetailedActivity>>,
    get_calls: AtomicUsize,
    updates: Mutex<Vec<(u64, String)>>,
}

#[allow(dead_code)]
impl FakeFitness {
    pub fn add_activity(&self, activity: DetailedActivity) {
        self.activities.lock().unwrap().insert(activity.id, activity);
    }

    pub fn description(&self, activity_id: u64) -> Option<String> {
        self.activities
            .lock()
            .unwrap()
            .get(&activity_id)
            .and_then(|a| a.description.clone())
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn update_count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }
}

#[async_trait]
impl FitnessProvider for FakeFitness {
    async fn get_activity(&self, _user_id: i64, activity_id: u64) -> Result<DetailedActivity, AppError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.activities
            .lock()
            .unwrap()
            .get(&activity_id)
            .cloned()
            .ok_or_else(|| AppError::StravaApi("HTTP 404 Not Found".to_string()))
    }

    async fn update_activity_description(
        &self,
        _user_id: i64,
        activity_id: u64,
        description: &str,
    ) -> Result<(), AppError> {
        let mut activities = self.activities.lock().unwrap();
        let activity = activities
            .get_mut(&activity_id)
            .ok_or_else(|| AppError::StravaApi("HTTP 404 Not Found".to_string()))?;
        activity.description = Some(description.to_string());
        self.updates
            .lock()
            .unwrap()
            .push((activity_id, description.to_string()));
        Ok(())
    }
}

// ─── App builder ─────────────────────────────────────────────────────────────

/// Everything a route or lifecycle test needs.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub db: Database,
    pub music: Arc<FakeMusic>,
    pub fitness: Arc<FakeFitness>,
}

/// Create a test app over an in-memory database and fake providers.
#[allow(dead_code)]
pub async fn create_test_app() -> TestApp {
    create_test_app_with_interval(std::time::Duration::from_secs(60)).await
}

#[allow(dead_code)]
pub async fn create_test_app_with_interval(poll_interval: std::time::Duration) -> TestApp {
    let config = Config::default();
    let db = test_db().await;
    let music = Arc::new(FakeMusic::default());
    let fitness = Arc::new(FakeFitness::default());

    let supervisor = Arc::new(Supervisor::new(
        db.clone(),
        music.clone() as Arc<dyn MusicProvider>,
        poll_interval,
    ));
    let reconciler = Arc::new(EventReconciler::new(
        db.clone(),
        music.clone() as Arc<dyn MusicProvider>,
        fitness.clone() as Arc<dyn FitnessProvider>,
    ));

    let state = Arc::new(AppState {
        config,
        db: db.clone(),
        supervisor,
        reconciler,
    });

    TestApp {
        router: create_router(state.clone()),
        state,
        db,
        music,
        fitness,
    }
}
