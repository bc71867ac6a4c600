// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava Soundtrack server
//!
//! Samples Spotify playback for every connected user and annotates new
//! Strava activities with the playlist that was playing.

use anyhow::Context;
use std::sync::Arc;
use strava_soundtrack::{
    config::Config,
    db::Database,
    services::{
        tokens::{SPOTIFY_TOKEN_URL, STRAVA_TOKEN_URL},
        ClientCredentials, EventReconciler, FitnessProvider, MusicProvider, SpotifyClient,
        SpotifyService, StravaClient, StravaService, Supervisor, TokenService,
    },
    AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(
        port = config.port,
        poll_interval_secs = config.spotify_poll_interval_secs,
        "Starting Strava Soundtrack"
    );

    // Open the database and apply migrations
    let db = Database::connect(&config.database_url)
        .await
        .context("Failed to open database")?;

    // Token service shared by both providers
    let tokens = TokenService::new(
        db.clone(),
        ClientCredentials::new(
            config.strava_client_id.clone(),
            config.strava_client_secret.clone(),
            STRAVA_TOKEN_URL,
        ),
        ClientCredentials::new(
            config.spotify_client_id.clone(),
            config.spotify_client_secret.clone(),
            SPOTIFY_TOKEN_URL,
        ),
    )
    .context("Failed to build token service")?;

    let music: Arc<dyn MusicProvider> = Arc::new(SpotifyService::new(
        SpotifyClient::new().context("Failed to build Spotify client")?,
        tokens.clone(),
    ));
    let fitness: Arc<dyn FitnessProvider> = Arc::new(StravaService::new(
        StravaClient::new().context("Failed to build Strava client")?,
        tokens,
    ));

    let supervisor = Arc::new(Supervisor::new(
        db.clone(),
        Arc::clone(&music),
        config.poll_interval(),
    ));
    let reconciler = Arc::new(EventReconciler::new(db.clone(), music, fitness));

    // Launch a sampler per connected user
    supervisor
        .start_all()
        .await
        .context("Failed to start playback samplers")?;

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        supervisor: Arc::clone(&supervisor),
        reconciler,
    });

    // Build router
    let app = strava_soundtrack::routes::create_router(state);

    // Start server
    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    supervisor.shutdown_all().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Initialize structured JSON logging.
fn init_logging() -> anyhow::Result<()> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("strava_soundtrack=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
