// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Webhook routes for Strava events.

use crate::models::{Provider, WebhookEvent};
use crate::AppState;
use axum::{
    extract::{Json, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Webhook routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/webhook", get(verify).post(handle_event))
}

/// Strava webhook verification query params.
#[derive(Deserialize)]
struct VerifyParams {
    #[serde(rename = "hub.mode")]
    mode: String,
    #[serde(rename = "hub.challenge")]
    challenge: String,
    #[serde(rename = "hub.verify_token")]
    verify_token: String,
}

/// Verification response.
#[derive(Serialize, Default)]
struct VerifyResponse {
    #[serde(rename = "hub.challenge")]
    challenge: String,
}

/// Verify webhook subscription (GET).
async fn verify(
    State(state): State<Arc<AppState>>,
    Query(params): Query<VerifyParams>,
) -> impl IntoResponse {
    if params.mode == "subscribe" && params.verify_token == state.config.webhook_verify_token {
        tracing::info!("Webhook subscription verified");
        (
            StatusCode::OK,
            Json(VerifyResponse {
                challenge: params.challenge,
            }),
        )
    } else {
        tracing::warn!(
            mode = %params.mode,
            "Webhook verification failed: invalid token"
        );
        (StatusCode::FORBIDDEN, Json(VerifyResponse::default()))
    }
}

/// Handle incoming webhook events (POST).
///
/// Reconciliation runs on a supervisor-tracked task; Strava only needs a
/// quick 200.
async fn handle_event(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<serde_json::Value>,
) -> StatusCode {
    tracing::debug!(payload = %payload, "Webhook event received (raw)");

    let event: WebhookEvent = match serde_json::from_value(payload) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!(error = %e, "Failed to parse webhook event");
            return StatusCode::OK; // Still return 200 to Strava to avoid retries
        }
    };

    tracing::info!(
        object_type = %event.object_type,
        object_id = event.object_id,
        aspect_type = %event.aspect_type,
        owner_id = event.owner_id,
        "Webhook event parsed successfully"
    );

    if !event.is_activity_create() {
        tracing::debug!(
            object_type = %event.object_type,
            aspect_type = %event.aspect_type,
            "Ignoring unhandled event type"
        );
        return StatusCode::OK;
    }

    if state.supervisor.is_shutting_down() {
        tracing::warn!(activity_id = event.object_id, "Dropping event during shutdown");
        return StatusCode::OK;
    }

    let task_state = Arc::clone(&state);
    state.supervisor.spawn(async move {
        reconcile_event(task_state, event).await;
    });

    StatusCode::OK
}

/// Reconcile one event, then make sure the user has a running sampler.
async fn reconcile_event(state: Arc<AppState>, event: WebhookEvent) {
    let outcome = match state.reconciler.reconcile(&event).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(
                error = %e,
                owner_id = event.owner_id,
                activity_id = event.object_id,
                "Activity reconciliation failed"
            );
            return;
        }
    };

    let Some(user_id) = outcome.user_id() else {
        return;
    };
    if state.supervisor.is_running(user_id) {
        return;
    }

    match state.db.get_token(user_id, Provider::Spotify).await {
        Ok(Some(_)) => {
            if state.supervisor.launch_one(user_id) {
                tracing::info!(user_id, "Started sampler for webhook user");
            }
        }
        Ok(None) => {}
        Err(e) => tracing::warn!(user_id, error = %e, "Failed to check Spotify connection"),
    }
}
