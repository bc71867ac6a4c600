// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava webhook notification payload.

use serde::Deserialize;
use std::collections::HashMap;

pub const OBJECT_TYPE_ACTIVITY: &str = "activity";
pub const OBJECT_TYPE_ATHLETE: &str = "athlete";
pub const ASPECT_TYPE_CREATE: &str = "create";
pub const ASPECT_TYPE_UPDATE: &str = "update";
pub const ASPECT_TYPE_DELETE: &str = "delete";

/// Strava webhook event payload.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    /// "activity" or "athlete"
    pub object_type: String,
    pub object_id: u64,
    /// "create", "update" or "delete"
    pub aspect_type: String,
    #[serde(default)]
    pub updates: Option<HashMap<String, serde_json::Value>>,
    /// Strava athlete ID of the owner
    pub owner_id: u64,
    #[serde(default)]
    pub subscription_id: u64,
    /// Epoch seconds
    #[serde(default)]
    pub event_time: i64,
}

impl WebhookEvent {
    /// Only newly created activities are reconciled.
    pub fn is_activity_create(&self) -> bool {
        self.object_type == OBJECT_TYPE_ACTIVITY && self.aspect_type == ASPECT_TYPE_CREATE
    }
}
