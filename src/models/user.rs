// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User and OAuth token models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A user linked to a Strava athlete and, optionally, a Spotify account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Internal user ID
    pub id: i64,
    /// Strava athlete ID (webhook `owner_id`)
    pub strava_id: i64,
    /// Spotify user ID, once the music account is connected
    pub spotify_id: Option<String>,
    pub first_name: String,
    pub last_name: String,
}

/// Fields needed to create a user on first Strava login.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub strava_id: i64,
    pub first_name: String,
    pub last_name: String,
}

/// External OAuth provider a token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Strava,
    Spotify,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Strava => "strava",
            Provider::Spotify => "spotify",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "strava" => Ok(Provider::Strava),
            "spotify" => Ok(Provider::Spotify),
            other => Err(format!("unknown provider: {}", other)),
        }
    }
}

/// OAuth token record, one per (user, provider).
#[derive(Debug, Clone)]
pub struct OAuthToken {
    pub user_id: i64,
    pub provider: Provider,
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Absolute expiry of the access token
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_round_trip_through_str() {
        for provider in [Provider::Strava, Provider::Spotify] {
            assert_eq!(provider.as_str().parse::<Provider>(), Ok(provider));
        }
        assert!("deezer".parse::<Provider>().is_err());
    }
}
