// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! History store: append-only playback observations.
//!
//! Inserts take a connection so one observation (entry, context, item) can be
//! written inside a single transaction. Reads go through [`Database`].

use crate::db::Database;
use crate::error::AppError;
use crate::models::{HistoryEntry, ItemDetails, PlayContext, PlayedItem};
use crate::time_utils::{from_epoch_millis, to_epoch_millis};
use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

/// Columns shared by every history read, joined to context and item rows.
const HISTORY_SELECT: &str = r#"
    SELECT h.id, h.user_id, h.timestamp_ms, h.is_playing,
           c.type AS ctx_type, c.uri AS ctx_uri, c.href AS ctx_href,
           c.external_url AS ctx_external_url,
           i.type AS item_type, i.uri AS item_uri, i.name AS item_name,
           i.href AS item_href, i.external_url AS item_external_url,
           i.artists, i.album_name, i.album_uri,
           i.episode_description, i.show_name, i.show_description, i.show_uri
    FROM history h
    LEFT JOIN history_context c ON c.history_id = h.id
    LEFT JOIN history_item i ON i.history_id = h.id
"#;

// ─── Writes ──────────────────────────────────────────────────────────────────

/// Append a history entry and return its ID.
pub async fn insert_history(
    conn: &mut SqliteConnection,
    user_id: i64,
    timestamp: DateTime<Utc>,
    is_playing: bool,
) -> Result<i64, AppError> {
    let result =
        sqlx::query("INSERT INTO history (user_id, timestamp_ms, is_playing) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(to_epoch_millis(timestamp))
            .bind(is_playing)
            .execute(&mut *conn)
            .await?;
    Ok(result.last_insert_rowid())
}

/// Attach the playing context to a history entry.
pub async fn insert_history_context(
    conn: &mut SqliteConnection,
    history_id: i64,
    context: &PlayContext,
) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO history_context (history_id, type, href, external_url, uri) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(history_id)
    .bind(&context.kind)
    .bind(&context.href)
    .bind(&context.external_url)
    .bind(&context.uri)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Attach the played track or episode to a history entry.
pub async fn insert_history_item(
    conn: &mut SqliteConnection,
    history_id: i64,
    item: &PlayedItem,
) -> Result<(), AppError> {
    let query = sqlx::query(
        r#"
        INSERT INTO history_item (
            history_id, type, href, external_url, uri, name,
            artists, album_name, album_uri,
            episode_description, show_name, show_description, show_uri
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(history_id)
    .bind(item.details.kind())
    .bind(&item.href)
    .bind(&item.external_url)
    .bind(&item.uri)
    .bind(&item.name);

    let query = match &item.details {
        ItemDetails::Track {
            artists,
            album_name,
            album_uri,
        } => {
            let artists = serde_json::to_string(artists)
                .map_err(|e| AppError::Internal(anyhow::anyhow!("artist encoding: {}", e)))?;
            query
                .bind(Some(artists))
                .bind(Some(album_name.clone()))
                .bind(Some(album_uri.clone()))
                .bind(None::<String>)
                .bind(None::<String>)
                .bind(None::<String>)
                .bind(None::<String>)
        }
        ItemDetails::Episode {
            description,
            show_name,
            show_description,
            show_uri,
        } => query
            .bind(None::<String>)
            .bind(None::<String>)
            .bind(None::<String>)
            .bind(Some(description.clone()))
            .bind(Some(show_name.clone()))
            .bind(Some(show_description.clone()))
            .bind(Some(show_uri.clone())),
    };

    query.execute(&mut *conn).await?;
    Ok(())
}

// ─── Reads ───────────────────────────────────────────────────────────────────

impl Database {
    /// Append a bare entry (no context, no item). Used for "nothing playing".
    pub async fn insert_history(
        &self,
        user_id: i64,
        timestamp: DateTime<Utc>,
        is_playing: bool,
    ) -> Result<i64, AppError> {
        let mut conn = self.pool().acquire().await?;
        insert_history(&mut conn, user_id, timestamp, is_playing).await
    }

    /// Append an entry together with its context and item, atomically.
    pub async fn record_playback(
        &self,
        user_id: i64,
        timestamp: DateTime<Utc>,
        is_playing: bool,
        context: Option<&PlayContext>,
        item: &PlayedItem,
    ) -> Result<i64, AppError> {
        let mut tx = self.begin().await?;
        let history_id = insert_history(&mut tx, user_id, timestamp, is_playing).await?;
        if let Some(context) = context {
            insert_history_context(&mut tx, history_id, context).await?;
        }
        insert_history_item(&mut tx, history_id, item).await?;
        tx.commit().await?;
        Ok(history_id)
    }

    /// Most recently written entry for a user, complete or not.
    pub async fn get_last_history_entry(
        &self,
        user_id: i64,
    ) -> Result<Option<HistoryEntry>, AppError> {
        let sql = format!("{} WHERE h.user_id = ? ORDER BY h.id DESC LIMIT 1", HISTORY_SELECT);
        let row = sqlx::query_as::<_, HistoryRow>(&sql)
            .bind(user_id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.map(HistoryEntry::from))
    }

    /// Most recently written entry for a user that carries an item row.
    pub async fn get_last_complete_history_entry(
        &self,
        user_id: i64,
    ) -> Result<Option<HistoryEntry>, AppError> {
        let sql = format!(
            "{} WHERE h.user_id = ? AND i.history_id IS NOT NULL ORDER BY h.id DESC LIMIT 1",
            HISTORY_SELECT
        );
        let row = sqlx::query_as::<_, HistoryRow>(&sql)
            .bind(user_id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.map(HistoryEntry::from))
    }

    /// Entries for a user with `start <= timestamp <= end`, oldest first.
    pub async fn get_history_entries_between(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<HistoryEntry>, AppError> {
        let sql = format!(
            "{} WHERE h.user_id = ? AND h.timestamp_ms BETWEEN ? AND ? \
             ORDER BY h.timestamp_ms ASC, h.id ASC",
            HISTORY_SELECT
        );
        let rows = sqlx::query_as::<_, HistoryRow>(&sql)
            .bind(user_id)
            .bind(to_epoch_millis(start))
            .bind(to_epoch_millis(end))
            .fetch_all(self.pool())
            .await?;
        Ok(rows.into_iter().map(HistoryEntry::from).collect())
    }
}

/// Flat row produced by [`HISTORY_SELECT`].
#[derive(sqlx::FromRow)]
struct HistoryRow {
    id: i64,
    user_id: i64,
    timestamp_ms: i64,
    is_playing: bool,
    ctx_type: Option<String>,
    ctx_uri: Option<String>,
    ctx_href: Option<String>,
    ctx_external_url: Option<String>,
    item_type: Option<String>,
    item_uri: Option<String>,
    item_name: Option<String>,
    item_href: Option<String>,
    item_external_url: Option<String>,
    artists: Option<String>,
    album_name: Option<String>,
    album_uri: Option<String>,
    episode_description: Option<String>,
    show_name: Option<String>,
    show_description: Option<String>,
    show_uri: Option<String>,
}

impl From<HistoryRow> for HistoryEntry {
    fn from(row: HistoryRow) -> Self {
        let context = row.ctx_uri.map(|uri| PlayContext {
            kind: row.ctx_type.unwrap_or_default(),
            uri,
            href: row.ctx_href.unwrap_or_default(),
            external_url: row.ctx_external_url.unwrap_or_default(),
        });

        let details = match row.item_type.as_deref() {
            Some("track") => Some(ItemDetails::Track {
                artists: row
                    .artists
                    .as_deref()
                    .and_then(|a| serde_json::from_str(a).ok())
                    .unwrap_or_default(),
                album_name: row.album_name.unwrap_or_default(),
                album_uri: row.album_uri.unwrap_or_default(),
            }),
            Some("episode") => Some(ItemDetails::Episode {
                description: row.episode_description.unwrap_or_default(),
                show_name: row.show_name.unwrap_or_default(),
                show_description: row.show_description.unwrap_or_default(),
                show_uri: row.show_uri.unwrap_or_default(),
            }),
            Some(other) => {
                tracing::warn!(history_id = row.id, item_type = other, "Unknown stored item type");
                None
            }
            None => None,
        };

        let item = details.map(|details| PlayedItem {
            uri: row.item_uri.unwrap_or_default(),
            name: row.item_name.unwrap_or_default(),
            href: row.item_href.unwrap_or_default(),
            external_url: row.item_external_url.unwrap_or_default(),
            details,
        });

        HistoryEntry {
            id: row.id,
            user_id: row.user_id,
            timestamp: from_epoch_millis(row.timestamp_ms),
            is_playing: row.is_playing,
            context,
            item,
        }
    }
}
