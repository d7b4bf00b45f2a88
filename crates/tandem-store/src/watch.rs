//! CRUD operations for [`WatchItem`] records.
//!
//! Every committed mutation is published on the change feed under the
//! `watch_items` table name.

use chrono::{DateTime, Utc};
use rusqlite::params;
use tandem_shared::{RoomCode, UserId};
use uuid::Uuid;

use crate::changes::ChangeKind;
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::WatchItem;

/// Table name used in change-feed events.
pub const TABLE: &str = "watch_items";

impl Database {
    /// Insert a new watchlist entry.
    pub fn insert_watch_item(&self, item: &WatchItem) -> Result<()> {
        self.conn().execute(
            "INSERT INTO watch_items (id, room_code, author_id, title, watched, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                item.id.to_string(),
                item.room_code.as_str(),
                item.author_id.as_str(),
                item.title,
                item.watched as i64,
                item.created_at.to_rfc3339(),
            ],
        )?;
        self.changes()
            .publish_row(TABLE, ChangeKind::Insert, &item.room_code, item);
        Ok(())
    }

    /// Fetch a single entry by id.
    pub fn get_watch_item(&self, id: Uuid) -> Result<WatchItem> {
        self.conn()
            .query_row(
                "SELECT id, room_code, author_id, title, watched, created_at
                 FROM watch_items WHERE id = ?1",
                params![id.to_string()],
                row_to_watch_item,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Set the watched flag.  Returns `true` if a row was updated.
    pub fn set_watched(&self, id: Uuid, watched: bool) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE watch_items SET watched = ?1 WHERE id = ?2",
            params![watched as i64, id.to_string()],
        )?;
        if affected == 0 {
            return Ok(false);
        }

        let item = self.get_watch_item(id)?;
        self.changes()
            .publish_row(TABLE, ChangeKind::Update, &item.room_code, &item);
        Ok(true)
    }

    /// Delete an entry by id.  Returns `true` if a row was deleted.
    pub fn delete_watch_item(&self, id: Uuid) -> Result<bool> {
        let item = match self.get_watch_item(id) {
            Ok(item) => item,
            Err(StoreError::NotFound) => return Ok(false),
            Err(e) => return Err(e),
        };

        let affected = self.conn().execute(
            "DELETE FROM watch_items WHERE id = ?1",
            params![id.to_string()],
        )?;
        if affected > 0 {
            self.changes().publish_delete(TABLE, &item.room_code, id);
        }
        Ok(affected > 0)
    }

    /// Snapshot of a room's watchlist in canonical order: unwatched entries
    /// first, newest first within each group.
    pub fn list_watch_items(&self, room: &RoomCode) -> Result<Vec<WatchItem>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, room_code, author_id, title, watched, created_at
             FROM watch_items
             WHERE room_code = ?1
             ORDER BY watched ASC, created_at DESC, id ASC",
        )?;

        let rows = stmt.query_map(params![room.as_str()], row_to_watch_item)?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`WatchItem`].
fn row_to_watch_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<WatchItem> {
    let id_str: String = row.get(0)?;
    let room_str: String = row.get(1)?;
    let author_str: String = row.get(2)?;
    let title: String = row.get(3)?;
    let watched: i64 = row.get(4)?;
    let created_str: String = row.get(5)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(WatchItem {
        id,
        room_code: RoomCode(room_str),
        author_id: UserId(author_str),
        title,
        watched: watched != 0,
        created_at,
    })
}
