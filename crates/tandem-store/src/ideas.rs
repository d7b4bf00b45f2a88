//! CRUD operations for [`Idea`] records (the shared date-ideas list).

use chrono::{DateTime, Utc};
use rusqlite::params;
use tandem_shared::{RoomCode, UserId};
use uuid::Uuid;

use crate::changes::ChangeKind;
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Idea;

/// Table name used in change-feed events.
pub const TABLE: &str = "ideas";

impl Database {
    /// Insert a new idea.
    pub fn insert_idea(&self, idea: &Idea) -> Result<()> {
        self.conn().execute(
            "INSERT INTO ideas (id, room_code, author_id, text, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                idea.id.to_string(),
                idea.room_code.as_str(),
                idea.author_id.as_str(),
                idea.text,
                idea.created_at.to_rfc3339(),
            ],
        )?;
        self.changes()
            .publish_row(TABLE, ChangeKind::Insert, &idea.room_code, idea);
        Ok(())
    }

    /// Delete an idea by id.  Returns `true` if a row was deleted.
    pub fn delete_idea(&self, id: Uuid) -> Result<bool> {
        let room = match self.idea_room(id)? {
            Some(room) => room,
            None => return Ok(false),
        };

        let affected = self
            .conn()
            .execute("DELETE FROM ideas WHERE id = ?1", params![id.to_string()])?;
        if affected > 0 {
            self.changes().publish_delete(TABLE, &room, id);
        }
        Ok(affected > 0)
    }

    /// Snapshot of a room's ideas, newest first.
    pub fn list_ideas(&self, room: &RoomCode) -> Result<Vec<Idea>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, room_code, author_id, text, created_at
             FROM ideas
             WHERE room_code = ?1
             ORDER BY created_at DESC, id ASC",
        )?;

        let rows = stmt.query_map(params![room.as_str()], row_to_idea)?;

        let mut ideas = Vec::new();
        for row in rows {
            ideas.push(row?);
        }
        Ok(ideas)
    }

    fn idea_room(&self, id: Uuid) -> Result<Option<RoomCode>> {
        match self.conn().query_row(
            "SELECT room_code FROM ideas WHERE id = ?1",
            params![id.to_string()],
            |row| row.get::<_, String>(0),
        ) {
            Ok(room) => Ok(Some(RoomCode(room))),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Sqlite(e)),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to an [`Idea`].
fn row_to_idea(row: &rusqlite::Row<'_>) -> rusqlite::Result<Idea> {
    let id_str: String = row.get(0)?;
    let room_str: String = row.get(1)?;
    let author_str: String = row.get(2)?;
    let text: String = row.get(3)?;
    let created_str: String = row.get(4)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Idea {
        id,
        room_code: RoomCode(room_str),
        author_id: UserId(author_str),
        text,
        created_at,
    })
}
