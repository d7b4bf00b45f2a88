//! CRUD operations for [`Post`] records (the discussion feed).

use chrono::{DateTime, Utc};
use rusqlite::params;
use tandem_shared::{RoomCode, UserId};
use uuid::Uuid;

use crate::changes::ChangeKind;
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Post;

/// Table name used in change-feed events.
pub const TABLE: &str = "posts";

impl Database {
    /// Insert a new feed post.
    pub fn insert_post(&self, post: &Post) -> Result<()> {
        self.conn().execute(
            "INSERT INTO posts (id, room_code, author_id, body, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                post.id.to_string(),
                post.room_code.as_str(),
                post.author_id.as_str(),
                post.body,
                post.created_at.to_rfc3339(),
            ],
        )?;
        self.changes()
            .publish_row(TABLE, ChangeKind::Insert, &post.room_code, post);
        Ok(())
    }

    /// Delete a post by id.  Returns `true` if a row was deleted.
    pub fn delete_post(&self, id: Uuid) -> Result<bool> {
        let room = match self.post_room(id)? {
            Some(room) => room,
            None => return Ok(false),
        };

        let affected = self
            .conn()
            .execute("DELETE FROM posts WHERE id = ?1", params![id.to_string()])?;
        if affected > 0 {
            self.changes().publish_delete(TABLE, &room, id);
        }
        Ok(affected > 0)
    }

    /// Snapshot of a room's feed, newest first.
    pub fn list_posts(&self, room: &RoomCode) -> Result<Vec<Post>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, room_code, author_id, body, created_at
             FROM posts
             WHERE room_code = ?1
             ORDER BY created_at DESC, id ASC",
        )?;

        let rows = stmt.query_map(params![room.as_str()], row_to_post)?;

        let mut posts = Vec::new();
        for row in rows {
            posts.push(row?);
        }
        Ok(posts)
    }

    fn post_room(&self, id: Uuid) -> Result<Option<RoomCode>> {
        match self.conn().query_row(
            "SELECT room_code FROM posts WHERE id = ?1",
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

/// Map a `rusqlite::Row` to a [`Post`].
fn row_to_post(row: &rusqlite::Row<'_>) -> rusqlite::Result<Post> {
    let id_str: String = row.get(0)?;
    let room_str: String = row.get(1)?;
    let author_str: String = row.get(2)?;
    let body: String = row.get(3)?;
    let created_str: String = row.get(4)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Post {
        id,
        room_code: RoomCode(room_str),
        author_id: UserId(author_str),
        body,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn open_db(dir: &tempfile::TempDir) -> Database {
        Database::open_at(&dir.path().join("test.db")).unwrap()
    }

    fn post(room: &RoomCode, body: &str, hour: u32) -> Post {
        Post {
            id: Uuid::new_v4(),
            room_code: room.clone(),
            author_id: UserId::new("u1"),
            body: body.to_string(),
            created_at: Utc.with_ymd_and_hms(2026, 8, 1, hour, 0, 0).unwrap(),
        }
    }

    #[test]
    fn posts_list_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(&dir);
        let room = RoomCode::parse("r1").unwrap();

        db.insert_post(&post(&room, "third", 3)).unwrap();
        db.insert_post(&post(&room, "first", 1)).unwrap();
        db.insert_post(&post(&room, "second", 2)).unwrap();

        let bodies: Vec<String> = db
            .list_posts(&room)
            .unwrap()
            .into_iter()
            .map(|p| p.body)
            .collect();
        assert_eq!(bodies, vec!["third", "second", "first"]);
    }

    #[test]
    fn list_is_scoped_to_the_room() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(&dir);
        let r1 = RoomCode::parse("r1").unwrap();
        let r2 = RoomCode::parse("r2").unwrap();

        db.insert_post(&post(&r1, "ours", 1)).unwrap();
        db.insert_post(&post(&r2, "theirs", 2)).unwrap();

        let bodies: Vec<String> = db
            .list_posts(&r1)
            .unwrap()
            .into_iter()
            .map(|p| p.body)
            .collect();
        assert_eq!(bodies, vec!["ours"]);
    }

    #[test]
    fn deleting_a_missing_post_reports_false() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(&dir);

        assert!(!db.delete_post(Uuid::new_v4()).unwrap());
    }
}
