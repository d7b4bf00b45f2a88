//! CRUD operations for [`Room`] and [`Membership`] records.
//!
//! Both upserts are idempotent by design: creating a room that already
//! exists, or re-adding an existing member, is a no-op rather than a
//! constraint violation.

use chrono::{DateTime, Utc};
use rusqlite::params;
use tandem_shared::{RoomCode, UserId};

use crate::database::Database;
use crate::error::Result;
use crate::models::{Membership, Room};

impl Database {
    // ------------------------------------------------------------------
    // Rooms
    // ------------------------------------------------------------------

    /// Create the room if it does not exist yet.  An existing room is left
    /// untouched.
    pub fn upsert_room(&self, room: &Room) -> Result<()> {
        self.conn().execute(
            "INSERT OR IGNORE INTO rooms (code, created_at) VALUES (?1, ?2)",
            params![room.code.as_str(), room.created_at.to_rfc3339()],
        )?;
        Ok(())
    }

    /// Whether a room with this code exists.
    pub fn room_exists(&self, code: &RoomCode) -> Result<bool> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM rooms WHERE code = ?1",
            params![code.as_str()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    // ------------------------------------------------------------------
    // Memberships
    // ------------------------------------------------------------------

    /// Attach the user to the room if not already a member.  A duplicate
    /// `(room, user)` pair is a no-op.
    pub fn upsert_membership(&self, membership: &Membership) -> Result<()> {
        self.conn().execute(
            "INSERT OR IGNORE INTO room_members (room_code, user_id, joined_at)
             VALUES (?1, ?2, ?3)",
            params![
                membership.room_code.as_str(),
                membership.user_id.as_str(),
                membership.joined_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// List the members of a room, oldest join first.
    pub fn members_of(&self, code: &RoomCode) -> Result<Vec<Membership>> {
        let mut stmt = self.conn().prepare(
            "SELECT room_code, user_id, joined_at
             FROM room_members
             WHERE room_code = ?1
             ORDER BY joined_at ASC",
        )?;

        let rows = stmt.query_map(params![code.as_str()], row_to_membership)?;

        let mut members = Vec::new();
        for row in rows {
            members.push(row?);
        }
        Ok(members)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`Membership`].
fn row_to_membership(row: &rusqlite::Row<'_>) -> rusqlite::Result<Membership> {
    let room_str: String = row.get(0)?;
    let user_str: String = row.get(1)?;
    let joined_str: String = row.get(2)?;

    let joined_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&joined_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Membership {
        room_code: RoomCode(room_str),
        user_id: UserId(user_str),
        joined_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_db(dir: &tempfile::TempDir) -> Database {
        Database::open_at(&dir.path().join("test.db")).unwrap()
    }

    #[test]
    fn creating_a_room_twice_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(&dir);

        let room = Room {
            code: RoomCode::parse("our-room").unwrap(),
            created_at: Utc::now(),
        };
        db.upsert_room(&room).unwrap();
        db.upsert_room(&room).expect("second upsert must not error");

        assert!(db.room_exists(&room.code).unwrap());
    }

    #[test]
    fn duplicate_membership_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(&dir);

        let code = RoomCode::parse("our-room").unwrap();
        db.upsert_room(&Room {
            code: code.clone(),
            created_at: Utc::now(),
        })
        .unwrap();

        let membership = Membership {
            room_code: code.clone(),
            user_id: UserId::new("u1"),
            joined_at: Utc::now(),
        };
        db.upsert_membership(&membership).unwrap();
        db.upsert_membership(&membership)
            .expect("second upsert must not error");

        let members = db.members_of(&code).unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].user_id, UserId::new("u1"));
    }

    #[test]
    fn unknown_room_has_no_members() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(&dir);

        let members = db.members_of(&RoomCode::parse("nowhere").unwrap()).unwrap();
        assert!(members.is_empty());
    }
}
