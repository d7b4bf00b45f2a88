//! CRUD operations for [`Profile`] records.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::params;
use tandem_shared::UserId;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Profile;

impl Database {
    /// Insert or update the profile row for a user.  Repeated calls with the
    /// same name have no additional effect beyond the `updated_at` bump.
    pub fn upsert_profile(&self, profile: &Profile) -> Result<()> {
        self.conn().execute(
            "INSERT INTO profiles (user_id, display_name, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET
                 display_name = excluded.display_name,
                 updated_at   = excluded.updated_at",
            params![
                profile.user_id.as_str(),
                profile.display_name,
                profile.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Fetch a profile by user id.  A missing row is `Ok(None)`, not an
    /// error: most users have no profile until they set a display name.
    pub fn get_profile(&self, user_id: &UserId) -> Result<Option<Profile>> {
        match self.conn().query_row(
            "SELECT user_id, display_name, updated_at FROM profiles WHERE user_id = ?1",
            params![user_id.as_str()],
            row_to_profile,
        ) {
            Ok(profile) => Ok(Some(profile)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Sqlite(e)),
        }
    }

    /// Batched display-name lookup.  Returns one entry per id that has a
    /// profile row with a name set; callers default the rest.
    pub fn display_names(&self, user_ids: &[UserId]) -> Result<HashMap<UserId, String>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let placeholders = vec!["?"; user_ids.len()].join(", ");
        let sql = format!(
            "SELECT user_id, display_name FROM profiles
             WHERE display_name IS NOT NULL AND user_id IN ({placeholders})"
        );

        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map(
            rusqlite::params_from_iter(user_ids.iter().map(|id| id.as_str())),
            |row| {
                let id: String = row.get(0)?;
                let name: String = row.get(1)?;
                Ok((UserId(id), name))
            },
        )?;

        let mut names = HashMap::new();
        for row in rows {
            let (id, name) = row?;
            names.insert(id, name);
        }
        Ok(names)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`Profile`].
fn row_to_profile(row: &rusqlite::Row<'_>) -> rusqlite::Result<Profile> {
    let user_str: String = row.get(0)?;
    let display_name: Option<String> = row.get(1)?;
    let updated_str: String = row.get(2)?;

    let updated_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&updated_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Profile {
        user_id: UserId(user_str),
        display_name,
        updated_at,
    })
}
