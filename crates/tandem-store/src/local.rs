//! The local key-value cache.
//!
//! A tiny JSON store scoped to this client only.  Tandem uses it to remember
//! the last joined room code across restarts; nothing in it is ever synced.

use rusqlite::params;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::database::Database;
use crate::error::{Result, StoreError};

impl Database {
    /// Store a value under a key, replacing any previous value.
    pub fn local_set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        self.conn().execute(
            "INSERT OR REPLACE INTO local_cache (key, value) VALUES (?1, ?2)",
            params![key, json],
        )?;
        Ok(())
    }

    /// Read a value back.  Missing keys and undecodable values both come
    /// back as `None`; a corrupt cache entry must never take the app down.
    pub fn local_get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let json = match self.conn().query_row(
            "SELECT value FROM local_cache WHERE key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        ) {
            Ok(json) => json,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(StoreError::Sqlite(e)),
        };

        match serde_json::from_str(&json) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(key, error = %e, "discarding malformed local cache entry");
                Ok(None)
            }
        }
    }
}
