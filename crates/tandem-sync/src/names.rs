//! The name resolution cache.
//!
//! Memoizes author-id to display-name lookups so enrichment costs one
//! batched profile query per reconciliation pass instead of one per record.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use tandem_shared::UserId;
use tandem_store::Database;
use tracing::warn;

/// Memoized id → display-name map.
///
/// Absent profiles resolve to the empty string, never an error.  The cache
/// is reset whenever a list is replaced wholesale so profile-name changes
/// made elsewhere are picked up.
pub struct NameCache {
    names: HashMap<UserId, String>,
}

impl NameCache {
    pub fn new() -> Self {
        Self {
            names: HashMap::new(),
        }
    }

    /// Drop all memoized names.
    pub fn reset(&mut self) {
        self.names.clear();
    }

    /// Record a locally-known name without a lookup (own submissions).
    pub fn seed(&mut self, id: UserId, name: String) {
        self.names.entry(id).or_insert(name);
    }

    /// Ensure every id in the set is memoized, fetching the unresolved
    /// subset in one batched lookup.  A failed lookup leaves the missing
    /// ids unresolved for this pass so the next pass retries them.
    pub fn resolve(&mut self, db: &Mutex<Database>, ids: &HashSet<UserId>) {
        let missing: Vec<UserId> = ids
            .iter()
            .filter(|id| !self.names.contains_key(*id))
            .cloned()
            .collect();
        if missing.is_empty() {
            return;
        }

        let fetched = match db.lock() {
            Ok(db) => match db.display_names(&missing) {
                Ok(map) => map,
                Err(e) => {
                    warn!(error = %e, "batched name lookup failed");
                    return;
                }
            },
            Err(_) => {
                warn!("storage handle poisoned during name lookup");
                return;
            }
        };

        for id in missing {
            let name = fetched.get(&id).cloned().unwrap_or_default();
            self.names.insert(id, name);
        }
    }

    /// The display name for an id: memoized value, or `""` when unknown.
    pub fn name_for(&self, id: &UserId) -> &str {
        self.names.get(id).map(String::as_str).unwrap_or("")
    }
}

impl Default for NameCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tandem_store::Profile;

    fn open_db(dir: &tempfile::TempDir) -> Mutex<Database> {
        Mutex::new(Database::open_at(&dir.path().join("test.db")).unwrap())
    }

    #[test]
    fn unknown_authors_resolve_to_empty_string() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(&dir);
        let mut cache = NameCache::new();

        let ghost = UserId::new("ghost");
        cache.resolve(&db, &HashSet::from([ghost.clone()]));
        assert_eq!(cache.name_for(&ghost), "");
    }

    #[test]
    fn known_profiles_are_fetched_once_and_memoized() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(&dir);

        let ada = UserId::new("ada");
        db.lock()
            .unwrap()
            .upsert_profile(&Profile {
                user_id: ada.clone(),
                display_name: Some("Ada".to_string()),
                updated_at: Utc::now(),
            })
            .unwrap();

        let mut cache = NameCache::new();
        cache.resolve(&db, &HashSet::from([ada.clone()]));
        assert_eq!(cache.name_for(&ada), "Ada");

        // Stale until reset: the memo survives a later profile change.
        db.lock()
            .unwrap()
            .upsert_profile(&Profile {
                user_id: ada.clone(),
                display_name: Some("Lady Lovelace".to_string()),
                updated_at: Utc::now(),
            })
            .unwrap();
        cache.resolve(&db, &HashSet::from([ada.clone()]));
        assert_eq!(cache.name_for(&ada), "Ada");

        cache.reset();
        cache.resolve(&db, &HashSet::from([ada.clone()]));
        assert_eq!(cache.name_for(&ada), "Lady Lovelace");
    }

    #[test]
    fn seeding_does_not_override_a_fetched_name() {
        let mut cache = NameCache::new();
        let ada = UserId::new("ada");

        cache.seed(ada.clone(), "Ada".to_string());
        cache.seed(ada.clone(), "Someone Else".to_string());
        assert_eq!(cache.name_for(&ada), "Ada");
    }
}
