//! The generic list reconciler.
//!
//! [`ListSpec`] describes one synced record table; [`ListState`] is the
//! explicit per-room state machine that merges an ordered snapshot fetch
//! with live change events into one canonically-ordered in-memory list.

use std::cmp::Ordering;

use serde::Serialize;
use tandem_shared::{RoomCode, UserId};
use tandem_store::{Database, StoreError};
use tracing::debug;
use uuid::Uuid;

use crate::names::NameCache;

/// Everything the synchronizer needs to know about one record table.
pub trait ListSpec: Send + Sync + 'static {
    /// Table name as it appears in change-feed events.
    const TABLE: &'static str;

    /// Whether update/delete events trigger a wholesale room refetch
    /// (watchlist-like tables) instead of being ignored (feed-like tables,
    /// whose live path reacts to inserts only).
    const REFETCH_ON_MUTATION: bool;

    /// Whether a submit prepends the inserted row locally with the
    /// locally-known display name instead of waiting for its insert event.
    const LOCAL_ECHO_ON_SUBMIT: bool;

    type Row: Clone + Send + Sync + 'static;
    type Draft: Send + 'static;

    /// Decode a change-feed row.  Malformed payloads are absent, not errors.
    fn decode(row: &serde_json::Value) -> Option<Self::Row>;

    fn id(row: &Self::Row) -> Uuid;
    fn author(row: &Self::Row) -> &UserId;

    /// Canonical display order: `Less` means `a` renders above `b`.
    fn cmp(a: &Self::Row, b: &Self::Row) -> Ordering;

    /// The primary text field of a draft, validated non-empty on submit.
    fn draft_text(draft: &Self::Draft) -> &str;

    /// Ordered snapshot of the room's records.
    fn fetch(db: &Database, room: &RoomCode) -> Result<Vec<Self::Row>, StoreError>;

    /// Insert a new record authored by `author`, returning the stored row.
    fn insert(
        db: &Database,
        room: &RoomCode,
        author: &UserId,
        draft: Self::Draft,
    ) -> Result<Self::Row, StoreError>;

    /// Set the record's mutable flag.  Tables without one ignore the call.
    fn set_flag(_db: &Database, _id: Uuid, _value: bool) -> Result<bool, StoreError> {
        Ok(false)
    }

    /// Delete the record by id.
    fn delete(db: &Database, id: Uuid) -> Result<bool, StoreError>;
}

/// Lifecycle of one mounted room+table pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No room code present; list empty.
    Idle,
    /// Room present, snapshot fetch in flight; events already apply.
    Bootstrapping,
    /// Snapshot loaded; events apply incrementally.
    Live,
}

/// In-memory reconciled list for one room+table pairing.
///
/// The epoch increments on every room change; snapshot results carry the
/// epoch they were started under and are discarded when it no longer
/// matches, so a late response for a stale room can never touch the
/// current room's list.
pub struct ListState<S: ListSpec> {
    room: Option<RoomCode>,
    epoch: u64,
    phase: Phase,
    rows: Vec<S::Row>,
}

impl<S: ListSpec> ListState<S> {
    pub fn new() -> Self {
        Self {
            room: None,
            epoch: 0,
            phase: Phase::Idle,
            rows: Vec::new(),
        }
    }

    pub fn room(&self) -> Option<&RoomCode> {
        self.room.as_ref()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn rows(&self) -> &[S::Row] {
        &self.rows
    }

    /// Enter a room (or leave with `None`).  Clears the list, bumps the
    /// epoch, and returns the tag the next snapshot fetch must carry.
    pub fn set_room(&mut self, room: Option<RoomCode>) -> u64 {
        self.epoch += 1;
        self.rows.clear();
        self.phase = if room.is_some() {
            Phase::Bootstrapping
        } else {
            Phase::Idle
        };
        self.room = room;
        self.epoch
    }

    /// Apply a resolved snapshot tagged with the epoch it was started under.
    ///
    /// While bootstrapping, rows already applied from events are merged by
    /// id (union, never appended twice).  Once live, the fetched rows
    /// replace the list wholesale: that is the refetch path, and merging
    /// would resurrect rows deleted since the last fetch.
    ///
    /// Returns whether the list changed state; a stale-epoch snapshot is
    /// discarded.
    pub fn apply_snapshot(&mut self, epoch: u64, mut fetched: Vec<S::Row>) -> bool {
        if epoch != self.epoch {
            debug!(
                table = S::TABLE,
                stale_epoch = epoch,
                current_epoch = self.epoch,
                "discarding snapshot for a superseded room"
            );
            return false;
        }

        if self.phase == Phase::Bootstrapping {
            let seen: Vec<Uuid> = fetched.iter().map(S::id).collect();
            for row in self.rows.drain(..) {
                if !seen.contains(&S::id(&row)) {
                    fetched.push(row);
                }
            }
        }

        fetched.sort_by(S::cmp);
        self.rows = fetched;
        self.phase = Phase::Live;
        true
    }

    /// Apply an insert event, keeping canonical order.  A row whose id is
    /// already present (own echo, or snapshot raced the event) is left
    /// alone.  Returns whether the list changed.
    pub fn apply_insert(&mut self, row: S::Row) -> bool {
        if self.room.is_none() {
            return false;
        }
        let id = S::id(&row);
        if self.rows.iter().any(|r| S::id(r) == id) {
            return false;
        }

        let pos = self
            .rows
            .partition_point(|r| S::cmp(r, &row) == Ordering::Less);
        self.rows.insert(pos, row);
        true
    }
}

impl<S: ListSpec> Default for ListState<S> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Enrichment
// ---------------------------------------------------------------------------

/// A record plus its resolved author name.  Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Enriched<R> {
    pub row: R,
    /// Resolved display name; empty string when unresolved.
    pub author_name: String,
}

/// Recompute the enriched list from the raw rows and the name map.
pub fn enrich<S: ListSpec>(rows: &[S::Row], names: &NameCache) -> Vec<Enriched<S::Row>> {
    rows.iter()
        .map(|row| Enriched {
            row: row.clone(),
            author_name: names.name_for(S::author(row)).to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::{FeedSpec, WatchlistSpec};
    use chrono::{TimeZone, Utc};
    use tandem_store::{Post, WatchItem};

    fn post(body: &str, hour: u32) -> Post {
        Post {
            id: Uuid::new_v4(),
            room_code: RoomCode::parse("r1").unwrap(),
            author_id: UserId::new("u1"),
            body: body.to_string(),
            created_at: Utc.with_ymd_and_hms(2026, 8, 1, hour, 0, 0).unwrap(),
        }
    }

    fn watch_item(title: &str, watched: bool, hour: u32) -> WatchItem {
        WatchItem {
            id: Uuid::new_v4(),
            room_code: RoomCode::parse("r1").unwrap(),
            author_id: UserId::new("u1"),
            title: title.to_string(),
            watched,
            created_at: Utc.with_ymd_and_hms(2026, 8, 1, hour, 0, 0).unwrap(),
        }
    }

    #[test]
    fn feed_orders_newest_first() {
        let mut state = ListState::<FeedSpec>::new();
        let epoch = state.set_room(RoomCode::parse("r1"));

        state.apply_snapshot(epoch, vec![post("t3", 3), post("t1", 1), post("t2", 2)]);

        let bodies: Vec<&str> = state.rows().iter().map(|p| p.body.as_str()).collect();
        assert_eq!(bodies, vec!["t3", "t2", "t1"]);
    }

    #[test]
    fn watchlist_orders_unwatched_first_then_newest() {
        let mut state = ListState::<WatchlistSpec>::new();
        let epoch = state.set_room(RoomCode::parse("r1"));

        state.apply_snapshot(
            epoch,
            vec![
                watch_item("t5", true, 5),
                watch_item("t2", false, 2),
                watch_item("t4", false, 4),
            ],
        );

        let titles: Vec<&str> = state.rows().iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["t4", "t2", "t5"]);
    }

    #[test]
    fn event_before_snapshot_converges_without_duplicates() {
        let mut state = ListState::<FeedSpec>::new();
        let epoch = state.set_room(RoomCode::parse("r1"));

        let a = post("a", 1);
        let b = post("b", 2);

        // The insert event for `b` races ahead of the snapshot that already
        // contains both records.
        assert!(state.apply_insert(b.clone()));
        assert!(state.apply_snapshot(epoch, vec![a.clone(), b.clone()]));

        let ids: Vec<Uuid> = state.rows().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![b.id, a.id]);
    }

    #[test]
    fn event_after_snapshot_converges_without_duplicates() {
        let mut state = ListState::<FeedSpec>::new();
        let epoch = state.set_room(RoomCode::parse("r1"));

        let a = post("a", 1);
        let b = post("b", 2);

        assert!(state.apply_snapshot(epoch, vec![a.clone()]));
        assert!(state.apply_insert(b.clone()));
        assert!(!state.apply_insert(b.clone()), "duplicate must not re-apply");

        let ids: Vec<Uuid> = state.rows().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![b.id, a.id]);
    }

    #[test]
    fn stale_snapshot_is_discarded() {
        let mut state = ListState::<FeedSpec>::new();
        let old_epoch = state.set_room(RoomCode::parse("room-a"));
        state.set_room(RoomCode::parse("room-b"));

        assert!(!state.apply_snapshot(old_epoch, vec![post("from room a", 1)]));
        assert!(state.rows().is_empty());
        assert_eq!(state.phase(), Phase::Bootstrapping);
    }

    #[test]
    fn leaving_the_room_clears_the_list() {
        let mut state = ListState::<FeedSpec>::new();
        let epoch = state.set_room(RoomCode::parse("r1"));
        state.apply_snapshot(epoch, vec![post("a", 1)]);

        state.set_room(None);
        assert_eq!(state.phase(), Phase::Idle);
        assert!(state.rows().is_empty());
        assert!(!state.apply_insert(post("late", 2)));
    }

    #[test]
    fn live_snapshot_replaces_wholesale() {
        let mut state = ListState::<FeedSpec>::new();
        let epoch = state.set_room(RoomCode::parse("r1"));

        let a = post("a", 1);
        let b = post("b", 2);
        state.apply_snapshot(epoch, vec![a.clone(), b.clone()]);

        // Refetch after `a` was deleted elsewhere: the gone row must not
        // be resurrected by a merge.
        state.apply_snapshot(epoch, vec![b.clone()]);
        let ids: Vec<Uuid> = state.rows().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![b.id]);
    }

    #[test]
    fn enrichment_is_total() {
        let mut state = ListState::<FeedSpec>::new();
        let epoch = state.set_room(RoomCode::parse("r1"));
        state.apply_snapshot(epoch, vec![post("a", 1)]);

        let names = NameCache::new();
        let enriched = enrich::<FeedSpec>(state.rows(), &names);
        assert_eq!(enriched.len(), 1);
        assert_eq!(enriched[0].author_name, "");
    }
}
