//! The change feed: a broadcast channel carrying one event per committed
//! record-table mutation.
//!
//! Subscribers receive every event and filter by table and room on their own
//! side; a lagging subscriber misses events (broadcast semantics) and is
//! expected to recover through its next snapshot fetch.

use serde::Serialize;
use tandem_shared::constants::CHANGE_FEED_CAPACITY;
use tandem_shared::RoomCode;
use tokio::sync::broadcast;

/// What happened to the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One committed mutation of a room-scoped record table.
///
/// `row` is the full row as JSON for inserts and updates, and an
/// `{"id": ...}` stub for deletes.
#[derive(Debug, Clone)]
pub struct RowEvent {
    pub table: &'static str,
    pub kind: ChangeKind,
    pub room: RoomCode,
    pub row: serde_json::Value,
}

/// Fan-out sender for [`RowEvent`]s, owned by the [`Database`].
///
/// [`Database`]: crate::Database
#[derive(Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<RowEvent>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self { tx }
    }

    /// Open a new subscription.  Only events published after this call are
    /// delivered.
    pub fn subscribe(&self) -> broadcast::Receiver<RowEvent> {
        self.tx.subscribe()
    }

    /// Publish a full-row event.  Having no subscribers is not an error.
    pub fn publish_row<T: Serialize>(
        &self,
        table: &'static str,
        kind: ChangeKind,
        room: &RoomCode,
        row: &T,
    ) {
        match serde_json::to_value(row) {
            Ok(value) => {
                let _ = self.tx.send(RowEvent {
                    table,
                    kind,
                    room: room.clone(),
                    row: value,
                });
            }
            Err(e) => {
                tracing::warn!(table, error = %e, "failed to serialize row event");
            }
        }
    }

    /// Publish a delete event carrying only the row id.
    pub fn publish_delete(&self, table: &'static str, room: &RoomCode, id: uuid::Uuid) {
        let _ = self.tx.send(RowEvent {
            table,
            kind: ChangeKind::Delete,
            room: room.clone(),
            row: serde_json::json!({ "id": id.to_string() }),
        });
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}
