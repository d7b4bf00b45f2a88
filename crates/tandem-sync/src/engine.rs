//! The live list synchronizer task.
//!
//! One task per mounted room+table pairing owns that list's state
//! exclusively.  External code communicates with it through a typed command
//! channel and reads results from a `watch` channel, keeping the engine
//! fully asynchronous and decoupled.  The change-feed subscription is opened
//! at spawn time, before any snapshot fetch can start, so no event falls in
//! the gap between snapshot and subscription.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tandem_shared::constants::LIST_COMMAND_CAPACITY;
use tandem_shared::{Identity, RoomCode, UserId};
use tandem_store::{ChangeKind, Database, RowEvent};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Result, SyncError};
use crate::list::{enrich, Enriched, ListSpec, ListState};
use crate::names::NameCache;
use crate::session::SessionProvider;

/// Commands sent *into* the synchronizer task.
pub enum ListCommand<S: ListSpec> {
    /// Mount a room (or unmount with `None`).
    SetRoom(Option<RoomCode>),
    /// Insert a new record authored by the current user.
    Submit {
        draft: S::Draft,
        reply: oneshot::Sender<Result<()>>,
    },
    /// Fire-and-forget flag mutation.
    Toggle { id: Uuid, value: bool },
    /// Fire-and-forget removal.
    Remove { id: Uuid },
    /// Stop the task.
    Shutdown,
}

/// Handle to a running synchronizer: command sender plus the enriched-list
/// read model.
pub struct ListHandle<S: ListSpec> {
    cmd_tx: mpsc::Sender<ListCommand<S>>,
    records_rx: watch::Receiver<Vec<Enriched<S::Row>>>,
}

impl<S: ListSpec> ListHandle<S> {
    /// The reactive list read model.
    pub fn records(&self) -> watch::Receiver<Vec<Enriched<S::Row>>> {
        self.records_rx.clone()
    }

    pub async fn set_room(&self, room: Option<RoomCode>) -> Result<()> {
        self.cmd_tx
            .send(ListCommand::SetRoom(room))
            .await
            .map_err(|_| SyncError::EngineClosed)
    }

    /// Submit a draft and wait for the precondition checks and the insert.
    pub async fn submit(&self, draft: S::Draft) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(ListCommand::Submit {
                draft,
                reply: reply_tx,
            })
            .await
            .map_err(|_| SyncError::EngineClosed)?;
        reply_rx.await.map_err(|_| SyncError::EngineClosed)?
    }

    pub async fn toggle(&self, id: Uuid, value: bool) -> Result<()> {
        self.cmd_tx
            .send(ListCommand::Toggle { id, value })
            .await
            .map_err(|_| SyncError::EngineClosed)
    }

    pub async fn remove(&self, id: Uuid) -> Result<()> {
        self.cmd_tx
            .send(ListCommand::Remove { id })
            .await
            .map_err(|_| SyncError::EngineClosed)
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.cmd_tx
            .send(ListCommand::Shutdown)
            .await
            .map_err(|_| SyncError::EngineClosed)
    }
}

/// Spawn the synchronizer for one record table.
///
/// The returned handle starts in `Idle`; mount a room with
/// [`ListHandle::set_room`].
pub fn spawn_list_sync<S: ListSpec>(
    db: Arc<Mutex<Database>>,
    sessions: Arc<dyn SessionProvider>,
    identity_rx: watch::Receiver<Option<Identity>>,
) -> Result<ListHandle<S>> {
    // Subscribe before any snapshot fetch can start.
    let events = db
        .lock()
        .map_err(|_| SyncError::Poisoned)?
        .changes()
        .subscribe();

    let (cmd_tx, cmd_rx) = mpsc::channel(LIST_COMMAND_CAPACITY);
    let (records_tx, records_rx) = watch::channel(Vec::new());

    let engine = Engine::<S> {
        db,
        sessions,
        identity_rx,
        state: ListState::new(),
        names: NameCache::new(),
        records_tx,
    };
    tokio::spawn(engine.run(cmd_rx, events));

    Ok(ListHandle { cmd_tx, records_rx })
}

// ---------------------------------------------------------------------------
// Engine internals
// ---------------------------------------------------------------------------

type Snapshot<S> = JoinHandle<(u64, Result<Vec<<S as ListSpec>::Row>>)>;

struct Engine<S: ListSpec> {
    db: Arc<Mutex<Database>>,
    sessions: Arc<dyn SessionProvider>,
    identity_rx: watch::Receiver<Option<Identity>>,
    state: ListState<S>,
    names: NameCache,
    records_tx: watch::Sender<Vec<Enriched<S::Row>>>,
}

impl<S: ListSpec> Engine<S> {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::Receiver<ListCommand<S>>,
        mut events: broadcast::Receiver<RowEvent>,
    ) {
        let mut snapshot: Option<Snapshot<S>> = None;

        debug!(table = S::TABLE, "list synchronizer started");

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(ListCommand::SetRoom(room)) => {
                        let epoch = self.state.set_room(room.clone());
                        self.names.reset();
                        self.publish();
                        snapshot = room.map(|room| self.spawn_fetch(epoch, room));
                    }
                    Some(ListCommand::Submit { draft, reply }) => {
                        let _ = reply.send(self.handle_submit(draft));
                    }
                    Some(ListCommand::Toggle { id, value }) => self.handle_toggle(id, value),
                    Some(ListCommand::Remove { id }) => self.handle_remove(id),
                    Some(ListCommand::Shutdown) | None => break,
                },

                event = events.recv() => match event {
                    Ok(event) => {
                        if let Some(epoch) = self.handle_event(event) {
                            if let Some(room) = self.state.room().cloned() {
                                snapshot = Some(self.spawn_fetch(epoch, room));
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(table = S::TABLE, missed, "change feed lagged, refetching");
                        if let Some(room) = self.state.room().cloned() {
                            snapshot = Some(self.spawn_fetch(self.state.epoch(), room));
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        warn!(table = S::TABLE, "change feed closed");
                        break;
                    }
                },

                result = poll_snapshot::<S>(&mut snapshot), if snapshot.is_some() => {
                    snapshot = None;
                    match result {
                        Ok((epoch, Ok(rows))) => {
                            if self.state.apply_snapshot(epoch, rows) {
                                self.names.reset();
                                self.refresh_names();
                                self.publish();
                            }
                        }
                        Ok((_, Err(e))) => {
                            warn!(
                                table = S::TABLE,
                                error = %e,
                                "snapshot fetch failed, keeping last known list"
                            );
                        }
                        Err(e) => {
                            warn!(table = S::TABLE, error = %e, "snapshot task failed");
                        }
                    }
                }
            }
        }

        debug!(table = S::TABLE, "list synchronizer stopped");
    }

    /// Apply one change-feed event.  Returns the epoch to refetch under when
    /// the event calls for a wholesale refresh.
    fn handle_event(&mut self, event: RowEvent) -> Option<u64> {
        if event.table != S::TABLE {
            return None;
        }
        match self.state.room() {
            Some(room) if *room == event.room => {}
            Some(_) => {
                debug!(
                    table = S::TABLE,
                    event_room = %event.room,
                    "ignoring event for another room"
                );
                return None;
            }
            None => return None,
        }

        match event.kind {
            ChangeKind::Insert => {
                let row = match S::decode(&event.row) {
                    Some(row) => row,
                    None => {
                        debug!(table = S::TABLE, "ignoring undecodable row event");
                        return None;
                    }
                };
                if self.state.apply_insert(row) {
                    self.refresh_names();
                    self.publish();
                }
                None
            }
            ChangeKind::Update | ChangeKind::Delete if S::REFETCH_ON_MUTATION => {
                Some(self.state.epoch())
            }
            ChangeKind::Update | ChangeKind::Delete => None,
        }
    }

    fn handle_submit(&mut self, draft: S::Draft) -> Result<()> {
        if S::draft_text(&draft).trim().is_empty() {
            debug!(table = S::TABLE, "ignoring empty submission");
            return Ok(());
        }

        // Author resolution happens at submit time, not from a cached value.
        let session = self
            .sessions
            .current_session()
            .ok_or(SyncError::NoIdentity)?;
        let room = self.state.room().cloned().ok_or(SyncError::NoRoom)?;

        let row = {
            let db = self.db.lock().map_err(|_| SyncError::Poisoned)?;
            S::insert(&db, &room, &session.user_id, draft)?
        };

        if S::LOCAL_ECHO_ON_SUBMIT {
            let name = self
                .identity_rx
                .borrow()
                .as_ref()
                .map(Identity::local_name)
                .unwrap_or_default();
            self.names.seed(session.user_id.clone(), name);
            if self.state.apply_insert(row) {
                self.refresh_names();
                self.publish();
            }
        }

        Ok(())
    }

    fn handle_toggle(&mut self, id: Uuid, value: bool) {
        match self.db.lock() {
            Ok(db) => {
                if let Err(e) = S::set_flag(&db, id, value) {
                    warn!(
                        table = S::TABLE,
                        %id,
                        error = %e,
                        "toggle failed, list converges on the next event"
                    );
                }
            }
            Err(_) => warn!(table = S::TABLE, "storage handle poisoned during toggle"),
        }
    }

    fn handle_remove(&mut self, id: Uuid) {
        match self.db.lock() {
            Ok(db) => {
                if let Err(e) = S::delete(&db, id) {
                    warn!(
                        table = S::TABLE,
                        %id,
                        error = %e,
                        "remove failed, list converges on the next event"
                    );
                }
            }
            Err(_) => warn!(table = S::TABLE, "storage handle poisoned during remove"),
        }
    }

    fn spawn_fetch(&self, epoch: u64, room: RoomCode) -> Snapshot<S> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let result = match db.lock() {
                Ok(db) => S::fetch(&db, &room).map_err(SyncError::from),
                Err(_) => Err(SyncError::Poisoned),
            };
            (epoch, result)
        })
    }

    fn refresh_names(&mut self) {
        let ids: HashSet<UserId> = self
            .state
            .rows()
            .iter()
            .map(|row| S::author(row).clone())
            .collect();
        self.names.resolve(&self.db, &ids);
    }

    fn publish(&self) {
        self.records_tx
            .send_replace(enrich::<S>(self.state.rows(), &self.names));
    }
}

async fn poll_snapshot<S: ListSpec>(
    snapshot: &mut Option<Snapshot<S>>,
) -> std::result::Result<(u64, Result<Vec<S::Row>>), tokio::task::JoinError> {
    match snapshot.as_mut() {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}
