//! The hub: one wiring point for the whole synchronization core.
//!
//! Owns the identity resolver and one synchronizer per record table, and
//! exposes the operations and reactive read models a UI consumes.

use std::sync::{Arc, Mutex};

use tandem_shared::constants::LOCAL_KEY_ROOM_CODE;
use tandem_shared::{Identity, RoomCode};
use tandem_store::{Database, Idea, Post, WatchItem};
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::{spawn_list_sync, ListHandle};
use crate::error::Result;
use crate::identity::IdentityResolver;
use crate::list::Enriched;
use crate::rooms;
use crate::session::SessionProvider;
use crate::tables::{FeedSpec, IdeaDraft, IdeasSpec, PostDraft, WatchDraft, WatchlistSpec};

/// The synchronization core for one client.
pub struct Hub {
    sessions: Arc<dyn SessionProvider>,
    db: Arc<Mutex<Database>>,
    resolver: IdentityResolver,
    room_tx: watch::Sender<Option<RoomCode>>,
    watchlist: ListHandle<WatchlistSpec>,
    feed: ListHandle<FeedSpec>,
    ideas: ListHandle<IdeasSpec>,
}

impl Hub {
    /// Wire the core against a session provider and an open store.
    ///
    /// When a room code was remembered from a previous run, the
    /// synchronizers mount it immediately; membership was persisted when
    /// the room was first joined.
    pub async fn new(
        sessions: Arc<dyn SessionProvider>,
        db: Arc<Mutex<Database>>,
    ) -> Result<Self> {
        let resolver = IdentityResolver::spawn(Arc::clone(&sessions), Arc::clone(&db));

        let watchlist = spawn_list_sync::<WatchlistSpec>(
            Arc::clone(&db),
            Arc::clone(&sessions),
            resolver.watch(),
        )?;
        let feed = spawn_list_sync::<FeedSpec>(
            Arc::clone(&db),
            Arc::clone(&sessions),
            resolver.watch(),
        )?;
        let ideas = spawn_list_sync::<IdeasSpec>(
            Arc::clone(&db),
            Arc::clone(&sessions),
            resolver.watch(),
        )?;

        let (room_tx, _) = watch::channel(None);

        let hub = Self {
            sessions,
            db,
            resolver,
            room_tx,
            watchlist,
            feed,
            ideas,
        };

        if let Some(code) = hub.cached_room_code() {
            info!(room = %code, "restoring remembered room");
            hub.mount_room(code).await?;
        }

        Ok(hub)
    }

    // ------------------------------------------------------------------
    // Read models
    // ------------------------------------------------------------------

    pub fn identity(&self) -> watch::Receiver<Option<Identity>> {
        self.resolver.watch()
    }

    pub fn room_code(&self) -> watch::Receiver<Option<RoomCode>> {
        self.room_tx.subscribe()
    }

    pub fn watchlist(&self) -> watch::Receiver<Vec<Enriched<WatchItem>>> {
        self.watchlist.records()
    }

    pub fn feed(&self) -> watch::Receiver<Vec<Enriched<Post>>> {
        self.feed.records()
    }

    pub fn ideas(&self) -> watch::Receiver<Vec<Enriched<Idea>>> {
        self.ideas.records()
    }

    // ------------------------------------------------------------------
    // Identity operations
    // ------------------------------------------------------------------

    /// Dispatch a passwordless sign-in challenge.
    pub fn request_sign_in(&self, contact: &str) -> Result<()> {
        self.sessions.sign_in_with_challenge(contact)
    }

    /// End the session.  Already-synced lists stay visible; writes start
    /// failing their identity precondition.
    pub fn sign_out(&self) {
        self.sessions.sign_out();
    }

    pub fn update_display_name(&self, name: &str) -> Result<()> {
        self.resolver.update_display_name(name)
    }

    // ------------------------------------------------------------------
    // Room operations
    // ------------------------------------------------------------------

    /// Create-or-join a room by code and mount every synchronizer into it.
    ///
    /// A code that trims empty is a silent no-op (`Ok(None)`).
    pub async fn join_or_create_room(&self, code: &str) -> Result<Option<RoomCode>> {
        match rooms::join_or_create_room(&self.sessions, &self.db, code)? {
            None => Ok(None),
            Some(code) => {
                self.mount_room(code.clone()).await?;
                Ok(Some(code))
            }
        }
    }

    // ------------------------------------------------------------------
    // List operations
    // ------------------------------------------------------------------

    pub async fn submit_watch_item(&self, title: &str) -> Result<()> {
        self.watchlist
            .submit(WatchDraft {
                title: title.to_string(),
            })
            .await
    }

    pub async fn toggle_watched(&self, id: Uuid, watched: bool) -> Result<()> {
        self.watchlist.toggle(id, watched).await
    }

    pub async fn remove_watch_item(&self, id: Uuid) -> Result<()> {
        self.watchlist.remove(id).await
    }

    pub async fn submit_post(&self, body: &str) -> Result<()> {
        self.feed
            .submit(PostDraft {
                body: body.to_string(),
            })
            .await
    }

    pub async fn remove_post(&self, id: Uuid) -> Result<()> {
        self.feed.remove(id).await
    }

    pub async fn submit_idea(&self, text: &str) -> Result<()> {
        self.ideas
            .submit(IdeaDraft {
                text: text.to_string(),
            })
            .await
    }

    pub async fn remove_idea(&self, id: Uuid) -> Result<()> {
        self.ideas.remove(id).await
    }

    /// Stop every synchronizer and the identity resolver.
    pub async fn shutdown(self) {
        let _ = self.watchlist.shutdown().await;
        let _ = self.feed.shutdown().await;
        let _ = self.ideas.shutdown().await;
        self.resolver.shutdown();
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn mount_room(&self, code: RoomCode) -> Result<()> {
        self.watchlist.set_room(Some(code.clone())).await?;
        self.feed.set_room(Some(code.clone())).await?;
        self.ideas.set_room(Some(code.clone())).await?;
        self.room_tx.send_replace(Some(code));
        Ok(())
    }

    fn cached_room_code(&self) -> Option<RoomCode> {
        let db = match self.db.lock() {
            Ok(db) => db,
            Err(_) => {
                warn!("storage handle poisoned while restoring room code");
                return None;
            }
        };
        match db.local_get::<RoomCode>(LOCAL_KEY_ROOM_CODE) {
            Ok(code) => code,
            Err(e) => {
                warn!(error = %e, "failed to read remembered room code");
                None
            }
        }
    }
}
