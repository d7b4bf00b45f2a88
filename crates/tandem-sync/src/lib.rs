//! # tandem-sync
//!
//! The room-scoped collaborative synchronization core.
//!
//! Two paired clients keep shared lists (a watchlist, a discussion feed, a
//! date-ideas list) consistent through the durable row store and its change
//! feed.  Each mounted room+table pairing is owned by one synchronizer task
//! that bootstraps from an ordered snapshot, reconciles live change events
//! into the in-memory list, and enriches records with resolved author names.
//!
//! The [`Hub`] wires everything together and is the surface a UI consumes:
//! reactive read models (`identity`, `room_code`, the three lists) plus the
//! operations to sign in, join a room, and mutate records.

pub mod engine;
pub mod hub;
pub mod identity;
pub mod list;
pub mod names;
pub mod rooms;
pub mod session;
pub mod tables;

mod error;

pub use engine::{spawn_list_sync, ListCommand, ListHandle};
pub use error::{Result, SyncError};
pub use hub::Hub;
pub use identity::IdentityResolver;
pub use list::{enrich, Enriched, ListSpec, ListState, Phase};
pub use names::NameCache;
pub use rooms::join_or_create_room;
pub use session::{LocalSessions, Session, SessionEvent, SessionProvider};
pub use tables::{FeedSpec, IdeaDraft, IdeasSpec, PostDraft, WatchDraft, WatchlistSpec};
