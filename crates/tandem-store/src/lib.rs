//! # tandem-store
//!
//! Durable storage for the Tandem synchronization core, backed by SQLite.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for every domain
//! model, plus a [`ChangeFeed`](changes::ChangeFeed): a broadcast channel on
//! which every committed record-table mutation publishes a row event.  The
//! sync layer bootstraps from ordered snapshot queries and stays current by
//! subscribing to the feed.

pub mod changes;
pub mod database;
pub mod feed;
pub mod ideas;
pub mod local;
pub mod migrations;
pub mod models;
pub mod profiles;
pub mod rooms;
pub mod watch;

mod error;

pub use changes::{ChangeFeed, ChangeKind, RowEvent};
pub use database::Database;
pub use error::StoreError;
pub use models::*;
