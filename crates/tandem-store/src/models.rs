//! Domain model structs persisted in the local SQLite database.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can travel on
//! the change feed as a JSON row and be handed directly to a UI layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tandem_shared::{RoomCode, UserId};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

/// A shared room: the flat namespace two partners join by code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Room {
    /// The user-chosen code; primary key.
    pub code: RoomCode,
    /// When the room was first created.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Membership
// ---------------------------------------------------------------------------

/// The relation recording which identities belong to which room.
/// Unique per `(room_code, user_id)` pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Membership {
    pub room_code: RoomCode,
    pub user_id: UserId,
    pub joined_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// A user profile row.  Holds the mutable display name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub user_id: UserId,
    /// `None` until the user sets a name.
    pub display_name: Option<String>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Watch item
// ---------------------------------------------------------------------------

/// An entry on the shared watchlist.  Any member of the room may toggle
/// `watched` or delete the entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WatchItem {
    /// Unique record identifier.
    pub id: Uuid,
    /// The room this entry belongs to.
    pub room_code: RoomCode,
    /// Who added the entry.
    pub author_id: UserId,
    /// The title to watch.
    pub title: String,
    /// Whether the pair has watched it yet.
    pub watched: bool,
    /// When the entry was created.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Post
// ---------------------------------------------------------------------------

/// A discussion feed entry.  Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Post {
    pub id: Uuid,
    pub room_code: RoomCode,
    pub author_id: UserId,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Idea
// ---------------------------------------------------------------------------

/// A shared date-idea entry.  Immutable once created; removable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Idea {
    pub id: Uuid,
    pub room_code: RoomCode,
    pub author_id: UserId,
    pub text: String,
    pub created_at: DateTime<Utc>,
}
