//! [`ListSpec`] implementations for the three synced tables.

use std::cmp::Ordering;

use chrono::Utc;
use tandem_shared::{RoomCode, UserId};
use tandem_store::{feed, ideas, watch, Database, Idea, Post, StoreError, WatchItem};
use uuid::Uuid;

use crate::list::ListSpec;

// ---------------------------------------------------------------------------
// Watchlist
// ---------------------------------------------------------------------------

/// The shared watchlist: unwatched entries first, newest first within each
/// group.  Toggles and removals replace the list through a room refetch.
pub struct WatchlistSpec;

/// Submit payload for a watchlist entry.
#[derive(Debug, Clone)]
pub struct WatchDraft {
    pub title: String,
}

impl ListSpec for WatchlistSpec {
    const TABLE: &'static str = watch::TABLE;
    const REFETCH_ON_MUTATION: bool = true;
    const LOCAL_ECHO_ON_SUBMIT: bool = false;

    type Row = WatchItem;
    type Draft = WatchDraft;

    fn decode(row: &serde_json::Value) -> Option<Self::Row> {
        serde_json::from_value(row.clone()).ok()
    }

    fn id(row: &Self::Row) -> Uuid {
        row.id
    }

    fn author(row: &Self::Row) -> &UserId {
        &row.author_id
    }

    fn cmp(a: &Self::Row, b: &Self::Row) -> Ordering {
        a.watched
            .cmp(&b.watched)
            .then_with(|| b.created_at.cmp(&a.created_at))
            .then_with(|| a.id.cmp(&b.id))
    }

    fn draft_text(draft: &Self::Draft) -> &str {
        &draft.title
    }

    fn fetch(db: &Database, room: &RoomCode) -> Result<Vec<Self::Row>, StoreError> {
        db.list_watch_items(room)
    }

    fn insert(
        db: &Database,
        room: &RoomCode,
        author: &UserId,
        draft: Self::Draft,
    ) -> Result<Self::Row, StoreError> {
        let item = WatchItem {
            id: Uuid::new_v4(),
            room_code: room.clone(),
            author_id: author.clone(),
            title: draft.title.trim().to_string(),
            watched: false,
            created_at: Utc::now(),
        };
        db.insert_watch_item(&item)?;
        Ok(item)
    }

    fn set_flag(db: &Database, id: Uuid, value: bool) -> Result<bool, StoreError> {
        db.set_watched(id, value)
    }

    fn delete(db: &Database, id: Uuid) -> Result<bool, StoreError> {
        db.delete_watch_item(id)
    }
}

// ---------------------------------------------------------------------------
// Discussion feed
// ---------------------------------------------------------------------------

/// The discussion feed: newest first, live path reacts to inserts only, so
/// a submit echoes the new post locally with the locally-known name.
pub struct FeedSpec;

/// Submit payload for a feed post.
#[derive(Debug, Clone)]
pub struct PostDraft {
    pub body: String,
}

impl ListSpec for FeedSpec {
    const TABLE: &'static str = feed::TABLE;
    const REFETCH_ON_MUTATION: bool = false;
    const LOCAL_ECHO_ON_SUBMIT: bool = true;

    type Row = Post;
    type Draft = PostDraft;

    fn decode(row: &serde_json::Value) -> Option<Self::Row> {
        serde_json::from_value(row.clone()).ok()
    }

    fn id(row: &Self::Row) -> Uuid {
        row.id
    }

    fn author(row: &Self::Row) -> &UserId {
        &row.author_id
    }

    fn cmp(a: &Self::Row, b: &Self::Row) -> Ordering {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    }

    fn draft_text(draft: &Self::Draft) -> &str {
        &draft.body
    }

    fn fetch(db: &Database, room: &RoomCode) -> Result<Vec<Self::Row>, StoreError> {
        db.list_posts(room)
    }

    fn insert(
        db: &Database,
        room: &RoomCode,
        author: &UserId,
        draft: Self::Draft,
    ) -> Result<Self::Row, StoreError> {
        let post = Post {
            id: Uuid::new_v4(),
            room_code: room.clone(),
            author_id: author.clone(),
            body: draft.body.trim().to_string(),
            created_at: Utc::now(),
        };
        db.insert_post(&post)?;
        Ok(post)
    }

    fn delete(db: &Database, id: Uuid) -> Result<bool, StoreError> {
        db.delete_post(id)
    }
}

// ---------------------------------------------------------------------------
// Date ideas
// ---------------------------------------------------------------------------

/// The shared date-ideas list: newest first; removals land live through a
/// room refetch.
pub struct IdeasSpec;

/// Submit payload for a date idea.
#[derive(Debug, Clone)]
pub struct IdeaDraft {
    pub text: String,
}

impl ListSpec for IdeasSpec {
    const TABLE: &'static str = ideas::TABLE;
    const REFETCH_ON_MUTATION: bool = true;
    const LOCAL_ECHO_ON_SUBMIT: bool = false;

    type Row = Idea;
    type Draft = IdeaDraft;

    fn decode(row: &serde_json::Value) -> Option<Self::Row> {
        serde_json::from_value(row.clone()).ok()
    }

    fn id(row: &Self::Row) -> Uuid {
        row.id
    }

    fn author(row: &Self::Row) -> &UserId {
        &row.author_id
    }

    fn cmp(a: &Self::Row, b: &Self::Row) -> Ordering {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    }

    fn draft_text(draft: &Self::Draft) -> &str {
        &draft.text
    }

    fn fetch(db: &Database, room: &RoomCode) -> Result<Vec<Self::Row>, StoreError> {
        db.list_ideas(room)
    }

    fn insert(
        db: &Database,
        room: &RoomCode,
        author: &UserId,
        draft: Self::Draft,
    ) -> Result<Self::Row, StoreError> {
        let idea = Idea {
            id: Uuid::new_v4(),
            room_code: room.clone(),
            author_id: author.clone(),
            text: draft.text.trim().to_string(),
            created_at: Utc::now(),
        };
        db.insert_idea(&idea)?;
        Ok(idea)
    }

    fn delete(db: &Database, id: Uuid) -> Result<bool, StoreError> {
        db.delete_idea(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_event_rows_decode_to_none() {
        let garbage = serde_json::json!({ "unexpected": "shape" });
        assert!(WatchlistSpec::decode(&garbage).is_none());
        assert!(FeedSpec::decode(&garbage).is_none());
        assert!(IdeasSpec::decode(&garbage).is_none());
    }

    #[test]
    fn published_rows_decode_back() {
        let post = Post {
            id: Uuid::new_v4(),
            room_code: RoomCode::parse("r1").unwrap(),
            author_id: UserId::new("u1"),
            body: "hello".to_string(),
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&post).unwrap();
        let decoded = FeedSpec::decode(&value).unwrap();
        assert_eq!(decoded.id, post.id);
        assert_eq!(decoded.body, "hello");
    }
}
