/// Local-cache key under which the last joined room code is persisted.
pub const LOCAL_KEY_ROOM_CODE: &str = "tandem.room";

/// Capacity of the change-feed broadcast channel.
pub const CHANGE_FEED_CAPACITY: usize = 256;

/// Capacity of the session-event broadcast channel.
pub const SESSION_EVENT_CAPACITY: usize = 16;

/// Capacity of the per-list command channel.
pub const LIST_COMMAND_CAPACITY: usize = 64;
