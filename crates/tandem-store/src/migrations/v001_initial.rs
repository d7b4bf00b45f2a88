//! v001 -- Initial schema creation.
//!
//! Creates the room/membership/profile tables, the three synced record
//! tables (`watch_items`, `posts`, `ideas`), and the local key-value cache.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Rooms
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS rooms (
    code       TEXT PRIMARY KEY NOT NULL,    -- user-chosen shared code
    created_at TEXT NOT NULL                 -- ISO-8601 / RFC-3339
);

-- ----------------------------------------------------------------
-- Room members
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS room_members (
    room_code TEXT NOT NULL,                 -- FK -> rooms(code)
    user_id   TEXT NOT NULL,                 -- opaque session user id
    joined_at TEXT NOT NULL,

    PRIMARY KEY (room_code, user_id),
    FOREIGN KEY (room_code) REFERENCES rooms(code)
);

-- ----------------------------------------------------------------
-- Profiles
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS profiles (
    user_id      TEXT PRIMARY KEY NOT NULL,
    display_name TEXT,
    updated_at   TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- Watch items
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS watch_items (
    id         TEXT PRIMARY KEY NOT NULL,    -- UUID v4
    room_code  TEXT NOT NULL,                -- FK -> rooms(code)
    author_id  TEXT NOT NULL,
    title      TEXT NOT NULL,
    watched    INTEGER NOT NULL DEFAULT 0,   -- boolean 0/1
    created_at TEXT NOT NULL,

    FOREIGN KEY (room_code) REFERENCES rooms(code)
);

CREATE INDEX IF NOT EXISTS idx_watch_items_room_created
    ON watch_items(room_code, created_at DESC);

-- ----------------------------------------------------------------
-- Feed posts
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS posts (
    id         TEXT PRIMARY KEY NOT NULL,    -- UUID v4
    room_code  TEXT NOT NULL,                -- FK -> rooms(code)
    author_id  TEXT NOT NULL,
    body       TEXT NOT NULL,
    created_at TEXT NOT NULL,

    FOREIGN KEY (room_code) REFERENCES rooms(code)
);

CREATE INDEX IF NOT EXISTS idx_posts_room_created
    ON posts(room_code, created_at DESC);

-- ----------------------------------------------------------------
-- Date ideas
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS ideas (
    id         TEXT PRIMARY KEY NOT NULL,    -- UUID v4
    room_code  TEXT NOT NULL,                -- FK -> rooms(code)
    author_id  TEXT NOT NULL,
    text       TEXT NOT NULL,
    created_at TEXT NOT NULL,

    FOREIGN KEY (room_code) REFERENCES rooms(code)
);

CREATE INDEX IF NOT EXISTS idx_ideas_room_created
    ON ideas(room_code, created_at DESC);

-- ----------------------------------------------------------------
-- Local key-value cache (per-profile, never synced)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS local_cache (
    key   TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL                      -- JSON
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
