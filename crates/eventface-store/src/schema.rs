//! Database schema. Applied idempotently on every open.

pub(crate) const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS identities (
    user_id     TEXT PRIMARY KEY,
    created_at  TEXT NOT NULL
);

-- Reference descriptors, little-endian f32. The lowest id per identity is
-- its representative.
CREATE TABLE IF NOT EXISTS descriptors (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     TEXT NOT NULL REFERENCES identities(user_id) ON DELETE CASCADE,
    descriptor  BLOB NOT NULL,
    dim         INTEGER NOT NULL,
    created_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_descriptors_user ON descriptors(user_id);

CREATE TABLE IF NOT EXISTS events (
    event_id    TEXT PRIMARY KEY,
    status      TEXT NOT NULL CHECK (status IN ('processing', 'ready')),
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS event_images (
    id          TEXT PRIMARY KEY,
    event_id    TEXT NOT NULL REFERENCES events(event_id) ON DELETE CASCADE,
    image_url   TEXT NOT NULL,
    processed   INTEGER NOT NULL,
    face_count  INTEGER NOT NULL,
    error       TEXT,
    created_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_event_images_event ON event_images(event_id);

CREATE TABLE IF NOT EXISTS face_matches (
    id          TEXT PRIMARY KEY,
    event_id    TEXT NOT NULL REFERENCES events(event_id) ON DELETE CASCADE,
    user_id     TEXT NOT NULL,
    image_url   TEXT NOT NULL,
    face_index  INTEGER NOT NULL,
    distance    REAL,
    created_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_face_matches_event ON face_matches(event_id);
"#;
