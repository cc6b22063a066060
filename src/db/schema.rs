//! Database schema and migrations.
//!
//! Migrations are applied in order; the schema_version table records
//! which ones have run.

/// Database migrations.
pub const MIGRATIONS: &[&str] = &[
    // v1: rooms and upload sessions
    r#"
-- Data rooms. Each room owns exactly one root folder.
CREATE TABLE rooms (
    id              TEXT PRIMARY KEY,
    name            TEXT NOT NULL,
    size            INTEGER NOT NULL,
    expires         TEXT NOT NULL,
    root_folder_id  TEXT NOT NULL UNIQUE,
    created         TEXT NOT NULL
);

-- File metadata. A row is the upload session until status becomes 'published'.
CREATE TABLE files (
    id              TEXT PRIMARY KEY,
    file_id         TEXT NOT NULL,
    file_hash       TEXT,
    name            TEXT NOT NULL,
    description     TEXT,
    created         TEXT NOT NULL,
    expires         TEXT NOT NULL,
    status          TEXT NOT NULL DEFAULT 'uploading'
                    CHECK (status IN ('uploading', 'published')),
    size            INTEGER NOT NULL,
    chunks          INTEGER NOT NULL CHECK (chunks >= 1),
    folder_id       TEXT NOT NULL REFERENCES rooms(root_folder_id),
    author_id       TEXT,
    UNIQUE (file_id, folder_id)
);

CREATE INDEX idx_files_folder_id ON files(folder_id);
CREATE INDEX idx_files_status ON files(status);
"#,
];
