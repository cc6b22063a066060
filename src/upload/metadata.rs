//! File metadata records.
//!
//! A `files` row is both the upload session (while `uploading`) and the
//! metadata of the published artifact afterwards.

use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};
use uuid::Uuid;

use crate::db::uuid_column;
use crate::{DataRoomError, Result};

/// Lifecycle status of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileStatus {
    /// Chunks are still arriving; the file cannot be downloaded.
    Uploading,
    /// The artifact is assembled and downloadable.
    Published,
}

impl FileStatus {
    /// Database and wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Uploading => "uploading",
            FileStatus::Published => "published",
        }
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for FileStatus {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        match s.as_str() {
            "uploading" => Ok(FileStatus::Uploading),
            "published" => Ok(FileStatus::Published),
            other => Err(format!("unknown file status: {other}")),
        }
    }
}

/// Metadata of an uploaded (or uploading) file.
#[derive(Debug, Clone)]
pub struct FileMeta {
    /// Session identity; also names the staged chunks and the artifact.
    pub id: Uuid,
    /// Client-supplied file identifier.
    pub file_id: String,
    /// Advertised content hash. Stored, never verified.
    pub file_hash: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub created: DateTime<Utc>,
    pub expires: DateTime<Utc>,
    pub status: FileStatus,
    /// Declared total size in bytes.
    pub size: i64,
    /// Expected number of payload chunks.
    pub chunks: u32,
    /// Owning folder (a room's root folder).
    pub folder_id: Uuid,
    pub author_id: Option<String>,
}

impl FileMeta {
    /// Whether the session can no longer accept chunks.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == FileStatus::Uploading && self.expires <= now
    }

    /// Whether `chunk_number` is a valid payload index for this file.
    pub fn accepts_chunk(&self, chunk_number: u32) -> bool {
        (1..=self.chunks).contains(&chunk_number)
    }
}

impl<'r> FromRow<'r, SqliteRow> for FileMeta {
    fn from_row(row: &'r SqliteRow) -> sqlx::Result<Self> {
        let status: String = row.try_get("status")?;
        let status = FileStatus::try_from(status).map_err(|e| sqlx::Error::ColumnDecode {
            index: "status".to_string(),
            source: e.into(),
        })?;

        Ok(Self {
            id: uuid_column(row, "id")?,
            file_id: row.try_get("file_id")?,
            file_hash: row.try_get("file_hash")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            created: row.try_get("created")?,
            expires: row.try_get("expires")?,
            status,
            size: row.try_get("size")?,
            chunks: row.try_get("chunks")?,
            folder_id: uuid_column(row, "folder_id")?,
            author_id: row.try_get("author_id")?,
        })
    }
}

/// Data for creating a new upload session.
#[derive(Debug, Clone)]
pub struct NewFileMeta {
    pub file_id: String,
    pub folder_id: Uuid,
    pub name: String,
    pub size: i64,
    pub chunks: u32,
    pub file_hash: Option<String>,
    pub description: Option<String>,
    pub author_id: Option<String>,
    /// Session lifetime from creation.
    pub ttl: Duration,
}

impl NewFileMeta {
    /// Create a NewFileMeta with a 10 day session lifetime.
    pub fn new(
        file_id: impl Into<String>,
        folder_id: Uuid,
        name: impl Into<String>,
        size: i64,
        chunks: u32,
    ) -> Self {
        Self {
            file_id: file_id.into(),
            folder_id,
            name: name.into(),
            size,
            chunks,
            file_hash: None,
            description: None,
            author_id: None,
            ttl: Duration::days(10),
        }
    }

    /// Set the advertised content hash.
    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.file_hash = Some(hash.into());
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the session lifetime in days.
    pub fn with_ttl_days(mut self, days: i64) -> Self {
        self.ttl = Duration::days(days);
        self
    }
}

const FILE_COLUMNS: &str = "id, file_id, file_hash, name, description, created, expires, \
                            status, size, chunks, folder_id, author_id";

/// Repository for file metadata.
pub struct FileMetaRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> FileMetaRepository<'a> {
    /// Create a new FileMetaRepository with the given database pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new `uploading` row unless one already exists for
    /// `(file_id, folder_id)`. Returns whether a row was inserted.
    pub async fn create_if_absent(&self, id: Uuid, new_meta: &NewFileMeta) -> Result<bool> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO files (id, file_id, file_hash, name, description, created, expires,
                                status, size, chunks, folder_id, author_id)
             VALUES (?, ?, ?, ?, ?, ?, ?, 'uploading', ?, ?, ?, ?)
             ON CONFLICT (file_id, folder_id) DO NOTHING",
        )
        .bind(id.to_string())
        .bind(&new_meta.file_id)
        .bind(&new_meta.file_hash)
        .bind(&new_meta.name)
        .bind(&new_meta.description)
        .bind(now)
        .bind(now + new_meta.ttl)
        .bind(new_meta.size)
        .bind(new_meta.chunks)
        .bind(new_meta.folder_id.to_string())
        .bind(&new_meta.author_id)
        .execute(self.pool)
        .await
        .map_err(|e| DataRoomError::Database(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }

    /// Get a file by session id.
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<FileMeta>> {
        let meta = sqlx::query_as::<_, FileMeta>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(self.pool)
        .await
        .map_err(|e| DataRoomError::Database(e.to_string()))?;

        Ok(meta)
    }

    /// Find the session for a client file identifier within a folder.
    pub async fn find_by_external_id(
        &self,
        file_id: &str,
        folder_id: Uuid,
    ) -> Result<Option<FileMeta>> {
        let meta = sqlx::query_as::<_, FileMeta>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE file_id = ? AND folder_id = ?"
        ))
        .bind(file_id)
        .bind(folder_id.to_string())
        .fetch_optional(self.pool)
        .await
        .map_err(|e| DataRoomError::Database(e.to_string()))?;

        Ok(meta)
    }

    /// List files in a folder, oldest first.
    pub async fn list_by_folder(&self, folder_id: Uuid) -> Result<Vec<FileMeta>> {
        let files = sqlx::query_as::<_, FileMeta>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE folder_id = ? ORDER BY created, id"
        ))
        .bind(folder_id.to_string())
        .fetch_all(self.pool)
        .await
        .map_err(|e| DataRoomError::Database(e.to_string()))?;

        Ok(files)
    }

    /// List all sessions still in `uploading` status.
    pub async fn list_uploading(&self) -> Result<Vec<FileMeta>> {
        let files = sqlx::query_as::<_, FileMeta>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE status = 'uploading' ORDER BY created, id"
        ))
        .fetch_all(self.pool)
        .await
        .map_err(|e| DataRoomError::Database(e.to_string()))?;

        Ok(files)
    }

    /// Flip `uploading` to `published`.
    ///
    /// Returns `true` only for the call that performed the transition.
    pub async fn mark_published(&self, id: Uuid) -> Result<bool> {
        let result =
            sqlx::query("UPDATE files SET status = 'published' WHERE id = ? AND status = 'uploading'")
                .bind(id.to_string())
                .execute(self.pool)
                .await
                .map_err(|e| DataRoomError::Database(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }
}
