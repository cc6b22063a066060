//! Room types and repository.

use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::db::uuid_column;
use crate::{DataRoomError, Result};

/// A data room.
#[derive(Debug, Clone)]
pub struct Room {
    /// Room identity.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Quota in bytes (informational).
    pub size: i64,
    /// When the room expires.
    pub expires: DateTime<Utc>,
    /// Identity of the room's single root folder.
    pub root_folder_id: Uuid,
    /// When the room was created.
    pub created: DateTime<Utc>,
}

impl<'r> FromRow<'r, SqliteRow> for Room {
    fn from_row(row: &'r SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: uuid_column(row, "id")?,
            name: row.try_get("name")?,
            size: row.try_get("size")?,
            expires: row.try_get("expires")?,
            root_folder_id: uuid_column(row, "root_folder_id")?,
            created: row.try_get("created")?,
        })
    }
}

/// Storage usage of a room.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoomUsage {
    /// Sum of declared file sizes in bytes.
    pub size_used: i64,
    /// Number of files (published or uploading).
    pub num_files: i64,
}

/// Data for creating a new room.
#[derive(Debug, Clone)]
pub struct NewRoom {
    /// Display name.
    pub name: String,
    /// Quota in bytes.
    pub size: i64,
    /// Lifetime from creation.
    pub ttl: Duration,
}

impl NewRoom {
    /// Create a NewRoom with a 30 day lifetime.
    pub fn new(name: impl Into<String>, size: i64) -> Self {
        Self {
            name: name.into(),
            size,
            ttl: Duration::days(30),
        }
    }

    /// Set the lifetime in days.
    pub fn with_ttl_days(mut self, days: i64) -> Self {
        self.ttl = Duration::days(days);
        self
    }
}

const ROOM_COLUMNS: &str = "id, name, size, expires, root_folder_id, created";

/// Repository for room operations.
pub struct RoomRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> RoomRepository<'a> {
    /// Create a new RoomRepository with the given database pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a room with fresh room and root folder identities.
    pub async fn create(&self, new_room: &NewRoom) -> Result<Room> {
        let now = Utc::now();
        let room = Room {
            id: Uuid::new_v4(),
            name: new_room.name.clone(),
            size: new_room.size,
            expires: now + new_room.ttl,
            root_folder_id: Uuid::new_v4(),
            created: now,
        };

        sqlx::query(
            "INSERT INTO rooms (id, name, size, expires, root_folder_id, created)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(room.id.to_string())
        .bind(&room.name)
        .bind(room.size)
        .bind(room.expires)
        .bind(room.root_folder_id.to_string())
        .bind(room.created)
        .execute(self.pool)
        .await
        .map_err(|e| DataRoomError::Database(e.to_string()))?;

        info!("Created room {} ({})", room.id, room.name);
        Ok(room)
    }

    /// Get a room by ID.
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<Room>> {
        let room = sqlx::query_as::<_, Room>(&format!(
            "SELECT {ROOM_COLUMNS} FROM rooms WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(self.pool)
        .await
        .map_err(|e| DataRoomError::Database(e.to_string()))?;

        Ok(room)
    }

    /// List all rooms, oldest first.
    pub async fn list(&self) -> Result<Vec<Room>> {
        let rooms = sqlx::query_as::<_, Room>(&format!(
            "SELECT {ROOM_COLUMNS} FROM rooms ORDER BY created, id"
        ))
        .fetch_all(self.pool)
        .await
        .map_err(|e| DataRoomError::Database(e.to_string()))?;

        Ok(rooms)
    }

    /// Compute the storage usage of the room owning `root_folder_id`.
    pub async fn usage(&self, root_folder_id: Uuid) -> Result<RoomUsage> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(size), 0) AS size_used, COUNT(*) AS num_files
             FROM files WHERE folder_id = ?",
        )
        .bind(root_folder_id.to_string())
        .fetch_one(self.pool)
        .await
        .map_err(|e| DataRoomError::Database(e.to_string()))?;

        Ok(RoomUsage {
            size_used: row.try_get("size_used")?,
            num_files: row.try_get("num_files")?,
        })
    }

    /// Delete a room. Returns the number of rooms deleted (0 if it did not exist).
    ///
    /// A room that still holds files is rejected with a conflict.
    pub async fn delete(&self, id: Uuid) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        let root_folder_id: Option<String> =
            sqlx::query_scalar("SELECT root_folder_id FROM rooms WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&mut *tx)
                .await?;

        let Some(root_folder_id) = root_folder_id else {
            return Ok(0);
        };

        let files: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files WHERE folder_id = ?")
            .bind(&root_folder_id)
            .fetch_one(&mut *tx)
            .await?;
        if files > 0 {
            return Err(DataRoomError::Conflict(format!(
                "room still contains {files} file(s)"
            )));
        }

        let result = sqlx::query("DELETE FROM rooms WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!("Deleted room {}", id);
        Ok(result.rows_affected())
    }
}
