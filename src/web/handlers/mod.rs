//! API handlers.

pub mod room;
pub mod upload;

pub use room::*;
pub use upload::*;

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::db::Database;
use crate::upload::{
    ArtifactStore, ChunkStore, SessionLocks, UploadService, DEFAULT_MAX_CHUNKS,
    DEFAULT_SESSION_TTL_DAYS,
};
use crate::Result;

/// Shared database reference.
pub type SharedDatabase = Arc<Database>;

/// Application state shared across handlers.
pub struct AppState {
    /// Database connection pool.
    pub db: SharedDatabase,
    /// Staged chunk storage.
    pub staging: ChunkStore,
    /// Assembled file storage.
    pub artifacts: ArtifactStore,
    /// Per-session locks for completion and assembly.
    pub locks: SessionLocks,
    /// Lifetime of new upload sessions.
    pub session_ttl_days: i64,
    /// Lifetime of new rooms.
    pub room_ttl_days: i64,
    /// Largest chunk count a session may declare.
    pub max_chunks: u32,
}

impl AppState {
    /// Create application state with default lifetimes.
    pub fn new(db: SharedDatabase, staging: ChunkStore, artifacts: ArtifactStore) -> Self {
        Self {
            db,
            staging,
            artifacts,
            locks: SessionLocks::new(),
            session_ttl_days: DEFAULT_SESSION_TTL_DAYS,
            room_ttl_days: 30,
            max_chunks: DEFAULT_MAX_CHUNKS,
        }
    }

    /// Create application state from configuration, opening both stores.
    pub fn from_config(db: SharedDatabase, config: &Config) -> Result<Self> {
        let staging = ChunkStore::new(&config.storage.staging_path)?.with_write_timeout(
            Duration::from_secs(config.upload.chunk_write_timeout_secs),
        );
        let artifacts = ArtifactStore::new(&config.storage.files_path)?;

        Ok(Self::new(db, staging, artifacts)
            .with_session_ttl_days(config.upload.session_ttl_days)
            .with_room_ttl_days(config.rooms.ttl_days)
            .with_max_chunks(config.upload.max_chunks))
    }

    /// Set the lifetime of new upload sessions.
    pub fn with_session_ttl_days(mut self, days: i64) -> Self {
        self.session_ttl_days = days;
        self
    }

    /// Set the lifetime of new rooms.
    pub fn with_room_ttl_days(mut self, days: i64) -> Self {
        self.room_ttl_days = days;
        self
    }

    /// Set the largest chunk count a session may declare.
    pub fn with_max_chunks(mut self, max_chunks: u32) -> Self {
        self.max_chunks = max_chunks;
        self
    }

    /// Upload service bound to this state.
    pub fn upload_service(&self) -> UploadService<'_> {
        UploadService::new(&self.db, &self.staging, &self.artifacts, &self.locks)
            .with_session_ttl_days(self.session_ttl_days)
            .with_max_chunks(self.max_chunks)
    }
}
