//! Upload service.
//!
//! This module ties the metadata registry, the staging store and the
//! artifact store together:
//! - Session initiation and resume
//! - Chunk reception and completion detection
//! - One-time assembly and publication
//! - Download gating

use std::fmt::Display;

use chrono::Utc;
use futures::Stream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::Database;
use crate::room::RoomRepository;
use crate::{DataRoomError, Result};

use super::artifact::ArtifactStore;
use super::locks::SessionLocks;
use super::metadata::{FileMeta, FileMetaRepository, FileStatus, NewFileMeta};
use super::staging::ChunkStore;
use super::{
    DEFAULT_MAX_CHUNKS, DEFAULT_SESSION_TTL_DAYS, MAX_FILENAME_LENGTH, MAX_FILE_ID_LENGTH,
};

/// Parameters of a chunk 0 (session initiation) request.
#[derive(Debug, Clone)]
pub struct InitiateUpload {
    pub room_id: Uuid,
    /// Target folder; defaults to the room's root folder.
    pub folder_id: Option<Uuid>,
    /// Client-supplied file identifier, stable across resumes.
    pub file_id: String,
    pub file_name: String,
    pub total_chunks: u32,
    pub total_size: i64,
    pub file_hash: Option<String>,
    pub description: Option<String>,
}

impl InitiateUpload {
    /// Create an initiation request for the room's root folder.
    pub fn new(
        room_id: Uuid,
        file_id: impl Into<String>,
        file_name: impl Into<String>,
        total_chunks: u32,
        total_size: i64,
    ) -> Self {
        Self {
            room_id,
            folder_id: None,
            file_id: file_id.into(),
            file_name: file_name.into(),
            total_chunks,
            total_size,
            file_hash: None,
            description: None,
        }
    }

    /// Set an explicit target folder.
    pub fn with_folder(mut self, folder_id: Uuid) -> Self {
        self.folder_id = Some(folder_id);
        self
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

    fn validate(&self, max_chunks: u32) -> Result<()> {
        if self.file_id.trim().is_empty() {
            return Err(DataRoomError::Validation("fileID is required".to_string()));
        }
        if self.file_id.chars().count() > MAX_FILE_ID_LENGTH {
            return Err(DataRoomError::Validation(format!(
                "fileID must be at most {MAX_FILE_ID_LENGTH} characters"
            )));
        }
        if self.file_name.trim().is_empty() {
            return Err(DataRoomError::Validation("fileName is required".to_string()));
        }
        if self.file_name.chars().count() > MAX_FILENAME_LENGTH {
            return Err(DataRoomError::Validation(format!(
                "fileName must be at most {MAX_FILENAME_LENGTH} characters"
            )));
        }
        if self.total_chunks == 0 {
            return Err(DataRoomError::Validation(
                "totalChunks must be at least 1".to_string(),
            ));
        }
        if self.total_chunks > max_chunks {
            return Err(DataRoomError::Validation(format!(
                "totalChunks must be at most {max_chunks}"
            )));
        }
        if self.total_size < 0 {
            return Err(DataRoomError::Validation(
                "totalSize must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Outcome of session initiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadSession {
    /// Whether a new session was created (false on resume).
    pub created: bool,
    pub session_id: Uuid,
}

/// State of a session after a completion check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub session_id: Uuid,
    /// Chunks currently staged (equal to `total` once published).
    pub staged: u32,
    pub total: u32,
    pub status: FileStatus,
    /// Whether this call assembled the artifact.
    pub assembled: bool,
}

impl Completion {
    fn published(meta: &FileMeta, assembled: bool) -> Self {
        Self {
            session_id: meta.id,
            staged: meta.chunks,
            total: meta.chunks,
            status: FileStatus::Published,
            assembled,
        }
    }
}

/// Acknowledgement of a received chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkReceipt {
    pub chunk_number: u32,
    pub completion: Completion,
}

/// A published file ready to be streamed.
#[derive(Debug)]
pub struct Download {
    pub meta: FileMeta,
    pub file: tokio::fs::File,
    /// Artifact length in bytes.
    pub size: u64,
}

/// Upload service for chunked ingestion and downloads.
pub struct UploadService<'a> {
    db: &'a Database,
    staging: &'a ChunkStore,
    artifacts: &'a ArtifactStore,
    locks: &'a SessionLocks,
    session_ttl_days: i64,
    max_chunks: u32,
}

impl<'a> UploadService<'a> {
    /// Create a new UploadService.
    pub fn new(
        db: &'a Database,
        staging: &'a ChunkStore,
        artifacts: &'a ArtifactStore,
        locks: &'a SessionLocks,
    ) -> Self {
        Self {
            db,
            staging,
            artifacts,
            locks,
            session_ttl_days: DEFAULT_SESSION_TTL_DAYS,
            max_chunks: DEFAULT_MAX_CHUNKS,
        }
    }

    /// Set the lifetime of newly created sessions.
    pub fn with_session_ttl_days(mut self, days: i64) -> Self {
        self.session_ttl_days = days;
        self
    }

    /// Set the largest chunk count a new session may declare.
    pub fn with_max_chunks(mut self, max_chunks: u32) -> Self {
        self.max_chunks = max_chunks;
        self
    }

    fn files(&self) -> FileMetaRepository<'_> {
        FileMetaRepository::new(self.db.pool())
    }

    async fn load(&self, session_id: Uuid) -> Result<FileMeta> {
        self.files()
            .get_by_id(session_id)
            .await?
            .ok_or_else(|| DataRoomError::NotFound("upload session".to_string()))
    }

    /// Resolve the folder of a room. An explicit folder must be the root folder.
    async fn resolve_folder(&self, room_id: Uuid, folder_id: Option<Uuid>) -> Result<Uuid> {
        let room = RoomRepository::new(self.db.pool())
            .get_by_id(room_id)
            .await?
            .ok_or_else(|| DataRoomError::NotFound("room".to_string()))?;

        match folder_id {
            Some(folder_id) if folder_id != room.root_folder_id => Err(DataRoomError::Conflict(
                "folder id not in provided room".to_string(),
            )),
            _ => Ok(room.root_folder_id),
        }
    }

    /// Create or resume the session for `(file_id, folder)`.
    ///
    /// An existing session is returned unchanged, whatever the other
    /// parameters say.
    pub async fn initiate(&self, request: &InitiateUpload) -> Result<UploadSession> {
        request.validate(self.max_chunks)?;
        let folder_id = self
            .resolve_folder(request.room_id, request.folder_id)
            .await?;

        let files = self.files();
        if let Some(existing) = files
            .find_by_external_id(&request.file_id, folder_id)
            .await?
        {
            debug!("Resuming upload session {}", existing.id);
            return Ok(UploadSession {
                created: false,
                session_id: existing.id,
            });
        }

        let mut new_meta = NewFileMeta::new(
            request.file_id.clone(),
            folder_id,
            request.file_name.clone(),
            request.total_size,
            request.total_chunks,
        )
        .with_ttl_days(self.session_ttl_days);
        new_meta.file_hash = request.file_hash.clone();
        new_meta.description = request.description.clone();

        let session_id = Uuid::new_v4();
        if files.create_if_absent(session_id, &new_meta).await? {
            info!(
                "Created upload session {} for {} ({} chunk(s), {} bytes)",
                session_id, request.file_name, request.total_chunks, request.total_size
            );
            return Ok(UploadSession {
                created: true,
                session_id,
            });
        }

        // Lost a race with a concurrent initiate for the same file.
        let existing = files
            .find_by_external_id(&request.file_id, folder_id)
            .await?
            .ok_or_else(|| {
                DataRoomError::Database("upload session missing after conflicting insert".to_string())
            })?;
        Ok(UploadSession {
            created: false,
            session_id: existing.id,
        })
    }

    fn check_chunk_number(meta: &FileMeta, chunk_number: u32) -> Result<()> {
        if meta.accepts_chunk(chunk_number) {
            Ok(())
        } else {
            Err(DataRoomError::Validation(format!(
                "chunkNumber must be between 1 and {}",
                meta.chunks
            )))
        }
    }

    /// Receive one chunk of an existing session.
    ///
    /// The payload is streamed to staging without holding the session lock;
    /// it becomes visible, and completion is checked, under the lock. A
    /// chunk for an already published session is ignored.
    pub async fn receive_chunk<S, B, E>(
        &self,
        session_id: Uuid,
        chunk_number: u32,
        payload: S,
    ) -> Result<ChunkReceipt>
    where
        S: Stream<Item = std::result::Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
    {
        let meta = self.load(session_id).await?;
        Self::check_chunk_number(&meta, chunk_number)?;

        if meta.status == FileStatus::Published {
            debug!(
                "Ignoring chunk {} for published session {}",
                chunk_number, session_id
            );
            return Ok(ChunkReceipt {
                chunk_number,
                completion: Completion::published(&meta, false),
            });
        }
        if meta.is_expired(Utc::now()) {
            return Err(DataRoomError::Expired(format!(
                "upload session {session_id} expired at {}",
                meta.expires.to_rfc3339()
            )));
        }

        let pending = self
            .staging
            .receive(session_id, chunk_number, payload)
            .await?;

        let _guard = self.locks.acquire(session_id).await;
        let meta = match self.load(session_id).await {
            Ok(meta) => meta,
            Err(e) => {
                pending.discard().await;
                return Err(e);
            }
        };
        if meta.status == FileStatus::Published {
            pending.discard().await;
            return Ok(ChunkReceipt {
                chunk_number,
                completion: Completion::published(&meta, false),
            });
        }

        pending.commit().await?;
        let completion = self.complete_locked(&meta).await?;
        Ok(ChunkReceipt {
            chunk_number,
            completion,
        })
    }

    /// Check completion and assemble if every chunk is staged.
    ///
    /// Caller must hold the session lock and pass a freshly loaded row.
    async fn complete_locked(&self, meta: &FileMeta) -> Result<Completion> {
        if meta.status == FileStatus::Published {
            return Ok(Completion::published(meta, false));
        }

        if self.artifacts.exists(meta.id).await? {
            // Assembled earlier but the status update did not go through.
            self.publish(meta).await?;
            self.staging.remove(meta.id, meta.chunks).await;
            return Ok(Completion::published(meta, false));
        }

        let staged = self.staging.staged_count(meta.id, meta.chunks).await?;
        if staged < meta.chunks {
            return Ok(Completion {
                session_id: meta.id,
                staged,
                total: meta.chunks,
                status: FileStatus::Uploading,
                assembled: false,
            });
        }

        let size = self
            .artifacts
            .assemble(meta.id, meta.chunks, self.staging)
            .await?;
        if size != meta.size as u64 {
            warn!(
                "Session {} assembled {} bytes but declared {}",
                meta.id, size, meta.size
            );
        }
        self.publish(meta).await?;
        Ok(Completion::published(meta, true))
    }

    async fn publish(&self, meta: &FileMeta) -> Result<()> {
        if self.files().mark_published(meta.id).await? {
            info!("Published {} ({})", meta.id, meta.name);
        } else {
            warn!("Session {} was already published", meta.id);
        }
        Ok(())
    }

    /// Re-run completion for a session, e.g. after a failed assembly.
    pub async fn finalize(&self, session_id: Uuid) -> Result<Completion> {
        self.load(session_id).await?;
        self.retry_completion(session_id).await
    }

    /// Whether a chunk is already stored (always true once published).
    pub async fn chunk_status(&self, session_id: Uuid, chunk_number: u32) -> Result<bool> {
        let meta = self.load(session_id).await?;
        Self::check_chunk_number(&meta, chunk_number)?;

        if meta.status == FileStatus::Published {
            return Ok(true);
        }
        self.staging.is_staged(session_id, chunk_number).await
    }

    /// Retry completion for every unexpired session still uploading.
    ///
    /// Returns the number of sessions published by this sweep.
    pub async fn sweep(&self) -> Result<usize> {
        let now = Utc::now();
        let mut published = 0;

        for meta in self.files().list_uploading().await? {
            if meta.is_expired(now) {
                continue;
            }

            match self.retry_completion(meta.id).await {
                Ok(completion) if completion.status == FileStatus::Published => published += 1,
                Ok(_) => {}
                Err(e) => warn!("Completion retry failed for {}: {}", meta.id, e),
            }
        }

        Ok(published)
    }

    async fn retry_completion(&self, session_id: Uuid) -> Result<Completion> {
        let _guard = self.locks.acquire(session_id).await;
        let meta = self.load(session_id).await?;
        self.complete_locked(&meta).await
    }

    /// List the files of a room folder.
    pub async fn list_files(&self, room_id: Uuid, folder_id: Option<Uuid>) -> Result<Vec<FileMeta>> {
        let folder_id = self.resolve_folder(room_id, folder_id).await?;
        self.files().list_by_folder(folder_id).await
    }

    /// Open a published file for download.
    pub async fn download(&self, session_id: Uuid) -> Result<Download> {
        let meta = self.load(session_id).await?;
        if meta.status != FileStatus::Published {
            return Err(DataRoomError::Unavailable("File unavailable".to_string()));
        }

        let (file, size) = self.artifacts.open(session_id).await?;
        Ok(Download { meta, file, size })
    }
}
