//! Final artifact storage and assembly.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::staging::ChunkStore;
use crate::{DataRoomError, Result};

const ASSEMBLING_SUFFIX: &str = ".assembling";
const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Storage for assembled files, one file per session id.
///
/// An artifact is written once, under a temporary name, and renamed into
/// place only after every chunk has been copied and synced.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    base_path: PathBuf,
}

impl ArtifactStore {
    /// Create an ArtifactStore rooted at `base_path`.
    ///
    /// Unfinished assemblies from an earlier process are removed.
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path)?;

        for entry in fs::read_dir(&base_path)? {
            let entry = entry?;
            if entry
                .file_name()
                .to_string_lossy()
                .ends_with(ASSEMBLING_SUFFIX)
            {
                info!("Removing unfinished assembly {:?}", entry.path());
                fs::remove_file(entry.path())?;
            }
        }

        Ok(Self { base_path })
    }

    /// Get the base path of this store.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Path of the artifact for a session.
    pub fn path(&self, session_id: Uuid) -> PathBuf {
        self.base_path.join(session_id.to_string())
    }

    /// Whether the artifact exists.
    pub async fn exists(&self, session_id: Uuid) -> Result<bool> {
        tokio::fs::try_exists(self.path(session_id))
            .await
            .map_err(|e| DataRoomError::Storage(format!("cannot stat artifact: {e}")))
    }

    /// Open the artifact for reading. Returns the file and its length.
    pub async fn open(&self, session_id: Uuid) -> Result<(tokio::fs::File, u64)> {
        let file = tokio::fs::File::open(self.path(session_id))
            .await
            .map_err(|e| DataRoomError::Storage(format!("cannot open artifact {session_id}: {e}")))?;
        let len = file
            .metadata()
            .await
            .map_err(|e| DataRoomError::Storage(format!("cannot stat artifact {session_id}: {e}")))?
            .len();
        Ok((file, len))
    }

    /// Concatenate staged chunks `1..=total` into the artifact.
    ///
    /// Staged chunks are removed only after the artifact is in place. On
    /// any failure the chunks are left untouched for a later retry.
    /// Returns the artifact size in bytes.
    pub async fn assemble(&self, session_id: Uuid, total: u32, staging: &ChunkStore) -> Result<u64> {
        if staging.staged_count(session_id, total).await? < total {
            let missing = staging.missing_chunks(session_id, total).await?;
            return Err(DataRoomError::Assembly(format!(
                "session {session_id} is missing chunk(s) {missing:?}"
            )));
        }

        let temp_path = self
            .base_path
            .join(format!("{session_id}{ASSEMBLING_SUFFIX}"));

        let size = match self
            .concatenate(session_id, total, staging, &temp_path)
            .await
        {
            Ok(size) => size,
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_file(&temp_path).await {
                    if cleanup.kind() != io::ErrorKind::NotFound {
                        warn!("Failed to remove {:?}: {}", temp_path, cleanup);
                    }
                }
                return Err(e);
            }
        };

        tokio::fs::rename(&temp_path, self.path(session_id))
            .await
            .map_err(|e| DataRoomError::Storage(format!("cannot place artifact: {e}")))?;

        let removed = staging.remove(session_id, total).await;
        info!(
            "Assembled {} from {} chunk(s), {} bytes",
            session_id, removed, size
        );
        Ok(size)
    }

    async fn concatenate(
        &self,
        session_id: Uuid,
        total: u32,
        staging: &ChunkStore,
        temp_path: &Path,
    ) -> Result<u64> {
        let write_err = |e: io::Error| DataRoomError::Storage(format!("cannot write artifact: {e}"));

        let mut out = tokio::fs::File::create(temp_path).await.map_err(write_err)?;
        let mut buf = vec![0u8; COPY_BUFFER_SIZE];
        let mut size = 0u64;

        for n in 1..=total {
            let read_err =
                |e: io::Error| DataRoomError::Assembly(format!("cannot read chunk {n}: {e}"));
            let mut chunk = staging.open(session_id, n).await.map_err(read_err)?;
            loop {
                let read = chunk.read(&mut buf).await.map_err(read_err)?;
                if read == 0 {
                    break;
                }
                out.write_all(&buf[..read]).await.map_err(write_err)?;
                size += read as u64;
            }
            debug!("Appended chunk {} of {} for {}", n, total, session_id);
        }

        out.flush().await.map_err(write_err)?;
        out.sync_all().await.map_err(write_err)?;
        Ok(size)
    }
}
