//! Chunk staging store.
//!
//! Each received chunk is first streamed to a private partial file and only
//! renamed to its staging key once fully written and synced:
//! ```text
//! {base_path}/
//! ├── {session}-1
//! ├── {session}-2
//! └── {session}-3.{nonce}.part   (write in progress)
//! ```
//! A chunk therefore either exists completely under its key or not at all.

use std::collections::HashSet;
use std::fmt::Display;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::pin;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{DataRoomError, Result};

const PART_SUFFIX: &str = ".part";

/// Staging key of a chunk: `<session>-<chunk>`.
pub fn chunk_key(session_id: Uuid, chunk_number: u32) -> String {
    format!("{session_id}-{chunk_number}")
}

/// Durable storage for individual chunks.
#[derive(Debug, Clone)]
pub struct ChunkStore {
    base_path: PathBuf,
    write_timeout: Option<Duration>,
}

impl ChunkStore {
    /// Create a ChunkStore rooted at `base_path`.
    ///
    /// The directory is created if needed and partial files left behind by
    /// an earlier process are removed.
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path)?;

        let store = Self {
            base_path,
            write_timeout: None,
        };
        let purged = store.purge_partials()?;
        if purged > 0 {
            info!("Removed {} stale partial chunk(s)", purged);
        }
        Ok(store)
    }

    /// Bound the time a single chunk write may take.
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = Some(timeout);
        self
    }

    /// Get the base path of this store.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Path of a staged chunk.
    pub fn chunk_path(&self, session_id: Uuid, chunk_number: u32) -> PathBuf {
        self.base_path.join(chunk_key(session_id, chunk_number))
    }

    fn purge_partials(&self) -> Result<usize> {
        let mut purged = 0;
        for entry in fs::read_dir(&self.base_path)? {
            let entry = entry?;
            if entry.file_name().to_string_lossy().ends_with(PART_SUFFIX) {
                fs::remove_file(entry.path())?;
                purged += 1;
            }
        }
        Ok(purged)
    }

    /// Stream a chunk payload into a partial file.
    ///
    /// Nothing is visible under the staging key until
    /// [`PendingChunk::commit`] is called. On failure, timeout or
    /// cancellation the partial file is removed.
    pub async fn receive<S, B, E>(
        &self,
        session_id: Uuid,
        chunk_number: u32,
        payload: S,
    ) -> Result<PendingChunk>
    where
        S: Stream<Item = std::result::Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
    {
        let key = chunk_key(session_id, chunk_number);
        let part = PartFile {
            path: self
                .base_path
                .join(format!("{key}.{}{PART_SUFFIX}", Uuid::new_v4().simple())),
            armed: true,
        };

        let write = write_payload(&part.path, payload);
        let written = match self.write_timeout {
            Some(limit) => tokio::time::timeout(limit, write).await.unwrap_or_else(|_| {
                Err(DataRoomError::Storage(format!(
                    "writing chunk {key} timed out after {}s",
                    limit.as_secs()
                )))
            }),
            None => write.await,
        };
        let bytes = match written {
            Ok(bytes) => bytes,
            Err(e) => {
                part.discard().await;
                return Err(e);
            }
        };

        debug!("Received chunk {} ({} bytes)", key, bytes);
        Ok(PendingChunk {
            part,
            target: self.base_path.join(key),
            bytes,
        })
    }

    /// Whether a chunk is staged.
    pub async fn is_staged(&self, session_id: Uuid, chunk_number: u32) -> Result<bool> {
        tokio::fs::try_exists(self.chunk_path(session_id, chunk_number))
            .await
            .map_err(|e| DataRoomError::Storage(format!("cannot stat staged chunk: {e}")))
    }

    /// Chunk numbers in `1..=total` currently staged, from one directory scan.
    async fn staged_numbers(&self, session_id: Uuid, total: u32) -> Result<HashSet<u32>> {
        let list_err =
            |e: io::Error| DataRoomError::Storage(format!("cannot list staged chunks: {e}"));
        let prefix = format!("{session_id}-");

        let mut entries = tokio::fs::read_dir(&self.base_path)
            .await
            .map_err(list_err)?;
        let mut staged = HashSet::new();
        while let Some(entry) = entries.next_entry().await.map_err(list_err)? {
            let name = entry.file_name();
            let number = name
                .to_str()
                .and_then(|name| name.strip_prefix(&prefix))
                .and_then(|n| n.parse::<u32>().ok());
            if let Some(n) = number.filter(|n| (1..=total).contains(n)) {
                staged.insert(n);
            }
        }
        Ok(staged)
    }

    /// Number of chunks in `1..=total` that are staged.
    pub async fn staged_count(&self, session_id: Uuid, total: u32) -> Result<u32> {
        Ok(self.staged_numbers(session_id, total).await?.len() as u32)
    }

    /// Chunk numbers in `1..=total` that are not staged.
    pub async fn missing_chunks(&self, session_id: Uuid, total: u32) -> Result<Vec<u32>> {
        let staged = self.staged_numbers(session_id, total).await?;
        Ok((1..=total).filter(|n| !staged.contains(n)).collect())
    }

    /// Open a staged chunk for reading.
    pub async fn open(&self, session_id: Uuid, chunk_number: u32) -> io::Result<tokio::fs::File> {
        tokio::fs::File::open(self.chunk_path(session_id, chunk_number)).await
    }

    /// Remove staged chunks `1..=total`. Returns how many were removed.
    ///
    /// Failures are logged and skipped.
    pub async fn remove(&self, session_id: Uuid, total: u32) -> usize {
        let mut removed = 0;
        for n in 1..=total {
            match tokio::fs::remove_file(self.chunk_path(session_id, n)).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(
                    "Failed to remove staged chunk {}: {}",
                    chunk_key(session_id, n),
                    e
                ),
            }
        }
        removed
    }
}

async fn write_payload<S, B, E>(path: &Path, payload: S) -> Result<u64>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    let storage_err = |e: io::Error| DataRoomError::Storage(format!("cannot write chunk: {e}"));

    let mut file = tokio::fs::File::create(path).await.map_err(storage_err)?;
    let mut payload = pin!(payload);
    let mut written = 0u64;

    while let Some(piece) = payload.next().await {
        let piece = piece
            .map_err(|e| DataRoomError::Storage(format!("chunk payload interrupted: {e}")))?;
        let piece = piece.as_ref();
        file.write_all(piece).await.map_err(storage_err)?;
        written += piece.len() as u64;
    }

    file.flush().await.map_err(storage_err)?;
    file.sync_all().await.map_err(storage_err)?;
    Ok(written)
}

/// Partial file that is deleted on drop unless disarmed.
#[derive(Debug)]
struct PartFile {
    path: PathBuf,
    armed: bool,
}

impl PartFile {
    /// Remove the file without blocking the runtime.
    async fn discard(mut self) {
        self.armed = false;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => debug!("Discarded partial chunk {:?}", self.path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove partial chunk {:?}: {}", self.path, e),
        }
    }
}

impl Drop for PartFile {
    // Reached when the owning future is cancelled mid-write or a commit
    // fails; other paths use `discard`. The removal is a single unlink.
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Discarded partial chunk {:?}", self.path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove partial chunk {:?}: {}", self.path, e),
        }
    }
}

/// A fully written chunk that is not yet visible under its staging key.
///
/// Dropping it discards the data.
#[derive(Debug)]
pub struct PendingChunk {
    part: PartFile,
    target: PathBuf,
    bytes: u64,
}

impl PendingChunk {
    /// Payload size in bytes.
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Publish the chunk under its staging key, replacing an earlier delivery.
    pub async fn commit(mut self) -> Result<()> {
        tokio::fs::rename(&self.part.path, &self.target)
            .await
            .map_err(|e| DataRoomError::Storage(format!("cannot stage chunk: {e}")))?;
        self.part.armed = false;
        Ok(())
    }

    /// Throw the payload away.
    pub async fn discard(self) {
        self.part.discard().await;
    }
}
