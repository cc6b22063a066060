//! Chunked upload ingestion and assembly.
//!
//! An upload is a session (a `files` row) created by chunk 0. Chunks
//! `1..=N` arrive independently, in any order and concurrently, and are
//! staged on disk. The request that completes the set assembles the final
//! artifact exactly once and publishes it; only published files can be
//! downloaded.

mod artifact;
mod locks;
mod metadata;
mod service;
mod staging;

pub use artifact::ArtifactStore;
pub use locks::{SessionGuard, SessionLocks};
pub use metadata::{FileMeta, FileMetaRepository, FileStatus, NewFileMeta};
pub use service::{
    ChunkReceipt, Completion, Download, InitiateUpload, UploadService, UploadSession,
};
pub use staging::{chunk_key, ChunkStore, PendingChunk};

/// Maximum length of a file name in characters.
pub const MAX_FILENAME_LENGTH: usize = 255;

/// Maximum length of a client file identifier in characters.
pub const MAX_FILE_ID_LENGTH: usize = 255;

/// Default lifetime of an upload session in days.
pub const DEFAULT_SESSION_TTL_DAYS: i64 = 10;

/// Default upper bound on the chunks of one session.
pub const DEFAULT_MAX_CHUNKS: u32 = 10_000;
