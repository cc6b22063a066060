//! Response DTOs for Web API.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::room::{Room, RoomUsage};
use crate::upload::{ChunkReceipt, Completion, FileMeta, UploadSession};

fn rfc3339(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Response of chunk 0.
#[derive(Debug, Serialize, ToSchema)]
pub struct FileMetaResponse {
    /// Whether a new session was created (false on resume).
    #[serde(rename = "fileMetaCreated")]
    pub created: bool,
    #[serde(rename = "fileMetaID")]
    pub file_meta_id: Uuid,
}

impl From<UploadSession> for FileMetaResponse {
    fn from(session: UploadSession) -> Self {
        Self {
            created: session.created,
            file_meta_id: session.session_id,
        }
    }
}

/// Response of a chunk upload or a finalize call.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChunkResponse {
    #[serde(rename = "fileMetaID")]
    pub file_meta_id: Uuid,
    /// Chunk that was received (absent for finalize).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_number: Option<u32>,
    pub chunks_staged: u32,
    pub total_chunks: u32,
    /// `uploading` or `published`.
    pub file_status: String,
}

impl From<Completion> for ChunkResponse {
    fn from(completion: Completion) -> Self {
        Self {
            file_meta_id: completion.session_id,
            chunk_number: None,
            chunks_staged: completion.staged,
            total_chunks: completion.total,
            file_status: completion.status.to_string(),
        }
    }
}

impl From<ChunkReceipt> for ChunkResponse {
    fn from(receipt: ChunkReceipt) -> Self {
        Self {
            chunk_number: Some(receipt.chunk_number),
            ..Self::from(receipt.completion)
        }
    }
}

/// A data room with its usage.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoomResponse {
    #[serde(rename = "roomID")]
    pub id: Uuid,
    #[serde(rename = "roomName")]
    pub name: String,
    /// Quota in bytes.
    #[serde(rename = "roomSize")]
    pub size: i64,
    #[serde(rename = "roomExpires")]
    pub expires: String,
    #[serde(rename = "rootFolderID")]
    pub root_folder_id: Uuid,
    #[serde(rename = "roomSizeUsed")]
    pub size_used: i64,
    #[serde(rename = "roomNumFiles")]
    pub num_files: i64,
}

impl RoomResponse {
    pub fn new(room: Room, usage: RoomUsage) -> Self {
        Self {
            id: room.id,
            name: room.name,
            size: room.size,
            expires: rfc3339(&room.expires),
            root_folder_id: room.root_folder_id,
            size_used: usage.size_used,
            num_files: usage.num_files,
        }
    }
}

/// File metadata as listed in a room.
#[derive(Debug, Serialize, ToSchema)]
pub struct FileResponse {
    #[serde(rename = "fileMetaID")]
    pub file_meta_id: Uuid,
    #[serde(rename = "fileID")]
    pub file_id: String,
    #[serde(rename = "fileHash")]
    pub file_hash: Option<String>,
    #[serde(rename = "fileName")]
    pub file_name: String,
    #[serde(rename = "fileDesc")]
    pub file_desc: Option<String>,
    #[serde(rename = "fileCreated")]
    pub file_created: String,
    #[serde(rename = "fileExpires")]
    pub file_expires: String,
    #[serde(rename = "fileStatus")]
    pub file_status: String,
    #[serde(rename = "fileSize")]
    pub file_size: i64,
    #[serde(rename = "folderID")]
    pub folder_id: Uuid,
    #[serde(rename = "authorID")]
    pub author_id: Option<String>,
    #[serde(rename = "authorName")]
    pub author_name: Option<String>,
    #[serde(rename = "deleteAvailable")]
    pub delete_available: bool,
}

impl From<FileMeta> for FileResponse {
    fn from(meta: FileMeta) -> Self {
        Self {
            file_meta_id: meta.id,
            file_id: meta.file_id,
            file_hash: meta.file_hash,
            file_name: meta.name,
            file_desc: meta.description,
            file_created: rfc3339(&meta.created),
            file_expires: rfc3339(&meta.expires),
            file_status: meta.status.to_string(),
            file_size: meta.size,
            folder_id: meta.folder_id,
            author_id: meta.author_id,
            author_name: None,
            delete_available: false,
        }
    }
}

/// Files of a room folder.
#[derive(Debug, Serialize, ToSchema)]
pub struct ContentResponse {
    #[serde(rename = "contentData")]
    pub content_data: Vec<FileResponse>,
}

/// Result of a room deletion.
#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteResponse {
    /// Number of rooms deleted.
    pub deleted: u64,
}
