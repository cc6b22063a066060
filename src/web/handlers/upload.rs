//! Upload and download handlers.

use axum::{
    body::Body,
    extract::{FromRequest, Multipart, Query, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tokio_util::io::ReaderStream;

use crate::upload::Download;
use crate::web::dto::{ChunkResponse, FileMetaQuery, FileMetaResponse, UploadQuery};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::DataRoomError;

/// Multipart field carrying the chunk payload.
const FILE_FIELD: &str = "file";

const UNKNOWN_FILE_MESSAGE: &str =
    "Error getting file metadata parameters! You may not have access rights to the file.";

/// Generate a safe Content-Disposition header value for file downloads.
///
/// The plain `filename` parameter is reduced to printable ASCII (control
/// characters dropped; quotes, backslashes and non-ASCII replaced). Any name
/// that needed changes also gets an RFC 5987 `filename*` parameter.
fn content_disposition_header(filename: &str) -> String {
    let sanitized: String = filename
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '"' | '\\' => '_',
            c if !c.is_ascii() => '_',
            _ => c,
        })
        .collect();

    if sanitized == filename {
        return format!("attachment; filename=\"{}\"", filename);
    }

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        sanitized,
        urlencoding::encode(filename)
    )
}

/// POST /upload - Initiate a session (chunkNumber=0) or upload a chunk.
#[utoipa::path(
    post,
    path = "/upload",
    tag = "upload",
    params(UploadQuery),
    responses(
        (status = 200, description = "FileMetaResponse for chunkNumber=0, ChunkResponse otherwise"),
        (status = 400, description = "Invalid parameters, unknown room or session"),
        (status = 410, description = "Upload session expired"),
        (status = 500, description = "Chunk could not be stored or assembled")
    )
)]
pub async fn upload(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UploadQuery>,
    request: Request,
) -> Result<Response, ApiError> {
    let chunk_number = query.chunk_number()?;
    let service = state.upload_service();

    if chunk_number == 0 {
        let initiate = query.to_initiate()?;
        let session = service.initiate(&initiate).await?;
        return Ok(Json(FileMetaResponse::from(session)).into_response());
    }

    let session_id = query.session_id()?;
    let mut multipart = Multipart::from_request(request, &state)
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        if field.file_name().is_none() {
            return Err(ApiError::bad_request("The file field must be a file upload"));
        }

        let receipt = service
            .receive_chunk(session_id, chunk_number, field)
            .await
            .map_err(|e| {
                if !matches!(
                    e,
                    DataRoomError::Validation(_)
                        | DataRoomError::NotFound(_)
                        | DataRoomError::Expired(_)
                ) {
                    tracing::error!(
                        "Failed to store chunk {} of {}: {}",
                        chunk_number,
                        session_id,
                        e
                    );
                }
                ApiError::from(e)
            })?;
        return Ok(Json(ChunkResponse::from(receipt)).into_response());
    }

    Err(ApiError::bad_request("Missing multipart field: file"))
}

/// GET /upload - Check whether a chunk is already stored.
#[utoipa::path(
    get,
    path = "/upload",
    tag = "upload",
    params(UploadQuery),
    responses(
        (status = 200, description = "Chunk already stored"),
        (status = 204, description = "Chunk not stored yet"),
        (status = 400, description = "Invalid parameters or unknown session")
    )
)]
pub async fn check_chunk(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UploadQuery>,
) -> Result<StatusCode, ApiError> {
    let chunk_number = query.chunk_number()?;
    let session_id = query.session_id()?;

    let staged = state
        .upload_service()
        .chunk_status(session_id, chunk_number)
        .await?;

    Ok(if staged {
        StatusCode::OK
    } else {
        StatusCode::NO_CONTENT
    })
}

/// POST /upload/finalize - Retry completion of a session.
#[utoipa::path(
    post,
    path = "/upload/finalize",
    tag = "upload",
    params(FileMetaQuery),
    responses(
        (status = 200, description = "Session state after the completion check", body = ChunkResponse),
        (status = 400, description = "Invalid parameters or unknown session"),
        (status = 500, description = "Assembly failed")
    )
)]
pub async fn finalize_upload(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FileMetaQuery>,
) -> Result<Json<ChunkResponse>, ApiError> {
    let session_id = query.session_id()?;
    let completion = state.upload_service().finalize(session_id).await?;
    Ok(Json(ChunkResponse::from(completion)))
}

/// GET /download - Download a published file.
#[utoipa::path(
    get,
    path = "/download",
    tag = "upload",
    params(FileMetaQuery),
    responses(
        (status = 200, description = "File content", content_type = "application/octet-stream"),
        (status = 400, description = "Unknown or malformed file id"),
        (status = 404, description = "File not published yet")
    )
)]
pub async fn download(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FileMetaQuery>,
) -> Result<Response<Body>, ApiError> {
    let session_id = query.session_id()?;

    let Download { meta, file, size } = state
        .upload_service()
        .download(session_id)
        .await
        .map_err(|e| match e {
            DataRoomError::NotFound(_) => ApiError::bad_request(UNKNOWN_FILE_MESSAGE),
            other => ApiError::from(other),
        })?;

    tracing::debug!("Serving {} ({} bytes)", meta.id, size);

    let response = Response::builder()
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition_header(&meta.name),
        )
        .header(header::CONTENT_LENGTH, size)
        .header("Content-Description", "File Transfer")
        .header("Content-Transfer-Encoding", "binary")
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| {
            tracing::error!("Failed to build response: {}", e);
            ApiError::internal("Failed to build response")
        })?;

    Ok(response)
}
