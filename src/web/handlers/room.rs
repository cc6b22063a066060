//! Data room handlers.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;

use crate::room::{NewRoom, RoomRepository};
use crate::web::dto::{
    parse_uuid_param, ContentQuery, ContentResponse, CreateRoomRequest, DeleteResponse,
    FileResponse, RoomResponse, ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;

/// GET /datarooms - List all rooms with their usage.
#[utoipa::path(
    get,
    path = "/datarooms",
    tag = "rooms",
    responses(
        (status = 200, description = "All rooms", body = Vec<RoomResponse>)
    )
)]
pub async fn list_rooms(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<RoomResponse>>, ApiError> {
    let repo = RoomRepository::new(state.db.pool());
    let rooms = repo.list().await?;

    let mut response = Vec::with_capacity(rooms.len());
    for room in rooms {
        let usage = repo.usage(room.root_folder_id).await?;
        response.push(RoomResponse::new(room, usage));
    }

    Ok(Json(response))
}

/// POST /datarooms - Create a room.
#[utoipa::path(
    post,
    path = "/datarooms",
    tag = "rooms",
    request_body = CreateRoomRequest,
    responses(
        (status = 200, description = "Room created", body = RoomResponse),
        (status = 400, description = "Invalid request"),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn create_room(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<CreateRoomRequest>,
) -> Result<Json<RoomResponse>, ApiError> {
    let new_room = NewRoom::new(req.name.trim(), req.size).with_ttl_days(state.room_ttl_days);
    let room = RoomRepository::new(state.db.pool()).create(&new_room).await?;
    Ok(Json(RoomResponse::new(room, Default::default())))
}

/// DELETE /datarooms/{room_id} - Delete an empty room.
#[utoipa::path(
    delete,
    path = "/datarooms/{room_id}",
    tag = "rooms",
    params(("room_id" = String, Path, description = "Room id")),
    responses(
        (status = 200, description = "Number of rooms deleted", body = DeleteResponse),
        (status = 400, description = "Malformed id or room still holds files")
    )
)]
pub async fn delete_room(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let room_id = parse_uuid_param(&Some(room_id), "roomID")?;
    let deleted = RoomRepository::new(state.db.pool()).delete(room_id).await?;
    Ok(Json(DeleteResponse { deleted }))
}

/// GET /content - List the files of a room folder.
#[utoipa::path(
    get,
    path = "/content",
    tag = "rooms",
    params(ContentQuery),
    responses(
        (status = 200, description = "Files of the folder", body = ContentResponse),
        (status = 400, description = "Unknown room or folder outside the room")
    )
)]
pub async fn list_content(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ContentQuery>,
) -> Result<Json<ContentResponse>, ApiError> {
    let room_id = query.room_id()?;
    let folder_id = query.folder_id()?;

    let files = state
        .upload_service()
        .list_files(room_id, folder_id)
        .await?;

    Ok(Json(ContentResponse {
        content_data: files.into_iter().map(FileResponse::from).collect(),
    }))
}
