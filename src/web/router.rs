//! Router configuration for Web API.

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Json, Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use super::dto::{
    ChunkResponse, ContentResponse, CreateRoomRequest, DeleteResponse, FileMetaResponse,
    FileResponse, RoomResponse,
};
use super::handlers::{
    self, check_chunk, create_room, delete_room, download, finalize_upload, list_content,
    list_rooms, upload, AppState,
};
use super::middleware::create_cors_layer;

/// OpenAPI document of the HTTP surface.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::upload::upload,
        handlers::upload::check_chunk,
        handlers::upload::finalize_upload,
        handlers::upload::download,
        handlers::room::list_rooms,
        handlers::room::create_room,
        handlers::room::delete_room,
        handlers::room::list_content,
    ),
    components(schemas(
        FileMetaResponse,
        ChunkResponse,
        RoomResponse,
        FileResponse,
        ContentResponse,
        DeleteResponse,
        CreateRoomRequest,
    )),
    tags(
        (name = "upload", description = "Chunked upload and download"),
        (name = "rooms", description = "Data rooms and their content")
    )
)]
pub struct ApiDoc;

/// Create the main API router.
///
/// `max_body_bytes` bounds every request body, and with it the size of a
/// single chunk.
pub fn create_router(
    app_state: Arc<AppState>,
    cors_origins: &[String],
    max_body_bytes: usize,
) -> Router {
    Router::new()
        .route("/upload", get(check_chunk).post(upload))
        .route("/upload/finalize", post(finalize_upload))
        .route("/download", get(download))
        .route("/datarooms", get(list_rooms).post(create_room))
        .route("/datarooms/:room_id", delete(delete_room))
        .route("/content", get(list_content))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(cors_origins))
                .layer(DefaultBodyLimit::max(max_body_bytes)),
        )
        .with_state(app_state)
}

/// Create a health check router.
pub fn create_health_router() -> Router {
    Router::new().route("/health", get(health_check))
}

/// Create the router serving the OpenAPI document.
pub fn create_openapi_router() -> Router {
    Router::new().route("/api-docs/openapi.json", get(openapi_json))
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
