//! HTTP API of the data room service.
//!
//! Chunked uploads, downloads, and room management are served over a
//! plain REST interface; the OpenAPI document is served alongside.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use handlers::AppState;
pub use router::{create_router, ApiDoc};
pub use server::WebServer;
