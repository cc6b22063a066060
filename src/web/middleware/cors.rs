//! CORS middleware configuration.

use axum::http::header::{ACCEPT, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};

const METHODS: [Method; 4] = [Method::GET, Method::POST, Method::DELETE, Method::OPTIONS];

/// Browsers hide these from scripts unless exposed; download clients read
/// the file name and size from them.
const EXPOSED: [axum::http::HeaderName; 2] = [CONTENT_DISPOSITION, CONTENT_LENGTH];

/// Create a CORS layer from configured origins.
///
/// With no usable origin every origin is allowed, without credentials.
pub fn create_cors_layer(origins: &[String]) -> CorsLayer {
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(origin) => Some(origin),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", o);
                None
            }
        })
        .collect();

    let layer = CorsLayer::new()
        .allow_methods(METHODS)
        .expose_headers(EXPOSED);

    if parsed.is_empty() {
        layer.allow_headers(Any).allow_origin(Any)
    } else {
        layer
            .allow_headers([CONTENT_TYPE, ACCEPT])
            .allow_credentials(true)
            .allow_origin(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_cors_layer_empty_origins() {
        let _layer = create_cors_layer(&[]);
        // Should not panic
    }

    #[test]
    fn test_create_cors_layer_invalid_origins_fall_back() {
        let origins = vec!["not\na header".to_string()];
        let _layer = create_cors_layer(&origins);
    }

    #[test]
    fn test_create_cors_layer_with_origins() {
        let origins = vec![
            "https://rooms.example.com".to_string(),
            "http://localhost:3000".to_string(),
        ];
        let _layer = create_cors_layer(&origins);
    }
}
