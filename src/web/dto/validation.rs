//! Validation utilities for Web API DTOs.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::web::error::ApiError;

/// A JSON extractor that validates the request body.
///
/// Deserialization failures are reported as bad requests, validation
/// failures as field-level validation errors.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid JSON: {}", e)))?;

        value.validate().map_err(ApiError::from_validation_errors)?;

        Ok(ValidatedJson(value))
    }
}

/// Validate that a string does not contain control characters.
pub fn no_control_chars(value: &str) -> Result<(), validator::ValidationError> {
    if value.chars().any(char::is_control) {
        return Err(validator::ValidationError::new("no_control_chars")
            .with_message("Must not contain control characters".into()));
    }
    Ok(())
}

/// Validate that a string is not empty after trimming whitespace.
pub fn not_empty_trimmed(value: &str) -> Result<(), validator::ValidationError> {
    if value.trim().is_empty() {
        return Err(validator::ValidationError::new("not_empty_trimmed")
            .with_message("Must not be empty".into()));
    }
    Ok(())
}

/// Validate a single-line display name (room names).
pub fn display_name(value: &str) -> Result<(), validator::ValidationError> {
    not_empty_trimmed(value)?;
    no_control_chars(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_control_chars() {
        assert!(no_control_chars("Deal room").is_ok());
        assert!(no_control_chars("Line 1\nLine 2").is_err());
        assert!(no_control_chars("Hello\x00World").is_err());
        assert!(no_control_chars("Hello\x1bWorld").is_err());
    }

    #[test]
    fn test_not_empty_trimmed() {
        assert!(not_empty_trimmed("  Hello  ").is_ok());
        assert!(not_empty_trimmed("").is_err());
        assert!(not_empty_trimmed("\t ").is_err());
    }

    #[test]
    fn test_display_name() {
        assert!(display_name("Q3 financials").is_ok());
        assert!(display_name("   ").is_err());
        assert!(display_name("bad\rname").is_err());
    }
}
