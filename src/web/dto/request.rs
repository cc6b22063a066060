//! Request DTOs for Web API.
//!
//! Query parameters are accepted as raw strings and parsed here, so that a
//! missing or malformed parameter is reported as a validation error with the
//! parameter's name.

use std::str::FromStr;

use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::validation::display_name;
use crate::upload::InitiateUpload;
use crate::{DataRoomError, Result};

/// A present, non-blank parameter, returned verbatim.
fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str> {
    match value.as_deref() {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(DataRoomError::Validation(format!("{name} is required"))),
    }
}

/// A non-blank parameter, returned verbatim.
fn optional(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// Parse a numeric or id parameter; surrounding whitespace is ignored.
fn parse<T: FromStr>(value: &str, name: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| DataRoomError::Validation(format!("{name} is malformed: {value:?}")))
}

/// Parse a required UUID parameter.
pub fn parse_uuid_param(value: &Option<String>, name: &str) -> Result<Uuid> {
    parse(required(value, name)?, name)
}

/// Query of `POST /upload` and `GET /upload`.
///
/// `chunkNumber=0` initiates a session and needs the room/file parameters;
/// `chunkNumber>=1` needs only `fileMetaID`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UploadQuery {
    /// Chunk index; 0 initiates the session.
    #[serde(rename = "chunkNumber")]
    pub chunk_number: Option<String>,
    /// Session id returned by chunk 0.
    #[serde(rename = "fileMetaID")]
    pub file_meta_id: Option<String>,
    #[serde(rename = "roomID")]
    pub room_id: Option<String>,
    /// Defaults to the room's root folder.
    #[serde(rename = "folderID")]
    pub folder_id: Option<String>,
    /// Client file identifier, stable across resumes.
    #[serde(rename = "fileID")]
    pub file_id: Option<String>,
    #[serde(rename = "fileName")]
    pub file_name: Option<String>,
    #[serde(rename = "totalChunks")]
    pub total_chunks: Option<String>,
    /// Declared total size in bytes.
    #[serde(rename = "totalSize")]
    pub total_size: Option<String>,
    /// Advertised content hash (stored, not verified).
    #[serde(rename = "fileHash")]
    pub file_hash: Option<String>,
    #[serde(rename = "fileDesc")]
    pub file_desc: Option<String>,
}

impl UploadQuery {
    pub fn chunk_number(&self) -> Result<u32> {
        parse(required(&self.chunk_number, "chunkNumber")?, "chunkNumber")
    }

    pub fn session_id(&self) -> Result<Uuid> {
        parse_uuid_param(&self.file_meta_id, "fileMetaID")
    }

    /// Build the session initiation request of a chunk 0 call.
    pub fn to_initiate(&self) -> Result<InitiateUpload> {
        let room_id = parse_uuid_param(&self.room_id, "roomID")?;
        let folder_id = optional(&self.folder_id)
            .map(|v| parse::<Uuid>(v, "folderID"))
            .transpose()?;
        let total_chunks = parse(required(&self.total_chunks, "totalChunks")?, "totalChunks")?;
        let total_size = parse(required(&self.total_size, "totalSize")?, "totalSize")?;

        let mut request = InitiateUpload::new(
            room_id,
            required(&self.file_id, "fileID")?,
            required(&self.file_name, "fileName")?,
            total_chunks,
            total_size,
        );
        if let Some(folder_id) = folder_id {
            request = request.with_folder(folder_id);
        }
        if let Some(hash) = optional(&self.file_hash) {
            request = request.with_hash(hash);
        }
        if let Some(description) = optional(&self.file_desc) {
            request = request.with_description(description);
        }
        Ok(request)
    }
}

/// Query carrying only a session id (`/download`, `/upload/finalize`).
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FileMetaQuery {
    #[serde(rename = "fileMetaID")]
    pub file_meta_id: Option<String>,
}

impl FileMetaQuery {
    pub fn session_id(&self) -> Result<Uuid> {
        parse_uuid_param(&self.file_meta_id, "fileMetaID")
    }
}

/// Query of `GET /content`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ContentQuery {
    #[serde(rename = "roomID")]
    pub room_id: Option<String>,
    /// Defaults to the room's root folder.
    #[serde(rename = "folderID")]
    pub folder_id: Option<String>,
}

impl ContentQuery {
    pub fn room_id(&self) -> Result<Uuid> {
        parse_uuid_param(&self.room_id, "roomID")
    }

    pub fn folder_id(&self) -> Result<Option<Uuid>> {
        optional(&self.folder_id)
            .map(|v| parse(v, "folderID"))
            .transpose()
    }
}

/// Room creation request.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateRoomRequest {
    /// Display name.
    #[serde(rename = "roomName")]
    #[validate(
        length(min = 1, max = 100, message = "Room name must be 1-100 characters"),
        custom(function = "display_name")
    )]
    pub name: String,
    /// Quota in bytes.
    #[serde(rename = "roomSize", default)]
    #[validate(range(min = 0, message = "Room size must not be negative"))]
    pub size: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn initiate_query() -> UploadQuery {
        UploadQuery {
            chunk_number: Some("0".to_string()),
            room_id: Some(Uuid::nil().to_string()),
            file_id: Some("doc1".to_string()),
            file_name: Some("a.txt".to_string()),
            total_chunks: Some("2".to_string()),
            total_size: Some("20".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_to_initiate() {
        let mut query = initiate_query();
        query.file_hash = Some("abc".to_string());
        query.folder_id = Some(String::new());

        let request = query.to_initiate().unwrap();
        assert_eq!(request.room_id, Uuid::nil());
        assert_eq!(request.folder_id, None);
        assert_eq!(request.file_id, "doc1");
        assert_eq!(request.file_name, "a.txt");
        assert_eq!(request.total_chunks, 2);
        assert_eq!(request.total_size, 20);
        assert_eq!(request.file_hash.as_deref(), Some("abc"));
        assert_eq!(request.description, None);
    }

    #[test]
    fn test_to_initiate_keeps_identifiers_verbatim() {
        let mut query = initiate_query();
        query.file_id = Some(" doc1".to_string());
        query.file_name = Some("  report .pdf ".to_string());
        query.file_desc = Some(" Q3 ".to_string());
        query.total_chunks = Some(" 2 ".to_string());

        let request = query.to_initiate().unwrap();
        assert_eq!(request.file_id, " doc1");
        assert_eq!(request.file_name, "  report .pdf ");
        assert_eq!(request.description.as_deref(), Some(" Q3 "));
        assert_eq!(request.total_chunks, 2);

        query.file_id = Some("   ".to_string());
        assert!(matches!(
            query.to_initiate(),
            Err(DataRoomError::Validation(msg)) if msg == "fileID is required"
        ));
    }

    #[test]
    fn test_to_initiate_missing_parameter() {
        let mut query = initiate_query();
        query.file_name = None;

        match query.to_initiate() {
            Err(DataRoomError::Validation(msg)) => assert_eq!(msg, "fileName is required"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_to_initiate_malformed_parameters() {
        let mut query = initiate_query();
        query.total_chunks = Some("-1".to_string());
        assert!(matches!(
            query.to_initiate(),
            Err(DataRoomError::Validation(_))
        ));

        let mut query = initiate_query();
        query.room_id = Some("not-a-uuid".to_string());
        match query.to_initiate() {
            Err(DataRoomError::Validation(msg)) => assert!(msg.contains("roomID")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_chunk_number() {
        let mut query = UploadQuery::default();
        assert!(query.chunk_number().is_err());

        query.chunk_number = Some("3".to_string());
        assert_eq!(query.chunk_number().unwrap(), 3);

        query.chunk_number = Some("three".to_string());
        assert!(query.chunk_number().is_err());
    }

    #[test]
    fn test_session_id() {
        let id = Uuid::new_v4();
        let query = FileMetaQuery {
            file_meta_id: Some(id.to_string()),
        };
        assert_eq!(query.session_id().unwrap(), id);
        assert!(FileMetaQuery::default().session_id().is_err());
    }

    #[test]
    fn test_content_query() {
        let room = Uuid::new_v4();
        let query = ContentQuery {
            room_id: Some(room.to_string()),
            folder_id: None,
        };
        assert_eq!(query.room_id().unwrap(), room);
        assert_eq!(query.folder_id().unwrap(), None);
    }

    #[test]
    fn test_query_deserialize_names() {
        let query: UploadQuery =
            serde_json::from_str(r#"{"chunkNumber":"1","fileMetaID":"x","totalSize":"5"}"#)
                .unwrap();
        assert_eq!(query.chunk_number.as_deref(), Some("1"));
        assert_eq!(query.file_meta_id.as_deref(), Some("x"));
        assert_eq!(query.total_size.as_deref(), Some("5"));
    }

    #[test]
    fn test_create_room_validation() {
        let valid = CreateRoomRequest {
            name: "Deal room".to_string(),
            size: 1024,
        };
        assert!(valid.validate().is_ok());

        let blank = CreateRoomRequest {
            name: "   ".to_string(),
            size: 1,
        };
        assert!(blank.validate().is_err());

        let negative = CreateRoomRequest {
            name: "Room".to_string(),
            size: -5,
        };
        assert!(negative.validate().is_err());
    }
}
