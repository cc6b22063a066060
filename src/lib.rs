//! Data room upload service
//!
//! Resumable, chunked file uploads into data rooms: chunks are staged on
//! disk, assembled exactly once when the last one arrives, and the
//! published file is served for download.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod room;
pub mod upload;
pub mod web;

pub use config::Config;
pub use db::Database;
pub use error::{DataRoomError, Result};
pub use room::{NewRoom, Room, RoomRepository};
pub use upload::{FileMeta, FileStatus, InitiateUpload, UploadService};
pub use web::WebServer;
