//! Data rooms.
//!
//! A room is a quota-bounded container with a single root folder. Uploaded
//! files reference the root folder identity, never the room id directly.

mod repository;

pub use repository::{NewRoom, Room, RoomRepository, RoomUsage};
