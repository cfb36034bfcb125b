use async_trait::async_trait;
use thiserror::Error;

mod data;
mod memory;
mod pg;

pub use data::*;
pub use memory::*;
pub use pg::*;

pub type DatabaseResult<T> = std::result::Result<T, DatabaseError>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    /// An unknown or internal error happened with the database
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
    /// A resource already exists
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        /// The resource in question
        resource: &'static str,
        /// The field that is conflicting
        field: &'static str,
        /// The conflicting value
        value: String,
    },
    /// A resource in the database doesn't exist
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: String,
    },
}

/// Represents a type that can store and fetch lounge data durably.
///
/// Rooms and their playlists outlive the in-memory registry, which only
/// materializes a room while clients are connected to it.
#[async_trait]
pub trait Database: Send + Sync + 'static {
    async fn create_room(&self, code: &str) -> DatabaseResult<RoomData>;
    async fn room_by_code(&self, code: &str) -> DatabaseResult<RoomData>;
    async fn list_rooms(&self) -> DatabaseResult<Vec<RoomData>>;
    /// Persists the playback triplet of a room.
    async fn update_playback(
        &self,
        room_id: PrimaryKey,
        update: PlaybackUpdate,
    ) -> DatabaseResult<()>;

    /// Returns the playlist of a room in playback order.
    async fn videos_by_room(&self, room_id: PrimaryKey) -> DatabaseResult<Vec<VideoData>>;
    async fn create_video(&self, new_video: NewVideo) -> DatabaseResult<VideoData>;
    /// Bulk variant of [Database::create_video], preserving input order.
    async fn create_videos(&self, new_videos: Vec<NewVideo>) -> DatabaseResult<Vec<VideoData>>;
    async fn delete_video(&self, video_id: PrimaryKey) -> DatabaseResult<()>;
    async fn set_video_played(&self, video_id: PrimaryKey, is_played: bool) -> DatabaseResult<()>;
}

/// Helpers to convert driver errors into [DatabaseError]
pub(crate) trait IntoDatabaseError {
    fn any(self) -> DatabaseError;
    fn not_found_or(self, resource: &'static str, identifier: &str) -> DatabaseError;
}
