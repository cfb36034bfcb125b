use chrono::{DateTime, Utc};
use lounge_protocol::WireVideo;

/// The type used for primary keys in the database.
pub type PrimaryKey = i64;

/// A lounge room
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RoomData {
    pub id: PrimaryKey,
    /// The human-friendly code used to identify the room
    pub code: String,
    /// The external id of the video selected for playback, if any.
    ///
    /// This may point at an entry that no longer exists in the playlist,
    /// because removing a video does not advance playback.
    pub current_video_id: Option<String>,
    pub is_playing: bool,
    /// The last playback position the host reported, in seconds
    pub current_time: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An entry in a room's playlist
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VideoData {
    pub id: PrimaryKey,
    pub room_id: PrimaryKey,
    /// The opaque id of the upstream media
    pub external_id: String,
    pub title: String,
    pub thumbnail_url: String,
    /// The opaque identity of the client that added the entry
    pub added_by: String,
    /// Set once playback advanced past this entry. Advisory only.
    pub is_played: bool,
    /// The sort key within the room. Ties are broken by `created_at`, then `id`.
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewVideo {
    pub room_id: PrimaryKey,
    pub external_id: String,
    pub title: String,
    pub thumbnail_url: String,
    pub added_by: String,
    pub position: i32,
}

/// The subset of room state that is persisted on playback transitions
/// and throttled position reports.
#[derive(Debug, Clone)]
pub struct PlaybackUpdate {
    pub current_video_id: Option<String>,
    pub is_playing: bool,
    pub current_time: f64,
}

impl From<VideoData> for WireVideo {
    fn from(video: VideoData) -> Self {
        WireVideo {
            id: video.id,
            external_id: video.external_id,
            title: video.title,
            thumbnail: video.thumbnail_url,
            added_by: video.added_by,
            is_played: video.is_played,
            order: video.position,
        }
    }
}
