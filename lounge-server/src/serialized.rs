//! All schemas that are exposed from endpoints are defined here
//! along with the conversion impls

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use lounge_core::{PlaylistMetadata, RoomData, VideoData, VideoMetadata};

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    id: i64,
    code: String,
    current_video_id: Option<String>,
    is_playing: bool,
    current_time: f64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    id: i64,
    #[serde(rename = "youtubeId")]
    external_id: String,
    title: String,
    thumbnail: String,
    added_by: String,
    is_played: bool,
    order: i32,
    created_at: DateTime<Utc>,
}

/// A room along with its playlist, as returned by the room detail endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomWithVideos {
    #[serde(flatten)]
    room: Room,
    videos: Vec<Video>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    external_id: String,
    title: String,
    thumbnail: String,
    channel_title: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    playlist_id: String,
    title: String,
    video_count: usize,
    videos: Vec<SearchResult>,
}

/// Helper trait to convert any type into a serialized version
pub trait ToSerialized<T>
where
    T: Serialize,
{
    fn to_serialized(&self) -> T;
}

impl<I, O> ToSerialized<Vec<O>> for Vec<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Vec<O> {
        self.iter().map(|x| x.to_serialized()).collect()
    }
}

impl ToSerialized<Room> for RoomData {
    fn to_serialized(&self) -> Room {
        Room {
            id: self.id,
            code: self.code.clone(),
            current_video_id: self.current_video_id.clone(),
            is_playing: self.is_playing,
            current_time: self.current_time,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl ToSerialized<Video> for VideoData {
    fn to_serialized(&self) -> Video {
        Video {
            id: self.id,
            external_id: self.external_id.clone(),
            title: self.title.clone(),
            thumbnail: self.thumbnail_url.clone(),
            added_by: self.added_by.clone(),
            is_played: self.is_played,
            order: self.position,
            created_at: self.created_at,
        }
    }
}

impl ToSerialized<RoomWithVideos> for (RoomData, Vec<VideoData>) {
    fn to_serialized(&self) -> RoomWithVideos {
        RoomWithVideos {
            room: self.0.to_serialized(),
            videos: self.1.to_serialized(),
        }
    }
}

impl ToSerialized<SearchResult> for VideoMetadata {
    fn to_serialized(&self) -> SearchResult {
        SearchResult {
            external_id: self.external_id.clone(),
            title: self.title.clone(),
            thumbnail: self.thumbnail.clone(),
            channel_title: self.channel_title.clone(),
        }
    }
}

impl ToSerialized<Playlist> for PlaylistMetadata {
    fn to_serialized(&self) -> Playlist {
        Playlist {
            playlist_id: self.playlist_id.clone(),
            title: self.title.clone(),
            video_count: self.video_count,
            videos: self.videos.to_serialized(),
        }
    }
}
