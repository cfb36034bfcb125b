//! The wire protocol spoken over the `/ws` gateway.
//!
//! Frames are UTF-8 JSON, one message per frame, discriminated by the `type`
//! field. The legacy `youtubeId` field name is kept on the wire for
//! compatibility with existing clients.

use serde::{Deserialize, Serialize};

/// The role a client declares when joining a room.
///
/// The host is the single client that renders media and reports playback
/// position. Everyone else is a guest acting as a remote control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Host,
    Guest,
}

/// A playlist entry as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireVideo {
    pub id: i64,
    #[serde(rename = "youtubeId")]
    pub external_id: String,
    pub title: String,
    pub thumbnail: String,
    pub added_by: String,
    pub is_played: bool,
    pub order: i32,
}

/// A video submitted by a client via `ADD_VIDEO` or `ADD_VIDEOS`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSubmission {
    #[serde(rename = "youtubeId")]
    pub external_id: String,
    pub title: String,
    pub thumbnail: String,
}

/// Messages sent from a client to the gateway.
///
/// Every room-scoped message carries `roomId`, which is the human-friendly
/// room code rather than the internal id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "JOIN", rename_all = "camelCase")]
    Join {
        room_id: String,
        user_id: String,
        role: Role,
    },
    #[serde(rename = "ADD_VIDEO", rename_all = "camelCase")]
    AddVideo {
        room_id: String,
        video: VideoSubmission,
        user_id: String,
    },
    #[serde(rename = "ADD_VIDEOS", rename_all = "camelCase")]
    AddVideos {
        room_id: String,
        videos: Vec<VideoSubmission>,
        user_id: String,
    },
    #[serde(rename = "PLAY", rename_all = "camelCase")]
    Play { room_id: String },
    #[serde(rename = "PAUSE", rename_all = "camelCase")]
    Pause { room_id: String },
    #[serde(rename = "SYNC_TIME", rename_all = "camelCase")]
    SyncTime {
        room_id: String,
        current_time: f64,
        is_playing: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<f64>,
    },
    #[serde(rename = "NEXT_VIDEO", rename_all = "camelCase")]
    NextVideo { room_id: String },
    #[serde(rename = "REMOVE_VIDEO", rename_all = "camelCase")]
    RemoveVideo { room_id: String, video_id: i64 },
    #[serde(rename = "SELECT_VIDEO", rename_all = "camelCase")]
    SelectVideo {
        room_id: String,
        #[serde(rename = "youtubeId")]
        external_id: String,
    },
    #[serde(rename = "PING")]
    Ping,
}

/// Messages sent from the gateway to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// The full authoritative snapshot, sent as a reply to `JOIN`.
    #[serde(rename = "SYNC_STATE", rename_all = "camelCase")]
    SyncState {
        current_video_id: Option<String>,
        is_playing: bool,
        current_time: f64,
        playlist: Vec<WireVideo>,
    },
    #[serde(rename = "PLAYLIST_UPDATE")]
    PlaylistUpdate { playlist: Vec<WireVideo> },
    #[serde(rename = "PLAY", rename_all = "camelCase")]
    Play {
        video_id: Option<String>,
        current_time: f64,
    },
    #[serde(rename = "PAUSE")]
    Pause,
    /// The effective position report, after the play/pause cooldown is applied.
    #[serde(rename = "SYNC_TIME", rename_all = "camelCase")]
    SyncTime { current_time: f64, is_playing: bool },
    /// Instructs the host to load and play a video. `videoId` is none when
    /// the playlist ran out.
    #[serde(rename = "PLAY_VIDEO", rename_all = "camelCase")]
    PlayVideo { video_id: Option<String> },
    #[serde(rename = "PONG")]
    Pong,
    #[serde(rename = "ERROR")]
    Error { message: String },
}

impl ClientMessage {
    /// The room code this message addresses, if it is room-scoped.
    pub fn room_id(&self) -> Option<&str> {
        match self {
            Self::Join { room_id, .. }
            | Self::AddVideo { room_id, .. }
            | Self::AddVideos { room_id, .. }
            | Self::Play { room_id }
            | Self::Pause { room_id }
            | Self::SyncTime { room_id, .. }
            | Self::NextVideo { room_id }
            | Self::RemoveVideo { room_id, .. }
            | Self::SelectVideo { room_id, .. } => Some(room_id),
            Self::Ping => None,
        }
    }
}
