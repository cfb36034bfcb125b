use std::collections::HashSet;

use lounge_protocol::{ServerMessage, VideoSubmission, WireVideo};

/// A playlist entry as the client mirrors it.
///
/// Ids are strings because optimistic entries carry a synthetic id until
/// the next snapshot replaces them with the server-assigned one.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistEntry {
    pub id: String,
    pub external_id: String,
    pub title: String,
    pub thumbnail: String,
    pub added_by: String,
    pub is_played: bool,
    pub order: i32,
}

/// The client's mirror of a room's authoritative state.
///
/// Incremental updates patch it in place; every `SYNC_STATE` and
/// `PLAYLIST_UPDATE` replaces whole sections, which is what reconciles
/// optimistic entries away.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientState {
    pub playlist: Vec<PlaylistEntry>,
    pub current_video_id: Option<String>,
    pub is_playing: bool,
    pub current_time: f64,
    /// External ids of optimistic additions the server has not confirmed yet
    pub pending: HashSet<String>,
    /// The latest server error, kept until the next successful snapshot
    pub last_error: Option<String>,
}

impl ClientState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a server message.
    pub fn apply(&mut self, message: &ServerMessage) {
        match message {
            ServerMessage::SyncState {
                current_video_id,
                is_playing,
                current_time,
                playlist,
            } => {
                self.playlist = playlist.iter().cloned().map(Into::into).collect();
                self.current_video_id = current_video_id.clone();
                self.is_playing = *is_playing;
                self.current_time = *current_time;
                self.pending.clear();
                self.last_error = None;
            }
            ServerMessage::PlaylistUpdate { playlist } => {
                self.playlist = playlist.iter().cloned().map(Into::into).collect();
                self.pending.clear();
            }
            ServerMessage::Play {
                video_id,
                current_time,
            } => {
                if video_id.is_some() {
                    self.current_video_id = video_id.clone();
                }

                self.is_playing = true;
                self.current_time = *current_time;
            }
            ServerMessage::Pause => {
                self.is_playing = false;
            }
            ServerMessage::SyncTime {
                current_time,
                is_playing,
            } => {
                self.current_time = *current_time;
                self.is_playing = *is_playing;
            }
            ServerMessage::PlayVideo { video_id } => {
                self.current_video_id = video_id.clone();
                self.is_playing = video_id.is_some();
                self.current_time = 0.;
            }
            ServerMessage::Error { message } => {
                // Pessimistically assume the last optimistic mutation failed
                self.last_error = Some(message.clone());
                self.pending.clear();
            }
            ServerMessage::Pong => {}
        }
    }

    /// Inserts an optimistic playlist entry for a submission that was just
    /// sent to the server. The next snapshot replaces it either with the
    /// confirmed entry or with nothing.
    pub fn apply_optimistic_add(&mut self, video: &VideoSubmission, added_by: &str) {
        let order = self
            .playlist
            .iter()
            .map(|entry| entry.order)
            .max()
            .map(|highest| highest + 1)
            .unwrap_or(0);

        self.pending.insert(video.external_id.clone());
        self.playlist.push(PlaylistEntry {
            id: format!("optimistic-{}", video.external_id),
            external_id: video.external_id.clone(),
            title: video.title.clone(),
            thumbnail: video.thumbnail.clone(),
            added_by: added_by.to_string(),
            is_played: false,
            order,
        });
    }

    /// Applies a play or pause before the server confirms it.
    pub fn apply_optimistic_playing(&mut self, playing: bool) {
        self.is_playing = playing && self.current_video_id.is_some();
    }

    pub fn is_pending(&self, external_id: &str) -> bool {
        self.pending.contains(external_id)
    }
}

impl From<WireVideo> for PlaylistEntry {
    fn from(video: WireVideo) -> Self {
        PlaylistEntry {
            id: video.id.to_string(),
            external_id: video.external_id,
            title: video.title,
            thumbnail: video.thumbnail,
            added_by: video.added_by,
            is_played: video.is_played,
            order: video.order,
        }
    }
}
