use std::time::Instant;

use log::{info, warn};
use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;

use lounge_protocol::{ServerMessage, VideoSubmission, WireVideo};

use crate::{
    CoreContext, Database, DatabaseError, NewVideo, PlaybackUpdate, PrimaryKey, RoomData,
    VideoData,
};

use super::{MessageSink, RoomError, RoomSession, SessionHandle, SessionId};

/// A lounge room, holding the authoritative playback state, the playlist,
/// and the sessions of the clients currently connected to it.
///
/// Every mutation locks [Room::state] across the whole
/// read-modify-persist-broadcast sequence, which makes mutations on a single
/// room linearizable and gives every client the same broadcast order.
pub struct Room<Db> {
    context: CoreContext<Db>,
    data: RoomData,
    state: AsyncMutex<PlaybackState>,
    /// The clients currently attached to this room
    sessions: Mutex<Vec<RoomSession>>,
}

struct PlaybackState {
    /// The playlist, sorted by position. Appends keep it sorted because new
    /// entries always take the highest position.
    playlist: Vec<VideoData>,
    current_video_id: Option<String>,
    is_playing: bool,
    current_time: f64,
    /// When the last explicit play or pause command was processed
    cooldown_at: Option<Instant>,
    /// When the playback position was last written to the durable store
    last_position_persist: Option<Instant>,
}

/// The values a position report resolved to after the cooldown was applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectivePosition {
    pub current_time: f64,
    pub is_playing: bool,
}

impl<Db> Room<Db>
where
    Db: Database,
{
    pub fn new(context: &CoreContext<Db>, data: RoomData, playlist: Vec<VideoData>) -> Self {
        let state = PlaybackState {
            playlist,
            current_video_id: data.current_video_id.clone(),
            is_playing: data.current_video_id.is_some() && data.is_playing,
            current_time: if data.current_video_id.is_some() {
                data.current_time
            } else {
                0.
            },
            cooldown_at: None,
            last_position_persist: None,
        };

        Self {
            context: context.clone(),
            data,
            state: AsyncMutex::new(state),
            sessions: Default::default(),
        }
    }

    pub fn id(&self) -> PrimaryKey {
        self.data.id
    }

    pub fn code(&self) -> &str {
        &self.data.code
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    /// Registers a session, evicting any existing session with the same
    /// user id. The snapshot is queued on the sink before the session
    /// becomes visible to broadcasts, so the client always receives
    /// `SYNC_STATE` first.
    pub async fn attach(&self, user_id: String, sink: MessageSink) -> SessionHandle {
        let state = self.state.lock().await;

        let session = RoomSession::new(user_id, sink);
        let handle = SessionHandle {
            room_code: self.data.code.clone(),
            session_id: session.id,
            user_id: session.user_id.clone(),
        };

        session.send(self.snapshot_of(&state));

        {
            let mut sessions = self.sessions.lock();
            let evicted = sessions.len();

            // Dropping the evicted session also drops its sink, which ends
            // the stale channel's writer.
            sessions.retain(|s| s.user_id != session.user_id);

            if sessions.len() < evicted {
                info!(
                    "Evicted previous session of {} in room {}",
                    session.user_id, self.data.code
                );
            }

            sessions.push(session);
        }

        handle
    }

    /// Removes a session. Called by the gateway on disconnect.
    pub fn detach(&self, session_id: SessionId) {
        self.sessions.lock().retain(|s| s.id != session_id);
    }

    /// Appends a video to the playlist. If the room had nothing selected,
    /// the new entry starts playing immediately.
    pub async fn add_video(
        &self,
        submission: VideoSubmission,
        added_by: String,
    ) -> Result<(), RoomError> {
        let mut state = self.state.lock().await;

        let video = self
            .context
            .database
            .create_video(NewVideo {
                room_id: self.data.id,
                external_id: submission.external_id,
                title: submission.title,
                thumbnail_url: submission.thumbnail,
                added_by,
                position: state.next_position(),
            })
            .await
            .map_err(RoomError::Database)?;

        let external_id = video.external_id.clone();
        state.playlist.push(video);

        if state.current_video_id.is_none() {
            state.start_playing(external_id.clone());
            self.persist_playback(&state).await?;
            self.broadcast(ServerMessage::PlayVideo {
                video_id: Some(external_id),
            });
        }

        self.broadcast(self.playlist_update_of(&state));
        Ok(())
    }

    /// Bulk variant of [Room::add_video], preserving input order. The first
    /// added entry auto-starts if the room was idle.
    pub async fn add_videos(
        &self,
        submissions: Vec<VideoSubmission>,
        added_by: String,
    ) -> Result<(), RoomError> {
        if submissions.is_empty() {
            return Ok(());
        }

        let mut state = self.state.lock().await;
        let first_position = state.next_position();

        let new_videos = submissions
            .into_iter()
            .enumerate()
            .map(|(offset, submission)| NewVideo {
                room_id: self.data.id,
                external_id: submission.external_id,
                title: submission.title,
                thumbnail_url: submission.thumbnail,
                added_by: added_by.clone(),
                position: first_position + offset as i32,
            })
            .collect();

        let videos = self
            .context
            .database
            .create_videos(new_videos)
            .await
            .map_err(RoomError::Database)?;

        let first_external_id = videos
            .first()
            .map(|v| v.external_id.clone())
            .expect("at least one video was created");

        state.playlist.extend(videos);

        if state.current_video_id.is_none() {
            state.start_playing(first_external_id.clone());
            self.persist_playback(&state).await?;
            self.broadcast(ServerMessage::PlayVideo {
                video_id: Some(first_external_id),
            });
        }

        self.broadcast(self.playlist_update_of(&state));
        Ok(())
    }

    /// Deletes a playlist entry. The current video is never changed, even
    /// when the removed entry is the one playing; playback only advances
    /// through [Room::next_video] or [Room::select_video].
    pub async fn remove_video(&self, video_id: PrimaryKey) -> Result<(), RoomError> {
        let mut state = self.state.lock().await;

        if !state.playlist.iter().any(|v| v.id == video_id) {
            return Err(RoomError::VideoNotFound);
        }

        self.context
            .database
            .delete_video(video_id)
            .await
            .map_err(|e| match e {
                DatabaseError::NotFound { .. } => RoomError::VideoNotFound,
                e => RoomError::Database(e),
            })?;

        state.playlist.retain(|v| v.id != video_id);

        self.broadcast(self.playlist_update_of(&state));
        Ok(())
    }

    /// Selects a video for playback, restarting from the beginning.
    pub async fn select_video(&self, external_id: String) -> Result<(), RoomError> {
        let mut state = self.state.lock().await;

        state.start_playing(external_id.clone());
        self.persist_playback(&state).await?;

        self.broadcast(ServerMessage::PlayVideo {
            video_id: Some(external_id),
        });
        Ok(())
    }

    /// Advances to the successor of the current entry, or stops playback
    /// when the current entry is the last one or is not in the playlist.
    pub async fn next_video(&self) -> Result<(), RoomError> {
        let mut state = self.state.lock().await;

        let current_index = state
            .current_video_id
            .as_ref()
            .and_then(|id| state.playlist.iter().position(|v| v.external_id == *id));

        if let Some(index) = current_index {
            let video = &mut state.playlist[index];
            video.is_played = true;

            // The played flag is advisory, so a failed write only warrants a warning
            if let Err(e) = self.context.database.set_video_played(video.id, true).await {
                warn!(
                    "Failed to mark video {} as played in room {}: {}",
                    video.id, self.data.code, e
                );
            }
        }

        let successor = current_index
            .and_then(|index| state.playlist.get(index + 1))
            .map(|v| v.external_id.clone());

        match successor.clone() {
            Some(external_id) => state.start_playing(external_id),
            None => state.stop_playing(),
        }

        self.persist_playback(&state).await?;

        self.broadcast(ServerMessage::PlayVideo {
            video_id: successor,
        });
        self.broadcast(self.playlist_update_of(&state));
        Ok(())
    }

    /// Applies an explicit play or pause command and records the cooldown
    /// moment that shields the new bit from stale position reports.
    pub async fn set_playing(&self, playing: bool) -> Result<(), RoomError> {
        let mut state = self.state.lock().await;

        // A room without a selected video stays paused
        state.is_playing = playing && state.current_video_id.is_some();
        state.cooldown_at = Some(Instant::now());

        if playing {
            self.broadcast(ServerMessage::Play {
                video_id: state.current_video_id.clone(),
                current_time: state.current_time,
            });
        } else {
            self.broadcast(ServerMessage::Pause);
        }

        Ok(())
    }

    /// Applies a host position report. The position is always accepted; the
    /// playing bit only once the play/pause cooldown has lapsed. Everyone
    /// except the reporting session receives the effective values.
    pub async fn report_position(
        &self,
        current_time: f64,
        is_playing: bool,
        sender: SessionId,
    ) -> EffectivePosition {
        let mut state = self.state.lock().await;

        state.current_time = current_time.max(0.);

        let in_cooldown = state
            .cooldown_at
            .map(|at| at.elapsed() < self.context.config.playback_cooldown)
            .unwrap_or(false);

        if !in_cooldown {
            state.is_playing = is_playing && state.current_video_id.is_some();
        }

        let effective = EffectivePosition {
            current_time: state.current_time,
            is_playing: state.is_playing,
        };

        let due = state
            .last_position_persist
            .map(|at| at.elapsed() >= self.context.config.position_persist_interval)
            .unwrap_or(true);

        if due {
            // Position reports arrive every couple of seconds, so losing one
            // write is harmless. Log and move on.
            if let Err(e) = self
                .context
                .database
                .update_playback(self.data.id, state.playback_update())
                .await
            {
                warn!(
                    "Failed to persist playback position for room {}: {}",
                    self.data.code, e
                );
            }

            state.last_position_persist = Some(Instant::now());
        }

        self.broadcast_except(
            sender,
            ServerMessage::SyncTime {
                current_time: effective.current_time,
                is_playing: effective.is_playing,
            },
        );

        effective
    }

    fn snapshot_of(&self, state: &PlaybackState) -> ServerMessage {
        ServerMessage::SyncState {
            current_video_id: state.current_video_id.clone(),
            is_playing: state.is_playing,
            current_time: state.current_time,
            playlist: state.wire_playlist(),
        }
    }

    fn playlist_update_of(&self, state: &PlaybackState) -> ServerMessage {
        ServerMessage::PlaylistUpdate {
            playlist: state.wire_playlist(),
        }
    }

    async fn persist_playback(&self, state: &PlaybackState) -> Result<(), RoomError> {
        self.context
            .database
            .update_playback(self.data.id, state.playback_update())
            .await
            .map_err(RoomError::Database)
    }

    fn broadcast(&self, message: ServerMessage) {
        for session in self.sessions.lock().iter() {
            session.send(message.clone());
        }
    }

    fn broadcast_except(&self, excluded: SessionId, message: ServerMessage) {
        for session in self.sessions.lock().iter() {
            if session.id != excluded {
                session.send(message.clone());
            }
        }
    }
}

impl PlaybackState {
    fn next_position(&self) -> i32 {
        self.playlist
            .iter()
            .map(|v| v.position)
            .max()
            .map(|highest| highest + 1)
            .unwrap_or(0)
    }

    fn start_playing(&mut self, external_id: String) {
        self.current_video_id = Some(external_id);
        self.is_playing = true;
        self.current_time = 0.;
    }

    fn stop_playing(&mut self) {
        self.current_video_id = None;
        self.is_playing = false;
        self.current_time = 0.;
    }

    fn playback_update(&self) -> PlaybackUpdate {
        PlaybackUpdate {
            current_video_id: self.current_video_id.clone(),
            is_playing: self.is_playing,
            current_time: self.current_time,
        }
    }

    fn wire_playlist(&self) -> Vec<WireVideo> {
        self.playlist.iter().cloned().map(Into::into).collect()
    }
}
