use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use crate::{
    Database, DatabaseError, DatabaseResult, NewVideo, PlaybackUpdate, PrimaryKey, RoomData,
    VideoData,
};

/// An in-memory database implementation.
///
/// Used by tests, and usable for ephemeral deployments where rooms do not
/// need to survive a restart.
#[derive(Default)]
pub struct MemoryDatabase {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    rooms: Vec<RoomData>,
    videos: Vec<VideoData>,
    next_id: PrimaryKey,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

impl State {
    fn assign_id(&mut self) -> PrimaryKey {
        self.next_id += 1;
        self.next_id
    }

    fn insert_video(&mut self, new_video: NewVideo) -> VideoData {
        let video = VideoData {
            id: self.assign_id(),
            room_id: new_video.room_id,
            external_id: new_video.external_id,
            title: new_video.title,
            thumbnail_url: new_video.thumbnail_url,
            added_by: new_video.added_by,
            is_played: false,
            position: new_video.position,
            created_at: Utc::now(),
        };

        self.videos.push(video.clone());
        video
    }

    fn room_exists(&self, room_id: PrimaryKey) -> DatabaseResult<()> {
        self.rooms
            .iter()
            .any(|r| r.id == room_id)
            .then_some(())
            .ok_or(DatabaseError::NotFound {
                resource: "room",
                identifier: room_id.to_string(),
            })
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn create_room(&self, code: &str) -> DatabaseResult<RoomData> {
        let mut state = self.state.lock();

        if state.rooms.iter().any(|r| r.code == code) {
            return Err(DatabaseError::Conflict {
                resource: "room",
                field: "code",
                value: code.to_string(),
            });
        }

        let now = Utc::now();
        let room = RoomData {
            id: state.assign_id(),
            code: code.to_string(),
            current_video_id: None,
            is_playing: false,
            current_time: 0.,
            created_at: now,
            updated_at: now,
        };

        state.rooms.push(room.clone());
        Ok(room)
    }

    async fn room_by_code(&self, code: &str) -> DatabaseResult<RoomData> {
        self.state
            .lock()
            .rooms
            .iter()
            .find(|r| r.code == code)
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "room",
                identifier: code.to_string(),
            })
    }

    async fn list_rooms(&self) -> DatabaseResult<Vec<RoomData>> {
        Ok(self.state.lock().rooms.clone())
    }

    async fn update_playback(
        &self,
        room_id: PrimaryKey,
        update: PlaybackUpdate,
    ) -> DatabaseResult<()> {
        let mut state = self.state.lock();

        let room = state
            .rooms
            .iter_mut()
            .find(|r| r.id == room_id)
            .ok_or(DatabaseError::NotFound {
                resource: "room",
                identifier: room_id.to_string(),
            })?;

        room.current_video_id = update.current_video_id;
        room.is_playing = update.is_playing;
        room.current_time = update.current_time;
        room.updated_at = Utc::now();

        Ok(())
    }

    async fn videos_by_room(&self, room_id: PrimaryKey) -> DatabaseResult<Vec<VideoData>> {
        let mut videos: Vec<_> = self
            .state
            .lock()
            .videos
            .iter()
            .filter(|v| v.room_id == room_id)
            .cloned()
            .collect();

        videos.sort_by(|a, b| {
            a.position
                .cmp(&b.position)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });

        Ok(videos)
    }

    async fn create_video(&self, new_video: NewVideo) -> DatabaseResult<VideoData> {
        let mut state = self.state.lock();

        state.room_exists(new_video.room_id)?;
        Ok(state.insert_video(new_video))
    }

    async fn create_videos(&self, new_videos: Vec<NewVideo>) -> DatabaseResult<Vec<VideoData>> {
        let mut state = self.state.lock();

        for new_video in &new_videos {
            state.room_exists(new_video.room_id)?;
        }

        Ok(new_videos
            .into_iter()
            .map(|v| state.insert_video(v))
            .collect())
    }

    async fn delete_video(&self, video_id: PrimaryKey) -> DatabaseResult<()> {
        let mut state = self.state.lock();
        let before = state.videos.len();

        state.videos.retain(|v| v.id != video_id);

        if state.videos.len() == before {
            return Err(DatabaseError::NotFound {
                resource: "video",
                identifier: video_id.to_string(),
            });
        }

        Ok(())
    }

    async fn set_video_played(&self, video_id: PrimaryKey, is_played: bool) -> DatabaseResult<()> {
        let mut state = self.state.lock();

        let video = state
            .videos
            .iter_mut()
            .find(|v| v.id == video_id)
            .ok_or(DatabaseError::NotFound {
                resource: "video",
                identifier: video_id.to_string(),
            })?;

        video.is_played = is_played;
        Ok(())
    }
}
