mod room;
mod session;

use std::sync::Arc;

use log::info;
use thiserror::Error;

pub use room::*;
pub use session::*;

use crate::{random_room_code, CoreContext, Database, DatabaseError, RoomData, VideoData};

/// How many times a room code is regenerated when it collides with an
/// existing room before giving up.
const CODE_ATTEMPTS: usize = 8;

pub struct RoomManager<Db> {
    context: CoreContext<Db>,
}

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("Room not found")]
    RoomNotFound,
    #[error("Video not found")]
    VideoNotFound,
    #[error("Could not allocate a unique room code")]
    CodeAllocation,
    #[error(transparent)]
    Database(DatabaseError),
}

impl<Db> RoomManager<Db>
where
    Db: Database,
{
    pub fn new(context: &CoreContext<Db>) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Creates a new room with a freshly generated code.
    pub async fn create_room(&self) -> Result<RoomData, RoomError> {
        for _ in 0..CODE_ATTEMPTS {
            let code = random_room_code();

            match self.context.database.create_room(&code).await {
                Ok(room) => {
                    info!("Created room {}", room.code);
                    return Ok(room);
                }
                Err(DatabaseError::Conflict { .. }) => continue,
                Err(e) => return Err(RoomError::Database(e)),
            }
        }

        Err(RoomError::CodeAllocation)
    }

    /// Returns a room's durable record along with its playlist.
    pub async fn room_with_videos(
        &self,
        code: &str,
    ) -> Result<(RoomData, Vec<VideoData>), RoomError> {
        let room = self
            .context
            .database
            .room_by_code(code)
            .await
            .map_err(not_found_as_room)?;

        let videos = self
            .context
            .database
            .videos_by_room(room.id)
            .await
            .map_err(RoomError::Database)?;

        Ok((room, videos))
    }

    /// Returns all rooms in the durable store.
    pub async fn list_rooms(&self) -> Result<Vec<RoomData>, RoomError> {
        self.context
            .database
            .list_rooms()
            .await
            .map_err(RoomError::Database)
    }

    /// Returns the in-memory room for a code, materializing it from the
    /// durable store on first use.
    pub async fn room(&self, code: &str) -> Result<Arc<Room<Db>>, RoomError> {
        if let Some(room) = self.context.rooms.get(code).map(|r| r.value().clone()) {
            return Ok(room);
        }

        let data = self
            .context
            .database
            .room_by_code(code)
            .await
            .map_err(not_found_as_room)?;

        let videos = self
            .context
            .database
            .videos_by_room(data.id)
            .await
            .map_err(RoomError::Database)?;

        info!("Materialized room {}", data.code);

        let room = Arc::new(Room::new(&self.context, data, videos));

        // Two callers may materialize concurrently. The entry API keeps
        // whichever copy landed first.
        let room = self
            .context
            .rooms
            .entry(code.to_string())
            .or_insert(room)
            .value()
            .clone();

        Ok(room)
    }

    /// Attaches a client to a room. The full-state snapshot is delivered
    /// through the sink as the session's first message.
    pub async fn attach(
        &self,
        code: &str,
        user_id: String,
        sink: MessageSink,
    ) -> Result<SessionHandle, RoomError> {
        let room = self.room(code).await?;
        let handle = room.attach(user_id, sink).await;

        // A concurrent detach may have collected the entry between the
        // lookup and the registration. Re-insert so the room stays
        // addressable.
        self.context
            .rooms
            .entry(code.to_string())
            .or_insert_with(|| room.clone());

        Ok(handle)
    }

    /// Detaches a session. The in-memory room is garbage collected once its
    /// last session is gone; the durable record remains.
    pub fn detach(&self, handle: &SessionHandle) {
        if let Some(room) = self
            .context
            .rooms
            .get(&handle.room_code)
            .map(|r| r.value().clone())
        {
            room.detach(handle.session_id);
        }

        let removed = self
            .context
            .rooms
            .remove_if(&handle.room_code, |_, room| room.is_empty());

        if removed.is_some() {
            info!("Dematerialized empty room {}", handle.room_code);
        }
    }
}

fn not_found_as_room(error: DatabaseError) -> RoomError {
    match error {
        DatabaseError::NotFound { .. } => RoomError::RoomNotFound,
        e => RoomError::Database(e),
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver};

    use lounge_protocol::{ServerMessage, VideoSubmission};

    use super::SessionHandle;
    use crate::{Config, Coordinator, MemoryDatabase, Room};

    fn coordinator() -> Coordinator<MemoryDatabase> {
        Coordinator::new(MemoryDatabase::new(), Config::default())
    }

    fn coordinator_with(config: Config) -> Coordinator<MemoryDatabase> {
        Coordinator::new(MemoryDatabase::new(), config)
    }

    fn submission(external_id: &str) -> VideoSubmission {
        VideoSubmission {
            external_id: external_id.to_string(),
            title: format!("Title of {external_id}"),
            thumbnail: format!("https://thumbs.example/{external_id}.jpg"),
        }
    }

    async fn attach(
        coordinator: &Coordinator<MemoryDatabase>,
        code: &str,
        user_id: &str,
    ) -> (SessionHandle, UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();

        let handle = coordinator
            .rooms
            .attach(code, user_id.to_string(), tx)
            .await
            .expect("room exists");

        (handle, rx)
    }

    /// Creates a room with a guest attached, returning the receiver with the
    /// initial snapshot already consumed.
    async fn room_with_guest(
        coordinator: &Coordinator<MemoryDatabase>,
    ) -> (
        Arc<Room<MemoryDatabase>>,
        SessionHandle,
        UnboundedReceiver<ServerMessage>,
    ) {
        let room_data = coordinator.rooms.create_room().await.unwrap();
        let (handle, mut rx) = attach(coordinator, &room_data.code, "guest").await;

        drain(&mut rx);

        let room = coordinator.rooms.room(&room_data.code).await.unwrap();
        (room, handle, rx)
    }

    fn drain(rx: &mut UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut messages = vec![];

        while let Ok(message) = rx.try_recv() {
            messages.push(message);
        }

        messages
    }

    #[tokio::test]
    async fn attach_requires_an_existing_room() {
        let coordinator = coordinator();
        let (tx, _rx) = mpsc::unbounded_channel();

        let result = coordinator
            .rooms
            .attach("ABCDEF", "u1".to_string(), tx)
            .await;

        assert!(matches!(result, Err(super::RoomError::RoomNotFound)));
    }

    #[tokio::test]
    async fn the_snapshot_is_the_first_message_a_session_receives() {
        let coordinator = coordinator();
        let room_data = coordinator.rooms.create_room().await.unwrap();

        let (_handle, mut rx) = attach(&coordinator, &room_data.code, "u1").await;

        assert_eq!(
            drain(&mut rx),
            vec![ServerMessage::SyncState {
                current_video_id: None,
                is_playing: false,
                current_time: 0.,
                playlist: vec![],
            }]
        );
    }

    #[tokio::test]
    async fn first_video_auto_starts() {
        let coordinator = coordinator();
        let (room, _handle, mut rx) = room_with_guest(&coordinator).await;

        room.add_video(submission("v1"), "guest".to_string())
            .await
            .unwrap();

        let messages = drain(&mut rx);
        assert_eq!(messages.len(), 2);

        assert_eq!(
            messages[0],
            ServerMessage::PlayVideo {
                video_id: Some("v1".to_string())
            }
        );

        match &messages[1] {
            ServerMessage::PlaylistUpdate { playlist } => {
                assert_eq!(playlist.len(), 1);
                assert_eq!(playlist[0].external_id, "v1");
                assert_eq!(playlist[0].order, 0);
            }
            other => panic!("Expected a playlist update, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn second_video_does_not_interrupt_playback() {
        let coordinator = coordinator();
        let (room, _handle, mut rx) = room_with_guest(&coordinator).await;

        room.add_video(submission("v1"), "guest".to_string())
            .await
            .unwrap();
        drain(&mut rx);

        room.add_video(submission("v2"), "guest".to_string())
            .await
            .unwrap();

        let messages = drain(&mut rx);
        assert_eq!(messages.len(), 1);
        assert!(matches!(messages[0], ServerMessage::PlaylistUpdate { .. }));
    }

    #[tokio::test]
    async fn duplicate_join_evicts_the_previous_session() {
        let coordinator = coordinator();
        let room_data = coordinator.rooms.create_room().await.unwrap();

        let (_handle_a, mut rx_a) = attach(&coordinator, &room_data.code, "u1").await;
        drain(&mut rx_a);

        let (_handle_b, mut rx_b) = attach(&coordinator, &room_data.code, "u1").await;
        drain(&mut rx_b);

        // The first session's sink was dropped by the eviction
        assert_eq!(rx_a.try_recv(), Err(TryRecvError::Disconnected));

        let room = coordinator.rooms.room(&room_data.code).await.unwrap();
        room.add_video(submission("v1"), "u1".to_string())
            .await
            .unwrap();

        assert_eq!(drain(&mut rx_b).len(), 2);
    }

    #[tokio::test]
    async fn playlist_positions_stay_strictly_increasing() {
        let coordinator = coordinator();
        let (room, _handle, _rx) = room_with_guest(&coordinator).await;

        for id in ["v1", "v2", "v3"] {
            room.add_video(submission(id), "guest".to_string())
                .await
                .unwrap();
        }

        let (_, videos) = coordinator
            .rooms
            .room_with_videos(room.code())
            .await
            .unwrap();

        room.remove_video(videos[1].id).await.unwrap();
        room.add_video(submission("v4"), "guest".to_string())
            .await
            .unwrap();

        let (_, videos) = coordinator
            .rooms
            .room_with_videos(room.code())
            .await
            .unwrap();

        let positions: Vec<_> = videos.iter().map(|v| v.position).collect();
        let mut sorted = positions.clone();
        sorted.sort();
        sorted.dedup();

        assert_eq!(positions, sorted, "positions are a strict total order");
        assert_eq!(positions, vec![0, 2, 3]);
    }

    #[tokio::test]
    async fn bulk_add_preserves_input_order_and_auto_starts() {
        let coordinator = coordinator();
        let (room, _handle, mut rx) = room_with_guest(&coordinator).await;

        room.add_videos(
            vec![submission("v1"), submission("v2"), submission("v3")],
            "guest".to_string(),
        )
        .await
        .unwrap();

        let messages = drain(&mut rx);

        assert_eq!(
            messages[0],
            ServerMessage::PlayVideo {
                video_id: Some("v1".to_string())
            }
        );

        match &messages[1] {
            ServerMessage::PlaylistUpdate { playlist } => {
                let ids: Vec<_> = playlist.iter().map(|v| v.external_id.as_str()).collect();
                assert_eq!(ids, vec!["v1", "v2", "v3"]);
            }
            other => panic!("Expected a playlist update, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn next_video_advances_and_marks_played() {
        let coordinator = coordinator();
        let (room, _handle, mut rx) = room_with_guest(&coordinator).await;

        room.add_videos(vec![submission("v1"), submission("v2")], "guest".to_string())
            .await
            .unwrap();
        drain(&mut rx);

        room.next_video().await.unwrap();

        let messages = drain(&mut rx);
        assert_eq!(
            messages[0],
            ServerMessage::PlayVideo {
                video_id: Some("v2".to_string())
            }
        );

        match &messages[1] {
            ServerMessage::PlaylistUpdate { playlist } => {
                assert!(playlist[0].is_played);
                assert!(!playlist[1].is_played);
            }
            other => panic!("Expected a playlist update, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn next_video_on_the_last_entry_stops_playback() {
        let coordinator = coordinator();
        let (room, _handle, mut rx) = room_with_guest(&coordinator).await;

        room.add_videos(vec![submission("v1"), submission("v2")], "guest".to_string())
            .await
            .unwrap();
        room.select_video("v2".to_string()).await.unwrap();
        drain(&mut rx);

        room.next_video().await.unwrap();

        let messages = drain(&mut rx);
        assert_eq!(messages[0], ServerMessage::PlayVideo { video_id: None });
        assert!(matches!(messages[1], ServerMessage::PlaylistUpdate { .. }));

        // A fresh session sees the terminal state in its snapshot
        let (_handle, mut rx) = attach(&coordinator, room.code(), "u2").await;

        match drain(&mut rx).remove(0) {
            ServerMessage::SyncState {
                current_video_id,
                is_playing,
                current_time,
                ..
            } => {
                assert_eq!(current_video_id, None);
                assert!(!is_playing);
                assert_eq!(current_time, 0.);
            }
            other => panic!("Expected a snapshot, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn removing_the_current_video_leaves_it_selected() {
        let coordinator = coordinator();
        let (room, _handle, _rx) = room_with_guest(&coordinator).await;

        room.add_video(submission("v1"), "guest".to_string())
            .await
            .unwrap();

        let (_, videos) = coordinator
            .rooms
            .room_with_videos(room.code())
            .await
            .unwrap();

        room.remove_video(videos[0].id).await.unwrap();

        // The dangling id stays until the next explicit advance
        let (_handle, mut rx) = attach(&coordinator, room.code(), "u2").await;

        match drain(&mut rx).remove(0) {
            ServerMessage::SyncState {
                current_video_id,
                playlist,
                ..
            } => {
                assert_eq!(current_video_id, Some("v1".to_string()));
                assert!(playlist.is_empty());
            }
            other => panic!("Expected a snapshot, got {other:?}"),
        }

        // Advancing from the dangling id stops playback
        room.next_video().await.unwrap();

        let (_handle, mut rx) = attach(&coordinator, room.code(), "u3").await;

        match drain(&mut rx).remove(0) {
            ServerMessage::SyncState {
                current_video_id, ..
            } => assert_eq!(current_video_id, None),
            other => panic!("Expected a snapshot, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn removing_an_unknown_video_fails() {
        let coordinator = coordinator();
        let (room, _handle, _rx) = room_with_guest(&coordinator).await;

        let result = room.remove_video(999).await;
        assert!(matches!(result, Err(super::RoomError::VideoNotFound)));
    }

    #[tokio::test]
    async fn cooldown_shields_the_playing_bit() {
        let coordinator = coordinator();
        let (room, _guest, mut guest_rx) = room_with_guest(&coordinator).await;

        room.add_video(submission("v1"), "guest".to_string())
            .await
            .unwrap();

        let (host, mut host_rx) = attach(&coordinator, room.code(), "host").await;

        room.set_playing(false).await.unwrap();
        drain(&mut host_rx);
        drain(&mut guest_rx);

        // The host still believes it is playing; the report arrives inside
        // the cooldown window, so only the position is taken.
        let effective = room.report_position(10.3, true, host.session_id).await;

        assert_eq!(effective.current_time, 10.3);
        assert!(!effective.is_playing);

        assert_eq!(
            drain(&mut guest_rx),
            vec![ServerMessage::SyncTime {
                current_time: 10.3,
                is_playing: false,
            }]
        );

        // The reporting session is excluded from the fan-out
        assert_eq!(drain(&mut host_rx), vec![]);
    }

    #[tokio::test]
    async fn reports_apply_the_playing_bit_after_the_cooldown() {
        let config = Config {
            playback_cooldown: std::time::Duration::ZERO,
            ..Config::default()
        };

        let coordinator = coordinator_with(config);
        let (room, _guest, _rx) = room_with_guest(&coordinator).await;

        room.add_video(submission("v1"), "guest".to_string())
            .await
            .unwrap();

        let (host, _host_rx) = attach(&coordinator, room.code(), "host").await;

        room.set_playing(false).await.unwrap();

        let effective = room.report_position(10.3, true, host.session_id).await;

        assert_eq!(effective.current_time, 10.3);
        assert!(effective.is_playing);
    }

    #[tokio::test]
    async fn empty_rooms_are_dematerialized_on_detach() {
        let coordinator = coordinator();
        let room_data = coordinator.rooms.create_room().await.unwrap();

        let (handle, _rx) = attach(&coordinator, &room_data.code, "u1").await;

        assert!(coordinator.rooms.context.rooms.contains_key(&room_data.code));

        coordinator.rooms.detach(&handle);

        assert!(!coordinator.rooms.context.rooms.contains_key(&room_data.code));

        // The durable record survives
        assert!(coordinator
            .rooms
            .room_with_videos(&room_data.code)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn detaching_an_evicted_session_keeps_the_replacement() {
        let coordinator = coordinator();
        let room_data = coordinator.rooms.create_room().await.unwrap();

        let (handle_a, _rx_a) = attach(&coordinator, &room_data.code, "u1").await;
        let (_handle_b, mut rx_b) = attach(&coordinator, &room_data.code, "u1").await;
        drain(&mut rx_b);

        // The evicted channel disconnects afterwards, which must not tear
        // down the replacement session.
        coordinator.rooms.detach(&handle_a);

        let room = coordinator.rooms.room(&room_data.code).await.unwrap();
        room.add_video(submission("v1"), "u1".to_string())
            .await
            .unwrap();

        assert_eq!(drain(&mut rx_b).len(), 2);
    }
}
