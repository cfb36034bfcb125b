use std::sync::Arc;
use std::time::Duration;

use log::debug;
use parking_lot::Mutex;
use tokio::{sync::mpsc, task::JoinHandle, time::interval};

use lounge_protocol::{ClientMessage, Role, ServerMessage, VideoSubmission};

use crate::{
    ClientState, CommandGate, Connection, ConnectionEvent, ConnectionOptions, ConnectionSender,
    ConnectionStatus, Player,
};

/// How often the host reports its playback position.
pub const POSITION_REPORT_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct RoomOptions {
    /// The websocket endpoint, e.g. `ws://host:4530/ws`
    pub url: String,
    /// The room code
    pub room_id: String,
    /// The client identity, persisted across reloads by the caller
    pub user_id: String,
    pub role: Role,
}

/// The client session reconciler.
///
/// Owns the reconnecting channel and the mirrored room state. Identity is
/// replayed on every (re)connect, inbound messages patch the mirror, and
/// guest mutations apply optimistically before the server confirms them.
pub struct RoomClient {
    options: RoomOptions,
    connection: Connection,
    sender: ConnectionSender,
    state: Arc<Mutex<ClientState>>,
    gate: Arc<Mutex<CommandGate>>,
    tasks: Vec<JoinHandle<()>>,
}

impl RoomClient {
    /// Connects to a room. The player is the host's embedded player; guests
    /// pass none and only mirror state.
    pub fn connect(options: RoomOptions, player: Option<Arc<dyn Player>>) -> Self {
        let (connection, events) =
            Connection::connect(ConnectionOptions::new(options.url.clone()));

        let sender = connection.sender();
        let state = Arc::new(Mutex::new(ClientState::new()));
        let gate = Arc::new(Mutex::new(CommandGate::new()));

        let mut tasks = vec![tokio::spawn(run_events(
            options.clone(),
            sender.clone(),
            state.clone(),
            gate.clone(),
            player.clone(),
            events,
        ))];

        if options.role == Role::Host {
            if let Some(player) = player {
                tasks.push(tokio::spawn(run_position_reports(
                    options.clone(),
                    sender.clone(),
                    player,
                )));
            }
        }

        Self {
            options,
            connection,
            sender,
            state,
            gate,
            tasks,
        }
    }

    /// A copy of the mirrored room state.
    pub fn state(&self) -> ClientState {
        self.state.lock().clone()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.connection.status()
    }

    pub fn reconnect_count(&self) -> u32 {
        self.connection.reconnect_count()
    }

    pub fn add_video(&self, video: VideoSubmission) {
        self.state
            .lock()
            .apply_optimistic_add(&video, &self.options.user_id);

        self.sender.send(ClientMessage::AddVideo {
            room_id: self.options.room_id.clone(),
            video,
            user_id: self.options.user_id.clone(),
        });
    }

    pub fn add_videos(&self, videos: Vec<VideoSubmission>) {
        {
            let mut state = self.state.lock();

            for video in &videos {
                state.apply_optimistic_add(video, &self.options.user_id);
            }
        }

        self.sender.send(ClientMessage::AddVideos {
            room_id: self.options.room_id.clone(),
            videos,
            user_id: self.options.user_id.clone(),
        });
    }

    pub fn play(&self) {
        self.state.lock().apply_optimistic_playing(true);
        self.sender.send(ClientMessage::Play {
            room_id: self.options.room_id.clone(),
        });
    }

    pub fn pause(&self) {
        self.state.lock().apply_optimistic_playing(false);
        self.sender.send(ClientMessage::Pause {
            room_id: self.options.room_id.clone(),
        });
    }

    pub fn next_video(&self) {
        self.sender.send(ClientMessage::NextVideo {
            room_id: self.options.room_id.clone(),
        });
    }

    pub fn select_video(&self, external_id: impl Into<String>) {
        self.sender.send(ClientMessage::SelectVideo {
            room_id: self.options.room_id.clone(),
            external_id: external_id.into(),
        });
    }

    pub fn remove_video(&self, video_id: i64) {
        self.sender.send(ClientMessage::RemoveVideo {
            room_id: self.options.room_id.clone(),
            video_id,
        });
    }

    /// Called by the host when the embedded player reports that the current
    /// video ended. Events raised while a remote command is still settling
    /// are swallowed.
    pub fn notify_ended(&self) {
        if self.gate.lock().is_suppressed() {
            debug!("Swallowing ended event inside the suppression window");
            return;
        }

        self.next_video();
    }

    /// Tears the reconciler down: cancels timers and the channel without
    /// scheduling another reconnect.
    pub fn close(&self) {
        self.connection.close();

        for task in &self.tasks {
            task.abort();
        }
    }
}

impl Drop for RoomClient {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_events(
    options: RoomOptions,
    sender: ConnectionSender,
    state: Arc<Mutex<ClientState>>,
    gate: Arc<Mutex<CommandGate>>,
    player: Option<Arc<dyn Player>>,
    mut events: mpsc::UnboundedReceiver<ConnectionEvent>,
) {
    while let Some(event) = events.recv().await {
        match event {
            // Identity is replayed on every (re)connect; the snapshot that
            // answers it overwrites whatever the mirror drifted to.
            ConnectionEvent::Connected => {
                sender.send(ClientMessage::Join {
                    room_id: options.room_id.clone(),
                    user_id: options.user_id.clone(),
                    role: options.role,
                });
            }
            ConnectionEvent::Disconnected => {}
            ConnectionEvent::Message(message) => {
                if let Some(player) = &player {
                    apply_to_player(&message, player.as_ref(), &gate);
                }

                state.lock().apply(&message);
            }
        }
    }
}

/// Applies an inbound command to the embedded player, opening the
/// suppression window so the player's own feedback is not echoed back.
fn apply_to_player(message: &ServerMessage, player: &dyn Player, gate: &Mutex<CommandGate>) {
    match message {
        ServerMessage::Play { .. } => {
            gate.lock().mark();
            player.play();
        }
        ServerMessage::Pause => {
            gate.lock().mark();
            player.pause();
        }
        ServerMessage::PlayVideo { video_id } => {
            gate.lock().mark();

            match video_id {
                Some(id) => player.load(id),
                None => player.pause(),
            }
        }
        ServerMessage::SyncState {
            current_video_id,
            is_playing,
            current_time,
            ..
        } => {
            gate.lock().mark();

            match current_video_id {
                Some(id) => {
                    player.load(id);
                    player.seek(*current_time);

                    if *is_playing {
                        player.play();
                    } else {
                        player.pause();
                    }
                }
                None => player.pause(),
            }
        }
        _ => {}
    }
}

async fn run_position_reports(
    options: RoomOptions,
    sender: ConnectionSender,
    player: Arc<dyn Player>,
) {
    let mut ticker = interval(POSITION_REPORT_INTERVAL);

    loop {
        ticker.tick().await;

        if sender.status() != ConnectionStatus::Connected || !player.is_ready() {
            continue;
        }

        sender.send(ClientMessage::SyncTime {
            room_id: options.room_id.clone(),
            current_time: player.current_time(),
            is_playing: player.is_playing(),
            duration: Some(player.duration()),
        });
    }
}
