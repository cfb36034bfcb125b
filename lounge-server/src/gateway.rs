use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use log::{debug, info};
use tokio::{spawn, sync::mpsc};

use lounge_core::{Database, MessageSink, RoomError, SessionHandle};
use lounge_protocol::{ClientMessage, ServerMessage};

use crate::context::ServerContext;

pub(crate) async fn ws_handler<Db>(
    ws: WebSocketUpgrade,
    context: ServerContext<Db>,
) -> impl IntoResponse
where
    Db: Database,
{
    ws.on_upgrade(move |socket| handle_connection(socket, context))
}

/// Drives a single client channel: parses inbound frames, routes them to the
/// owning room, and drains the per-client send queue.
async fn handle_connection<Db>(socket: WebSocket, context: ServerContext<Db>)
where
    Db: Database,
{
    let (mut outgoing, mut incoming) = socket.split();
    let (sink, mut queued) = mpsc::unbounded_channel::<ServerMessage>();

    // All sends go through the queue, so one slow client only ever stalls
    // its own writer.
    let writer = spawn(async move {
        while let Some(message) = queued.recv().await {
            let frame = serde_json::to_string(&message).expect("message serializes");

            if outgoing.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }

        let _ = outgoing.close().await;
    });

    let mut connection = Connection {
        context,
        sink,
        session: None,
    };

    while let Some(Ok(frame)) = incoming.next().await {
        match frame {
            Message::Text(text) => connection.handle_frame(&text).await,
            Message::Close(_) => break,
            // Transport-level pings are answered by the websocket layer
            _ => {}
        }
    }

    connection.disconnect();
    drop(connection);

    // With every sink clone gone the writer drains and exits
    let _ = writer.await;
}

struct Connection<Db> {
    context: ServerContext<Db>,
    sink: MessageSink,
    session: Option<SessionHandle>,
}

impl<Db> Connection<Db>
where
    Db: Database,
{
    fn send(&self, message: ServerMessage) {
        let _ = self.sink.send(message);
    }

    async fn handle_frame(&mut self, frame: &str) {
        let message: ClientMessage = match serde_json::from_str(frame) {
            Ok(message) => message,
            Err(e) => {
                debug!("Dropping malformed frame: {e}");
                self.send(ServerMessage::Error {
                    message: "Invalid message".to_string(),
                });
                return;
            }
        };

        if let Err(e) = self.handle_message(message).await {
            self.send(ServerMessage::Error {
                message: e.to_string(),
            });
        }
    }

    async fn handle_message(&mut self, message: ClientMessage) -> Result<(), RoomError> {
        match message {
            ClientMessage::Ping => {
                self.send(ServerMessage::Pong);
                Ok(())
            }
            ClientMessage::Join {
                room_id,
                user_id,
                role,
            } => self.join(room_id, user_id, role).await,
            other => self.mutate(other).await,
        }
    }

    async fn join(
        &mut self,
        room_id: String,
        user_id: String,
        role: lounge_protocol::Role,
    ) -> Result<(), RoomError> {
        let handle = self
            .context
            .coordinator
            .rooms
            .attach(&room_id, user_id, self.sink.clone())
            .await?;

        info!("{} joined room {} as {:?}", handle.user_id, room_id, role);

        // A repeated JOIN on the same channel replaces the previous session.
        // A failed one leaves it untouched.
        if let Some(previous) = self.session.replace(handle) {
            self.context.coordinator.rooms.detach(&previous);
        }

        Ok(())
    }

    async fn mutate(&mut self, message: ClientMessage) -> Result<(), RoomError> {
        let Some(session) = self.session.clone() else {
            self.send(ServerMessage::Error {
                message: "Not joined".to_string(),
            });
            return Ok(());
        };

        // Mutations address the room named in the message, which is the
        // room code. Identity is implicit in the channel.
        let Some(code) = message.room_id().map(str::to_string) else {
            return Ok(());
        };

        let room = self.context.coordinator.rooms.room(&code).await?;

        match message {
            ClientMessage::AddVideo { video, user_id, .. } => {
                room.add_video(video, user_id).await
            }
            ClientMessage::AddVideos {
                videos, user_id, ..
            } => room.add_videos(videos, user_id).await,
            ClientMessage::Play { .. } => room.set_playing(true).await,
            ClientMessage::Pause { .. } => room.set_playing(false).await,
            ClientMessage::SyncTime {
                current_time,
                is_playing,
                ..
            } => {
                room.report_position(current_time, is_playing, session.session_id)
                    .await;
                Ok(())
            }
            ClientMessage::NextVideo { .. } => room.next_video().await,
            ClientMessage::RemoveVideo { video_id, .. } => room.remove_video(video_id).await,
            ClientMessage::SelectVideo { external_id, .. } => {
                room.select_video(external_id).await
            }
            // Handled before routing
            ClientMessage::Join { .. } | ClientMessage::Ping => Ok(()),
        }
    }

    fn disconnect(&mut self) {
        if let Some(handle) = self.session.take() {
            self.context.coordinator.rooms.detach(&handle);
            info!("{} left room {}", handle.user_id, handle.room_code);
        }
    }
}
