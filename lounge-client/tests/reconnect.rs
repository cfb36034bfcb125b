//! Tests of the reconciler against an in-process gateway: join/snapshot,
//! optimistic reconciliation across a dropped channel, and heartbeat
//! recovery of a zombie connection.

use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::mpsc::UnboundedReceiver,
    time::{sleep, timeout},
};
use tokio_tungstenite::{accept_async, tungstenite::Message, WebSocketStream};

use lounge_client::{
    Connection, ConnectionEvent, ConnectionOptions, RoomClient, RoomOptions,
};
use lounge_protocol::{ClientMessage, Role, ServerMessage, VideoSubmission, WireVideo};

#[derive(Default)]
struct GatewayStats {
    connections: AtomicU32,
    joins: AtomicU32,
}

fn wire_video(id: i64, external_id: &str, order: i32) -> WireVideo {
    WireVideo {
        id,
        external_id: external_id.to_string(),
        title: format!("Title of {external_id}"),
        thumbnail: format!("https://thumbs.example/{external_id}.jpg"),
        added_by: "u1".to_string(),
        is_played: false,
        order,
    }
}

fn snapshot() -> ServerMessage {
    ServerMessage::SyncState {
        current_video_id: Some("v1".to_string()),
        is_playing: true,
        current_time: 5.0,
        playlist: vec![wire_video(1, "v1", 0)],
    }
}

async fn reply(socket: &mut WebSocketStream<TcpStream>, message: &ServerMessage) {
    let frame = serde_json::to_string(message).unwrap();
    socket.send(Message::Text(frame)).await.unwrap();
}

/// A gateway that answers joins with a fixed snapshot. When
/// `drop_first_add` is set, the first connection is closed as soon as an
/// `ADD_VIDEO` arrives, before the add is processed.
async fn spawn_gateway(drop_first_add: bool) -> (String, Arc<GatewayStats>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let stats = Arc::new(GatewayStats::default());

    let shared = stats.clone();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };

            let connection_index = shared.connections.fetch_add(1, Ordering::SeqCst);
            let stats = shared.clone();

            tokio::spawn(async move {
                let Ok(mut socket) = accept_async(stream).await else {
                    return;
                };

                while let Some(Ok(frame)) = socket.next().await {
                    let Message::Text(text) = frame else {
                        continue;
                    };

                    let Ok(message) = serde_json::from_str::<ClientMessage>(&text) else {
                        continue;
                    };

                    match message {
                        ClientMessage::Join { .. } => {
                            stats.joins.fetch_add(1, Ordering::SeqCst);
                            reply(&mut socket, &snapshot()).await;
                        }
                        ClientMessage::Ping => {
                            reply(&mut socket, &ServerMessage::Pong).await;
                        }
                        ClientMessage::AddVideo { video, .. } => {
                            if drop_first_add && connection_index == 0 {
                                // Simulate the channel dying before the add
                                // was received
                                break;
                            }

                            reply(
                                &mut socket,
                                &ServerMessage::PlaylistUpdate {
                                    playlist: vec![
                                        wire_video(1, "v1", 0),
                                        wire_video(2, &video.external_id, 1),
                                    ],
                                },
                            )
                            .await;
                        }
                        _ => {}
                    }
                }
            });
        }
    });

    (format!("ws://{addr}"), stats)
}

/// A gateway that completes the handshake and then never writes anything.
async fn spawn_silent_gateway() -> (String, Arc<GatewayStats>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let stats = Arc::new(GatewayStats::default());

    let shared = stats.clone();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };

            shared.connections.fetch_add(1, Ordering::SeqCst);

            tokio::spawn(async move {
                let Ok(mut socket) = accept_async(stream).await else {
                    return;
                };

                while let Some(Ok(_)) = socket.next().await {}
            });
        }
    });

    (format!("ws://{addr}"), stats)
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    timeout(Duration::from_secs(5), async {
        while !condition() {
            sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("condition holds in time");
}

async fn expect_event(
    events: &mut UnboundedReceiver<ConnectionEvent>,
    expected: ConnectionEvent,
) {
    timeout(Duration::from_secs(5), async {
        loop {
            let event = events.recv().await.expect("event stream is open");

            if event == expected {
                return;
            }
        }
    })
    .await
    .expect("event arrives in time");
}

fn options(url: String) -> RoomOptions {
    RoomOptions {
        url,
        room_id: "ABCDEF".to_string(),
        user_id: "u1".to_string(),
        role: Role::Guest,
    }
}

#[tokio::test]
async fn joining_applies_the_snapshot() {
    let (url, stats) = spawn_gateway(false).await;
    let client = RoomClient::connect(options(url), None);

    wait_until(|| client.state().current_video_id.as_deref() == Some("v1")).await;

    let state = client.state();
    assert!(state.is_playing);
    assert_eq!(state.current_time, 5.0);
    assert_eq!(state.playlist.len(), 1);
    assert_eq!(stats.joins.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn confirmed_adds_replace_the_optimistic_entry() {
    let (url, _stats) = spawn_gateway(false).await;
    let client = RoomClient::connect(options(url), None);

    wait_until(|| client.state().current_video_id.is_some()).await;

    client.add_video(VideoSubmission {
        external_id: "v2".to_string(),
        title: "Title of v2".to_string(),
        thumbnail: "https://thumbs.example/v2.jpg".to_string(),
    });

    wait_until(|| {
        let state = client.state();
        state.playlist.len() == 2 && state.playlist[1].id == "2" && state.pending.is_empty()
    })
    .await;
}

#[tokio::test]
async fn reconnecting_rejoins_and_reconciles_a_lost_add() {
    let (url, stats) = spawn_gateway(true).await;
    let client = RoomClient::connect(options(url), None);

    wait_until(|| client.state().current_video_id.is_some()).await;

    // This add kills the first channel before the server processes it,
    // leaving an optimistic entry behind
    client.add_video(VideoSubmission {
        external_id: "v3".to_string(),
        title: "Title of v3".to_string(),
        thumbnail: "https://thumbs.example/v3.jpg".to_string(),
    });

    // The reconciler reconnects and replays the join
    wait_until(|| stats.joins.load(Ordering::SeqCst) >= 2).await;
    wait_until(|| client.state().pending.is_empty()).await;

    let state = client.state();
    let ids: Vec<_> = state
        .playlist
        .iter()
        .map(|entry| entry.external_id.as_str())
        .collect();

    // The lost add is gone after the fresh snapshot
    assert_eq!(ids, vec!["v1"]);
    assert!(client.reconnect_count() >= 1);
}

#[tokio::test]
async fn an_unanswered_heartbeat_forces_a_reconnect() {
    let (url, stats) = spawn_silent_gateway().await;

    let connection_options = ConnectionOptions {
        heartbeat_interval: Duration::from_millis(100),
        heartbeat_timeout: Duration::from_millis(200),
        ..ConnectionOptions::new(url)
    };

    let (connection, mut events) = Connection::connect(connection_options);

    expect_event(&mut events, ConnectionEvent::Connected).await;

    // No PONG ever arrives, so the watchdog closes the channel
    expect_event(&mut events, ConnectionEvent::Disconnected).await;

    // The zombie is recovered by a fresh connection after the backoff
    expect_event(&mut events, ConnectionEvent::Connected).await;

    assert!(stats.connections.load(Ordering::SeqCst) >= 2);
    assert!(connection.reconnect_count() >= 1);

    connection.close();
}
