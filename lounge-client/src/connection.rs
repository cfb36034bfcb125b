use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use log::{debug, warn};
use parking_lot::Mutex;
use tokio::{
    net::TcpStream,
    sync::{mpsc, watch},
    time::{interval_at, sleep, sleep_until, Instant},
};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use lounge_protocol::{ClientMessage, ServerMessage};

/// How often a PING is sent while connected.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// How long a PING may go unanswered before the channel is considered dead.
///
/// This is what detects zombie connections that stay open in kernel space
/// but no longer deliver data.
pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(5);

const BACKOFF_BASE_MS: u64 = 1000;
const BACKOFF_CAP_MS: u64 = 30_000;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    pub url: String,
    pub heartbeat_interval: Duration,
    pub heartbeat_timeout: Duration,
}

impl ConnectionOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            heartbeat_interval: HEARTBEAT_INTERVAL,
            heartbeat_timeout: HEARTBEAT_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

/// What the connection reports back to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// The channel opened. The owner is expected to replay its identity.
    Connected,
    /// The channel dropped. A reconnect is already scheduled unless the
    /// connection was closed deliberately.
    Disconnected,
    /// A message arrived. `PONG` frames are consumed by the heartbeat and
    /// never surface here.
    Message(ServerMessage),
}

/// A single logical channel across any number of physical ones.
///
/// Reconnects with exponential backoff, replays nothing by itself (the
/// owner re-sends `JOIN` on [ConnectionEvent::Connected]), and force-closes
/// the socket when a heartbeat goes unanswered.
pub struct Connection {
    sender: ConnectionSender,
    shutdown: watch::Sender<bool>,
}

/// A cheap handle for sending messages through a [Connection].
#[derive(Clone)]
pub struct ConnectionSender {
    outgoing: mpsc::UnboundedSender<ClientMessage>,
    shared: Arc<Shared>,
}

#[derive(Default)]
struct Shared {
    status: Mutex<ConnectionStatus>,
    reconnect_count: AtomicU32,
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self::Disconnected
    }
}

impl Connection {
    /// Opens the connection and returns it along with the event stream.
    /// The first [ConnectionEvent::Connected] arrives once the channel is up.
    pub fn connect(options: ConnectionOptions) -> (Self, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let shared = Arc::new(Shared::default());

        tokio::spawn(run_driver(
            options,
            shared.clone(),
            outgoing_rx,
            event_tx,
            shutdown_rx,
        ));

        let connection = Self {
            sender: ConnectionSender {
                outgoing: outgoing_tx,
                shared,
            },
            shutdown: shutdown_tx,
        };

        (connection, event_rx)
    }

    pub fn sender(&self) -> ConnectionSender {
        self.sender.clone()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.sender.status()
    }

    /// How many reconnection attempts were made, for display purposes.
    pub fn reconnect_count(&self) -> u32 {
        self.sender.shared.reconnect_count.load(Ordering::Relaxed)
    }

    /// Tears the connection down for good: no further reconnects are
    /// scheduled and the socket is closed.
    pub fn close(&self) {
        let _ = self.shutdown.send(true);
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

impl ConnectionSender {
    /// Queues a message on the open channel. Sending on a channel that is
    /// not open is a no-op with a warning.
    pub fn send(&self, message: ClientMessage) {
        if self.status() != ConnectionStatus::Connected {
            warn!("Dropping send on a channel that is not open");
            return;
        }

        let _ = self.outgoing.send(message);
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.shared.status.lock()
    }
}

impl Shared {
    fn set_status(&self, status: ConnectionStatus) {
        *self.status.lock() = status;
    }
}

/// The delay before the next reconnection attempt, given how many attempts
/// failed since the last successful connect.
pub fn backoff_delay(failed_attempts: u32) -> Duration {
    let exponent = failed_attempts.min(5);
    Duration::from_millis((BACKOFF_BASE_MS << exponent).min(BACKOFF_CAP_MS))
}

async fn run_driver(
    options: ConnectionOptions,
    shared: Arc<Shared>,
    mut outgoing: mpsc::UnboundedReceiver<ClientMessage>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut failed_attempts: u32 = 0;

    loop {
        if *shutdown.borrow() {
            break;
        }

        shared.set_status(ConnectionStatus::Connecting);

        let attempt_failed = match connect_async(&options.url).await {
            Ok((socket, _)) => {
                failed_attempts = 0;
                shared.set_status(ConnectionStatus::Connected);

                if events.send(ConnectionEvent::Connected).is_err() {
                    break;
                }

                run_session(socket, &options, &mut outgoing, &events, &mut shutdown).await;

                shared.set_status(ConnectionStatus::Disconnected);

                if events.send(ConnectionEvent::Disconnected).is_err() {
                    break;
                }

                false
            }
            Err(e) => {
                debug!("Connection attempt failed: {e}");
                shared.set_status(ConnectionStatus::Disconnected);
                true
            }
        };

        if *shutdown.borrow() {
            break;
        }

        let delay = backoff_delay(failed_attempts);

        // Only failed opens bump the backoff; a session that connected and
        // later dropped starts over from the shortest delay.
        if attempt_failed {
            failed_attempts = failed_attempts.saturating_add(1);
        }

        shared.reconnect_count.fetch_add(1, Ordering::Relaxed);
        debug!("Reconnecting in {delay:?}");

        tokio::select! {
            _ = sleep(delay) => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    shared.set_status(ConnectionStatus::Disconnected);
}

/// Runs a single physical session until the socket drops, the heartbeat
/// times out, or the connection is closed.
async fn run_session(
    socket: Socket,
    options: &ConnectionOptions,
    outgoing: &mut mpsc::UnboundedReceiver<ClientMessage>,
    events: &mpsc::UnboundedSender<ConnectionEvent>,
    shutdown: &mut watch::Receiver<bool>,
) {
    let (mut sink, mut source) = socket.split();

    // The first heartbeat fires a full interval after connecting
    let start = Instant::now() + options.heartbeat_interval;
    let mut heartbeat = interval_at(start, options.heartbeat_interval);

    let watchdog = sleep_until(Instant::now() + options.heartbeat_timeout);
    tokio::pin!(watchdog);
    let mut watchdog_armed = false;

    loop {
        tokio::select! {
            message = outgoing.recv() => match message {
                Some(message) => {
                    let frame = serde_json::to_string(&message).expect("message serializes");

                    if sink.send(Message::Text(frame)).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            frame = source.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ServerMessage>(&text) {
                        // Any PONG disarms the pending watchdog
                        Ok(ServerMessage::Pong) => watchdog_armed = false,
                        Ok(message) => {
                            if events.send(ConnectionEvent::Message(message)).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("Dropping malformed frame: {e}"),
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            _ = heartbeat.tick() => {
                let frame = serde_json::to_string(&ClientMessage::Ping)
                    .expect("message serializes");

                if sink.send(Message::Text(frame)).await.is_err() {
                    break;
                }

                if !watchdog_armed {
                    watchdog.as_mut().reset(Instant::now() + options.heartbeat_timeout);
                    watchdog_armed = true;
                }
            },
            _ = &mut watchdog, if watchdog_armed => {
                warn!("Heartbeat timed out, closing channel");
                break;
            },
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    let _ = sink.close().await;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn backoff_doubles_from_one_second() {
        assert_eq!(backoff_delay(0), Duration::from_millis(1000));
        assert_eq!(backoff_delay(1), Duration::from_millis(2000));
        assert_eq!(backoff_delay(2), Duration::from_millis(4000));
        assert_eq!(backoff_delay(3), Duration::from_millis(8000));
        assert_eq!(backoff_delay(4), Duration::from_millis(16000));
    }

    #[test]
    fn backoff_is_capped_at_thirty_seconds() {
        assert_eq!(backoff_delay(5), Duration::from_millis(30_000));
        assert_eq!(backoff_delay(6), Duration::from_millis(30_000));
        assert_eq!(backoff_delay(u32::MAX), Duration::from_millis(30_000));
    }

    #[test]
    fn backoff_stays_within_the_contract_bounds() {
        for attempt in 0..64 {
            let delay = backoff_delay(attempt);

            assert!(delay >= Duration::from_millis(1000));
            assert!(delay <= Duration::from_millis(30_000));
        }
    }
}
