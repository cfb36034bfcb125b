use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

use lounge_protocol::ServerMessage;

static SESSION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identifies a session for the lifetime of its channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    fn next() -> Self {
        Self(SESSION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// The sending half of a client's channel. Sends are queued and never block,
/// so a slow client cannot hold up delivery to its siblings.
pub type MessageSink = mpsc::UnboundedSender<ServerMessage>;

/// Represents a client's presence in a room.
///
/// At most one session exists per `(room, user_id)` pair. A newly attached
/// session with the same user id evicts the previous one.
pub struct RoomSession {
    pub id: SessionId,
    pub user_id: String,
    pub(super) sink: MessageSink,
}

/// A handle to an attached session, used by the gateway to address and
/// detach it later.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub room_code: String,
    pub session_id: SessionId,
    pub user_id: String,
}

impl RoomSession {
    pub fn new(user_id: String, sink: MessageSink) -> Self {
        Self {
            id: SessionId::next(),
            user_id,
            sink,
        }
    }

    pub fn send(&self, message: ServerMessage) {
        // Fan-out is best-effort. A failed send means the client's writer is
        // gone, and the disconnect path will clean the session up.
        let _ = self.sink.send(message);
    }
}
