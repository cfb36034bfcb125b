//! The client half of the lounge protocol.
//!
//! Gives the rest of a client application the illusion of a single
//! long-lived channel with monotonic server state: the connection survives
//! physical drops through backoff and heartbeat, identity is replayed on
//! every (re)connect, and guest mutations apply optimistically until the
//! next authoritative snapshot reconciles them.

mod connection;
mod host;
mod reconciler;
mod state;

pub use connection::*;
pub use host::*;
pub use reconciler::*;
pub use state::*;
