//! Handler context
//!
//! Context passed to handler callbacks describing the connection.

use std::net::SocketAddr;
use std::time::Instant;

/// Which relay channel a connection upgraded on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Supplies frames, holds the slot while connected
    Producer,
    /// Receives control messages and frames
    Viewer,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Producer => f.write_str("producer"),
            Role::Viewer => f.write_str("viewer"),
        }
    }
}

/// Context passed to RelayHandler callbacks
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Unique session ID (one per TCP connection)
    pub session_id: u64,

    /// Remote peer address
    pub peer_addr: SocketAddr,

    /// Channel the connection upgraded on
    pub role: Role,

    /// When the WebSocket handshake completed
    pub connected_at: Instant,
}

impl SessionContext {
    /// Create a new context
    pub fn new(session_id: u64, peer_addr: SocketAddr, role: Role) -> Self {
        Self {
            session_id,
            peer_addr,
            role,
            connected_at: Instant::now(),
        }
    }

    /// Time since the handshake completed
    pub fn elapsed(&self) -> std::time::Duration {
        self.connected_at.elapsed()
    }
}
