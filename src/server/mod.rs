//! Relay server implementation
//!
//! One TCP port serves the viewer page, `/health`, `/stats`, and the two
//! WebSocket channels. Each connection runs on its own task.

pub mod config;
pub(crate) mod connection;
pub mod handler;
pub mod listener;
mod producer;
mod viewer;

pub use config::ServerConfig;
pub use handler::{NoopHandler, RelayHandler};
pub use listener::RelayServer;

/// Close code sent to a producer that connects while the slot is held
pub const SLOT_OCCUPIED_CLOSE_CODE: u16 = 4000;
