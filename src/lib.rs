//! screen-relay: single-producer, many-viewer WebSocket relay
//!
//! One producer pushes opaque binary frames (typically JPEG screenshots) over
//! a WebSocket; the relay fans each frame out to every connected viewer and
//! tells viewers when the producer comes and goes. Frames are never decoded,
//! stored, or replayed.
//!
//! # Example
//!
//! ```no_run
//! use screen_relay::{NoopHandler, RelayServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> screen_relay::Result<()> {
//!     let config = ServerConfig::with_addr("127.0.0.1:8000".parse().unwrap());
//!     let server = RelayServer::new(config, NoopHandler);
//!     server.run().await
//! }
//! ```
//!
//! # Channels
//!
//! - `/ws/producer`: at most one at a time; a second producer is closed with
//!   code [`server::SLOT_OCCUPIED_CLOSE_CODE`]
//! - `/ws/viewer`: any number; receives `producer:connected` or
//!   `producer:disconnected` on join, then frames as binary messages

pub mod client;
pub mod error;
pub mod http;
pub mod registry;
pub mod server;
pub mod session;
pub mod stats;

pub use error::{Error, Result};
pub use registry::{RegistryConfig, RelayRegistry};
pub use server::{NoopHandler, RelayHandler, RelayServer, ServerConfig};
