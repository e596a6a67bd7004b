//! Producer-side client
//!
//! Streams already-encoded frames to a relay's producer channel and keeps
//! reconnecting with capped exponential backoff. A close with
//! [`SLOT_OCCUPIED_CLOSE_CODE`](crate::server::SLOT_OCCUPIED_CLOSE_CODE) means
//! another producer is live and is retried like any other disconnect.

pub mod config;
pub mod publisher;

pub use config::ClientConfig;
pub use publisher::{FramePublisher, PublishEvent, SessionEnd};
