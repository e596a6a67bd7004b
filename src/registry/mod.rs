//! Connection registry for the single-producer relay
//!
//! The registry owns the producer slot and the viewer set, and routes frames
//! from the producer to every viewer.
//!
//! # Architecture
//!
//! ```text
//!                        Arc<RelayRegistry>
//!                  ┌──────────────────────────────┐
//!                  │ Mutex<RegistryState> {       │
//!                  │   producer: Option<Id>,      │
//!                  │   viewers: HashMap<Id,       │
//!                  │     ViewerEntry { tx } >     │
//!                  │ }                            │
//!                  └──────────────┬───────────────┘
//!                                 │
//!         ┌───────────────────────┼───────────────────────┐
//!         │                       │                       │
//!         ▼                       ▼                       ▼
//!   [ProducerLease]          [ViewerLease]           [ViewerLease]
//!   forward(payload)         recv().await            recv().await
//!         │                       │                       │
//!         └──► offer_frame() ──► queue ──► viewer task ──► WebSocket
//! ```
//!
//! # Zero-Copy Design
//!
//! Frames wrap `bytes::Bytes`, so every viewer queue holds a reference-counted
//! handle to the same allocation.

pub mod config;
pub mod entry;
pub mod error;
pub mod frame;
pub mod lease;
pub mod store;

pub use config::RegistryConfig;
pub use entry::{Delivery, ViewerMailbox};
pub use error::RegistryError;
pub use frame::{ConnectionId, ControlMessage, Frame, Outbound, UnknownControlMessage};
pub use lease::{ProducerLease, ViewerLease};
pub use store::{BroadcastOutcome, RelayRegistry};
