//! Registry error types

use thiserror::Error;

use super::frame::ConnectionId;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Another producer already holds the slot
    #[error("producer slot occupied by {holder}")]
    SlotOccupied { holder: ConnectionId },
}
