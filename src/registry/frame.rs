//! Payload and control-message types routed through the registry
//!
//! Frames are opaque to the relay. Control messages announce producer presence
//! and travel on the same per-viewer queue, so a viewer observes them in the
//! exact order they were dispatched relative to frames.

use bytes::Bytes;

/// Identity of an admitted connection (producer or viewer)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An opaque binary payload from the producer
///
/// Cheap to clone: every viewer shares the same reference-counted allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    data: Bytes,
}

impl Frame {
    /// Wrap a payload
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// Payload size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Zero-length frames are never forwarded
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow the payload
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Take the payload
    pub fn into_bytes(self) -> Bytes {
        self.data
    }
}

/// Producer presence notification sent to viewers as a text message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// A producer holds the slot
    ProducerConnected,
    /// The slot is empty
    ProducerDisconnected,
}

impl ControlMessage {
    /// Presence message matching slot occupancy
    pub fn presence(producer_connected: bool) -> Self {
        if producer_connected {
            ControlMessage::ProducerConnected
        } else {
            ControlMessage::ProducerDisconnected
        }
    }

    /// Wire text
    pub fn as_str(self) -> &'static str {
        match self {
            ControlMessage::ProducerConnected => "producer:connected",
            ControlMessage::ProducerDisconnected => "producer:disconnected",
        }
    }
}

impl std::fmt::Display for ControlMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ControlMessage {
    type Err = UnknownControlMessage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "producer:connected" => Ok(ControlMessage::ProducerConnected),
            "producer:disconnected" => Ok(ControlMessage::ProducerDisconnected),
            other => Err(UnknownControlMessage(other.to_owned())),
        }
    }
}

/// Text that is not one of the known control messages
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown control message: {0:?}")]
pub struct UnknownControlMessage(pub String);

/// An item queued for delivery to one viewer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Control(ControlMessage),
    Frame(Frame),
}
