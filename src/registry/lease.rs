//! Scoped registry membership
//!
//! A lease is the only way to hold the producer slot or a place in the viewer
//! set. Dropping it, on any exit path including unwinding, undoes the
//! registration exactly once.

use std::sync::Arc;

use bytes::Bytes;

use super::entry::ViewerMailbox;
use super::frame::{ConnectionId, Frame, Outbound};
use super::store::{BroadcastOutcome, RelayRegistry};

/// Proof of producer-slot ownership
///
/// Dropping the lease clears the slot and queues `producer:disconnected` for
/// every viewer.
pub struct ProducerLease {
    registry: Arc<RelayRegistry>,
    id: ConnectionId,
}

impl ProducerLease {
    pub(super) fn new(registry: Arc<RelayRegistry>, id: ConnectionId) -> Self {
        Self { registry, id }
    }

    /// Connection id holding the slot
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Forward one payload to every viewer
    pub fn forward(&self, payload: impl Into<Bytes>) -> BroadcastOutcome {
        self.registry.forward_frame(self.id, Frame::new(payload))
    }
}

impl Drop for ProducerLease {
    fn drop(&mut self) {
        self.registry.release_producer(self.id);
    }
}

impl std::fmt::Debug for ProducerLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProducerLease").field("id", &self.id).finish()
    }
}

/// Membership in the viewer set plus the queue feeding this viewer
///
/// Dropping the lease removes the viewer from the set.
pub struct ViewerLease {
    registry: Arc<RelayRegistry>,
    id: ConnectionId,
    mailbox: ViewerMailbox,
}

impl ViewerLease {
    pub(super) fn new(registry: Arc<RelayRegistry>, id: ConnectionId, mailbox: ViewerMailbox) -> Self {
        Self {
            registry,
            id,
            mailbox,
        }
    }

    /// Connection id of this viewer
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Wait for the next control message or frame
    ///
    /// Returns `None` if the registry evicted this viewer.
    pub async fn recv(&mut self) -> Option<Outbound> {
        self.mailbox.recv().await
    }

    /// Take the next queued item without waiting
    pub fn try_recv(&mut self) -> Option<Outbound> {
        self.mailbox.try_recv()
    }
}

impl Drop for ViewerLease {
    fn drop(&mut self) {
        self.registry.remove_viewer(self.id);
    }
}

impl std::fmt::Debug for ViewerLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewerLease")
            .field("id", &self.id)
            .field("pending_frames", &self.mailbox.pending_frames())
            .finish()
    }
}
