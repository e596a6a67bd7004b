//! Relay registry implementation
//!
//! The single server-context object holding the producer slot and the viewer
//! set. All mutation happens under one mutex whose critical sections only touch
//! memory: queue dispatch is non-blocking, network writes happen later in each
//! viewer's own task.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::config::RegistryConfig;
use super::entry::{Delivery, ViewerEntry};
use super::error::RegistryError;
use super::frame::{ConnectionId, ControlMessage, Frame};
use super::lease::{ProducerLease, ViewerLease};
use crate::stats::{HealthStatus, RelayStats};

/// Summary of one frame fan-out
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastOutcome {
    /// Viewers the frame was queued for
    pub queued: usize,
    /// Viewers whose queue was full
    pub dropped: usize,
    /// Viewers found dead and removed during this fan-out
    pub evicted: usize,
}

#[derive(Default)]
struct RegistryState {
    producer: Option<ConnectionId>,
    viewers: HashMap<ConnectionId, ViewerEntry>,
}

impl RegistryState {
    /// Queue `message` for every viewer, removing the ones that are gone.
    fn notify_viewers(&mut self, message: ControlMessage) -> usize {
        let before = self.viewers.len();
        self.viewers.retain(|_, viewer| viewer.push_control(message));
        before - self.viewers.len()
    }
}

/// Producer slot and viewer set shared by every connection task
pub struct RelayRegistry {
    state: Mutex<RegistryState>,
    config: RegistryConfig,
    stats: RelayStats,
    next_id: AtomicU64,
}

impl RelayRegistry {
    /// Create a new registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            config,
            stats: RelayStats::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Relay-wide counters
    pub fn stats(&self) -> &RelayStats {
        &self.stats
    }

    fn next_connection_id(&self) -> ConnectionId {
        ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Try to claim the producer slot
    ///
    /// Check and claim happen under one lock, so concurrent attempts can never
    /// both succeed. On success `producer:connected` is queued for every viewer
    /// before the lease is returned, which puts it ahead of any frame the new
    /// producer forwards. A rejected attempt leaves the slot and viewer set
    /// untouched.
    pub fn admit_producer(self: &Arc<Self>) -> Result<ProducerLease, RegistryError> {
        let id = self.next_connection_id();
        let (viewers, evicted) = {
            let mut state = self.state.lock();

            if let Some(holder) = state.producer {
                drop(state);
                self.stats.producer_rejected();
                tracing::warn!(
                    connection = %id,
                    holder = %holder,
                    "Producer rejected: slot occupied"
                );
                return Err(RegistryError::SlotOccupied { holder });
            }

            state.producer = Some(id);
            let evicted = state.notify_viewers(ControlMessage::ProducerConnected);
            (state.viewers.len(), evicted)
        };

        self.stats.producer_accepted();
        self.stats.viewers_evicted(evicted);
        tracing::info!(connection = %id, viewers = viewers, "Producer slot claimed");

        Ok(ProducerLease::new(Arc::clone(self), id))
    }

    /// Add a viewer
    ///
    /// Always succeeds. The current presence message is the first item in the
    /// new viewer's queue; it is queued under the same lock that inserts the
    /// viewer, so no slot transition can slip in between.
    pub fn admit_viewer(self: &Arc<Self>) -> ViewerLease {
        let id = self.next_connection_id();
        let (entry, mailbox) = ViewerEntry::new(self.config.viewer_queue_frames);

        let (producer_connected, viewers) = {
            let mut state = self.state.lock();
            let producer_connected = state.producer.is_some();
            entry.push_control(ControlMessage::presence(producer_connected));
            state.viewers.insert(id, entry);
            (producer_connected, state.viewers.len())
        };

        self.stats.viewer_joined();
        tracing::info!(
            connection = %id,
            producer_connected = producer_connected,
            viewers = viewers,
            "Viewer joined"
        );

        ViewerLease::new(Arc::clone(self), id, mailbox)
    }

    /// Fan a frame out to every viewer
    ///
    /// Zero-length frames and frames arriving with no viewers are dropped. A
    /// viewer with a full queue misses this frame; a viewer whose task is gone
    /// is removed. Neither affects the other viewers or the caller.
    pub(crate) fn forward_frame(&self, producer: ConnectionId, frame: Frame) -> BroadcastOutcome {
        if frame.is_empty() {
            self.stats.empty_frame();
            tracing::trace!(connection = %producer, "Discarding empty frame");
            return BroadcastOutcome::default();
        }

        let size = frame.len();
        let mut outcome = BroadcastOutcome::default();
        {
            let mut state = self.state.lock();
            debug_assert_eq!(state.producer, Some(producer));

            state.viewers.retain(|_, viewer| match viewer.offer_frame(frame.clone()) {
                Delivery::Queued => {
                    outcome.queued += 1;
                    true
                }
                Delivery::Dropped => {
                    outcome.dropped += 1;
                    true
                }
                Delivery::Closed => {
                    outcome.evicted += 1;
                    false
                }
            });

            // Counted before any viewer task can observe the frame.
            self.stats.frame_received(size, outcome.queued, outcome.dropped);
        }

        if outcome.evicted > 0 {
            self.stats.viewers_evicted(outcome.evicted);
            tracing::debug!(
                connection = %producer,
                evicted = outcome.evicted,
                "Removed dead viewers during broadcast"
            );
        }
        tracing::trace!(
            connection = %producer,
            size = size,
            queued = outcome.queued,
            dropped = outcome.dropped,
            "Frame forwarded"
        );

        outcome
    }

    /// Clear the slot if `producer` holds it and tell every viewer
    pub(crate) fn release_producer(&self, producer: ConnectionId) {
        let (viewers, evicted) = {
            let mut state = self.state.lock();

            if state.producer != Some(producer) {
                tracing::warn!(
                    connection = %producer,
                    holder = ?state.producer,
                    "Producer release mismatch"
                );
                return;
            }

            state.producer = None;
            let evicted = state.notify_viewers(ControlMessage::ProducerDisconnected);
            (state.viewers.len(), evicted)
        };

        self.stats.viewers_evicted(evicted);
        tracing::info!(connection = %producer, viewers = viewers, "Producer slot released");
    }

    /// Remove a viewer. Returns `false` if it was already gone.
    pub(crate) fn remove_viewer(&self, viewer: ConnectionId) -> bool {
        let (entry, remaining) = {
            let mut state = self.state.lock();
            let entry = state.viewers.remove(&viewer);
            (entry, state.viewers.len())
        };

        match entry {
            Some(entry) => {
                tracing::info!(
                    connection = %viewer,
                    watched_secs = entry.joined_at.elapsed().as_secs(),
                    remaining = remaining,
                    "Viewer removed"
                );
                true
            }
            None => false,
        }
    }

    /// Whether a producer currently holds the slot
    pub fn has_producer(&self) -> bool {
        self.state.lock().producer.is_some()
    }

    /// Number of registered viewers
    pub fn viewer_count(&self) -> usize {
        self.state.lock().viewers.len()
    }

    /// Status record for the health endpoint
    pub fn health(&self) -> HealthStatus {
        let state = self.state.lock();
        HealthStatus::ok(state.producer.is_some(), state.viewers.len())
    }
}

impl Default for RelayRegistry {
    fn default() -> Self {
        Self::new()
    }
}
