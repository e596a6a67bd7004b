//! Per-viewer queue types
//!
//! Each viewer owns an unbounded queue whose frame population is capped by a
//! shared counter. Control messages bypass the cap, so presence changes always
//! reach a live viewer, while a slow viewer sheds new frames instead of
//! accumulating latency.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;

use super::frame::{ControlMessage, Frame, Outbound};

/// Result of offering a frame to one viewer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Queued behind earlier items
    Queued,
    /// Viewer queue full, frame skipped for this viewer only
    Dropped,
    /// Viewer task is gone; the entry must be removed
    Closed,
}

/// Registry-side handle to one viewer
pub(crate) struct ViewerEntry {
    tx: mpsc::UnboundedSender<Outbound>,
    pending_frames: Arc<AtomicUsize>,
    max_pending_frames: usize,
    pub(crate) joined_at: Instant,
}

impl ViewerEntry {
    /// Create an entry and the mailbox its connection task drains
    ///
    /// A depth of zero is treated as one.
    pub(crate) fn new(max_pending_frames: usize) -> (Self, ViewerMailbox) {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending_frames = Arc::new(AtomicUsize::new(0));

        let entry = Self {
            tx,
            pending_frames: Arc::clone(&pending_frames),
            max_pending_frames: max_pending_frames.max(1),
            joined_at: Instant::now(),
        };
        let mailbox = ViewerMailbox { rx, pending_frames };

        (entry, mailbox)
    }

    /// Queue a control message. Returns `false` if the viewer is gone.
    pub(crate) fn push_control(&self, message: ControlMessage) -> bool {
        self.tx.send(Outbound::Control(message)).is_ok()
    }

    /// Offer a frame without blocking
    pub(crate) fn offer_frame(&self, frame: Frame) -> Delivery {
        if self.tx.is_closed() {
            return Delivery::Closed;
        }

        let pending = self.pending_frames.fetch_add(1, Ordering::AcqRel);
        if pending >= self.max_pending_frames {
            self.pending_frames.fetch_sub(1, Ordering::AcqRel);
            return Delivery::Dropped;
        }

        match self.tx.send(Outbound::Frame(frame)) {
            Ok(()) => Delivery::Queued,
            Err(_) => {
                self.pending_frames.fetch_sub(1, Ordering::AcqRel);
                Delivery::Closed
            }
        }
    }
}

/// Receiving end of a viewer's queue, owned by the viewer's connection task
pub struct ViewerMailbox {
    rx: mpsc::UnboundedReceiver<Outbound>,
    pending_frames: Arc<AtomicUsize>,
}

impl ViewerMailbox {
    /// Wait for the next item. `None` once the registry dropped the entry.
    pub async fn recv(&mut self) -> Option<Outbound> {
        let item = self.rx.recv().await;
        self.account(&item);
        item
    }

    /// Take the next item if one is ready
    pub fn try_recv(&mut self) -> Option<Outbound> {
        let item = self.rx.try_recv().ok();
        self.account(&item);
        item
    }

    /// Frames currently waiting
    pub fn pending_frames(&self) -> usize {
        self.pending_frames.load(Ordering::Acquire)
    }

    fn account(&self, item: &Option<Outbound>) {
        if let Some(Outbound::Frame(_)) = item {
            self.pending_frames.fetch_sub(1, Ordering::AcqRel);
        }
    }
}
