//! Statistics and metrics for the relay

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Statistics for one producer session
#[derive(Debug, Clone)]
pub struct SessionStats {
    /// Frames forwarded to the broadcast engine
    pub frames: u64,
    /// Zero-length frames discarded
    pub empty_frames: u64,
    /// Total payload bytes received
    pub bytes_received: u64,
    /// Per-viewer deliveries dropped because a viewer queue was full
    pub dropped_deliveries: u64,
    /// When the session was admitted
    pub started_at: Instant,
}

impl SessionStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self {
            frames: 0,
            empty_frames: 0,
            bytes_received: 0,
            dropped_deliveries: 0,
            started_at: Instant::now(),
        }
    }

    /// Connection duration so far
    pub fn duration(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Average inbound bitrate in bits per second
    pub fn bitrate(&self) -> u64 {
        bitrate(self.bytes_received, self.duration())
    }

    /// Average frame rate
    pub fn frame_rate(&self) -> f64 {
        let secs = self.duration().as_secs_f64();
        if secs > 0.0 {
            self.frames as f64 / secs
        } else {
            0.0
        }
    }
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

fn bitrate(bytes: u64, duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if secs > 0 {
        (bytes * 8) / secs
    } else {
        0
    }
}

/// Relay-wide counters, updated lock-free from every connection task
#[derive(Debug, Default)]
pub struct RelayStats {
    producers_accepted: AtomicU64,
    producers_rejected: AtomicU64,
    viewers_joined: AtomicU64,
    viewers_evicted: AtomicU64,
    frames_received: AtomicU64,
    empty_frames: AtomicU64,
    bytes_received: AtomicU64,
    deliveries_queued: AtomicU64,
    deliveries_dropped: AtomicU64,
}

impl RelayStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn producer_accepted(&self) {
        self.producers_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn producer_rejected(&self) {
        self.producers_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn viewer_joined(&self) {
        self.viewers_joined.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn viewers_evicted(&self, count: usize) {
        self.viewers_evicted.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn empty_frame(&self) {
        self.empty_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn frame_received(&self, bytes: usize, queued: usize, dropped: usize) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
        self.deliveries_queued.fetch_add(queued as u64, Ordering::Relaxed);
        self.deliveries_dropped.fetch_add(dropped as u64, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> RelayStatsSnapshot {
        RelayStatsSnapshot {
            producers_accepted: self.producers_accepted.load(Ordering::Relaxed),
            producers_rejected: self.producers_rejected.load(Ordering::Relaxed),
            viewers_joined: self.viewers_joined.load(Ordering::Relaxed),
            viewers_evicted: self.viewers_evicted.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            empty_frames: self.empty_frames.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            deliveries_queued: self.deliveries_queued.load(Ordering::Relaxed),
            deliveries_dropped: self.deliveries_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Serializable copy of [`RelayStats`], served on `/stats`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RelayStatsSnapshot {
    pub producers_accepted: u64,
    pub producers_rejected: u64,
    pub viewers_joined: u64,
    pub viewers_evicted: u64,
    pub frames_received: u64,
    pub empty_frames: u64,
    pub bytes_received: u64,
    pub deliveries_queued: u64,
    pub deliveries_dropped: u64,
}

/// Liveness record served on `/health`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub producer_connected: bool,
    pub viewer_count: usize,
}

impl HealthStatus {
    pub fn ok(producer_connected: bool, viewer_count: usize) -> Self {
        Self {
            status: "ok",
            producer_connected,
            viewer_count,
        }
    }
}
