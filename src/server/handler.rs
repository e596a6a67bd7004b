//! Lifecycle hooks
//!
//! Implement [`RelayHandler`] to observe admissions and departures. Hooks run
//! inline on the connection task after the registry has already changed, so
//! they cannot veto anything and should return quickly.

use crate::session::SessionContext;
use crate::stats::SessionStats;

/// Observer for relay lifecycle events. Every method has a no-op default.
pub trait RelayHandler: Send + Sync + 'static {
    /// A producer claimed the slot
    fn on_producer_connected(&self, _ctx: &SessionContext) {}

    /// A producer was turned away because the slot is held
    fn on_producer_rejected(&self, _ctx: &SessionContext) {}

    /// The producer left and the slot is empty again
    fn on_producer_disconnected(&self, _ctx: &SessionContext, _stats: &SessionStats) {}

    /// A viewer joined
    fn on_viewer_joined(&self, _ctx: &SessionContext) {}

    /// A viewer left
    fn on_viewer_left(&self, _ctx: &SessionContext) {}
}

/// Handler that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHandler;

impl RelayHandler for NoopHandler {}
