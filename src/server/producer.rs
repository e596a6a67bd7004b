//! Producer channel session
//!
//! Claims the slot, forwards every binary message until the connection ends,
//! and releases the slot through the lease on every exit path.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Message, Utf8Bytes};
use tokio_tungstenite::WebSocketStream;

use crate::error::Result;
use crate::registry::{ProducerLease, RegistryError, RelayRegistry};
use crate::server::handler::RelayHandler;
use crate::server::SLOT_OCCUPIED_CLOSE_CODE;
use crate::session::SessionContext;
use crate::stats::SessionStats;

/// How long a rejected producer gets to acknowledge the close frame
const CLOSE_ACK_TIMEOUT: Duration = Duration::from_secs(2);

pub(crate) async fn run<H: RelayHandler>(
    mut ws: WebSocketStream<TcpStream>,
    ctx: SessionContext,
    handler: &H,
    registry: &Arc<RelayRegistry>,
) -> Result<()> {
    let lease = match registry.admit_producer() {
        Ok(lease) => lease,
        Err(e) => {
            handler.on_producer_rejected(&ctx);
            reject(ws, &ctx, e).await;
            return Ok(());
        }
    };

    tracing::info!(
        session_id = ctx.session_id,
        peer = %ctx.peer_addr,
        connection = %lease.id(),
        "Producer connected"
    );
    handler.on_producer_connected(&ctx);

    let mut stats = SessionStats::new();
    let result = pump(&mut ws, &lease, &mut stats, &ctx).await;

    // Slot is cleared and viewers notified before anyone hears about it.
    drop(lease);

    tracing::info!(
        session_id = ctx.session_id,
        frames = stats.frames,
        empty_frames = stats.empty_frames,
        bytes = stats.bytes_received,
        dropped_deliveries = stats.dropped_deliveries,
        bitrate = stats.bitrate(),
        fps = stats.frame_rate(),
        duration_secs = stats.duration().as_secs(),
        "Producer disconnected"
    );
    handler.on_producer_disconnected(&ctx, &stats);

    result
}

/// Forward inbound binary messages until the stream ends
async fn pump(
    ws: &mut WebSocketStream<TcpStream>,
    lease: &ProducerLease,
    stats: &mut SessionStats,
    ctx: &SessionContext,
) -> Result<()> {
    while let Some(message) = ws.next().await {
        match message? {
            Message::Binary(data) => {
                if data.is_empty() {
                    stats.empty_frames += 1;
                    lease.forward(data);
                    continue;
                }

                stats.frames += 1;
                stats.bytes_received += data.len() as u64;
                let outcome = lease.forward(data);
                stats.dropped_deliveries += outcome.dropped as u64;
            }
            Message::Text(text) => {
                tracing::debug!(
                    session_id = ctx.session_id,
                    len = text.len(),
                    "Ignoring text message from producer"
                );
            }
            Message::Close(frame) => {
                // The close reply goes out on the next poll, which then ends the stream.
                tracing::debug!(session_id = ctx.session_id, frame = ?frame, "Producer closing");
            }
            _ => {}
        }
    }

    Ok(())
}

/// Close a producer that lost the race for the slot
async fn reject(mut ws: WebSocketStream<TcpStream>, ctx: &SessionContext, reason: RegistryError) {
    tracing::debug!(
        session_id = ctx.session_id,
        peer = %ctx.peer_addr,
        reason = %reason,
        "Closing rejected producer"
    );

    let frame = CloseFrame {
        code: CloseCode::from(SLOT_OCCUPIED_CLOSE_CODE),
        reason: Utf8Bytes::from_static("producer slot occupied"),
    };
    if let Err(e) = ws.close(Some(frame)).await {
        tracing::debug!(session_id = ctx.session_id, error = %e, "Close frame not delivered");
        return;
    }

    // Wait for the peer's close reply so the code is not lost to a reset.
    let drain = async { while let Some(Ok(_)) = ws.next().await {} };
    let _ = tokio::time::timeout(CLOSE_ACK_TIMEOUT, drain).await;
}
