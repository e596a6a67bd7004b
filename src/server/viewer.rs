//! Viewer channel session
//!
//! Drains the viewer's queue into the socket while watching the inbound side
//! for closure. Anything the viewer sends is ignored.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{Message, Utf8Bytes};
use tokio_tungstenite::WebSocketStream;

use crate::error::Result;
use crate::registry::{Outbound, RelayRegistry};
use crate::server::handler::RelayHandler;
use crate::session::SessionContext;

pub(crate) async fn run<H: RelayHandler>(
    ws: WebSocketStream<TcpStream>,
    ctx: SessionContext,
    handler: &H,
    registry: &Arc<RelayRegistry>,
) -> Result<()> {
    let mut lease = registry.admit_viewer();
    tracing::debug!(
        session_id = ctx.session_id,
        peer = %ctx.peer_addr,
        connection = %lease.id(),
        "Viewer connected"
    );
    handler.on_viewer_joined(&ctx);

    let (mut sink, mut stream) = ws.split();

    let result = loop {
        tokio::select! {
            // Queue first: the presence message must be written before any
            // inbound traffic is looked at.
            biased;

            outbound = lease.recv() => {
                let message = match outbound {
                    Some(Outbound::Control(control)) => {
                        Message::Text(Utf8Bytes::from_static(control.as_str()))
                    }
                    Some(Outbound::Frame(frame)) => Message::Binary(frame.into_bytes()),
                    None => {
                        tracing::debug!(session_id = ctx.session_id, "Viewer evicted");
                        break Ok(());
                    }
                };

                if let Err(e) = sink.send(message).await {
                    break Err(e.into());
                }
            }

            inbound = stream.next() => match inbound {
                Some(Ok(Message::Close(_))) => {
                    let _ = sink.close().await;
                    break Ok(());
                }
                Some(Ok(message)) => {
                    tracing::trace!(
                        session_id = ctx.session_id,
                        len = message.len(),
                        "Ignoring message from viewer"
                    );
                }
                Some(Err(e)) => break Err(e.into()),
                None => break Ok(()),
            },
        }
    };

    drop(lease);

    tracing::debug!(
        session_id = ctx.session_id,
        watched_secs = ctx.elapsed().as_secs(),
        error = result.as_ref().err().map(tracing::field::display),
        "Viewer disconnected"
    );
    handler.on_viewer_left(&ctx);

    result
}
