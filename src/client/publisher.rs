//! Frame publisher
//!
//! High-level API for pushing a live sequence of opaque frames to a relay.

use std::time::Instant;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::error::{Error, Result};
use crate::server::SLOT_OCCUPIED_CLOSE_CODE;

use super::config::ClientConfig;

/// Events from the publisher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishEvent {
    /// WebSocket handshake completed
    Connected,

    /// The relay already has a producer
    Rejected,

    /// The session ended
    Disconnected { code: Option<u16> },

    /// Waiting before the next connection attempt
    Retrying {
        attempt: u32,
        delay: std::time::Duration,
    },

    /// Reconnect deadline passed
    GaveUp,
}

/// Why a single publishing session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The frame channel was closed by the caller
    SourceExhausted,
    /// Closed with the slot-occupied code
    Rejected,
    /// Closed by the relay or the network
    Closed { code: Option<u16> },
}

impl SessionEnd {
    fn from_close_code(code: Option<u16>) -> Self {
        match code {
            Some(SLOT_OCCUPIED_CLOSE_CODE) => SessionEnd::Rejected,
            code => SessionEnd::Closed { code },
        }
    }
}

/// Relay frame publisher
///
/// # Example
/// ```no_run
/// use bytes::Bytes;
/// use screen_relay::client::{ClientConfig, FramePublisher};
///
/// # async fn example() -> screen_relay::error::Result<()> {
/// let config = ClientConfig::new("ws://127.0.0.1:8000/ws/producer");
/// let (publisher, mut events) = FramePublisher::new(config);
/// let (frames_tx, frames_rx) = tokio::sync::mpsc::channel::<Bytes>(4);
///
/// tokio::spawn(async move {
///     while let Some(event) = events.recv().await {
///         println!("Event: {:?}", event);
///     }
/// });
///
/// // Feed encoded frames through `frames_tx` from the capture loop.
/// # drop(frames_tx);
/// publisher.run(frames_rx).await?;
/// # Ok(())
/// # }
/// ```
pub struct FramePublisher {
    config: ClientConfig,
    event_tx: mpsc::Sender<PublishEvent>,
}

impl FramePublisher {
    /// Create a new publisher.
    ///
    /// Returns the publisher and a receiver for events. Events are dropped
    /// rather than blocking publishing if the receiver falls behind.
    pub fn new(config: ClientConfig) -> (Self, mpsc::Receiver<PublishEvent>) {
        let (event_tx, event_rx) = mpsc::channel(256);
        (Self { config, event_tx }, event_rx)
    }

    /// Get the publisher configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn emit(&self, event: PublishEvent) {
        let _ = self.event_tx.try_send(event);
    }

    /// Connect once and stream frames until either side ends the session
    pub async fn publish_session(&self, frames: &mut mpsc::Receiver<Bytes>) -> Result<SessionEnd> {
        let mut connected = false;
        self.session(frames, &mut connected).await
    }

    /// Sets `connected` once the handshake completes
    async fn session(
        &self,
        frames: &mut mpsc::Receiver<Bytes>,
        connected: &mut bool,
    ) -> Result<SessionEnd> {
        let (ws, _) = connect_async(self.config.url.as_str()).await?;
        *connected = true;
        tracing::info!(url = %self.config.url, "Connected to relay");
        self.emit(PublishEvent::Connected);

        let (mut sink, mut stream) = ws.split();

        loop {
            tokio::select! {
                // Inbound first so a rejection is seen before more frames go out.
                biased;

                message = stream.next() => match message {
                    Some(Ok(Message::Close(frame))) => {
                        let code = frame.map(|f| u16::from(f.code));
                        return Ok(SessionEnd::from_close_code(code));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                    None => return Ok(SessionEnd::Closed { code: None }),
                },

                frame = frames.recv() => match frame {
                    Some(data) => sink.send(Message::Binary(data)).await?,
                    None => {
                        let _ = sink.close().await;
                        return Ok(SessionEnd::SourceExhausted);
                    }
                },
            }
        }
    }

    /// Publish until the frame channel closes, reconnecting on every other
    /// session end
    ///
    /// The backoff schedule and the reconnect deadline restart after every
    /// session the relay accepted. Returns [`Error::Timeout`] once the deadline
    /// passes without one.
    pub async fn run(&self, mut frames: mpsc::Receiver<Bytes>) -> Result<()> {
        let mut started = Instant::now();
        let mut attempt: u32 = 1;

        loop {
            let mut connected = false;
            let end = self.session(&mut frames, &mut connected).await;

            // A rejection does not count: the slot is still busy.
            if connected && !matches!(end, Ok(SessionEnd::Rejected)) {
                started = Instant::now();
                attempt = 1;
            }

            match end {
                Ok(SessionEnd::SourceExhausted) => {
                    self.emit(PublishEvent::Disconnected { code: None });
                    return Ok(());
                }
                Ok(SessionEnd::Rejected) => {
                    tracing::warn!(url = %self.config.url, "Relay slot busy, will retry");
                    self.emit(PublishEvent::Rejected);
                }
                Ok(SessionEnd::Closed { code }) => {
                    tracing::info!(code = ?code, "Relay closed the connection");
                    self.emit(PublishEvent::Disconnected { code });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Publishing session failed");
                    self.emit(PublishEvent::Disconnected { code: None });
                }
            }

            if let Some(deadline) = self.config.reconnect_deadline {
                if started.elapsed() >= deadline {
                    tracing::warn!(attempts = attempt, "Reconnect deadline reached, giving up");
                    self.emit(PublishEvent::GaveUp);
                    return Err(Error::Timeout(deadline));
                }
            }

            let delay = self.config.backoff_delay(attempt);
            tracing::debug!(attempt = attempt, delay_ms = delay.as_millis() as u64, "Retrying");
            self.emit(PublishEvent::Retrying { attempt, delay });
            tokio::time::sleep(delay).await;
            attempt = attempt.saturating_add(1);
        }
    }
}
