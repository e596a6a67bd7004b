//! Crate-level error type

use std::time::Duration;

use thiserror::Error;

use crate::http::RequestError;
use crate::registry::RegistryError;

/// Errors produced by the relay server and publisher client
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("bad request: {0}")]
    Request(#[from] RequestError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("JSON encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Result alias using the crate error type
pub type Result<T> = std::result::Result<T, Error>;
