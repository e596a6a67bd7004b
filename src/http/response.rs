//! HTTP/1.1 response builder
//!
//! Every plain response the relay writes closes the connection afterwards, so
//! `Connection: close` is always emitted. Upgrade responses are built with
//! [`Response::switching_protocols`] and carry no body.

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;

use super::StatusCode;

/// An HTTP/1.1 response, ready to be serialized and sent
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: Vec<(&'static str, String)>,
    body: Bytes,
}

impl Response {
    /// Create a response with the given status and an empty body
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// `101 Switching Protocols` completing a WebSocket handshake
    pub fn switching_protocols(accept_key: String) -> Self {
        Self::new(StatusCode::SwitchingProtocols)
            .header("Upgrade", "websocket")
            .header("Connection", "Upgrade")
            .header("Sec-WebSocket-Accept", accept_key)
    }

    /// `200 OK` with a JSON body
    pub fn json<T: Serialize>(value: &T) -> serde_json::Result<Self> {
        let body = serde_json::to_vec(value)?;
        Ok(Self::new(StatusCode::Ok)
            .header("Content-Type", "application/json")
            .body(body))
    }

    /// `200 OK` with an HTML body
    pub fn html(page: impl Into<Bytes>) -> Self {
        Self::new(StatusCode::Ok)
            .header("Content-Type", "text/html; charset=utf-8")
            .body(page)
    }

    /// Plain-text error response
    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self::new(status)
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(message)
    }

    /// Append a response header
    #[must_use]
    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    /// Set the response body
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Status code of this response
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Serialize using HTTP/1.1 wire format
    pub fn into_bytes(self) -> BytesMut {
        let upgrade = self.status == StatusCode::SwitchingProtocols;
        let mut buf = BytesMut::with_capacity(128 + self.headers.len() * 64 + self.body.len());

        buf.put(
            format!(
                "HTTP/1.1 {} {}\r\n",
                self.status.as_u16(),
                self.status.canonical_reason()
            )
            .as_bytes(),
        );

        for (name, value) in &self.headers {
            buf.put(format!("{name}: {value}\r\n").as_bytes());
        }

        if !upgrade {
            buf.put(format!("Content-Length: {}\r\n", self.body.len()).as_bytes());
            buf.put(&b"Connection: close\r\n"[..]);
        }

        buf.put(&b"\r\n"[..]);
        buf.put(self.body);
        buf
    }
}
