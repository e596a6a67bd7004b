//! Per-connection front door
//!
//! Reads the HTTP request head, answers the plain routes, and hands WebSocket
//! upgrades on the producer and viewer paths to their session loops.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::handshake::derive_accept_key;
use tokio_tungstenite::tungstenite::protocol::Role as WsRole;
use tokio_tungstenite::WebSocketStream;

use crate::error::{Error, Result};
use crate::http::{Request, RequestError, Response, StatusCode};
use crate::registry::RelayRegistry;
use crate::server::config::ServerConfig;
use crate::server::handler::RelayHandler;
use crate::server::{producer, viewer};
use crate::session::{Role, SessionContext};

const VIEWER_PAGE: &str = include_str!("page.html");

/// Replaced with the configured viewer path when the page is served
const VIEWER_PATH_PLACEHOLDER: &str = "{{VIEWER_PATH}}";

/// Initial read buffer capacity per connection.
const INITIAL_BUF_SIZE: usize = 1024;

/// Where a request head is dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Index,
    Health,
    Stats,
    Channel(Role),
    NotFound,
    MethodNotAllowed,
}

fn viewer_page(config: &ServerConfig) -> String {
    VIEWER_PAGE.replace(VIEWER_PATH_PLACEHOLDER, &config.viewer_path)
}

fn route(config: &ServerConfig, request: &Request) -> Route {
    let path = request.path();
    let known = match path {
        "/" => Some(Route::Index),
        "/health" => Some(Route::Health),
        "/stats" => Some(Route::Stats),
        p if p == config.producer_path => Some(Route::Channel(Role::Producer)),
        p if p == config.viewer_path => Some(Route::Channel(Role::Viewer)),
        _ => None,
    };

    match known {
        None => Route::NotFound,
        Some(_) if request.method() != "GET" => Route::MethodNotAllowed,
        Some(route) => route,
    }
}

/// A single accepted TCP connection
pub(crate) struct Connection<H: RelayHandler> {
    session_id: u64,
    socket: TcpStream,
    peer_addr: SocketAddr,
    config: ServerConfig,
    handler: Arc<H>,
    registry: Arc<RelayRegistry>,
}

impl<H: RelayHandler> Connection<H> {
    pub(crate) fn new(
        session_id: u64,
        socket: TcpStream,
        peer_addr: SocketAddr,
        config: ServerConfig,
        handler: Arc<H>,
        registry: Arc<RelayRegistry>,
    ) -> Self {
        Self {
            session_id,
            socket,
            peer_addr,
            config,
            handler,
            registry,
        }
    }

    /// Serve the connection until it closes
    pub(crate) async fn run(mut self) -> Result<()> {
        let timeout = self.config.request_timeout;
        let head = tokio::time::timeout(timeout, self.read_request()).await;

        let (request, leftover) = match head {
            Ok(Ok(pair)) => pair,
            Ok(Err(Error::Request(e))) => {
                let status = match e {
                    RequestError::HeadTooLarge { .. } => StatusCode::RequestHeaderFieldsTooLarge,
                    _ => StatusCode::BadRequest,
                };
                tracing::warn!(
                    session_id = self.session_id,
                    peer = %self.peer_addr,
                    error = %e,
                    "Rejecting malformed request"
                );
                self.respond(Response::error(status, e.to_string())).await?;
                return Err(e.into());
            }
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(Error::Timeout(timeout)),
        };

        let route = route(&self.config, &request);
        tracing::debug!(
            session_id = self.session_id,
            peer = %self.peer_addr,
            method = request.method(),
            path = request.path(),
            route = ?route,
            "Dispatching request"
        );

        match route {
            Route::Index => {
                let page = viewer_page(&self.config);
                self.respond(Response::html(page)).await
            }
            Route::Health => {
                let response = Response::json(&self.registry.health())?;
                self.respond(response).await
            }
            Route::Stats => {
                let response = Response::json(&self.registry.stats().snapshot())?;
                self.respond(response).await
            }
            Route::Channel(role) => match request.websocket_key() {
                Some(key) => {
                    let accept_key = derive_accept_key(key.as_bytes());
                    self.upgrade(role, accept_key, leftover).await
                }
                None => {
                    let response =
                        Response::error(StatusCode::BadRequest, "expected a WebSocket upgrade");
                    self.respond(response).await
                }
            },
            Route::NotFound => {
                self.respond(Response::error(StatusCode::NotFound, "Not Found"))
                    .await
            }
            Route::MethodNotAllowed => {
                let response = Response::error(StatusCode::MethodNotAllowed, "Method Not Allowed")
                    .header("Allow", "GET");
                self.respond(response).await
            }
        }
    }

    /// Read until a full request head is buffered
    ///
    /// Returns the request and any bytes that followed the head.
    async fn read_request(&mut self) -> Result<(Request, BytesMut)> {
        let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);

        loop {
            let bytes_read = self.socket.read_buf(&mut buf).await?;
            if bytes_read == 0 {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed before request head",
                )));
            }

            match Request::parse(&buf) {
                Ok((request, head_len)) => {
                    let _ = buf.split_to(head_len);
                    return Ok((request, buf));
                }
                Err(RequestError::Incomplete) if buf.len() < self.config.max_request_size => {
                    continue;
                }
                Err(RequestError::Incomplete) => {
                    return Err(RequestError::HeadTooLarge {
                        max_bytes: self.config.max_request_size,
                    }
                    .into());
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Write a plain response and close
    async fn respond(&mut self, response: Response) -> Result<()> {
        self.socket.write_all(&response.into_bytes()).await?;
        self.socket.shutdown().await?;
        Ok(())
    }

    /// Complete the WebSocket handshake and run the channel's session loop
    async fn upgrade(mut self, role: Role, accept_key: String, leftover: BytesMut) -> Result<()> {
        self.socket
            .write_all(&Response::switching_protocols(accept_key).into_bytes())
            .await?;

        let ws = WebSocketStream::from_partially_read(
            self.socket,
            leftover.to_vec(),
            WsRole::Server,
            None,
        )
        .await;
        let ctx = SessionContext::new(self.session_id, self.peer_addr, role);

        match role {
            Role::Producer => producer::run(ws, ctx, self.handler.as_ref(), &self.registry).await,
            Role::Viewer => viewer::run(ws, ctx, self.handler.as_ref(), &self.registry).await,
        }
    }
}
