//! End-to-end tests against a relay bound on a loopback port

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use screen_relay::client::{ClientConfig, FramePublisher, PublishEvent, SessionEnd};
use screen_relay::server::SLOT_OCCUPIED_CLOSE_CODE;
use screen_relay::session::SessionContext;
use screen_relay::stats::SessionStats;
use screen_relay::{NoopHandler, RelayHandler, RelayRegistry, RelayServer, ServerConfig};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const STEP_TIMEOUT: Duration = Duration::from_secs(5);

async fn start_relay() -> (SocketAddr, Arc<RelayRegistry>) {
    start_relay_with(ServerConfig::default(), NoopHandler).await
}

async fn start_relay_with<H: RelayHandler>(
    config: ServerConfig,
    handler: H,
) -> (SocketAddr, Arc<RelayRegistry>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let config = config.bind(addr).stats_interval(Duration::ZERO);
    let server = RelayServer::new(config, handler);
    let registry = Arc::clone(server.registry());

    tokio::spawn(async move {
        let _ = server.serve(listener, std::future::pending()).await;
    });

    (addr, registry)
}

async fn connect(addr: SocketAddr, path: &str) -> Client {
    let url = format!("ws://{}{}", addr, path);
    let (ws, _) = tokio::time::timeout(STEP_TIMEOUT, connect_async(url))
        .await
        .expect("connect timed out")
        .expect("connect failed");
    ws
}

async fn next_message(ws: &mut Client) -> Message {
    tokio::time::timeout(STEP_TIMEOUT, ws.next())
        .await
        .expect("timed out waiting for a message")
        .expect("stream ended")
        .expect("websocket error")
}

async fn next_text(ws: &mut Client) -> String {
    match next_message(ws).await {
        Message::Text(text) => text.as_str().to_owned(),
        other => panic!("expected text, got {:?}", other),
    }
}

async fn next_binary(ws: &mut Client) -> Bytes {
    match next_message(ws).await {
        Message::Binary(data) => data,
        other => panic!("expected binary, got {:?}", other),
    }
}

/// Write raw request bytes and read until the relay closes the connection
async fn send_raw(addr: SocketAddr, request: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut stream = TcpStream::connect(addr).await?;
    stream.write_all(request).await?;

    let mut response = Vec::new();
    tokio::time::timeout(STEP_TIMEOUT, stream.read_to_end(&mut response))
        .await
        .expect("response timed out")?;
    Ok(response)
}

async fn http_request(addr: SocketAddr, request: &[u8]) -> String {
    String::from_utf8(send_raw(addr, request).await.unwrap()).unwrap()
}

async fn http_get(addr: SocketAddr, path: &str) -> String {
    let request = format!("GET {} HTTP/1.1\r\nHost: {}\r\n\r\n", path, addr);
    http_request(addr, request.as_bytes()).await
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..250 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached in time");
}

/// Records how often each lifecycle hook fires
#[derive(Default)]
struct HookCounts {
    producer_connected: AtomicUsize,
    producer_rejected: AtomicUsize,
    producer_disconnected: AtomicUsize,
    viewer_joined: AtomicUsize,
    viewer_left: AtomicUsize,
    frames_at_disconnect: AtomicU64,
    bytes_at_disconnect: AtomicU64,
}

impl HookCounts {
    fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Default)]
struct CountingHandler(Arc<HookCounts>);

impl RelayHandler for CountingHandler {
    fn on_producer_connected(&self, _ctx: &SessionContext) {
        self.0.producer_connected.fetch_add(1, Ordering::SeqCst);
    }

    fn on_producer_rejected(&self, _ctx: &SessionContext) {
        self.0.producer_rejected.fetch_add(1, Ordering::SeqCst);
    }

    fn on_producer_disconnected(&self, _ctx: &SessionContext, stats: &SessionStats) {
        self.0
            .frames_at_disconnect
            .store(stats.frames, Ordering::SeqCst);
        self.0
            .bytes_at_disconnect
            .store(stats.bytes_received, Ordering::SeqCst);
        self.0.producer_disconnected.fetch_add(1, Ordering::SeqCst);
    }

    fn on_viewer_joined(&self, _ctx: &SessionContext) {
        self.0.viewer_joined.fetch_add(1, Ordering::SeqCst);
    }

    fn on_viewer_left(&self, _ctx: &SessionContext) {
        self.0.viewer_left.fetch_add(1, Ordering::SeqCst);
    }
}

fn body(response: &str) -> &str {
    response
        .split_once("\r\n\r\n")
        .map(|(_, body)| body)
        .unwrap_or("")
}

#[tokio::test]
async fn test_viewer_without_producer_hears_disconnected() {
    let (addr, _registry) = start_relay().await;
    let mut viewer = connect(addr, "/ws/viewer").await;

    assert_eq!(next_text(&mut viewer).await, "producer:disconnected");
}

#[tokio::test]
async fn test_late_viewer_hears_connected_then_frames() {
    let (addr, _registry) = start_relay().await;

    let mut watcher = connect(addr, "/ws/viewer").await;
    assert_eq!(next_text(&mut watcher).await, "producer:disconnected");

    let mut producer = connect(addr, "/ws/producer").await;
    assert_eq!(next_text(&mut watcher).await, "producer:connected");

    let mut late = connect(addr, "/ws/viewer").await;
    assert_eq!(next_text(&mut late).await, "producer:connected");

    let frame = Bytes::from_static(b"\xff\xd8jpeg\xff\xd9");
    producer
        .send(Message::Binary(frame.clone()))
        .await
        .unwrap();

    assert_eq!(next_binary(&mut watcher).await, frame);
    assert_eq!(next_binary(&mut late).await, frame);
}

#[tokio::test]
async fn test_empty_frame_is_not_forwarded() {
    let (addr, registry) = start_relay().await;

    let mut viewer = connect(addr, "/ws/viewer").await;
    assert_eq!(next_text(&mut viewer).await, "producer:disconnected");

    let mut producer = connect(addr, "/ws/producer").await;
    assert_eq!(next_text(&mut viewer).await, "producer:connected");

    producer.send(Message::Binary(Bytes::new())).await.unwrap();
    producer
        .send(Message::Binary(Bytes::from_static(&[1, 2, 3])))
        .await
        .unwrap();

    assert_eq!(next_binary(&mut viewer).await, Bytes::from_static(&[1, 2, 3]));

    let stats = registry.stats().snapshot();
    assert_eq!(stats.empty_frames, 1);
    assert_eq!(stats.frames_received, 1);
}

#[tokio::test]
async fn test_second_producer_rejected_until_slot_frees() {
    let (addr, registry) = start_relay().await;

    let mut viewer = connect(addr, "/ws/viewer").await;
    assert_eq!(next_text(&mut viewer).await, "producer:disconnected");

    let mut first = connect(addr, "/ws/producer").await;
    assert_eq!(next_text(&mut viewer).await, "producer:connected");

    let mut second = connect(addr, "/ws/producer").await;
    match next_message(&mut second).await {
        Message::Close(Some(frame)) => {
            assert_eq!(u16::from(frame.code), SLOT_OCCUPIED_CLOSE_CODE);
        }
        other => panic!("expected close frame, got {:?}", other),
    }
    assert!(registry.has_producer());

    first.close(None).await.unwrap();
    assert_eq!(next_text(&mut viewer).await, "producer:disconnected");
    assert!(!registry.has_producer());

    let mut third = connect(addr, "/ws/producer").await;
    assert_eq!(next_text(&mut viewer).await, "producer:connected");

    third
        .send(Message::Binary(Bytes::from_static(b"frame")))
        .await
        .unwrap();
    assert_eq!(next_binary(&mut viewer).await, Bytes::from_static(b"frame"));

    assert_eq!(registry.stats().snapshot().producers_rejected, 1);
}

#[tokio::test]
async fn test_abrupt_producer_loss_notifies_viewers() {
    let (addr, registry) = start_relay().await;

    let mut viewer = connect(addr, "/ws/viewer").await;
    assert_eq!(next_text(&mut viewer).await, "producer:disconnected");

    let producer = connect(addr, "/ws/producer").await;
    assert_eq!(next_text(&mut viewer).await, "producer:connected");

    // No close handshake, just a dropped socket.
    drop(producer);

    assert_eq!(next_text(&mut viewer).await, "producer:disconnected");
    assert!(!registry.has_producer());
}

#[tokio::test]
async fn test_departed_viewer_does_not_affect_others() {
    let (addr, registry) = start_relay().await;

    let mut staying = connect(addr, "/ws/viewer").await;
    let mut leaving = connect(addr, "/ws/viewer").await;
    assert_eq!(next_text(&mut staying).await, "producer:disconnected");
    assert_eq!(next_text(&mut leaving).await, "producer:disconnected");

    let mut producer = connect(addr, "/ws/producer").await;
    assert_eq!(next_text(&mut staying).await, "producer:connected");
    assert_eq!(next_text(&mut leaving).await, "producer:connected");

    drop(leaving);

    for i in 0u8..5 {
        producer
            .send(Message::Binary(Bytes::from(vec![i; 64])))
            .await
            .unwrap();
        assert_eq!(next_binary(&mut staying).await, Bytes::from(vec![i; 64]));
    }

    // The dropped viewer is gone once its task notices the closed socket.
    for _ in 0..50 {
        if registry.viewer_count() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(registry.viewer_count(), 1);
}

#[tokio::test]
async fn test_health_endpoint() {
    let (addr, _registry) = start_relay().await;

    let response = http_get(addr, "/health").await;
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.contains("Content-Type: application/json"));

    let json: serde_json::Value = serde_json::from_str(body(&response)).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "status": "ok",
            "producer_connected": false,
            "viewer_count": 0
        })
    );
}

#[tokio::test]
async fn test_health_reflects_live_connections() {
    let (addr, _registry) = start_relay().await;

    let mut viewer = connect(addr, "/ws/viewer").await;
    assert_eq!(next_text(&mut viewer).await, "producer:disconnected");
    let _producer = connect(addr, "/ws/producer").await;
    assert_eq!(next_text(&mut viewer).await, "producer:connected");

    let response = http_get(addr, "/health").await;
    let json: serde_json::Value = serde_json::from_str(body(&response)).unwrap();
    assert_eq!(json["producer_connected"], true);
    assert_eq!(json["viewer_count"], 1);
}

#[tokio::test]
async fn test_index_and_unknown_paths() {
    let (addr, _registry) = start_relay().await;

    let index = http_get(addr, "/").await;
    assert!(index.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(index.contains("text/html"));
    assert!(index.contains("/ws/viewer"));

    let missing = http_get(addr, "/nope").await;
    assert!(missing.starts_with("HTTP/1.1 404 Not Found\r\n"));

    let plain = http_get(addr, "/ws/viewer").await;
    assert!(plain.starts_with("HTTP/1.1 400 Bad Request\r\n"));
}

#[tokio::test]
async fn test_publisher_is_told_when_slot_is_busy() {
    let (addr, _registry) = start_relay().await;

    let mut viewer = connect(addr, "/ws/viewer").await;
    assert_eq!(next_text(&mut viewer).await, "producer:disconnected");
    let _holder = connect(addr, "/ws/producer").await;
    assert_eq!(next_text(&mut viewer).await, "producer:connected");

    let config = ClientConfig::new(format!("ws://{}/ws/producer", addr));
    let (publisher, mut events) = FramePublisher::new(config);
    let (_frames_tx, mut frames_rx) = tokio::sync::mpsc::channel(1);

    let end = tokio::time::timeout(STEP_TIMEOUT, publisher.publish_session(&mut frames_rx))
        .await
        .unwrap();
    let end = tokio_test::assert_ok!(end);
    assert_eq!(end, SessionEnd::Rejected);
    assert_eq!(events.recv().await, Some(PublishEvent::Connected));
}

#[tokio::test]
async fn test_publisher_streams_frames() {
    let (addr, registry) = start_relay().await;

    let mut viewer = connect(addr, "/ws/viewer").await;
    assert_eq!(next_text(&mut viewer).await, "producer:disconnected");

    let config = ClientConfig::new(format!("ws://{}/ws/producer", addr));
    let (publisher, _events) = FramePublisher::new(config);
    let (frames_tx, frames_rx) = tokio::sync::mpsc::channel(4);
    let task = tokio::spawn(async move { publisher.run(frames_rx).await });

    assert_eq!(next_text(&mut viewer).await, "producer:connected");

    frames_tx.send(Bytes::from_static(b"one")).await.unwrap();
    frames_tx.send(Bytes::from_static(b"two")).await.unwrap();
    assert_eq!(next_binary(&mut viewer).await, Bytes::from_static(b"one"));
    assert_eq!(next_binary(&mut viewer).await, Bytes::from_static(b"two"));

    drop(frames_tx);
    let result = tokio::time::timeout(STEP_TIMEOUT, task).await.unwrap().unwrap();
    tokio_test::assert_ok!(result);

    assert_eq!(next_text(&mut viewer).await, "producer:disconnected");
    assert!(!registry.has_producer());
}

#[tokio::test]
async fn test_handler_hooks_fire_once_per_event() {
    let handler = CountingHandler::default();
    let counts = Arc::clone(&handler.0);
    let (addr, _registry) = start_relay_with(ServerConfig::default(), handler).await;

    let mut viewer = connect(addr, "/ws/viewer").await;
    assert_eq!(next_text(&mut viewer).await, "producer:disconnected");
    assert_eq!(HookCounts::get(&counts.viewer_joined), 1);

    let mut first = connect(addr, "/ws/producer").await;
    assert_eq!(next_text(&mut viewer).await, "producer:connected");
    wait_until(|| HookCounts::get(&counts.producer_connected) == 1).await;

    first
        .send(Message::Binary(Bytes::from_static(b"abc")))
        .await
        .unwrap();
    assert_eq!(next_binary(&mut viewer).await, Bytes::from_static(b"abc"));

    let mut second = connect(addr, "/ws/producer").await;
    assert!(matches!(next_message(&mut second).await, Message::Close(Some(_))));
    assert_eq!(HookCounts::get(&counts.producer_rejected), 1);

    first.close(None).await.unwrap();
    assert_eq!(next_text(&mut viewer).await, "producer:disconnected");
    wait_until(|| HookCounts::get(&counts.producer_disconnected) == 1).await;
    assert_eq!(counts.frames_at_disconnect.load(Ordering::SeqCst), 1);
    assert_eq!(counts.bytes_at_disconnect.load(Ordering::SeqCst), 3);

    viewer.close(None).await.unwrap();
    wait_until(|| HookCounts::get(&counts.viewer_left) == 1).await;

    assert_eq!(HookCounts::get(&counts.producer_connected), 1);
    assert_eq!(HookCounts::get(&counts.producer_rejected), 1);
    assert_eq!(HookCounts::get(&counts.producer_disconnected), 1);
    assert_eq!(HookCounts::get(&counts.viewer_joined), 1);
    assert_eq!(HookCounts::get(&counts.viewer_left), 1);
}

#[tokio::test]
async fn test_stats_endpoint_counts_rejections() {
    let (addr, _registry) = start_relay().await;

    let mut viewer = connect(addr, "/ws/viewer").await;
    assert_eq!(next_text(&mut viewer).await, "producer:disconnected");
    let _holder = connect(addr, "/ws/producer").await;
    assert_eq!(next_text(&mut viewer).await, "producer:connected");

    let mut rejected = connect(addr, "/ws/producer").await;
    assert!(matches!(next_message(&mut rejected).await, Message::Close(Some(_))));

    let response = http_get(addr, "/stats").await;
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.contains("Content-Type: application/json"));

    let json: serde_json::Value = serde_json::from_str(body(&response)).unwrap();
    assert_eq!(json["producers_accepted"], 1);
    assert_eq!(json["producers_rejected"], 1);
    assert_eq!(json["viewers_joined"], 1);
    assert_eq!(json["frames_received"], 0);
}

#[tokio::test]
async fn test_oversize_request_head_gets_431() {
    let (addr, _registry) = start_relay().await;

    // Exactly the default 16 KiB limit, with no terminating blank line.
    let limit = ServerConfig::default().max_request_size;
    let mut request = b"GET / HTTP/1.1\r\nX-Fill: ".to_vec();
    request.resize(limit, b'a');

    let response = http_request(addr, &request).await;
    assert!(response.starts_with("HTTP/1.1 431 Request Header Fields Too Large\r\n"));
    assert!(response.contains("Connection: close\r\n"));
}

#[tokio::test]
async fn test_non_get_gets_405() {
    let (addr, _registry) = start_relay().await;

    let request = b"POST /health HTTP/1.1\r\nHost: relay\r\nContent-Length: 0\r\n\r\n";
    let response = http_request(addr, request).await;

    assert!(response.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"));
    assert!(response.contains("Allow: GET\r\n"));
}

#[tokio::test]
async fn test_silent_client_dropped_after_request_timeout() {
    let config = ServerConfig::default().request_timeout(Duration::from_millis(200));
    let (addr, _registry) = start_relay_with(config, NoopHandler).await;

    let started = std::time::Instant::now();
    let response = send_raw(addr, b"GET / HTTP/1.1\r\n").await.unwrap();

    assert!(response.is_empty());
    assert!(started.elapsed() >= Duration::from_millis(200));
}

#[tokio::test]
async fn test_connection_limit_turns_away_excess() {
    let config = ServerConfig::default().max_connections(1);
    let (addr, registry) = start_relay_with(config, NoopHandler).await;

    let mut viewer = connect(addr, "/ws/viewer").await;
    assert_eq!(next_text(&mut viewer).await, "producer:disconnected");

    // Closed without a response while the viewer holds the only permit.
    let excess = send_raw(addr, b"").await;
    assert!(excess.map(|r| r.is_empty()).unwrap_or(true));

    viewer.close(None).await.unwrap();
    wait_until(|| registry.viewer_count() == 0).await;

    let request = format!("GET /health HTTP/1.1\r\nHost: {}\r\n\r\n", addr);
    let mut served = false;
    for _ in 0..50 {
        if let Ok(response) = send_raw(addr, request.as_bytes()).await {
            if response.starts_with(b"HTTP/1.1 200 OK") {
                served = true;
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(served, "permit was not released after the viewer left");
}

#[tokio::test]
async fn test_index_points_at_configured_viewer_path() {
    let config = ServerConfig::default().paths("/push", "/watch");
    let (addr, _registry) = start_relay_with(config, NoopHandler).await;

    let index = http_get(addr, "/").await;
    assert!(index.contains("'/watch'"));

    let mut viewer = connect(addr, "/watch").await;
    assert_eq!(next_text(&mut viewer).await, "producer:disconnected");
}
