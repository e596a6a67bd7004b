//! Server configuration

use std::net::SocketAddr;
use std::time::Duration;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// Time allowed to receive the HTTP request head
    pub request_timeout: Duration,

    /// Largest accepted HTTP request head in bytes
    pub max_request_size: usize,

    /// Upgrade path for the producer channel
    pub producer_path: String,

    /// Upgrade path for the viewer channel
    pub viewer_path: String,

    /// Interval between stats log lines (zero disables the reporter)
    pub stats_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            max_connections: 0, // Unlimited
            tcp_nodelay: true,  // Frames are latency sensitive
            request_timeout: Duration::from_secs(10),
            max_request_size: 16 * 1024,
            producer_path: "/ws/producer".into(),
            viewer_path: "/ws/viewer".into(),
            stats_interval: Duration::from_secs(30),
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set request-head timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the producer and viewer upgrade paths
    pub fn paths(mut self, producer: impl Into<String>, viewer: impl Into<String>) -> Self {
        self.producer_path = producer.into();
        self.viewer_path = viewer.into();
        self
    }

    /// Set stats reporting interval
    pub fn stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = interval;
        self
    }
}
