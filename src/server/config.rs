//! Server configuration

use std::net::SocketAddr;
use std::time::Duration;

/// Default WebSocket listen port
pub const DEFAULT_PORT: u16 = 8765;

/// Default maximum inbound WebSocket message size (1 MiB)
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum inbound WebSocket message (and frame) size in bytes
    pub max_message_size: usize,

    /// Per-subscriber outbound queue capacity, in records
    pub subscriber_queue: usize,

    /// Stats logging interval (zero disables)
    pub stats_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            subscriber_queue: 1024,
            stats_interval: Duration::from_secs(5),
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

    /// Set the listen port, keeping the bind host
    pub fn port(mut self, port: u16) -> Self {
        self.bind_addr.set_port(port);
        self
    }

    /// Set the maximum inbound message size
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Set the per-subscriber queue capacity (minimum 1)
    pub fn subscriber_queue(mut self, capacity: usize) -> Self {
        self.subscriber_queue = capacity.max(1);
        self
    }

    /// Set the stats logging interval
    pub fn stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = interval;
        self
    }
}
