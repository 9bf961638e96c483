//! Network configuration types.

use std::time::Duration;

/// Top-level network configuration for the server.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Bind address for the server.
    pub host: String,
    /// Port to listen on. 0 means OS-assigned.
    pub port: u16,
    /// Per-connection settings.
    pub connection: ConnectionConfig,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 2310,
            connection: ConnectionConfig::default(),
        }
    }
}

/// Per-connection configuration controlling framing and backpressure.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Bounded mpsc channel capacity for outbound lines per connection.
    pub outbound_channel_capacity: usize,
    /// Capacity of the per-connection verified-event subscription.
    pub event_channel_capacity: usize,
    /// Longest accepted request line in bytes.
    pub max_line_length: usize,
    /// Maximum time to wait when enqueueing an outbound line.
    pub send_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            outbound_channel_capacity: 256,
            event_channel_capacity: 64,
            max_line_length: 65_536, // 64 KB
            send_timeout: Duration::from_secs(5),
        }
    }
}
