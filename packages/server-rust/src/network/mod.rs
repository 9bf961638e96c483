//! TCP transport: acceptor, per-connection workers, and shutdown.

pub mod config;
pub mod connection;
pub mod server;
pub mod shutdown;

pub use config::{ConnectionConfig, NetworkConfig};
pub use connection::{
    ConnectionHandle, ConnectionId, ConnectionRegistry, OutboundMessage, PushError,
};
pub use server::{ClientStack, ClientStackFactory, GREETING};
pub use shutdown::{ConnectionTicket, Lifecycle, Phase};
