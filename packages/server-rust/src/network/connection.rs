//! Connection tracking and per-connection outbound line queues.
//!
//! Every accepted socket gets one bounded queue of outbound lines, drained
//! by a single writer task. That single consumer is what keeps each line
//! write atomic even though query replies and asynchronous event pushes
//! come from different tasks. Pushing a line waits (up to the connection's
//! enqueue timeout) when the client reads too slowly; closing is
//! best-effort and never blocks, since the worker also exits on its own
//! when the peer goes away.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::mpsc;

use super::config::ConnectionConfig;

/// Unique identifier for a connection, assigned by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

/// What the writer task pulls off a connection's queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    /// One reply or event line; the writer appends the `\n`.
    Line(String),
    /// Close the socket once everything queued ahead has been written.
    Close,
}

/// A line could not be queued for the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PushError {
    /// The queue stayed full past the enqueue timeout: the client is not
    /// reading its replies and pushes fast enough.
    #[error("client is not draining its outbound queue")]
    Backpressure,
    /// The writer task has exited; the connection is gone.
    #[error("connection closed")]
    Closed,
}

/// Producer side of one connection's outbound queue.
///
/// Shared by the read worker (replies) and the event pusher; the paired
/// writer task is the only place socket writes happen.
#[derive(Debug)]
pub struct ConnectionHandle {
    /// Unique connection identifier assigned by the registry.
    pub id: ConnectionId,
    /// When this connection was established.
    pub connected_at: Instant,
    queue: mpsc::Sender<OutboundMessage>,
    enqueue_timeout: Duration,
    lines_pushed: AtomicU64,
}

impl ConnectionHandle {
    /// Queues one line for the client, waiting up to the connection's
    /// enqueue timeout for space.
    ///
    /// # Errors
    ///
    /// [`PushError::Backpressure`] when the queue stays full for the whole
    /// timeout, [`PushError::Closed`] when the writer task has exited.
    pub async fn push_line(&self, line: impl Into<String>) -> Result<(), PushError> {
        let msg = OutboundMessage::Line(line.into());
        let queued = tokio::time::timeout(self.enqueue_timeout, self.queue.send(msg)).await;

        match queued {
            Ok(Ok(())) => {
                self.lines_pushed.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Ok(Err(_)) => Err(PushError::Closed),
            Err(_) => Err(PushError::Backpressure),
        }
    }

    /// Tells the writer to flush the queue and hang up.
    ///
    /// Best-effort: never blocks, and a queue already full of unread lines
    /// drops the close rather than wait for a client that has stopped
    /// reading.
    pub fn close(&self) {
        let _ = self.queue.try_send(OutboundMessage::Close);
    }

    /// Whether the writer task is still draining the queue.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.queue.is_closed()
    }

    /// How many lines have been queued for this client so far.
    #[must_use]
    pub fn lines_pushed(&self) -> u64 {
        self.lines_pushed.load(Ordering::Relaxed)
    }
}

/// Thread-safe registry of all active connections.
#[derive(Debug)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Arc<ConnectionHandle>>,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    /// Creates a new empty registry. Connection IDs start at 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers a new connection, returning its handle and the receiver
    /// the writer task drains.
    ///
    /// The handle carries the config's enqueue timeout, so producers never
    /// pass one around.
    pub fn register(
        &self,
        config: &ConnectionConfig,
    ) -> (Arc<ConnectionHandle>, mpsc::Receiver<OutboundMessage>) {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (queue, rx) = mpsc::channel(config.outbound_channel_capacity);

        let handle = Arc::new(ConnectionHandle {
            id,
            connected_at: Instant::now(),
            queue,
            enqueue_timeout: config.send_timeout,
            lines_pushed: AtomicU64::new(0),
        });

        self.connections.insert(id, Arc::clone(&handle));
        (handle, rx)
    }

    /// Removes a connection, returning its handle if it was registered.
    pub fn remove(&self, id: ConnectionId) -> Option<Arc<ConnectionHandle>> {
        self.connections.remove(&id).map(|(_, handle)| handle)
    }

    /// Looks up a connection by ID.
    #[must_use]
    pub fn get(&self, id: ConnectionId) -> Option<Arc<ConnectionHandle>> {
        self.connections.get(&id).map(|r| Arc::clone(r.value()))
    }

    /// Number of active connections.
    #[must_use]
    pub fn count(&self) -> usize {
        self.connections.len()
    }

    /// Removes and returns all connections, for the shutdown drain.
    pub fn drain_all(&self) -> Vec<Arc<ConnectionHandle>> {
        let keys: Vec<ConnectionId> = self.connections.iter().map(|entry| *entry.key()).collect();

        let mut handles = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some((_, handle)) = self.connections.remove(&key) {
                handles.push(handle);
            }
        }
        handles
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
