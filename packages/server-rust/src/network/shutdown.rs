//! Server lifecycle and connection draining.
//!
//! [`Lifecycle`] tracks which phase the server is in, hands the acceptor
//! and the connection workers their stop signal, and performs the drain:
//! on shutdown every registered connection gets an
//! [`OutboundMessage::Close`](super::connection::OutboundMessage) and the
//! drain then waits for the workers' [`ConnectionTicket`]s to be returned.
//! Open connections are counted through a watch channel, so waiting for
//! zero is a subscription, not a poll loop.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::watch;

use super::connection::ConnectionRegistry;

/// Where the server is in its life.
///
/// `Restoring -> Serving -> Draining -> Halted`. The first phase covers
/// snapshot restore, which completes before the listener ever binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Stores are being restored; no listener is bound yet.
    Restoring,
    /// The acceptor is taking connections.
    Serving,
    /// Shutdown has begun; existing clients are being closed.
    Draining,
    /// Every connection worker has finished.
    Halted,
}

/// Owns the server's phase, the stop signal, and the open-connection count.
///
/// Created by the composition root alongside the
/// [`ConnectionRegistry`]; the acceptor marks it serving, each accepted
/// connection takes a ticket, and the accept loop calls
/// [`Lifecycle::drain`] once its shutdown future resolves.
#[derive(Debug)]
pub struct Lifecycle {
    phase: ArcSwap<Phase>,
    stop: watch::Sender<bool>,
    open: watch::Sender<u64>,
}

impl Lifecycle {
    /// A lifecycle in the `Restoring` phase with no open connections.
    #[must_use]
    pub fn new() -> Self {
        let (stop, _) = watch::channel(false);
        let (open, _) = watch::channel(0);
        Self {
            phase: ArcSwap::from_pointee(Phase::Restoring),
            stop,
            open,
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        **self.phase.load()
    }

    /// Marks the listener bound and accepting.
    pub fn mark_serving(&self) {
        self.phase.store(Arc::new(Phase::Serving));
    }

    /// Receiver that flips once shutdown begins.
    ///
    /// Connection workers select on this alongside their read loop so a
    /// drain does not have to wait for the next line from the client.
    #[must_use]
    pub fn stop_signal(&self) -> watch::Receiver<bool> {
        self.stop.subscribe()
    }

    /// Counts one open connection until the returned ticket is dropped.
    ///
    /// The worker holds the ticket for the life of its read loop; dropping
    /// it (even by panic) is what lets a drain finish.
    #[must_use]
    pub fn open_connection(&self) -> ConnectionTicket {
        self.open.send_modify(|n| *n += 1);
        ConnectionTicket {
            open: self.open.clone(),
        }
    }

    /// Number of connections whose workers are still running.
    #[must_use]
    pub fn open_connections(&self) -> u64 {
        *self.open.borrow()
    }

    /// Stops the server: enters `Draining`, fires the stop signal, closes
    /// every registered connection, and waits up to `timeout` for all
    /// tickets to come back.
    ///
    /// Returns `true` (and enters `Halted`) when every worker finished in
    /// time; `false` leaves the phase at `Draining` with stragglers still
    /// counted.
    pub async fn drain(&self, registry: &ConnectionRegistry, timeout: Duration) -> bool {
        self.phase.store(Arc::new(Phase::Draining));
        // Workers may already be gone.
        let _ = self.stop.send(true);

        for handle in registry.drain_all() {
            handle.close();
        }

        let mut open = self.open.subscribe();
        let drained = matches!(
            tokio::time::timeout(timeout, open.wait_for(|n| *n == 0)).await,
            Ok(Ok(_))
        );
        if drained {
            self.phase.store(Arc::new(Phase::Halted));
        }
        drained
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Proof that one connection worker is still running.
///
/// Returned by [`Lifecycle::open_connection`]; the drop (including during
/// unwinding) is what decrements the open-connection count.
#[derive(Debug)]
pub struct ConnectionTicket {
    open: watch::Sender<u64>,
}

impl Drop for ConnectionTicket {
    fn drop(&mut self) {
        self.open.send_modify(|n| *n = n.saturating_sub(1));
    }
}
