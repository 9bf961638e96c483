//! Background expiration sweeper.
//!
//! One sweeper task runs per store. Each tick takes the write lock and
//! removes every entry whose deadline has passed. The task holds the store
//! only weakly, so it stops when the last handle is dropped as well as when
//! the store's shutdown handle fires.

use std::sync::Weak;
use std::time::Duration;

use tokio::sync::watch;
use tracing::debug;

use super::StoreInner;

pub(crate) fn spawn(
    store: Weak<StoreInner>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + interval;
        let mut ticker = tokio::time::interval_at(start, interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let Some(store) = store.upgrade() else { break };
                    let removed = store.delete_expired();
                    if removed > 0 {
                        debug!(removed, "sweeper removed expired entries");
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
    });
}
