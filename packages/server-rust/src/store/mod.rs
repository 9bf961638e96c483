//! Concurrent TTL store with background sweeping and disk snapshots.
//!
//! A [`Store`] is a cheap-to-clone handle over a readers-writer-locked map
//! of key -> [`Item`]. Reads that observe an expired item report it absent
//! without deleting it; physical removal belongs to the [`sweeper`], so
//! concurrent readers observe stable membership. When a snapshot is
//! configured the [`persistor`] periodically writes the map to disk as JSON
//! and [`Store::open`] restores it before the store becomes available.

mod item;
mod persistor;
mod sweeper;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use rapido_core::Value;
use thiserror::Error;
use tokio::sync::watch;

pub use item::{Item, Ttl, NEVER_EXPIRE};

/// How often the sweeper scans for expired entries.
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10);

/// How often the persistor writes a snapshot.
const DEFAULT_SNAPSHOT_INTERVAL: Duration = Duration::from_secs(30);

/// Failure to restore a snapshot during [`Store::open`].
///
/// A missing snapshot file is not an error; anything else aborts startup of
/// that store, because silently serving an empty map would look like data
/// loss.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The snapshot file exists but could not be read.
    #[error("failed to read snapshot {path}: {source}")]
    SnapshotIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The snapshot file is not a valid JSON map of items.
    #[error("malformed snapshot {path}: {source}")]
    SnapshotFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Snapshot location and cadence.
#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    /// File the snapshot is written to (and restored from).
    pub path: PathBuf,
    /// Interval between snapshot writes. Zero disables the persistor task
    /// (the file is still restored on open).
    pub interval: Duration,
}

impl SnapshotConfig {
    /// Snapshot config for `path` with the default cadence.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            interval: DEFAULT_SNAPSHOT_INTERVAL,
        }
    }
}

/// Store construction parameters.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// TTL applied by callers that defer to the store default.
    pub default_ttl: Ttl,
    /// Sweeper cadence. Zero disables the sweeper task.
    pub sweep_interval: Duration,
    /// Snapshot persistence, if any.
    pub snapshot: Option<SnapshotConfig>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_ttl: None,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            snapshot: None,
        }
    }
}

/// Shared state behind every [`Store`] handle.
///
/// Background tasks hold this only weakly so they never extend the store's
/// lifetime.
pub(crate) struct StoreInner {
    default_ttl: Ttl,
    entries: RwLock<HashMap<String, Item>>,
    shutdown: watch::Sender<bool>,
}

impl StoreInner {
    /// Removes every expired entry, returning how many were removed.
    pub(crate) fn delete_expired(&self) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, item| !item.is_expired());
        before - entries.len()
    }

    /// Clones the current entry map. The lock is released before the clone
    /// is handed to any I/O.
    pub(crate) fn snapshot(&self) -> HashMap<String, Item> {
        self.entries.read().clone()
    }
}

/// Concurrent map with per-entry TTL.
///
/// Clones share the same underlying map. Any operation may be invoked
/// concurrently from any number of handles; no operation has a failure mode
/// and none holds the internal lock across I/O.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Opens a store, restoring the snapshot first when one is configured.
    ///
    /// Recovery precedes availability: the snapshot load is synchronous and
    /// a malformed file fails the open. Spawns the sweeper and persistor
    /// background tasks, so this must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the configured snapshot file exists but
    /// cannot be read or parsed. A missing file is not an error.
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        let entries = match &config.snapshot {
            Some(snapshot) => persistor::load(&snapshot.path)?,
            None => HashMap::new(),
        };

        let (shutdown, _) = watch::channel(false);
        let inner = Arc::new(StoreInner {
            default_ttl: config.default_ttl,
            entries: RwLock::new(entries),
            shutdown,
        });

        if !config.sweep_interval.is_zero() {
            sweeper::spawn(
                Arc::downgrade(&inner),
                config.sweep_interval,
                inner.shutdown.subscribe(),
            );
        }

        if let Some(snapshot) = config.snapshot {
            if !snapshot.interval.is_zero() {
                persistor::spawn(
                    Arc::downgrade(&inner),
                    snapshot,
                    inner.shutdown.subscribe(),
                );
            }
        }

        Ok(Self { inner })
    }

    /// Inserts or replaces `key`. `ttl == None` stores a never-expiring
    /// item.
    pub fn set(&self, key: &str, data: Value, ttl: Ttl) {
        let item = Item::new(data, ttl);
        self.inner.entries.write().insert(key.to_string(), item);
    }

    /// Returns the live value under `key`. An expired entry reads as absent
    /// but is left in place for the sweeper.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        let entries = self.inner.entries.read();
        entries
            .get(key)
            .filter(|item| !item.is_expired())
            .map(|item| item.data().clone())
    }

    /// Removes `key`, returning the value it held if it was still live.
    pub fn delete(&self, key: &str) -> Option<Value> {
        let removed = self.inner.entries.write().remove(key)?;
        if removed.is_expired() {
            return None;
        }
        Some(removed.into_data())
    }

    /// Drops every entry.
    pub fn wipe(&self) {
        *self.inner.entries.write() = HashMap::new();
    }

    /// Removes every expired entry, returning how many were removed.
    /// Normally the sweeper's job; exposed for callers that want an eager
    /// pass.
    pub fn delete_expired(&self) -> usize {
        self.inner.delete_expired()
    }

    /// TTL applied when callers defer to the store default.
    #[must_use]
    pub fn default_ttl(&self) -> Ttl {
        self.inner.default_ttl
    }

    /// Number of entries, including expired ones the sweeper has not yet
    /// removed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    /// Whether the store holds no entries at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.entries.read().is_empty()
    }

    /// Stops the sweeper and persistor tasks for every handle of this
    /// store. Dropping the last handle has the same effect.
    pub fn shutdown(&self) {
        let _ = self.inner.shutdown.send(true);
    }
}
