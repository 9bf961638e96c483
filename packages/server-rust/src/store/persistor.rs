//! Periodic disk snapshots and startup restore.
//!
//! The persistor writes the whole entry map as one JSON document mapping
//! key -> `{"ExpireAt": ..., "Data": ...}`. Writes go to a sibling temp
//! file first and atomically rename over the target, so a crash mid-write
//! never corrupts the previous snapshot. Failures inside the loop are
//! logged and the loop continues; only restore failures at open are fatal
//! to that store.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Weak;

use tokio::sync::watch;
use tracing::{debug, warn};

use super::item::Item;
use super::{SnapshotConfig, StoreError, StoreInner};

/// Restores the entry map from `path`.
///
/// A missing file yields an empty map. Any other read failure, or a file
/// that does not parse as a JSON item map, is an error.
pub(crate) fn load(path: &Path) -> Result<HashMap<String, Item>, StoreError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no snapshot to restore");
            return Ok(HashMap::new());
        }
        Err(source) => {
            return Err(StoreError::SnapshotIo {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let entries =
        serde_json::from_slice(&bytes).map_err(|source| StoreError::SnapshotFormat {
            path: path.to_path_buf(),
            source,
        })?;

    debug!(path = %path.display(), "snapshot restored");
    Ok(entries)
}

/// Serializes `entries` and atomically replaces the file at `path`.
pub(crate) fn save(path: &Path, entries: &HashMap<String, Item>) -> std::io::Result<()> {
    let bytes = serde_json::to_vec(entries)?;

    let mut tmp = OsString::from(path.as_os_str());
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)
}

pub(crate) fn spawn(
    store: Weak<StoreInner>,
    config: SnapshotConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + config.interval;
        let mut ticker = tokio::time::interval_at(start, config.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let Some(store) = store.upgrade() else { break };
                    // Copy under the read lock, write without it.
                    let entries = store.snapshot();
                    if let Err(err) = save(&config.path, &entries) {
                        warn!(path = %config.path.display(), %err, "snapshot write failed");
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
    });
}
