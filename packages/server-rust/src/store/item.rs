//! Item types for the storage layer.
//!
//! An [`Item`] is what a [`Store`](super::Store) actually keeps per key:
//! the stored [`Value`] plus its expiry deadline. Items are immutable once
//! created; an overwrite replaces the whole item.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rapido_core::Value;
use serde::{Deserialize, Serialize};

/// Sentinel deadline for items that never expire.
pub const NEVER_EXPIRE: i64 = -1;

/// Per-item time-to-live. `None` means the item never expires.
pub type Ttl = Option<Duration>;

/// Wall-clock now in nanoseconds since the Unix epoch.
///
/// The pre-epoch clock case collapses to 0 rather than panicking; every
/// positive deadline then reads as "not yet expired", which is the safe
/// direction.
#[must_use]
pub(crate) fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
}

/// One stored entry: a value and the nanosecond deadline after which it
/// reads as absent.
///
/// The serialized field names (`ExpireAt`, `Data`) are the snapshot file
/// format; they must not change without migrating existing `rapido.db`
/// files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(rename = "ExpireAt")]
    expire_at: i64,
    #[serde(rename = "Data")]
    data: Value,
}

impl Item {
    /// Creates an item expiring `ttl` from now, or never for `None`.
    #[must_use]
    pub fn new(data: Value, ttl: Ttl) -> Self {
        let expire_at = match ttl {
            None => NEVER_EXPIRE,
            Some(d) => {
                now_nanos().saturating_add(i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
            }
        };

        Self { expire_at, data }
    }

    /// Returns `true` once the deadline has passed. Never true for
    /// [`NEVER_EXPIRE`] items.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expire_at != NEVER_EXPIRE && self.expire_at < now_nanos()
    }

    /// The stored value.
    #[must_use]
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Consumes the item, yielding the stored value.
    #[must_use]
    pub fn into_data(self) -> Value {
        self.data
    }

    /// Nanosecond deadline, or [`NEVER_EXPIRE`].
    #[must_use]
    pub fn expire_at(&self) -> i64 {
        self.expire_at
    }
}
