//! Subscribable server-side events.

use std::collections::BTreeSet;
use std::str::FromStr;

use super::AuthError;

/// A database operation a client can subscribe to via `PING ON`.
///
/// The discriminants are the on-disk encoding of the user catalog's
/// `Events` array and must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Op {
    Get = 1,
    Set = 2,
    Del = 3,
    Wipe = 4,
}

/// The set of events a client is subscribed to.
pub type Subscriptions = BTreeSet<Op>;

impl Op {
    /// Every subscribable operation.
    pub const ALL: [Op; 4] = [Op::Get, Op::Set, Op::Del, Op::Wipe];

    /// The numeric code as persisted in the user catalog.
    #[must_use]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Decodes a persisted event code.
    #[must_use]
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            1 => Some(Op::Get),
            2 => Some(Op::Set),
            3 => Some(Op::Del),
            4 => Some(Op::Wipe),
            _ => None,
        }
    }

    /// Lowercase wire spelling.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Op::Get => "get",
            Op::Set => "set",
            Op::Del => "del",
            Op::Wipe => "wipe",
        }
    }
}

impl FromStr for Op {
    type Err = AuthError;

    /// Parses an event name case-insensitively. Anything outside
    /// `{get, set, del, wipe}` is an invalid event.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "get" => Ok(Op::Get),
            "set" => Ok(Op::Set),
            "del" => Ok(Op::Del),
            "wipe" => Ok(Op::Wipe),
            _ => Err(AuthError::InvalidEvent),
        }
    }
}
