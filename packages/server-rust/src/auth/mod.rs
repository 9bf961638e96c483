//! Authentication and authorization layer.
//!
//! Wraps the data store with per-connection access state: the totally
//! ordered [`Access`] levels, the subscribable [`Op`] events, the persisted
//! [`User`] catalog, and [`SecureStore`], the per-connection facade that
//! authorizes every operation before it reaches the data.

mod access;
mod catalog;
mod client;
mod events;
mod secure;
mod user;

use thiserror::Error;

pub use access::Access;
pub use catalog::UserCatalog;
pub use client::ActiveClient;
pub use events::{Op, Subscriptions};
pub use secure::SecureStore;
pub use user::{MalformedUser, User};

/// Errors surfaced by the auth layer. The `Display` forms go to clients
/// verbatim behind an `ERR: ` prefix.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The active client's access level does not cover the operation.
    #[error("Access denied")]
    AccessDenied,
    /// Unknown username or wrong password.
    #[error("Invalid Credentials")]
    InvalidCredentials,
    /// Access level outside `0..=5`.
    #[error("Access parameter too high, max can be 5")]
    InvalidAccess,
    /// Event name outside `{get, set, del, wipe}`.
    #[error("Invalid event")]
    InvalidEvent,
}
