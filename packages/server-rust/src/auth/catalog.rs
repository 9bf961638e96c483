//! The user catalog: a store of encoded [`User`] records keyed by username.

use tracing::{info, warn};

use super::access::Access;
use super::events::Subscriptions;
use super::user::User;
use crate::store::Store;

/// Wraps a [`Store`] holding user records.
///
/// The catalog is the only component that knows the user encoding; everything
/// else trades in [`User`] values. A record that fails to decode is logged
/// and reported as absent, so catalog corruption degrades to failed logins
/// instead of taking the server down.
#[derive(Clone)]
pub struct UserCatalog {
    store: Store,
}

impl UserCatalog {
    /// Wraps the given store. The store's default TTL applies to records,
    /// which for a user catalog should be "never".
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Inserts or overwrites the record under its username.
    pub fn insert(&self, user: &User) {
        self.store
            .set(&user.username, user.to_value(), self.store.default_ttl());
    }

    /// Looks up a user by username. Malformed records read as absent.
    #[must_use]
    pub fn find(&self, username: &str) -> Option<User> {
        let value = self.store.get(username)?;
        match User::from_value(&value) {
            Ok(user) => Some(user),
            Err(err) => {
                warn!(username, %err, "skipping malformed user record");
                None
            }
        }
    }

    /// Inserts the bootstrap admin unless a record already exists under
    /// that username.
    pub fn ensure_admin(&self, username: &str, password: &str) {
        if self.find(username).is_some() {
            return;
        }
        info!(username, "bootstrapping admin user");
        self.insert(&User::new(
            username,
            password,
            Access::Admin,
            Subscriptions::new(),
        ));
    }
}
