//! Per-connection identity state.

use super::access::Access;
use super::events::Subscriptions;
use super::user::User;

/// The identity a connection is currently operating as.
///
/// Starts unauthenticated (empty credentials, [`Access::None`], no
/// subscriptions). `AUTH` replaces the whole state with the catalog record;
/// `PING ON`/`PING OFF` mutate the subscription set. Dropped with the
/// connection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ActiveClient {
    pub username: String,
    pub password: String,
    pub access: Access,
    pub subscriptions: Subscriptions,
}

impl ActiveClient {
    /// The catalog record equivalent of this state, used to persist
    /// subscription changes.
    #[must_use]
    pub fn to_user(&self) -> User {
        User::new(
            self.username.clone(),
            self.password.clone(),
            self.access,
            self.subscriptions.clone(),
        )
    }
}

impl From<User> for ActiveClient {
    fn from(user: User) -> Self {
        Self {
            username: user.username,
            password: user.password,
            access: user.access,
            subscriptions: user.subscriptions,
        }
    }
}
