//! [`SecureStore`]: the per-connection authorization facade.

use parking_lot::RwLock;
use rapido_core::Value;

use super::access::Access;
use super::catalog::UserCatalog;
use super::client::ActiveClient;
use super::events::Op;
use super::user::User;
use super::AuthError;
use crate::store::{Store, Ttl};

/// Wraps the data store and the user catalog with one connection's access
/// state.
///
/// One instance exists per connection and is shared between the driver and
/// the connection's event dispatcher, so the active client sits behind a
/// lock. Every data operation checks `active.access >= required` first; a
/// denied operation returns [`AuthError::AccessDenied`] without touching
/// the data store.
pub struct SecureStore {
    data: Store,
    users: UserCatalog,
    active: RwLock<ActiveClient>,
}

impl SecureStore {
    /// Creates a facade in the unauthenticated state.
    #[must_use]
    pub fn new(data: Store, users: UserCatalog) -> Self {
        Self {
            data,
            users,
            active: RwLock::new(ActiveClient::default()),
        }
    }

    // --- Data operations ---

    /// Stores `key`. Requires [`Access::Write`].
    ///
    /// # Errors
    ///
    /// [`AuthError::AccessDenied`] when the active client cannot write.
    pub fn set(&self, key: &str, data: Value, ttl: Ttl) -> Result<(), AuthError> {
        if !self.authorize(Access::Write) {
            return Err(AuthError::AccessDenied);
        }
        self.data.set(key, data, ttl);
        Ok(())
    }

    /// Reads `key`. Requires [`Access::Read`].
    ///
    /// # Errors
    ///
    /// [`AuthError::AccessDenied`] when the active client cannot read.
    pub fn get(&self, key: &str) -> Result<Option<Value>, AuthError> {
        if !self.authorize(Access::Read) {
            return Err(AuthError::AccessDenied);
        }
        Ok(self.data.get(key))
    }

    /// Deletes `key`, returning the removed value. Requires
    /// [`Access::Write`].
    ///
    /// # Errors
    ///
    /// [`AuthError::AccessDenied`] when the active client cannot write.
    pub fn delete(&self, key: &str) -> Result<Option<Value>, AuthError> {
        if !self.authorize(Access::Write) {
            return Err(AuthError::AccessDenied);
        }
        Ok(self.data.delete(key))
    }

    /// Clears the data store. Requires [`Access::Wipe`].
    ///
    /// # Errors
    ///
    /// [`AuthError::AccessDenied`] when the active client cannot wipe.
    pub fn wipe(&self) -> Result<(), AuthError> {
        if !self.authorize(Access::Wipe) {
            return Err(AuthError::AccessDenied);
        }
        self.data.wipe();
        Ok(())
    }

    /// The data store's default TTL, applied when a SET carries none.
    #[must_use]
    pub fn default_ttl(&self) -> Ttl {
        self.data.default_ttl()
    }

    // --- Active client operations ---

    /// Replaces the active client with the catalog record for `username`.
    ///
    /// # Errors
    ///
    /// [`AuthError::InvalidCredentials`] when the user is unknown (or its
    /// record is malformed) or the password does not match.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<(), AuthError> {
        let user = self
            .users
            .find(username)
            .ok_or(AuthError::InvalidCredentials)?;
        if user.password != password {
            return Err(AuthError::InvalidCredentials);
        }

        self.change_active_client(user.into());
        Ok(())
    }

    /// Creates or overwrites a user. Requires [`Access::ModifyUser`].
    ///
    /// The new record always starts with an empty subscription set; the
    /// data store is never touched.
    ///
    /// # Errors
    ///
    /// [`AuthError::AccessDenied`] without the required level,
    /// [`AuthError::InvalidAccess`] when `access` is outside `0..=5`.
    pub fn register_user(&self, username: &str, password: &str, access: u64) -> Result<(), AuthError> {
        if !self.authorize(Access::ModifyUser) {
            return Err(AuthError::AccessDenied);
        }
        let access = Access::try_from(access)?;

        self.users.insert(&User::new(
            username,
            password,
            access,
            super::events::Subscriptions::new(),
        ));
        Ok(())
    }

    /// Subscribes the active client to `event`. Requires [`Access::Admin`].
    ///
    /// A duplicate subscription is a no-op. The updated record is written
    /// back to the catalog so subscriptions survive reconnects.
    ///
    /// # Errors
    ///
    /// [`AuthError::AccessDenied`] without admin access,
    /// [`AuthError::InvalidEvent`] for an unknown event name.
    pub fn ping(&self, event: &str) -> Result<(), AuthError> {
        self.update_subscriptions(event, |subs, op| {
            subs.insert(op);
        })
    }

    /// Unsubscribes the active client from `event`. Requires
    /// [`Access::Admin`]. Persists like [`SecureStore::ping`].
    ///
    /// # Errors
    ///
    /// [`AuthError::AccessDenied`] without admin access,
    /// [`AuthError::InvalidEvent`] for an unknown event name.
    pub fn unping(&self, event: &str) -> Result<(), AuthError> {
        self.update_subscriptions(event, |subs, op| {
            subs.remove(&op);
        })
    }

    fn update_subscriptions(
        &self,
        event: &str,
        apply: impl FnOnce(&mut super::events::Subscriptions, Op),
    ) -> Result<(), AuthError> {
        if !self.authorize(Access::Admin) {
            return Err(AuthError::AccessDenied);
        }
        let op: Op = event.parse()?;

        let user = {
            let mut active = self.active.write();
            apply(&mut active.subscriptions, op);
            active.to_user()
        };
        self.users.insert(&user);
        Ok(())
    }

    /// Whether the active client's level covers `required`.
    #[must_use]
    pub fn authorize(&self, required: Access) -> bool {
        self.active.read().access >= required
    }

    /// Whether the active client is subscribed to `op`.
    #[must_use]
    pub fn is_subscribed(&self, op: Op) -> bool {
        self.active.read().subscriptions.contains(&op)
    }

    /// Replaces the whole active-client state.
    pub fn change_active_client(&self, client: ActiveClient) {
        *self.active.write() = client;
    }

    /// Snapshot of the active-client state.
    #[must_use]
    pub fn active_client(&self) -> ActiveClient {
        self.active.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::super::events::Subscriptions;
    use super::*;
    use crate::store::StoreConfig;

    struct Fixture {
        secure: SecureStore,
        data: Store,
        users: UserCatalog,
    }

    fn fixture() -> Fixture {
        let data = Store::open(StoreConfig::default()).unwrap();
        let users = UserCatalog::new(Store::open(StoreConfig::default()).unwrap());
        users.ensure_admin("admin", "pass");

        Fixture {
            secure: SecureStore::new(data.clone(), users.clone()),
            data,
            users,
        }
    }

    fn as_level(secure: &SecureStore, access: Access) {
        secure.change_active_client(ActiveClient {
            username: "test".to_string(),
            password: "test".to_string(),
            access,
            subscriptions: Subscriptions::new(),
        });
    }

    #[tokio::test]
    async fn initial_state_is_unauthenticated() {
        let f = fixture();
        assert_eq!(f.secure.active_client(), ActiveClient::default());
        assert_eq!(f.secure.get("k"), Err(AuthError::AccessDenied));
    }

    #[tokio::test]
    async fn authorization_follows_the_access_ordering() {
        let f = fixture();
        let levels = [
            Access::None,
            Access::Read,
            Access::Write,
            Access::ModifyUser,
            Access::Wipe,
            Access::Admin,
        ];

        for level in levels {
            as_level(&f.secure, level);

            assert_eq!(f.secure.get("k").is_ok(), level >= Access::Read, "{level:?} get");
            assert_eq!(
                f.secure.set("k", Value::Number(1.0), None).is_ok(),
                level >= Access::Write,
                "{level:?} set"
            );
            assert_eq!(
                f.secure.delete("k").is_ok(),
                level >= Access::Write,
                "{level:?} del"
            );
            assert_eq!(f.secure.wipe().is_ok(), level >= Access::Wipe, "{level:?} wipe");
            assert_eq!(
                f.secure.register_user("u", "p", 1).is_ok(),
                level >= Access::ModifyUser,
                "{level:?} reguser"
            );
            assert_eq!(
                f.secure.ping("get").is_ok(),
                level >= Access::Admin,
                "{level:?} ping"
            );
        }
    }

    #[tokio::test]
    async fn denied_operations_do_not_touch_the_stores() {
        let f = fixture();
        as_level(&f.secure, Access::None);

        assert_eq!(f.secure.set("k", Value::Number(1.0), None), Err(AuthError::AccessDenied));
        assert_eq!(
            f.secure.register_user("u", "p", 1),
            Err(AuthError::AccessDenied)
        );

        assert!(f.data.is_empty());
        assert!(f.users.find("u").is_none());
    }

    #[tokio::test]
    async fn denied_operation_leaves_active_client_unchanged() {
        let f = fixture();
        f.secure.authenticate("admin", "pass").unwrap();
        as_level(&f.secure, Access::Read);
        let before = f.secure.active_client();

        assert!(f.secure.wipe().is_err());
        assert_eq!(f.secure.active_client(), before);
    }

    #[tokio::test]
    async fn authenticate_with_valid_credentials() {
        let f = fixture();
        f.secure.authenticate("admin", "pass").unwrap();

        let active = f.secure.active_client();
        assert_eq!(active.username, "admin");
        assert_eq!(active.access, Access::Admin);
    }

    #[tokio::test]
    async fn authenticate_rejects_bad_credentials() {
        let f = fixture();
        assert_eq!(
            f.secure.authenticate("admin", "wrong"),
            Err(AuthError::InvalidCredentials)
        );
        assert_eq!(
            f.secure.authenticate("ghost", "pass"),
            Err(AuthError::InvalidCredentials)
        );
        // Still unauthenticated afterwards.
        assert_eq!(f.secure.active_client().access, Access::None);
    }

    #[tokio::test]
    async fn reauthentication_switches_identity() {
        let f = fixture();
        f.secure.authenticate("admin", "pass").unwrap();
        f.secure.register_user("reader", "r", 1).unwrap();

        f.secure.authenticate("reader", "r").unwrap();
        let active = f.secure.active_client();
        assert_eq!(active.username, "reader");
        assert_eq!(active.access, Access::Read);
        assert_eq!(f.secure.set("k", Value::Null, None), Err(AuthError::AccessDenied));
    }

    #[tokio::test]
    async fn register_user_validates_access_level() {
        let f = fixture();
        f.secure.authenticate("admin", "pass").unwrap();

        assert_eq!(
            f.secure.register_user("u", "p", 6),
            Err(AuthError::InvalidAccess)
        );
        assert!(f.users.find("u").is_none());

        f.secure.register_user("u", "p", 5).unwrap();
        assert_eq!(f.users.find("u").unwrap().access, Access::Admin);
    }

    #[tokio::test]
    async fn register_user_overwrites_and_clears_subscriptions() {
        let f = fixture();
        f.secure.authenticate("admin", "pass").unwrap();
        f.secure.ping("get").unwrap();

        // Re-registering the same username resets the record.
        f.secure.register_user("admin", "pass2", 5).unwrap();
        let record = f.users.find("admin").unwrap();
        assert_eq!(record.password, "pass2");
        assert!(record.subscriptions.is_empty());
    }

    #[tokio::test]
    async fn ping_subscribes_and_persists() {
        let f = fixture();
        f.secure.authenticate("admin", "pass").unwrap();

        f.secure.ping("set").unwrap();
        assert!(f.secure.is_subscribed(Op::Set));
        assert!(!f.secure.is_subscribed(Op::Get));

        // Duplicate subscription is a no-op.
        f.secure.ping("SET").unwrap();
        let record = f.users.find("admin").unwrap();
        assert_eq!(record.subscriptions.len(), 1);
    }

    #[tokio::test]
    async fn ping_rejects_unknown_events() {
        let f = fixture();
        f.secure.authenticate("admin", "pass").unwrap();
        assert_eq!(f.secure.ping("flush"), Err(AuthError::InvalidEvent));
    }

    #[tokio::test]
    async fn unping_unsubscribes_and_persists() {
        let f = fixture();
        f.secure.authenticate("admin", "pass").unwrap();
        f.secure.ping("del").unwrap();
        assert!(f.secure.is_subscribed(Op::Del));

        f.secure.unping("del").unwrap();
        assert!(!f.secure.is_subscribed(Op::Del));
        assert!(f.users.find("admin").unwrap().subscriptions.is_empty());

        // Unsubscribing an absent event is a no-op, not an error.
        f.secure.unping("del").unwrap();
    }

    #[tokio::test]
    async fn subscriptions_survive_reconnect() {
        let f = fixture();
        f.secure.authenticate("admin", "pass").unwrap();
        f.secure.ping("wipe").unwrap();

        // A fresh facade over the same stores models a new connection.
        let reconnect = SecureStore::new(f.data.clone(), f.users.clone());
        assert!(!reconnect.is_subscribed(Op::Wipe));
        reconnect.authenticate("admin", "pass").unwrap();
        assert!(reconnect.is_subscribed(Op::Wipe));
    }

    #[tokio::test]
    async fn data_operations_flow_through_to_the_store() {
        let f = fixture();
        f.secure.authenticate("admin", "pass").unwrap();

        f.secure.set("k", Value::String("v".to_string()), None).unwrap();
        assert_eq!(
            f.secure.get("k").unwrap(),
            Some(Value::String("v".to_string()))
        );
        assert_eq!(
            f.secure.delete("k").unwrap(),
            Some(Value::String("v".to_string()))
        );
        assert_eq!(f.secure.get("k").unwrap(), None);

        f.secure.set("a", Value::Number(1.0), None).unwrap();
        f.secure.wipe().unwrap();
        assert!(f.data.is_empty());
    }
}
