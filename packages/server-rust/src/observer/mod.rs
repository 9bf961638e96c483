//! Mutation observation and event gating.
//!
//! [`ObservedStore`] is a thin layer over [`SecureStore`] that publishes a
//! [`DataEvent`] to the global bus after every data operation, whether or
//! not the operation was authorized; the payload carries whatever the call
//! returned. A per-connection dispatcher task multiplexes the four `op_*`
//! topics and republishes the events the connection's active client has
//! subscribed to onto a private bus under [`topics::VERIFIED_EVENT`], which
//! is the transport's push hook.

use std::sync::Arc;

use rapido_core::Value;
use tokio::sync::watch;

use crate::auth::{AuthError, Op, SecureStore};
use crate::bus::{DataEvent, EventBus};
use crate::store::Ttl;

/// Fixed topic names on the global and private buses.
pub mod topics {
    /// Published after every get.
    pub const OP_GET: &str = "op_get";
    /// Published after every set.
    pub const OP_SET: &str = "op_set";
    /// Published after every delete.
    pub const OP_DEL: &str = "op_del";
    /// Published after every wipe.
    pub const OP_WIPE: &str = "op_wipe";
    /// Private-bus topic carrying only the events the active client has
    /// subscribed to.
    pub const VERIFIED_EVENT: &str = "verified_event";
}

/// Capacity of the dispatcher's fan-in channel.
const DISPATCH_CAPACITY: usize = 64;

/// The subscribable operation behind an `op_*` topic.
#[must_use]
pub fn op_for_topic(topic: &str) -> Option<Op> {
    match topic {
        topics::OP_GET => Some(Op::Get),
        topics::OP_SET => Some(Op::Set),
        topics::OP_DEL => Some(Op::Del),
        topics::OP_WIPE => Some(Op::Wipe),
        _ => None,
    }
}

/// The `op_*` topic an operation publishes under.
#[must_use]
pub fn topic_for_op(op: Op) -> &'static str {
    match op {
        Op::Get => topics::OP_GET,
        Op::Set => topics::OP_SET,
        Op::Del => topics::OP_DEL,
        Op::Wipe => topics::OP_WIPE,
    }
}

/// [`SecureStore`] facade that publishes an event after every data
/// operation and runs the per-connection verified-event dispatcher.
///
/// One instance per connection, owned by the driver. Dropping it stops the
/// dispatcher.
pub struct ObservedStore {
    secure: Arc<SecureStore>,
    bus: Arc<EventBus>,
    private: Arc<EventBus>,
    shutdown: watch::Sender<bool>,
}

impl ObservedStore {
    /// Wraps `secure`, publishing to `bus`, and spawns the dispatcher task
    /// feeding this connection's private bus. Must be called from within a
    /// tokio runtime.
    #[must_use]
    pub fn new(secure: Arc<SecureStore>, bus: Arc<EventBus>) -> Self {
        let private = Arc::new(EventBus::new());
        let (shutdown, shutdown_rx) = watch::channel(false);

        let mut mux = bus.multiplex(
            DISPATCH_CAPACITY,
            &[topics::OP_GET, topics::OP_SET, topics::OP_DEL, topics::OP_WIPE],
        );
        let dispatcher_secure = Arc::clone(&secure);
        let dispatcher_private = Arc::clone(&private);

        tokio::spawn(async move {
            let mut shutdown_rx = shutdown_rx;
            loop {
                tokio::select! {
                    event = mux.recv() => {
                        let Some(event) = event else { break };
                        let Some(op) = op_for_topic(&event.topic) else { continue };
                        if dispatcher_secure.is_subscribed(op) {
                            dispatcher_private.publish(topics::VERIFIED_EVENT, &event);
                        }
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
        });

        Self {
            secure,
            bus,
            private,
            shutdown,
        }
    }

    /// The private bus carrying this connection's verified events.
    #[must_use]
    pub fn private_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.private)
    }

    // --- Observed data operations ---

    /// Sets `key`, then publishes the input value under `op_set`.
    ///
    /// # Errors
    ///
    /// Propagates the underlying [`SecureStore::set`] error; the event is
    /// published either way.
    pub fn set(&self, key: &str, value: Value, ttl: Ttl) -> Result<(), AuthError> {
        let result = self.secure.set(key, value.clone(), ttl);
        self.bus
            .publish(topics::OP_SET, &DataEvent::new(topics::OP_SET, key, value));
        result
    }

    /// Gets `key`, then publishes the returned value (or `Null`) under
    /// `op_get`.
    ///
    /// # Errors
    ///
    /// Propagates the underlying [`SecureStore::get`] error; the event is
    /// published either way.
    pub fn get(&self, key: &str) -> Result<Option<Value>, AuthError> {
        let result = self.secure.get(key);
        let payload = match &result {
            Ok(Some(value)) => value.clone(),
            _ => Value::Null,
        };
        self.bus
            .publish(topics::OP_GET, &DataEvent::new(topics::OP_GET, key, payload));
        result
    }

    /// Deletes `key`, then publishes the removed value (or `Null`) under
    /// `op_del`.
    ///
    /// # Errors
    ///
    /// Propagates the underlying [`SecureStore::delete`] error; the event
    /// is published either way.
    pub fn delete(&self, key: &str) -> Result<Option<Value>, AuthError> {
        let result = self.secure.delete(key);
        let payload = match &result {
            Ok(Some(value)) => value.clone(),
            _ => Value::Null,
        };
        self.bus
            .publish(topics::OP_DEL, &DataEvent::new(topics::OP_DEL, key, payload));
        result
    }

    /// Wipes the store, then publishes `true` under key `"wipe"`.
    ///
    /// # Errors
    ///
    /// Propagates the underlying [`SecureStore::wipe`] error; the event is
    /// published either way.
    pub fn wipe(&self) -> Result<(), AuthError> {
        let result = self.secure.wipe();
        self.bus.publish(
            topics::OP_WIPE,
            &DataEvent::new(topics::OP_WIPE, "wipe", Value::Bool(true)),
        );
        result
    }

    // --- Unobserved pass-throughs to the auth layer ---

    /// See [`SecureStore::authenticate`].
    ///
    /// # Errors
    ///
    /// Propagates [`AuthError::InvalidCredentials`].
    pub fn authenticate(&self, username: &str, password: &str) -> Result<(), AuthError> {
        self.secure.authenticate(username, password)
    }

    /// See [`SecureStore::register_user`].
    ///
    /// # Errors
    ///
    /// Propagates [`AuthError::AccessDenied`] and
    /// [`AuthError::InvalidAccess`].
    pub fn register_user(&self, username: &str, password: &str, access: u64) -> Result<(), AuthError> {
        self.secure.register_user(username, password, access)
    }

    /// See [`SecureStore::ping`].
    ///
    /// # Errors
    ///
    /// Propagates [`AuthError::AccessDenied`] and
    /// [`AuthError::InvalidEvent`].
    pub fn ping(&self, event: &str) -> Result<(), AuthError> {
        self.secure.ping(event)
    }

    /// See [`SecureStore::unping`].
    ///
    /// # Errors
    ///
    /// Propagates [`AuthError::AccessDenied`] and
    /// [`AuthError::InvalidEvent`].
    pub fn unping(&self, event: &str) -> Result<(), AuthError> {
        self.secure.unping(event)
    }

    /// See [`SecureStore::default_ttl`].
    #[must_use]
    pub fn default_ttl(&self) -> Ttl {
        self.secure.default_ttl()
    }
}

impl Drop for ObservedStore {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}
