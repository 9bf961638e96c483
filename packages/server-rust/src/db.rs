//! The composition root: wires stores, buses, and the transport together.
//!
//! Layering per connection, outermost first:
//!
//! ```text
//!   TCP reader/writer            <- transport
//!   RQL lexer | parser | driver  <- translation
//!   ObservedStore                <- observation + event gating
//!   SecureStore                  <- auth
//!   Store (data) / Store (users) <- storage, shared across connections
//! ```
//!
//! [`RapidoDb`] follows the deferred startup lifecycle: [`RapidoDb::new`]
//! restores snapshots and bootstraps the admin user, [`RapidoDb::start`]
//! binds the listener (returning the actual port, useful with port 0), and
//! [`RapidoDb::serve`] accepts connections until its shutdown future
//! resolves.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::info;

use crate::auth::{SecureStore, UserCatalog};
use crate::bus::EventBus;
use crate::driver::Driver;
use crate::network::server::{self, ClientStack, ClientStackFactory};
use crate::network::{ConnectionRegistry, Lifecycle, NetworkConfig};
use crate::observer::{topics, ObservedStore};
use crate::store::{SnapshotConfig, Store, StoreConfig, StoreError};

/// Snapshot file for the data store, under the backup directory.
const DATA_SNAPSHOT: &str = "rapido.db";
/// Snapshot file for the user catalog, under the backup directory.
const USERS_SNAPSHOT: &str = "rapido_user.db";

/// Whole-server configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Listener address and per-connection transport settings.
    pub network: NetworkConfig,
    /// Username of the bootstrap admin, inserted if absent.
    pub admin_username: String,
    /// Password of the bootstrap admin.
    pub admin_password: String,
    /// Directory holding the snapshot files. `None` disables persistence.
    pub backup_dir: Option<PathBuf>,
    /// Cadence of snapshot writes when persistence is enabled.
    pub snapshot_interval: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            admin_username: "admin".to_string(),
            admin_password: "pass".to_string(),
            backup_dir: None,
            snapshot_interval: Duration::from_secs(30),
        }
    }
}

impl DbConfig {
    fn store_config(&self, file: &str) -> StoreConfig {
        let mut config = StoreConfig::default();
        if let Some(dir) = &self.backup_dir {
            let mut snapshot = SnapshotConfig::new(dir.join(file));
            snapshot.interval = self.snapshot_interval;
            config.snapshot = Some(snapshot);
        }
        config
    }
}

/// Builds the per-connection stack over the shared stores and global bus.
struct StackFactory {
    data: Store,
    users: UserCatalog,
    bus: Arc<EventBus>,
    event_capacity: usize,
}

impl ClientStackFactory for StackFactory {
    fn create(&self) -> ClientStack {
        let secure = Arc::new(SecureStore::new(self.data.clone(), self.users.clone()));
        let observed = ObservedStore::new(secure, Arc::clone(&self.bus));
        let events = observed
            .private_bus()
            .subscribe(topics::VERIFIED_EVENT, self.event_capacity);

        ClientStack {
            driver: Driver::new(observed),
            events,
        }
    }
}

/// The assembled server.
pub struct RapidoDb {
    config: DbConfig,
    data: Store,
    users: UserCatalog,
    bus: Arc<EventBus>,
    registry: Arc<ConnectionRegistry>,
    lifecycle: Arc<Lifecycle>,
    listener: Option<TcpListener>,
}

impl RapidoDb {
    /// Opens both stores (restoring their snapshots first) and bootstraps
    /// the admin user if absent.
    ///
    /// Spawns store background tasks, so this must be called from within a
    /// tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when a configured snapshot file exists but
    /// cannot be restored.
    pub fn new(config: DbConfig) -> Result<Self, StoreError> {
        let data = Store::open(config.store_config(DATA_SNAPSHOT))?;
        let users = UserCatalog::new(Store::open(config.store_config(USERS_SNAPSHOT))?);
        users.ensure_admin(&config.admin_username, &config.admin_password);

        Ok(Self {
            config,
            data,
            users,
            bus: Arc::new(EventBus::new()),
            registry: Arc::new(ConnectionRegistry::new()),
            lifecycle: Arc::new(Lifecycle::new()),
            listener: None,
        })
    }

    /// Shared handle to the connection registry.
    #[must_use]
    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Shared handle to the server lifecycle.
    #[must_use]
    pub fn lifecycle(&self) -> Arc<Lifecycle> {
        Arc::clone(&self.lifecycle)
    }

    /// Direct handle to the shared data store.
    #[must_use]
    pub fn data_store(&self) -> Store {
        self.data.clone()
    }

    /// Binds the TCP listener, returning the actual bound port (which may
    /// differ from the configured one when port 0 is used).
    ///
    /// # Errors
    ///
    /// Returns an error when the address cannot be bound, e.g. the port is
    /// in use. This is the server's only fatal startup path.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.network.host, self.config.network.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();

        info!(host = %self.config.network.host, port, "TCP listener bound");

        self.listener = Some(listener);
        Ok(port)
    }

    /// Accepts connections until `signal` resolves, then drains.
    ///
    /// Consumes `self` because the listener moves into the accept loop.
    ///
    /// # Errors
    ///
    /// Propagates fatal accept-loop failures.
    ///
    /// # Panics
    ///
    /// Panics when [`RapidoDb::start`] was not called first.
    pub async fn serve(self, signal: impl std::future::Future<Output = ()> + Send) -> anyhow::Result<()> {
        let listener = self
            .listener
            .expect("start() must be called before serve()");

        let factory = Arc::new(StackFactory {
            data: self.data.clone(),
            users: self.users.clone(),
            bus: Arc::clone(&self.bus),
            event_capacity: self.config.network.connection.event_channel_capacity,
        });

        let result = server::run(
            listener,
            factory,
            self.registry,
            self.lifecycle,
            self.config.network.connection.clone(),
            signal,
        )
        .await;

        // Stop the sweeper/persistor tasks promptly rather than waiting for
        // the last handle to drop.
        self.data.shutdown();

        result
    }
}

/// Reads snapshot paths for a backup directory, mirroring what
/// [`RapidoDb::new`] opens. Exposed for operational tooling and tests.
#[must_use]
pub fn snapshot_paths(backup_dir: &Path) -> (PathBuf, PathBuf) {
    (
        backup_dir.join(DATA_SNAPSHOT),
        backup_dir.join(USERS_SNAPSHOT),
    )
}
