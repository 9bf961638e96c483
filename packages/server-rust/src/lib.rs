//! RapidoDB server -- in-memory key/value database speaking RQL over TCP.
//!
//! The crate is layered the way a connection sees it:
//!
//! - **Store** ([`store`]): concurrent TTL map with background sweeping and
//!   JSON snapshots
//! - **Auth** ([`auth`]): user catalog, access levels, and the
//!   per-connection `SecureStore` facade
//! - **Bus** ([`bus`]): topic -> subscriber event broker
//! - **Observer** ([`observer`]): publishes mutations, gates pushes by the
//!   client's subscriptions
//! - **Driver** ([`driver`]): executes parsed RQL against the stack
//! - **Network** ([`network`]): TCP acceptor, line framing, per-connection
//!   workers, graceful shutdown
//! - **Db** ([`db`]): the composition root tying it all together

pub mod auth;
pub mod bus;
pub mod db;
pub mod driver;
pub mod network;
pub mod observer;
pub mod store;

pub use auth::{Access, AuthError, Op, SecureStore, User, UserCatalog};
pub use bus::{DataEvent, EventBus};
pub use db::{DbConfig, RapidoDb};
pub use driver::{Driver, DriverError};
pub use network::{ConnectionRegistry, Lifecycle, NetworkConfig};
pub use observer::ObservedStore;
pub use store::{SnapshotConfig, Store, StoreConfig, StoreError};
