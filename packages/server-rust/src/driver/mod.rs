//! The RQL driver: executes parsed statements against the observed store.
//!
//! One driver per connection, fed one source line at a time by the
//! transport. Statements execute in order; the first failure stops the
//! batch and is returned alongside the replies accumulated so far, which
//! the transport writes before the `ERR:` line.

use std::time::Duration;

use rapido_core::rql::{parse, RqlError, Statement};
use rapido_core::Value;
use thiserror::Error;

use crate::auth::AuthError;
use crate::observer::ObservedStore;
use crate::store::Ttl;

/// Anything a statement batch can fail with. The `Display` form is what the
/// client sees after `ERR: `.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Rql(#[from] RqlError),
    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Translates RQL source into store operations and replies.
pub struct Driver {
    store: ObservedStore,
}

impl Driver {
    /// Wraps the connection's observed store.
    #[must_use]
    pub fn new(store: ObservedStore) -> Self {
        Self { store }
    }

    /// Executes every statement in `src`, returning one reply per completed
    /// statement and the error that stopped the batch, if any.
    ///
    /// A lex or parse failure yields no replies at all.
    pub fn operate(&self, src: &str) -> (Vec<String>, Option<DriverError>) {
        let statements = match parse(src) {
            Ok(statements) => statements,
            Err(err) => return (Vec::new(), Some(err.into())),
        };

        let mut replies = Vec::with_capacity(statements.len());
        for statement in &statements {
            match self.execute(statement) {
                Ok(reply) => replies.push(reply),
                Err(err) => return (replies, Some(err)),
            }
        }

        (replies, None)
    }

    fn execute(&self, statement: &Statement) -> Result<String, DriverError> {
        match statement {
            Statement::Set { key, value, ttl_ms } => {
                let ttl = self.resolve_ttl(*ttl_ms);
                self.store.set(key, value.clone(), ttl)?;
                Ok("Success".to_string())
            }
            Statement::Get { keys } => {
                let values = keys
                    .iter()
                    .map(|key| Ok(self.store.get(key)?.unwrap_or(Value::Null)))
                    .collect::<Result<Vec<_>, DriverError>>()?;
                Ok(Value::Seq(values).to_string())
            }
            Statement::Del { keys } => {
                let values = keys
                    .iter()
                    .map(|key| Ok(self.store.delete(key)?.unwrap_or(Value::Null)))
                    .collect::<Result<Vec<_>, DriverError>>()?;
                Ok(Value::Seq(values).to_string())
            }
            Statement::Wipe => {
                self.store.wipe()?;
                Ok("Success".to_string())
            }
            Statement::Auth { username, password } => {
                self.store.authenticate(username, password)?;
                Ok("Successfully Authenticated".to_string())
            }
            Statement::RegUser {
                username,
                password,
                access,
            } => {
                self.store.register_user(username, password, *access)?;
                Ok(format!("Created user {username}"))
            }
            Statement::Ping { op, on } => {
                if *on {
                    self.store.ping(op)?;
                } else {
                    self.store.unping(op)?;
                }
                Ok("Success".to_string())
            }
        }
    }

    /// A statement without a TTL defers to the store default.
    fn resolve_ttl(&self, ttl_ms: u64) -> Ttl {
        if ttl_ms == 0 {
            self.store.default_ttl()
        } else {
            Some(Duration::from_millis(ttl_ms))
        }
    }
}
