//! Persisted user records and their catalog encoding.

use std::collections::BTreeMap;

use rapido_core::Value;
use thiserror::Error;

use super::access::Access;
use super::events::{Op, Subscriptions};

/// A user record could not be reconstituted from its stored form.
///
/// Recoverable by design: callers log it and treat the record as absent, so
/// one corrupt catalog entry can never take the server down.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed user record: {0}")]
pub struct MalformedUser(&'static str);

/// A user of the database.
///
/// Stored inside the user-catalog store as an item whose data is a
/// [`Value::Map`] with fields `Username`, `Password`, `Access` (number) and
/// `Events` (sequence of numbers). Passwords are stored verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub username: String,
    pub password: String,
    pub access: Access,
    pub subscriptions: Subscriptions,
}

impl User {
    /// Creates a user record. Does not persist it anywhere.
    #[must_use]
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        access: Access,
        subscriptions: Subscriptions,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            access,
            subscriptions,
        }
    }

    /// Encodes the record into its catalog [`Value`] form.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut map = BTreeMap::new();
        map.insert(
            "Username".to_string(),
            Value::String(self.username.clone()),
        );
        map.insert(
            "Password".to_string(),
            Value::String(self.password.clone()),
        );
        map.insert(
            "Access".to_string(),
            Value::Number(f64::from(self.access.as_u8())),
        );
        map.insert(
            "Events".to_string(),
            Value::Seq(
                self.subscriptions
                    .iter()
                    .map(|op| Value::Number(f64::from(op.as_u8())))
                    .collect(),
            ),
        );
        Value::Map(map)
    }

    /// Reconstitutes a record from its catalog [`Value`] form.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedUser`] when the value is not a map, a field is
    /// missing or mistyped, or an event code is unknown.
    pub fn from_value(value: &Value) -> Result<Self, MalformedUser> {
        let map = value.as_map().ok_or(MalformedUser("not a map"))?;

        let username = map
            .get("Username")
            .and_then(Value::as_str)
            .ok_or(MalformedUser("missing Username"))?;
        let password = map
            .get("Password")
            .and_then(Value::as_str)
            .ok_or(MalformedUser("missing Password"))?;

        let access = map
            .get("Access")
            .and_then(Value::as_number)
            .ok_or(MalformedUser("missing Access"))?;
        if access < 0.0 || access.fract() != 0.0 {
            return Err(MalformedUser("Access is not an unsigned integer"));
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let access =
            Access::try_from(access as u64).map_err(|_| MalformedUser("Access out of range"))?;

        let events = map
            .get("Events")
            .and_then(Value::as_seq)
            .ok_or(MalformedUser("missing Events"))?;
        let mut subscriptions = Subscriptions::new();
        for event in events {
            let code = event
                .as_number()
                .ok_or(MalformedUser("Events entry is not a number"))?;
            if code < 0.0 || code.fract() != 0.0 {
                return Err(MalformedUser("Events entry is not an unsigned integer"));
            }
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let op = Op::from_code(code as u64).ok_or(MalformedUser("unknown event code"))?;
            subscriptions.insert(op);
        }

        Ok(Self::new(username, password, access, subscriptions))
    }
}
