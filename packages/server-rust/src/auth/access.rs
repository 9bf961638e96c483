//! Access levels.

use super::AuthError;

/// Totally ordered permission levels. A client may perform an operation iff
/// its level is `>=` the operation's required level, so higher levels
/// subsume everything below them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Access {
    /// No permissions at all. The state of an unauthenticated connection.
    #[default]
    None = 0,
    /// May read values.
    Read = 1,
    /// May write and delete values.
    Write = 2,
    /// May create and overwrite users.
    ModifyUser = 3,
    /// May wipe the whole data store.
    Wipe = 4,
    /// May do everything, including event subscriptions.
    Admin = 5,
}

impl Access {
    /// The numeric level as persisted in the user catalog.
    #[must_use]
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u64> for Access {
    type Error = AuthError;

    fn try_from(level: u64) -> Result<Self, Self::Error> {
        match level {
            0 => Ok(Access::None),
            1 => Ok(Access::Read),
            2 => Ok(Access::Write),
            3 => Ok(Access::ModifyUser),
            4 => Ok(Access::Wipe),
            5 => Ok(Access::Admin),
            _ => Err(AuthError::InvalidAccess),
        }
    }
}
