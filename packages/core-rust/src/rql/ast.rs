//! Statement AST produced by the RQL parser.

use std::fmt;

use crate::types::Value;

/// One parsed RQL statement.
///
/// `Display` renders a canonical source form that re-parses to an equal
/// statement, which the diagnostics and the parser round-trip tests rely on.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `AUTH <username> <password>;`
    Auth {
        username: String,
        password: String,
    },
    /// `REGUSER <username> <password> [access];` -- a missing access level
    /// defaults to 0 (no permissions).
    RegUser {
        username: String,
        password: String,
        access: u64,
    },
    /// `SET <key> <value> [ttl_ms];` -- `ttl_ms == 0` means "store default".
    Set {
        key: String,
        value: Value,
        ttl_ms: u64,
    },
    /// `GET <key>...;`
    Get { keys: Vec<String> },
    /// `DEL <key>...;`
    Del { keys: Vec<String> },
    /// `WIPE;`
    Wipe,
    /// `PING ON|OFF GET|SET|DEL|WIPE;` -- subscribes (`on == true`) or
    /// unsubscribes the active client from a server-side event.
    Ping { op: String, on: bool },
}

/// Renders a value as an RQL literal (strings quoted, everything else as-is).
fn fmt_literal(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::String(s) => write!(f, "\"{s}\""),
        other => write!(f, "{other}"),
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Auth { username, password } => {
                write!(f, "AUTH {username} {password};")
            }
            Statement::RegUser {
                username,
                password,
                access,
            } => write!(f, "REGUSER {username} {password} {access};"),
            Statement::Set { key, value, ttl_ms } => {
                write!(f, "SET {key} ")?;
                fmt_literal(f, value)?;
                if *ttl_ms > 0 {
                    write!(f, " {ttl_ms}")?;
                }
                f.write_str(";")
            }
            Statement::Get { keys } => write!(f, "GET {};", keys.join(" ")),
            Statement::Del { keys } => write!(f, "DEL {};", keys.join(" ")),
            Statement::Wipe => f.write_str("WIPE;"),
            Statement::Ping { op, on } => {
                let mode = if *on { "ON" } else { "OFF" };
                write!(f, "PING {mode} {};", op.to_uppercase())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_forms() {
        let cases = [
            (
                Statement::Auth {
                    username: "admin".to_string(),
                    password: "pass".to_string(),
                },
                "AUTH admin pass;",
            ),
            (
                Statement::RegUser {
                    username: "u".to_string(),
                    password: "p".to_string(),
                    access: 3,
                },
                "REGUSER u p 3;",
            ),
            (
                Statement::Set {
                    key: "k".to_string(),
                    value: Value::String("hello".to_string()),
                    ttl_ms: 0,
                },
                "SET k \"hello\";",
            ),
            (
                Statement::Set {
                    key: "k".to_string(),
                    value: Value::Number(42.0),
                    ttl_ms: 250,
                },
                "SET k 42 250;",
            ),
            (
                Statement::Get {
                    keys: vec!["a".to_string(), "b".to_string()],
                },
                "GET a b;",
            ),
            (
                Statement::Del {
                    keys: vec!["a".to_string()],
                },
                "DEL a;",
            ),
            (Statement::Wipe, "WIPE;"),
            (
                Statement::Ping {
                    op: "get".to_string(),
                    on: true,
                },
                "PING ON GET;",
            ),
            (
                Statement::Ping {
                    op: "set".to_string(),
                    on: false,
                },
                "PING OFF SET;",
            ),
        ];

        for (stmt, expected) in cases {
            assert_eq!(stmt.to_string(), expected);
        }
    }
}
