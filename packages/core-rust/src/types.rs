//! Runtime value model shared by the store, the RQL driver, and snapshots.
//!
//! [`Value`] is the unit of data a client stores under a key. It is an
//! untagged serde enum, so snapshot files carry plain JSON (`null`, `true`,
//! `42`, `"hi"`, arrays, objects) and every kind survives a save/load cycle.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single stored value.
///
/// `Display` renders the form clients see in query replies and event pushes:
/// `Null` prints `<nil>`, integral numbers print without a decimal point,
/// strings print bare (no quotes), sequences print space-separated inside
/// brackets, and maps print `map[key:value ...]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Absent or explicitly null data.
    Null,
    /// Boolean flag.
    Bool(bool),
    /// Numeric data. All RQL numerics are doubles.
    Number(f64),
    /// Text data.
    String(String),
    /// Ordered sequence of values.
    Seq(Vec<Value>),
    /// String-keyed mapping. `BTreeMap` keeps snapshot output deterministic.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Borrows the inner string, if this is a [`Value::String`].
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the inner number, if this is a [`Value::Number`].
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Borrows the inner map, if this is a [`Value::Map`].
    #[must_use]
    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Borrows the inner sequence, if this is a [`Value::Seq`].
    #[must_use]
    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Value::Seq(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

/// Formats a number the way replies expect: integral values print without
/// a trailing `.0`, everything else uses the shortest float representation.
fn fmt_number(f: &mut fmt::Formatter<'_>, n: f64) -> fmt::Result {
    // i64 covers every integral double below 2^53 losslessly.
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        #[allow(clippy::cast_possible_truncation)]
        return write!(f, "{}", n as i64);
    }
    write!(f, "{n}")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("<nil>"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => fmt_number(f, *n),
            Value::String(s) => f.write_str(s),
            Value::Seq(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Map(entries) => {
                f.write_str("map[")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{key}:{value}")?;
                }
                f.write_str("]")
            }
        }
    }
}
