//! RapidoDB core -- the runtime value model and the RQL front-end.
//!
//! This crate is the protocol layer shared by the server and by tooling:
//!
//! - **Types** ([`types`]): the [`Value`] union stored under every key,
//!   JSON-compatible for snapshots and Go-`%v`-style for replies
//! - **RQL** ([`rql`]): tokenizer, recursive-descent parser, and statement
//!   AST for the line-oriented query language
//!
//! Nothing in here performs I/O or holds locks.

pub mod rql;
pub mod types;

pub use rql::{
    lex, parse, Keyword, LexError, Location, ParseError, RqlError, Statement, Symbol, Token,
    TokenKind,
};
pub use types::Value;

#[cfg(test)]
mod tests {
    #[test]
    fn crate_loads() {
        // Empty body: if this test runs, the crate compiles and loads.
    }

    #[test]
    fn re_exports_accessible_from_crate_root() {
        let _value = crate::Value::Null;
        let _tokens = crate::lex("wipe;").unwrap();
        let _ast = crate::parse("wipe;").unwrap();
    }
}
