//! RQL -- the RapidoDB Query Language.
//!
//! A newline-delimited, semicolon-separated text protocol. This module holds
//! the full translation front-end: [`token`] types, the [`lexer`], the
//! [`ast`], and the [`parser`]. Executing parsed statements is the server
//! driver's job; everything here is pure.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::Statement;
pub use lexer::{lex, LexError};
pub use parser::{parse, parse_tokens, ParseError, RqlError};
pub use token::{Keyword, Location, Symbol, Token, TokenKind};
