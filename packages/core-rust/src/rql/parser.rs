//! Recursive-descent parser for RQL.
//!
//! Consumes the token stream produced by [`lex`](super::lexer::lex) with one
//! token of lookahead. Each production consumes its trailing `;` and emits
//! one [`Statement`]; an empty source parses to an empty statement list.

use thiserror::Error;

use super::ast::Statement;
use super::lexer::{lex, LexError};
use super::token::{Keyword, Location, Symbol, Token, TokenKind};
use crate::types::Value;

/// Error produced when the token stream does not match the grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Expected {what} at {location}")]
pub struct ParseError {
    what: String,
    location: Location,
}

impl ParseError {
    /// Where the parse failed.
    #[must_use]
    pub fn location(&self) -> Location {
        self.location
    }
}

/// Either phase of query translation failing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RqlError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Lexes and parses an RQL source string into a statement list.
///
/// # Errors
///
/// Returns [`RqlError::Lex`] when tokenization fails and [`RqlError::Parse`]
/// when the token stream does not match the grammar.
pub fn parse(src: &str) -> Result<Vec<Statement>, RqlError> {
    let tokens = lex(src)?;
    let statements = parse_tokens(&tokens)?;
    tracing::trace!(count = statements.len(), "parsed statement batch");
    Ok(statements)
}

/// Parses an already-lexed token stream into a statement list.
///
/// # Errors
///
/// Returns [`ParseError`] when the tokens do not match the grammar.
pub fn parse_tokens(tokens: &[Token]) -> Result<Vec<Statement>, ParseError> {
    let mut parser = Parser { tokens, pos: 0 };
    let mut statements = Vec::new();

    while parser.peek().is_some() {
        statements.push(parser.statement()?);
    }

    Ok(statements)
}

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(token)
    }

    /// Location to report an error at: the current token, or the last token
    /// when the stream ended early.
    fn here(&self) -> Location {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or_else(Location::default, |t| t.location)
    }

    fn expected(&self, what: &str) -> ParseError {
        ParseError {
            what: what.to_string(),
            location: self.here(),
        }
    }

    fn expect_symbol(&mut self, symbol: Symbol) -> Result<(), ParseError> {
        if matches!(self.peek(), Some(token) if token.is_symbol(symbol)) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.expected(symbol.as_str()))
        }
    }

    fn expect_identifier(&mut self, what: &str) -> Result<String, ParseError> {
        match self.peek() {
            Some(token) if token.kind == TokenKind::Identifier => {
                let text = token.text.clone();
                self.pos += 1;
                Ok(text)
            }
            _ => Err(self.expected(what)),
        }
    }

    /// Consumes a numeric token if one is next, yielding its parsed value.
    fn eat_number(&mut self, what: &str) -> Result<Option<f64>, ParseError> {
        match self.peek() {
            Some(token) if token.kind == TokenKind::Number => {
                let parsed = token
                    .text
                    .parse::<f64>()
                    .map_err(|_| self.expected(what))?;
                self.pos += 1;
                Ok(Some(parsed))
            }
            _ => Ok(None),
        }
    }

    fn statement(&mut self) -> Result<Statement, ParseError> {
        let Some(token) = self.peek() else {
            return Err(self.expected("statement"));
        };
        if token.kind != TokenKind::Keyword {
            return Err(self.expected("statement"));
        }
        let keyword = token.text.clone();

        match keyword.as_str() {
            "auth" => self.auth(),
            "reguser" => self.reguser(),
            "set" => self.set(),
            "get" => self.keyed(Keyword::Get),
            "del" => self.keyed(Keyword::Del),
            "wipe" => self.wipe(),
            "ping" => self.ping(),
            _ => Err(self.expected("statement")),
        }
    }

    fn auth(&mut self) -> Result<Statement, ParseError> {
        self.bump();
        let username = self.expect_identifier("username")?;
        let password = self.expect_identifier("password")?;
        self.expect_symbol(Symbol::Semicolon)?;
        Ok(Statement::Auth { username, password })
    }

    fn reguser(&mut self) -> Result<Statement, ParseError> {
        self.bump();
        let username = self.expect_identifier("username")?;
        let password = self.expect_identifier("password")?;
        // A missing access level registers a user with no permissions.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let access = self.eat_number("access level")?.unwrap_or(0.0) as u64;
        self.expect_symbol(Symbol::Semicolon)?;
        Ok(Statement::RegUser {
            username,
            password,
            access,
        })
    }

    fn set(&mut self) -> Result<Statement, ParseError> {
        self.bump();
        let key = self.expect_identifier("key")?;
        let value = self.literal()?;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let ttl_ms = self.eat_number("ttl")?.unwrap_or(0.0) as u64;
        self.expect_symbol(Symbol::Semicolon)?;
        Ok(Statement::Set { key, value, ttl_ms })
    }

    /// Parses the value literal of a SET: a string, a number, or a bool.
    fn literal(&mut self) -> Result<Value, ParseError> {
        let Some(token) = self.peek() else {
            return Err(self.expected("value"));
        };

        let value = match token.kind {
            TokenKind::String => Value::String(token.text.clone()),
            TokenKind::Bool => Value::Bool(token.text == "true"),
            TokenKind::Number => {
                let parsed = token
                    .text
                    .parse::<f64>()
                    .map_err(|_| self.expected("value"))?;
                Value::Number(parsed)
            }
            _ => return Err(self.expected("value")),
        };

        self.pos += 1;
        Ok(value)
    }

    /// Shared production for GET and DEL: one or more keys.
    fn keyed(&mut self, keyword: Keyword) -> Result<Statement, ParseError> {
        self.bump();
        let mut keys = vec![self.expect_identifier("key")?];
        while matches!(self.peek(), Some(t) if t.kind == TokenKind::Identifier) {
            keys.push(self.expect_identifier("key")?);
        }
        self.expect_symbol(Symbol::Semicolon)?;

        Ok(match keyword {
            Keyword::Get => Statement::Get { keys },
            _ => Statement::Del { keys },
        })
    }

    fn wipe(&mut self) -> Result<Statement, ParseError> {
        self.bump();
        self.expect_symbol(Symbol::Semicolon)?;
        Ok(Statement::Wipe)
    }

    fn ping(&mut self) -> Result<Statement, ParseError> {
        self.bump();

        let on = match self.peek() {
            Some(t) if t.is_keyword(Keyword::On) => true,
            Some(t) if t.is_keyword(Keyword::Off) => false,
            _ => return Err(self.expected("ON or OFF")),
        };
        self.pos += 1;

        let op = match self.peek() {
            Some(t)
                if t.is_keyword(Keyword::Get)
                    || t.is_keyword(Keyword::Set)
                    || t.is_keyword(Keyword::Del)
                    || t.is_keyword(Keyword::Wipe) =>
            {
                t.text.clone()
            }
            _ => return Err(self.expected("event name")),
        };
        self.pos += 1;

        self.expect_symbol(Symbol::Semicolon)?;
        Ok(Statement::Ping { op, on })
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn empty_source_parses_to_empty_ast() {
        assert_eq!(parse("").unwrap(), vec![]);
        assert_eq!(parse("   \n\t").unwrap(), vec![]);
    }

    #[test]
    fn auth_statement() {
        assert_eq!(
            parse("AUTH user pass;").unwrap(),
            vec![Statement::Auth {
                username: "user".to_string(),
                password: "pass".to_string(),
            }]
        );
    }

    #[test]
    fn reguser_statement_with_access() {
        assert_eq!(
            parse("REGUSER user pass 5;").unwrap(),
            vec![Statement::RegUser {
                username: "user".to_string(),
                password: "pass".to_string(),
                access: 5,
            }]
        );
    }

    #[test]
    fn reguser_statement_defaults_access_to_zero() {
        assert_eq!(
            parse("REGUSER user pass;").unwrap(),
            vec![Statement::RegUser {
                username: "user".to_string(),
                password: "pass".to_string(),
                access: 0,
            }]
        );
    }

    #[test]
    fn set_statement() {
        assert_eq!(
            parse("SET data \"Hello World\";").unwrap(),
            vec![Statement::Set {
                key: "data".to_string(),
                value: Value::String("Hello World".to_string()),
                ttl_ms: 0,
            }]
        );
    }

    #[test]
    fn set_statement_with_expiry() {
        assert_eq!(
            parse("SET data \"Hello World\" 234;").unwrap(),
            vec![Statement::Set {
                key: "data".to_string(),
                value: Value::String("Hello World".to_string()),
                ttl_ms: 234,
            }]
        );
    }

    #[test]
    fn set_statement_numeric_and_bool_values() {
        assert_eq!(
            parse("SET n 42; SET b true;").unwrap(),
            vec![
                Statement::Set {
                    key: "n".to_string(),
                    value: Value::Number(42.0),
                    ttl_ms: 0,
                },
                Statement::Set {
                    key: "b".to_string(),
                    value: Value::Bool(true),
                    ttl_ms: 0,
                },
            ]
        );
    }

    #[test]
    fn multi_set_statements() {
        assert_eq!(
            parse("SET data \"Hello World\" 234; SET data1 3454 565;").unwrap(),
            vec![
                Statement::Set {
                    key: "data".to_string(),
                    value: Value::String("Hello World".to_string()),
                    ttl_ms: 234,
                },
                Statement::Set {
                    key: "data1".to_string(),
                    value: Value::Number(3454.0),
                    ttl_ms: 565,
                },
            ]
        );
    }

    #[test]
    fn get_statement_many_keys() {
        assert_eq!(
            parse("GET data data1 data2 data3;").unwrap(),
            vec![Statement::Get {
                keys: vec![
                    "data".to_string(),
                    "data1".to_string(),
                    "data2".to_string(),
                    "data3".to_string(),
                ],
            }]
        );
    }

    #[test]
    fn del_statement_many_keys() {
        assert_eq!(
            parse("DEL data data1;").unwrap(),
            vec![Statement::Del {
                keys: vec!["data".to_string(), "data1".to_string()],
            }]
        );
    }

    #[test]
    fn wipe_statement() {
        assert_eq!(parse("WIPE;").unwrap(), vec![Statement::Wipe]);
    }

    #[test]
    fn ping_on_statement() {
        assert_eq!(
            parse("PING ON GET;").unwrap(),
            vec![Statement::Ping {
                op: "get".to_string(),
                on: true,
            }]
        );
    }

    #[test]
    fn ping_off_statement() {
        assert_eq!(
            parse("PING OFF GET;").unwrap(),
            vec![Statement::Ping {
                op: "get".to_string(),
                on: false,
            }]
        );
    }

    #[test]
    fn mixed_statements() {
        let src = "SET data \"Hello World\"; GET data data1; DEL data; WIPE;";
        assert_eq!(
            parse(src).unwrap(),
            vec![
                Statement::Set {
                    key: "data".to_string(),
                    value: Value::String("Hello World".to_string()),
                    ttl_ms: 0,
                },
                Statement::Get {
                    keys: vec!["data".to_string(), "data1".to_string()],
                },
                Statement::Del {
                    keys: vec!["data".to_string()],
                },
                Statement::Wipe,
            ]
        );
    }

    #[test]
    fn error_messages_carry_locations() {
        let err = parse("AUTH user;").unwrap_err();
        assert_eq!(err.to_string(), "Expected password at line 0 col 9");

        let err = parse("GET;").unwrap_err();
        assert_eq!(err.to_string(), "Expected key at line 0 col 3");

        let err = parse("SET k;").unwrap_err();
        assert_eq!(err.to_string(), "Expected value at line 0 col 5");
    }

    #[test]
    fn missing_semicolon_is_an_error() {
        let err = parse("WIPE").unwrap_err();
        assert!(err.to_string().starts_with("Expected ;"));
    }

    #[test]
    fn ping_requires_mode_and_event() {
        assert!(parse("PING GET;").is_err());
        assert!(parse("PING ON IF;").is_err());
        assert!(parse("PING ON;").is_err());
    }

    #[test]
    fn unknown_leading_token_is_an_error() {
        let err = parse("frobnicate k;").unwrap_err();
        assert!(err.to_string().starts_with("Expected statement"));
    }

    #[test]
    fn lex_failures_surface_through_parse() {
        assert!(matches!(parse("get \"oops"), Err(RqlError::Lex(_))));
    }

    // --- Round-trip properties ---

    /// Identifier strategy whose first letter cannot begin any keyword or
    /// bool literal, so rendered statements re-lex unambiguously.
    fn ident() -> impl Strategy<Value = String> {
        "[bchjklmnquvxyz][a-zA-Z0-9_]{0,8}"
    }

    fn literal_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            "[a-zA-Z0-9 _.,!?-]{0,12}".prop_map(Value::String),
            (0u32..1_000_000).prop_map(|n| Value::Number(f64::from(n))),
            (0u32..1_000_000).prop_map(|n| Value::Number(f64::from(n) / 16.0)),
            any::<bool>().prop_map(Value::Bool),
        ]
    }

    fn statement() -> impl Strategy<Value = Statement> {
        prop_oneof![
            (ident(), ident()).prop_map(|(username, password)| Statement::Auth {
                username,
                password,
            }),
            (ident(), ident(), 0u64..=5).prop_map(|(username, password, access)| {
                Statement::RegUser {
                    username,
                    password,
                    access,
                }
            }),
            (ident(), literal_value(), 0u64..1_000_000_000).prop_map(
                |(key, value, ttl_ms)| Statement::Set { key, value, ttl_ms }
            ),
            prop::collection::vec(ident(), 1..4).prop_map(|keys| Statement::Get { keys }),
            prop::collection::vec(ident(), 1..4).prop_map(|keys| Statement::Del { keys }),
            Just(Statement::Wipe),
            (
                prop_oneof![
                    Just("get".to_string()),
                    Just("set".to_string()),
                    Just("del".to_string()),
                    Just("wipe".to_string()),
                ],
                any::<bool>(),
            )
                .prop_map(|(op, on)| Statement::Ping { op, on }),
        ]
    }

    proptest! {
        #[test]
        fn statement_display_reparses_to_equal_ast(stmt in statement()) {
            let rendered = stmt.to_string();
            let reparsed = parse(&rendered).expect("rendered statement should parse");
            prop_assert_eq!(reparsed, vec![stmt]);
        }

        #[test]
        fn token_stream_relexes_identically(stmt in statement()) {
            // Tokenizing a canonical rendering twice is a fixed point.
            let rendered = stmt.to_string();
            let first = super::lex(&rendered).expect("lex rendered");
            let joined = first
                .iter()
                .map(|t| match t.kind {
                    TokenKind::String => format!("\"{}\"", t.text),
                    _ => t.text.clone(),
                })
                .collect::<Vec<_>>()
                .join(" ");
            let second = super::lex(&joined).expect("lex joined");
            let kinds1: Vec<_> = first.iter().map(|t| (t.kind, t.text.clone())).collect();
            let kinds2: Vec<_> = second.iter().map(|t| (t.kind, t.text.clone())).collect();
            prop_assert_eq!(kinds1, kinds2);
        }
    }
}
