//! The RQL tokenizer.
//!
//! A cursor advances through the source; at each position the individual
//! lexers are tried in order (keyword, symbol, string, numeric, identifier)
//! and the first that succeeds consumes characters. Whitespace is consumed
//! without producing a token. When every lexer fails the whole scan fails
//! with the location and the last token successfully produced.

use thiserror::Error;

use super::token::{Keyword, Location, Symbol, Token, TokenKind};

/// Error produced when no lexer can make progress.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unable to lex token{hint} at {line} {col}")]
pub struct LexError {
    hint: String,
    line: u32,
    col: u32,
}

impl LexError {
    fn new(last: Option<&Token>, loc: Location) -> Self {
        Self {
            hint: last.map(|t| format!(" after {}", t.text)).unwrap_or_default(),
            line: loc.line,
            col: loc.col,
        }
    }

    /// Where the scan failed.
    #[must_use]
    pub fn location(&self) -> Location {
        Location {
            line: self.line,
            col: self.col,
        }
    }
}

/// Byte offset plus human-readable position, advanced together.
#[derive(Debug, Clone, Copy, Default)]
struct Cursor {
    ptr: usize,
    loc: Location,
}

impl Cursor {
    /// Advances over `n` bytes on the current line.
    fn advance(&mut self, n: usize) {
        self.ptr += n;
        self.loc.col += u32::try_from(n).unwrap_or(u32::MAX);
    }
}

type LexFn = fn(&str, Cursor) -> Option<(Option<Token>, Cursor)>;

/// Splits RQL source into tokens.
///
/// # Errors
///
/// Returns [`LexError`] when a position is reached that no lexer can
/// consume, e.g. an unterminated string literal or a stray character.
pub fn lex(src: &str) -> Result<Vec<Token>, LexError> {
    const LEXERS: [LexFn; 5] = [lex_keyword, lex_symbol, lex_string, lex_numeric, lex_identifier];

    let mut tokens = Vec::new();
    let mut cur = Cursor::default();

    'scan: while cur.ptr < src.len() {
        for lexer in LEXERS {
            if let Some((token, next)) = lexer(src, cur) {
                cur = next;
                if let Some(token) = token {
                    tokens.push(token);
                }
                continue 'scan;
            }
        }
        return Err(LexError::new(tokens.last(), cur.loc));
    }

    Ok(tokens)
}

/// Finds the longest option that case-insensitively prefixes the source at
/// `ptr`. Resolves ambiguities like `on` inside `off`-adjacent input by
/// always preferring the longer spelling.
fn longest_match<'o>(src: &[u8], ptr: usize, options: &[&'o str]) -> Option<&'o str> {
    let rest = &src[ptr..];
    let mut best: Option<&'o str> = None;

    for &option in options {
        let matches = rest.len() >= option.len()
            && rest[..option.len()].eq_ignore_ascii_case(option.as_bytes());
        if matches && best.is_none_or(|b| option.len() > b.len()) {
            best = Some(option);
        }
    }

    best
}

/// Lexes keywords plus the `true`/`false` literals, which share the
/// longest-prefix machinery but yield [`TokenKind::Bool`].
fn lex_keyword(src: &str, ic: Cursor) -> Option<(Option<Token>, Cursor)> {
    let mut options: Vec<&str> = Keyword::ALL.iter().map(|k| k.as_str()).collect();
    options.push("true");
    options.push("false");

    let matched = longest_match(src.as_bytes(), ic.ptr, &options)?;

    let kind = if matched == "true" || matched == "false" {
        TokenKind::Bool
    } else {
        TokenKind::Keyword
    };

    let mut cur = ic;
    cur.advance(matched.len());

    Some((
        Some(Token {
            kind,
            text: matched.to_string(),
            location: ic.loc,
        }),
        cur,
    ))
}

/// Lexes punctuation; also consumes whitespace, which yields no token.
/// A newline resets the column and advances the line.
fn lex_symbol(src: &str, ic: Cursor) -> Option<(Option<Token>, Cursor)> {
    let bytes = src.as_bytes();
    let mut cur = ic;

    match bytes[ic.ptr] {
        b'\n' => {
            cur.ptr += 1;
            cur.loc.line += 1;
            cur.loc.col = 0;
            return Some((None, cur));
        }
        b'\t' | b' ' => {
            cur.advance(1);
            return Some((None, cur));
        }
        _ => {}
    }

    let options: Vec<&str> = Symbol::ALL.iter().map(|s| s.as_str()).collect();
    let matched = longest_match(bytes, ic.ptr, &options)?;

    cur.advance(matched.len());

    Some((
        Some(Token {
            kind: TokenKind::Symbol,
            text: matched.to_string(),
            location: ic.loc,
        }),
        cur,
    ))
}

/// Lexes a `"`-delimited string literal. A `"` immediately followed by `\`
/// embeds a literal `"`; an unterminated literal fails the lexer.
fn lex_string(src: &str, ic: Cursor) -> Option<(Option<Token>, Cursor)> {
    let bytes = src.as_bytes();

    if bytes[ic.ptr] != b'"' {
        return None;
    }

    let mut cur = ic;
    cur.advance(1);
    let mut value = Vec::new();

    while cur.ptr < bytes.len() {
        let ch = bytes[cur.ptr];

        if ch == b'"' {
            if bytes.get(cur.ptr + 1) == Some(&b'\\') {
                value.push(ch);
                cur.advance(2);
                continue;
            }

            cur.advance(1);
            return Some((
                Some(Token {
                    kind: TokenKind::String,
                    text: String::from_utf8_lossy(&value).into_owned(),
                    location: ic.loc,
                }),
                cur,
            ));
        }

        if ch == b'\n' {
            cur.loc.line += 1;
            cur.loc.col = 0;
            cur.ptr += 1;
        } else {
            cur.advance(1);
        }
        value.push(ch);
    }

    None
}

/// Lexes a numeric literal: digits with at most one `.` and at most one
/// `e`/`E` exponent marker, optionally signed. Must begin with a digit or
/// a period.
fn lex_numeric(src: &str, ic: Cursor) -> Option<(Option<Token>, Cursor)> {
    let bytes = src.as_bytes();
    let mut cur = ic;
    let mut period_found = false;
    let mut exp_found = false;

    while cur.ptr < bytes.len() {
        let ch = bytes[cur.ptr];
        let is_digit = ch.is_ascii_digit();
        let is_period = ch == b'.';
        let is_exp = ch == b'e' || ch == b'E';

        if cur.ptr == ic.ptr {
            if !is_digit && !is_period {
                return None;
            }
            period_found = is_period;
            cur.advance(1);
            continue;
        }

        if is_period {
            if period_found {
                return None;
            }
            period_found = true;
            cur.advance(1);
            continue;
        }

        if is_exp {
            if exp_found {
                return None;
            }
            exp_found = true;
            // No period may follow the exponent marker.
            period_found = true;

            // The marker must not end the literal.
            if cur.ptr == bytes.len() - 1 {
                return None;
            }
            let next = bytes[cur.ptr + 1];
            if next == b'+' || next == b'-' {
                cur.advance(1);
            }
            cur.advance(1);
            continue;
        }

        if !is_digit {
            break;
        }
        cur.advance(1);
    }

    if cur.ptr == ic.ptr {
        return None;
    }

    Some((
        Some(Token {
            kind: TokenKind::Number,
            text: src[ic.ptr..cur.ptr].to_string(),
            location: ic.loc,
        }),
        cur,
    ))
}

/// Lexes a bare identifier: an ASCII letter followed by letters, digits,
/// `_` or `$`. Case is preserved.
fn lex_identifier(src: &str, ic: Cursor) -> Option<(Option<Token>, Cursor)> {
    let bytes = src.as_bytes();

    if !bytes[ic.ptr].is_ascii_alphabetic() {
        return None;
    }

    let mut cur = ic;
    cur.advance(1);

    while cur.ptr < bytes.len() {
        let ch = bytes[cur.ptr];
        if ch.is_ascii_alphanumeric() || ch == b'_' || ch == b'$' {
            cur.advance(1);
        } else {
            break;
        }
    }

    Some((
        Some(Token {
            kind: TokenKind::Identifier,
            text: src[ic.ptr..cur.ptr].to_string(),
            location: ic.loc,
        }),
        cur,
    ))
}
