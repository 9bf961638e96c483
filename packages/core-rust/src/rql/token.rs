//! Token types produced by the RQL lexer.

use std::fmt;

/// Position of a token's first character in the source text.
///
/// Lines and columns are zero-based; a newline resets the column and
/// advances the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    /// Zero-based line number.
    pub line: u32,
    /// Zero-based column number.
    pub col: u32,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {} col {}", self.line, self.col)
    }
}

/// Reserved words of RQL.
///
/// Keywords are matched case-insensitively by longest prefix; the token text
/// is always the lowercase canonical form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Auth,
    Get,
    Set,
    Del,
    Wipe,
    RegUser,
    Ping,
    On,
    Off,
    If,
    And,
    Or,
    ExpireIn,
}

impl Keyword {
    /// Every keyword, in no particular order.
    pub const ALL: [Keyword; 13] = [
        Keyword::Auth,
        Keyword::Get,
        Keyword::Set,
        Keyword::Del,
        Keyword::Wipe,
        Keyword::RegUser,
        Keyword::Ping,
        Keyword::On,
        Keyword::Off,
        Keyword::If,
        Keyword::And,
        Keyword::Or,
        Keyword::ExpireIn,
    ];

    /// Lowercase canonical spelling.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::Auth => "auth",
            Keyword::Get => "get",
            Keyword::Set => "set",
            Keyword::Del => "del",
            Keyword::Wipe => "wipe",
            Keyword::RegUser => "reguser",
            Keyword::Ping => "ping",
            Keyword::On => "on",
            Keyword::Off => "off",
            Keyword::If => "if",
            Keyword::And => "and",
            Keyword::Or => "or",
            Keyword::ExpireIn => "expirein",
        }
    }
}

/// Punctuation recognized by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    Semicolon,
    Comma,
    LeftParen,
    RightParen,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    Asterisk,
}

impl Symbol {
    /// Every symbol. Multi-character symbols precede their single-character
    /// prefixes so longest-match has both available.
    pub const ALL: [Symbol; 11] = [
        Symbol::Semicolon,
        Symbol::Comma,
        Symbol::LeftParen,
        Symbol::RightParen,
        Symbol::Eq,
        Symbol::Neq,
        Symbol::Lte,
        Symbol::Gte,
        Symbol::Lt,
        Symbol::Gt,
        Symbol::Asterisk,
    ];

    /// Literal spelling.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Symbol::Semicolon => ";",
            Symbol::Comma => ",",
            Symbol::LeftParen => "(",
            Symbol::RightParen => ")",
            Symbol::Eq => "==",
            Symbol::Neq => "!=",
            Symbol::Lt => "<",
            Symbol::Lte => "<=",
            Symbol::Gt => ">",
            Symbol::Gte => ">=",
            Symbol::Asterisk => "*",
        }
    }
}

/// Classification of a lexed token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// A reserved word ([`Keyword`]).
    Keyword,
    /// Punctuation ([`Symbol`]).
    Symbol,
    /// A bare name: `[A-Za-z][A-Za-z0-9_$]*`, case preserved.
    Identifier,
    /// A `"`-delimited string literal (delimiters stripped).
    String,
    /// A numeric literal; always parses as `f64`.
    Number,
    /// `true` or `false`.
    Bool,
}

/// One lexed token with the location of its first character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// What kind of token this is.
    pub kind: TokenKind,
    /// The token's text. Keywords are lowercase; string literals carry the
    /// unquoted contents; identifiers preserve source case.
    pub text: String,
    /// Where the token started in the source.
    pub location: Location,
}

impl Token {
    /// Returns `true` if this token is the given keyword.
    #[must_use]
    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        self.kind == TokenKind::Keyword && self.text == keyword.as_str()
    }

    /// Returns `true` if this token is the given symbol.
    #[must_use]
    pub fn is_symbol(&self, symbol: Symbol) -> bool {
        self.kind == TokenKind::Symbol && self.text == symbol.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_display() {
        let loc = Location { line: 2, col: 17 };
        assert_eq!(loc.to_string(), "line 2 col 17");
    }

    #[test]
    fn keyword_spellings_are_lowercase() {
        for keyword in Keyword::ALL {
            let s = keyword.as_str();
            assert_eq!(s, s.to_lowercase());
        }
    }

    #[test]
    fn token_keyword_match() {
        let token = Token {
            kind: TokenKind::Keyword,
            text: "auth".to_string(),
            location: Location::default(),
        };
        assert!(token.is_keyword(Keyword::Auth));
        assert!(!token.is_keyword(Keyword::Get));
        assert!(!token.is_symbol(Symbol::Semicolon));
    }

    #[test]
    fn token_symbol_match() {
        let token = Token {
            kind: TokenKind::Symbol,
            text: ";".to_string(),
            location: Location::default(),
        };
        assert!(token.is_symbol(Symbol::Semicolon));
        assert!(!token.is_symbol(Symbol::Comma));
    }
}
