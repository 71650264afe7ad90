//! Tokens of the `.cram` schema language.

use std::fmt;

/// A source position.
///
/// `line` and `column` are 1-based; columns count characters, not bytes.
/// `offset` is the byte offset into the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Reserved words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Package,
    Import,
    As,
    Message,
    Enum,
    Interface,
    Option,
    Required,
    Repeated,
    Optional,
    Map,
    True,
    False,
    Deprecated,
}

impl Keyword {
    pub fn from_ident(ident: &str) -> Option<Keyword> {
        Some(match ident {
            "package" => Keyword::Package,
            "import" => Keyword::Import,
            "as" => Keyword::As,
            "message" => Keyword::Message,
            "enum" => Keyword::Enum,
            "interface" => Keyword::Interface,
            "option" => Keyword::Option,
            "required" => Keyword::Required,
            "repeated" => Keyword::Repeated,
            "optional" => Keyword::Optional,
            "map" => Keyword::Map,
            "true" => Keyword::True,
            "false" => Keyword::False,
            "deprecated" => Keyword::Deprecated,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::Package => "package",
            Keyword::Import => "import",
            Keyword::As => "as",
            Keyword::Message => "message",
            Keyword::Enum => "enum",
            Keyword::Interface => "interface",
            Keyword::Option => "option",
            Keyword::Required => "required",
            Keyword::Repeated => "repeated",
            Keyword::Optional => "optional",
            Keyword::Map => "map",
            Keyword::True => "true",
            Keyword::False => "false",
            Keyword::Deprecated => "deprecated",
        }
    }
}

/// One lexed token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Int(u64),
    Float(f64),
    Str(String),
    Keyword(Keyword),
    /// One of `{ } ( ) [ ] ; : , = . * @`.
    Punct(char),
    /// A `//` comment (text without the slashes).
    LineComment(String),
    /// A `///` comment (text without the slashes).
    DocComment(String),
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Ident(name) => write!(f, "identifier '{name}'"),
            TokenKind::Int(value) => write!(f, "integer '{value}'"),
            TokenKind::Float(value) => write!(f, "float '{value}'"),
            TokenKind::Str(value) => write!(f, "string {value:?}"),
            TokenKind::Keyword(keyword) => write!(f, "'{}'", keyword.as_str()),
            TokenKind::Punct(ch) => write!(f, "'{ch}'"),
            TokenKind::LineComment(_) => write!(f, "comment"),
            TokenKind::DocComment(_) => write!(f, "doc comment"),
            TokenKind::Eof => write!(f, "end of file"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}
