//! Hand-rolled lexer for `.cram` sources.
//!
//! Identifiers may use any Unicode letter. Columns advance by one per
//! character whatever its byte width; byte offsets are tracked alongside
//! for tooling that slices the source.

use crate::diagnostic::{Diagnostic, Severity};
use crate::token::{Keyword, Span, Token, TokenKind};

const PUNCTUATION: &[char] = &['{', '}', '(', ')', '[', ']', ';', ':', ',', '=', '.', '*', '@'];

struct Lexer<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    line: usize,
    column: usize,
    tokens: Vec<Token>,
    diagnostics: Vec<Diagnostic>,
}

/// Lex `source` into tokens, always ending with `Eof`.
///
/// Malformed input produces a diagnostic and the lexer keeps going, so
/// the parser sees as much of the file as possible.
pub fn lex(source: &str) -> (Vec<Token>, Vec<Diagnostic>) {
    let mut lexer = Lexer {
        source,
        chars: source.char_indices().peekable(),
        line: 1,
        column: 1,
        tokens: Vec::new(),
        diagnostics: Vec::new(),
    };
    lexer.run();
    (lexer.tokens, lexer.diagnostics)
}

impl<'a> Lexer<'a> {
    fn span_at(&self, offset: usize) -> Span {
        Span {
            line: self.line,
            column: self.column,
            offset,
        }
    }

    fn bump(&mut self) -> Option<(usize, char)> {
        let next = self.chars.next();
        if let Some((_, ch)) = next {
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        next
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, ch)| ch)
    }

    fn error(&mut self, span: Span, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity: Severity::Error,
            message: message.into(),
            span,
        });
    }

    fn run(&mut self) {
        while let Some(&(offset, ch)) = self.chars.peek() {
            let span = self.span_at(offset);
            match ch {
                ch if ch.is_whitespace() => {
                    self.bump();
                }
                '/' => self.lex_comment(span),
                '"' => self.lex_string(span),
                ch if ch.is_ascii_digit() => self.lex_number(span),
                ch if ch.is_alphabetic() || ch == '_' => self.lex_ident(span),
                ch if PUNCTUATION.contains(&ch) => {
                    self.bump();
                    self.tokens.push(Token {
                        kind: TokenKind::Punct(ch),
                        span,
                    });
                }
                other => {
                    self.bump();
                    self.error(span, format!("unexpected character '{other}'"));
                }
            }
        }
        let end = self.span_at(self.source.len());
        self.tokens.push(Token {
            kind: TokenKind::Eof,
            span: end,
        });
    }

    fn lex_comment(&mut self, span: Span) {
        self.bump();
        if self.peek() != Some('/') {
            self.error(span, "expected '//' to start a comment");
            return;
        }
        self.bump();
        let doc = self.peek() == Some('/');
        if doc {
            self.bump();
        }

        let mut text = String::new();
        while let Some(ch) = self.peek() {
            if ch == '\n' {
                break;
            }
            text.push(ch);
            self.bump();
        }
        let text = text.strip_prefix(' ').unwrap_or(&text).to_string();
        let kind = if doc {
            TokenKind::DocComment(text)
        } else {
            TokenKind::LineComment(text)
        };
        self.tokens.push(Token { kind, span });
    }

    fn lex_string(&mut self, span: Span) {
        self.bump();
        let mut value = String::new();
        loop {
            let Some(ch) = self.peek() else {
                self.error(span, "unterminated string literal");
                break;
            };
            match ch {
                '"' => {
                    self.bump();
                    break;
                }
                '\n' => {
                    self.error(span, "unterminated string literal");
                    break;
                }
                '\\' => {
                    self.bump();
                    match self.bump().map(|(_, escaped)| escaped) {
                        Some('n') => value.push('\n'),
                        Some('r') => value.push('\r'),
                        Some('t') => value.push('\t'),
                        Some('\\') => value.push('\\'),
                        Some('"') => value.push('"'),
                        Some('0') => value.push('\0'),
                        Some('x') => {
                            let hi = self.bump().map(|(_, c)| c);
                            let lo = self.bump().map(|(_, c)| c);
                            match (
                                hi.and_then(|c| c.to_digit(16)),
                                lo.and_then(|c| c.to_digit(16)),
                            ) {
                                (Some(hi), Some(lo)) => {
                                    value.push(char::from((hi * 16 + lo) as u8));
                                }
                                _ => self.error(span, "invalid \\x escape"),
                            }
                        }
                        Some(other) => {
                            self.error(span, format!("unknown escape '\\{other}'"));
                        }
                        None => {
                            self.error(span, "unterminated string literal");
                            break;
                        }
                    }
                }
                _ => {
                    value.push(ch);
                    self.bump();
                }
            }
        }
        self.tokens.push(Token {
            kind: TokenKind::Str(value),
            span,
        });
    }

    fn lex_number(&mut self, span: Span) {
        let mut digits = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits.push(ch);
                self.bump();
            } else {
                break;
            }
        }

        // A dot followed by a digit makes this a float; a bare dot is
        // punctuation (qualified names).
        let is_float = {
            let mut lookahead = self.chars.clone();
            matches!(
                (lookahead.next(), lookahead.next()),
                (Some((_, '.')), Some((_, next))) if next.is_ascii_digit()
            )
        };

        if is_float {
            digits.push('.');
            self.bump();
            while let Some(ch) = self.peek() {
                if ch.is_ascii_digit() {
                    digits.push(ch);
                    self.bump();
                } else {
                    break;
                }
            }
            match digits.parse::<f64>() {
                Ok(value) => self.tokens.push(Token {
                    kind: TokenKind::Float(value),
                    span,
                }),
                Err(_) => self.error(span, "invalid float literal"),
            }
        } else {
            match digits.parse::<u64>() {
                Ok(value) => self.tokens.push(Token {
                    kind: TokenKind::Int(value),
                    span,
                }),
                Err(_) => self.error(span, "integer literal out of range"),
            }
        }
    }

    fn lex_ident(&mut self, span: Span) {
        let mut ident = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                ident.push(ch);
                self.bump();
            } else {
                break;
            }
        }
        let kind = match Keyword::from_ident(&ident) {
            Some(keyword) => TokenKind::Keyword(keyword),
            None => TokenKind::Ident(ident),
        };
        self.tokens.push(Token { kind, span });
    }
}
