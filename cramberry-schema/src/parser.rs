//! Recursive-descent parser for `.cram` sources.
//!
//! On a syntax error the parser records a diagnostic at the offending
//! token, synchronizes to the next `;`, `}` or top-level keyword, and
//! keeps going, so one bad declaration doesn't hide the rest of the file.

use crate::ast::*;
use crate::diagnostic::Diagnostic;
use crate::lexer;
use crate::token::{Keyword, Span, Token, TokenKind};

/// Outcome of parsing one source file.
#[derive(Debug, Clone)]
pub struct ParseResult {
    pub schema: Schema,
    pub diagnostics: Vec<Diagnostic>,
}

impl ParseResult {
    /// True if nothing error-severity was recorded.
    pub fn is_clean(&self) -> bool {
        !self.diagnostics.iter().any(Diagnostic::is_error)
    }

    /// The schema, or every diagnostic if any was an error.
    pub fn into_schema(self) -> Result<Schema, Vec<Diagnostic>> {
        if self.is_clean() {
            Ok(self.schema)
        } else {
            Err(self.diagnostics)
        }
    }
}

/// Parse one `.cram` source file.
pub fn parse(source: &str) -> ParseResult {
    let (tokens, mut diagnostics) = lexer::lex(source);

    // Free-standing comments go straight onto the schema; doc comments
    // stay in the stream and attach to the next declaration.
    let mut comments = Vec::new();
    let tokens: Vec<Token> = tokens
        .into_iter()
        .filter(|token| match &token.kind {
            TokenKind::LineComment(text) => {
                comments.push(text.clone());
                false
            }
            _ => true,
        })
        .collect();

    let mut parser = Parser {
        tokens,
        pos: 0,
        diagnostics: Vec::new(),
    };
    let mut schema = parser.parse_schema();
    schema.comments = comments;
    diagnostics.append(&mut parser.diagnostics);
    ParseResult {
        schema,
        diagnostics,
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
}

/// Unit error: the diagnostic is already recorded, the caller only
/// synchronizes.
type Fallible<T> = Result<T, ()>;

impl Parser {
    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].kind
    }

    fn span(&self) -> Span {
        self.tokens[self.pos.min(self.tokens.len() - 1)].span
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek(), TokenKind::Eof)
    }

    fn at_punct(&self, ch: char) -> bool {
        matches!(self.peek(), TokenKind::Punct(p) if *p == ch)
    }

    fn at_keyword(&self, keyword: Keyword) -> bool {
        matches!(self.peek(), TokenKind::Keyword(k) if *k == keyword)
    }

    fn eat_punct(&mut self, ch: char) -> bool {
        if self.at_punct(ch) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: Keyword) -> bool {
        if self.at_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error_here(&mut self, message: impl Into<String>) {
        let span = self.span();
        self.diagnostics.push(Diagnostic::error(span, message));
    }

    fn expect_punct(&mut self, ch: char) -> Fallible<Span> {
        if self.at_punct(ch) {
            Ok(self.advance().span)
        } else {
            self.error_here(format!("expected '{ch}', found {}", self.peek()));
            Err(())
        }
    }

    fn expect_ident(&mut self) -> Fallible<(String, Span)> {
        match self.peek() {
            TokenKind::Ident(_) => {
                let token = self.advance();
                let TokenKind::Ident(name) = token.kind else {
                    unreachable!()
                };
                Ok((name, token.span))
            }
            other => {
                let msg = format!("expected identifier, found {other}");
                self.error_here(msg);
                Err(())
            }
        }
    }

    fn expect_int(&mut self) -> Fallible<(u64, Span)> {
        match self.peek() {
            TokenKind::Int(_) => {
                let token = self.advance();
                let TokenKind::Int(value) = token.kind else {
                    unreachable!()
                };
                Ok((value, token.span))
            }
            other => {
                let msg = format!("expected integer, found {other}");
                self.error_here(msg);
                Err(())
            }
        }
    }

    fn expect_u32(&mut self) -> Fallible<(u32, Span)> {
        let (value, span) = self.expect_int()?;
        match u32::try_from(value) {
            Ok(value) => Ok((value, span)),
            Err(_) => {
                self.diagnostics
                    .push(Diagnostic::error(span, "integer out of range"));
                Err(())
            }
        }
    }

    /// Skip to the next `;`, `}` or top-level keyword.
    fn synchronize(&mut self) {
        while !self.at_eof() {
            if self.at_punct(';') {
                self.advance();
                return;
            }
            if self.at_punct('}') {
                self.advance();
                return;
            }
            if matches!(
                self.peek(),
                TokenKind::Keyword(
                    Keyword::Package
                        | Keyword::Import
                        | Keyword::Option
                        | Keyword::Message
                        | Keyword::Enum
                        | Keyword::Interface
                )
            ) {
                return;
            }
            self.advance();
        }
    }

    /// Consume consecutive doc comments.
    fn take_docs(&mut self) -> Vec<String> {
        let mut docs = Vec::new();
        while let TokenKind::DocComment(_) = self.peek() {
            let token = self.advance();
            if let TokenKind::DocComment(text) = token.kind {
                docs.push(text);
            }
        }
        docs
    }

    fn parse_schema(&mut self) -> Schema {
        let mut schema = Schema::default();

        if self.at_keyword(Keyword::Package) && self.parse_package(&mut schema).is_err() {
            self.synchronize();
        }

        while self.at_keyword(Keyword::Import) {
            if self.parse_import(&mut schema).is_err() {
                self.synchronize();
            }
        }

        while self.at_keyword(Keyword::Option) {
            match self.parse_option() {
                Ok(option) => schema.options.push(option),
                Err(()) => self.synchronize(),
            }
        }

        while !self.at_eof() {
            let docs = self.take_docs();
            if self.at_keyword(Keyword::Message) {
                match self.parse_message(docs) {
                    Ok(message) => schema.messages.push(message),
                    Err(()) => self.synchronize(),
                }
            } else if self.at_keyword(Keyword::Enum) {
                match self.parse_enum(docs) {
                    Ok(decl) => schema.enums.push(decl),
                    Err(()) => self.synchronize(),
                }
            } else if self.at_keyword(Keyword::Interface) {
                match self.parse_interface(docs) {
                    Ok(decl) => schema.interfaces.push(decl),
                    Err(()) => self.synchronize(),
                }
            } else {
                let msg = format!(
                    "expected 'message', 'enum' or 'interface', found {}",
                    self.peek()
                );
                self.error_here(msg);
                // Step past the offender so synchronization always makes
                // progress, then resynchronize.
                self.advance();
                self.synchronize();
            }
        }

        schema
    }

    /// True at a keyword that can only start a top-level declaration.
    /// Body loops bail out here instead of eating the next declaration.
    fn at_top_level_keyword(&self) -> bool {
        matches!(
            self.peek(),
            TokenKind::Keyword(
                Keyword::Package
                    | Keyword::Import
                    | Keyword::Message
                    | Keyword::Enum
                    | Keyword::Interface
            )
        )
    }

    fn parse_package(&mut self, schema: &mut Schema) -> Fallible<()> {
        self.advance(); // 'package'
        let (mut name, _) = self.expect_ident()?;
        while self.eat_punct('.') {
            let (part, _) = self.expect_ident()?;
            name.push('.');
            name.push_str(&part);
        }
        self.expect_punct(';')?;
        schema.package = Some(name);
        Ok(())
    }

    fn parse_import(&mut self, schema: &mut Schema) -> Fallible<()> {
        let span = self.advance().span; // 'import'
        let path = match self.peek() {
            TokenKind::Str(_) => {
                let token = self.advance();
                let TokenKind::Str(path) = token.kind else {
                    unreachable!()
                };
                path
            }
            other => {
                let msg = format!("expected import path string, found {other}");
                self.error_here(msg);
                return Err(());
            }
        };
        let alias = if self.eat_keyword(Keyword::As) {
            Some(self.expect_ident()?.0)
        } else {
            None
        };
        self.expect_punct(';')?;
        schema.imports.push(Import { path, alias, span });
        Ok(())
    }

    fn parse_option(&mut self) -> Fallible<OptionDecl> {
        let span = self.advance().span; // 'option'
        let (name, _) = self.expect_ident()?;
        self.expect_punct('=')?;
        let value = self.parse_option_value()?;
        self.expect_punct(';')?;
        Ok(OptionDecl { name, value, span })
    }

    fn parse_option_value(&mut self) -> Fallible<OptionValue> {
        let value = match self.peek().clone() {
            TokenKind::Int(value) => OptionValue::Int(value),
            TokenKind::Float(value) => OptionValue::Float(value),
            TokenKind::Str(value) => OptionValue::Str(value),
            TokenKind::Ident(name) => OptionValue::Ident(name),
            TokenKind::Keyword(Keyword::True) => OptionValue::Bool(true),
            TokenKind::Keyword(Keyword::False) => OptionValue::Bool(false),
            other => {
                let msg = format!("expected option value, found {other}");
                self.error_here(msg);
                return Err(());
            }
        };
        self.advance();
        Ok(value)
    }

    fn parse_message(&mut self, doc: Vec<String>) -> Fallible<Message> {
        let span = self.advance().span; // 'message'
        let (name, _) = self.expect_ident()?;
        let type_id = if self.eat_punct('@') {
            Some(self.expect_u32()?.0)
        } else {
            None
        };
        self.expect_punct('{')?;

        let mut message = Message {
            name,
            type_id,
            fields: Vec::new(),
            options: Vec::new(),
            doc,
            span,
        };

        while !self.at_punct('}') && !self.at_eof() {
            if self.at_top_level_keyword() {
                self.error_here("missing '}' before next declaration");
                return Ok(message);
            }
            let before = self.pos;
            let docs = self.take_docs();
            if self.at_keyword(Keyword::Option) {
                match self.parse_option() {
                    Ok(option) => message.options.push(option),
                    Err(()) => self.synchronize(),
                }
            } else {
                match self.parse_field(docs) {
                    Ok(field) => message.fields.push(field),
                    Err(()) => self.synchronize(),
                }
            }
            if self.pos == before {
                self.advance();
            }
        }
        self.expect_punct('}')?;
        Ok(message)
    }

    /// `name: type = number [modifier, option = value, ...];`
    fn parse_field(&mut self, doc: Vec<String>) -> Fallible<FieldDecl> {
        let (name, span) = self.expect_ident()?;
        self.expect_punct(':')?;
        let ty = self.parse_typeref()?;
        self.expect_punct('=')?;
        let (number, _) = self.expect_u32()?;

        let mut modifiers = Modifiers::default();
        let mut options = Vec::new();
        if self.eat_punct('[') {
            loop {
                match self.peek().clone() {
                    TokenKind::Keyword(Keyword::Required) => {
                        self.advance();
                        modifiers.required = true;
                    }
                    TokenKind::Keyword(Keyword::Optional) => {
                        self.advance();
                        modifiers.optional = true;
                    }
                    TokenKind::Keyword(Keyword::Repeated) => {
                        self.advance();
                        modifiers.repeated = true;
                    }
                    TokenKind::Keyword(Keyword::Deprecated) => {
                        self.advance();
                        modifiers.deprecated = true;
                    }
                    TokenKind::Ident(option_name) => {
                        let option_span = self.advance().span;
                        self.expect_punct('=')?;
                        let value = self.parse_option_value()?;
                        options.push(OptionDecl {
                            name: option_name,
                            value,
                            span: option_span,
                        });
                    }
                    other => {
                        let msg = format!("expected field modifier, found {other}");
                        self.error_here(msg);
                        return Err(());
                    }
                }
                if !self.eat_punct(',') {
                    break;
                }
            }
            self.expect_punct(']')?;
        }
        self.expect_punct(';')?;

        Ok(FieldDecl {
            name,
            ty,
            number,
            modifiers,
            options,
            doc,
            span,
        })
    }

    fn parse_typeref(&mut self) -> Fallible<TypeRef> {
        if self.eat_punct('*') {
            let inner = self.parse_typeref()?;
            return Ok(TypeRef::Pointer(Box::new(inner)));
        }

        if self.eat_punct('[') {
            let size = if self.at_punct(']') {
                0
            } else {
                self.expect_u32()?.0
            };
            self.expect_punct(']')?;
            let element = self.parse_typeref()?;
            return Ok(TypeRef::Array {
                size,
                element: Box::new(element),
            });
        }

        if self.eat_keyword(Keyword::Map) {
            self.expect_punct('[')?;
            let key = self.parse_typeref()?;
            self.expect_punct(']')?;
            let value = self.parse_typeref()?;
            return Ok(TypeRef::Map {
                key: Box::new(key),
                value: Box::new(value),
            });
        }

        let (first, _) = self.expect_ident()?;
        if self.eat_punct('.') {
            let (name, _) = self.expect_ident()?;
            return Ok(TypeRef::Named(QualifiedName {
                qualifier: Some(first),
                name,
            }));
        }
        match ScalarType::from_name(&first) {
            Some(scalar) => Ok(TypeRef::Scalar(scalar)),
            None => Ok(TypeRef::Named(QualifiedName::local(first))),
        }
    }

    fn parse_enum(&mut self, doc: Vec<String>) -> Fallible<EnumDecl> {
        let span = self.advance().span; // 'enum'
        let (name, _) = self.expect_ident()?;
        self.expect_punct('{')?;

        let mut decl = EnumDecl {
            name,
            values: Vec::new(),
            options: Vec::new(),
            doc,
            span,
        };

        while !self.at_punct('}') && !self.at_eof() {
            if self.at_top_level_keyword() {
                self.error_here("missing '}' before next declaration");
                return Ok(decl);
            }
            let before = self.pos;
            let docs = self.take_docs();
            if self.at_keyword(Keyword::Option) {
                match self.parse_option() {
                    Ok(option) => decl.options.push(option),
                    Err(()) => self.synchronize(),
                }
                continue;
            }
            let parsed = (|| -> Fallible<EnumValue> {
                let (value_name, value_span) = self.expect_ident()?;
                self.expect_punct('=')?;
                let (number, _) = self.expect_u32()?;
                self.expect_punct(';')?;
                Ok(EnumValue {
                    name: value_name,
                    number,
                    doc: docs.clone(),
                    span: value_span,
                })
            })();
            match parsed {
                Ok(value) => decl.values.push(value),
                Err(()) => self.synchronize(),
            }
            if self.pos == before {
                self.advance();
            }
        }
        self.expect_punct('}')?;
        Ok(decl)
    }

    /// `interface Name { Impl = 128; pkg.Other = 129; }`
    fn parse_interface(&mut self, doc: Vec<String>) -> Fallible<InterfaceDecl> {
        let span = self.advance().span; // 'interface'
        let (name, _) = self.expect_ident()?;
        self.expect_punct('{')?;

        let mut decl = InterfaceDecl {
            name,
            implementations: Vec::new(),
            options: Vec::new(),
            doc,
            span,
        };

        while !self.at_punct('}') && !self.at_eof() {
            if self.at_top_level_keyword() {
                self.error_here("missing '}' before next declaration");
                return Ok(decl);
            }
            let before = self.pos;
            self.take_docs();
            if self.at_keyword(Keyword::Option) {
                match self.parse_option() {
                    Ok(option) => decl.options.push(option),
                    Err(()) => self.synchronize(),
                }
                continue;
            }
            let parsed = (|| -> Fallible<InterfaceImpl> {
                let (first, impl_span) = self.expect_ident()?;
                let type_name = if self.eat_punct('.') {
                    let (inner, _) = self.expect_ident()?;
                    QualifiedName {
                        qualifier: Some(first),
                        name: inner,
                    }
                } else {
                    QualifiedName::local(first)
                };
                self.expect_punct('=')?;
                let (type_id, _) = self.expect_u32()?;
                self.expect_punct(';')?;
                Ok(InterfaceImpl {
                    type_id,
                    type_name,
                    span: impl_span,
                })
            })();
            match parsed {
                Ok(implementation) => decl.implementations.push(implementation),
                Err(()) => self.synchronize(),
            }
            if self.pos == before {
                self.advance();
            }
        }
        self.expect_punct('}')?;
        Ok(decl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = r#"
package example;
import "types.cram" as types;

/// A user account.
message User {
    id: int64 = 1 [required];
    name: string = 2;
    email: string = 3;
    tags: []string = 4;
    metadata: map[string]string = 5;
    address: *types.Address = 6;
}

enum Status { UNKNOWN = 0; ACTIVE = 1; }

interface Principal {
    User = 128;
    Admin = 129;
}
"#;

    #[test]
    fn test_parse_example() {
        let result = parse(EXAMPLE);
        let schema = result.into_schema().unwrap();

        assert_eq!(schema.package.as_deref(), Some("example"));
        assert_eq!(schema.imports.len(), 1);
        assert_eq!(schema.imports[0].alias.as_deref(), Some("types"));

        let user = schema.find_message("User").unwrap();
        assert_eq!(user.doc, vec!["A user account."]);
        assert_eq!(user.fields.len(), 6);
        assert!(user.fields[0].modifiers.required);
        assert_eq!(user.fields[0].ty, TypeRef::Scalar(ScalarType::Int64));
        assert_eq!(
            user.fields[3].ty,
            TypeRef::Array {
                size: 0,
                element: Box::new(TypeRef::Scalar(ScalarType::String)),
            }
        );
        assert!(matches!(user.fields[4].ty, TypeRef::Map { .. }));
        assert_eq!(user.fields[5].ty.to_string(), "*types.Address");

        let status = schema.find_enum("Status").unwrap();
        assert_eq!(status.values.len(), 2);
        assert_eq!(status.values[0].number, 0);

        let principal = schema.find_interface("Principal").unwrap();
        assert_eq!(principal.implementations.len(), 2);
        assert_eq!(principal.implementations[0].type_id, 128);
        assert_eq!(principal.implementations[0].type_name.to_string(), "User");
    }

    #[test]
    fn test_message_with_explicit_type_id() {
        let schema = parse("message User @128 { id: int64 = 1; }")
            .into_schema()
            .unwrap();
        assert_eq!(schema.messages[0].type_id, Some(128));
    }

    #[test]
    fn test_fixed_size_array() {
        let schema = parse("message M { digest: [32]uint8 = 1; }")
            .into_schema()
            .unwrap();
        assert_eq!(
            schema.messages[0].fields[0].ty,
            TypeRef::Array {
                size: 32,
                element: Box::new(TypeRef::Scalar(ScalarType::Uint8)),
            }
        );
    }

    #[test]
    fn test_error_recovery_continues() {
        // The first field is malformed; the second survives.
        let result = parse("message M { id int64 = 1; ok: bool = 2; }");
        assert!(!result.is_clean());
        assert_eq!(result.schema.messages.len(), 1);
        let fields = &result.schema.messages[0].fields;
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].name, "ok");
    }

    #[test]
    fn test_multiple_errors_accumulate() {
        let result = parse("message A { x int = 1; }\nmessage B { y bool = 2; }");
        let errors = result
            .diagnostics
            .iter()
            .filter(|d| d.is_error())
            .count();
        assert!(errors >= 2, "{:?}", result.diagnostics);
        assert_eq!(result.schema.messages.len(), 2);
    }

    #[test]
    fn test_field_options() {
        let schema = parse("message M { x: int32 = 1 [required, default = 5]; }")
            .into_schema()
            .unwrap();
        let field = &schema.messages[0].fields[0];
        assert!(field.modifiers.required);
        assert_eq!(field.options.len(), 1);
        assert_eq!(field.options[0].name, "default");
        assert_eq!(field.options[0].value, OptionValue::Int(5));
    }

    #[test]
    fn test_deprecated_modifier() {
        let schema = parse("message M { old: string = 9 [deprecated]; }")
            .into_schema()
            .unwrap();
        assert!(schema.messages[0].fields[0].modifiers.deprecated);
    }
}
