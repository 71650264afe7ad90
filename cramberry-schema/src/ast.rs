//! The schema AST.
//!
//! A schema is `(package, imports, options, messages, enums, interfaces,
//! comments)`; every declaration keeps its source span and doc comments.

use std::fmt;

use crate::token::Span;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    pub package: Option<String>,
    pub imports: Vec<Import>,
    pub options: Vec<OptionDecl>,
    pub messages: Vec<Message>,
    pub enums: Vec<EnumDecl>,
    pub interfaces: Vec<InterfaceDecl>,
    /// Free-standing `//` comments, in source order.
    pub comments: Vec<String>,
}

impl Schema {
    pub fn find_message(&self, name: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.name == name)
    }

    pub fn find_enum(&self, name: &str) -> Option<&EnumDecl> {
        self.enums.iter().find(|e| e.name == name)
    }

    pub fn find_interface(&self, name: &str) -> Option<&InterfaceDecl> {
        self.interfaces.iter().find(|i| i.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub path: String,
    pub alias: Option<String>,
    pub span: Span,
}

impl Import {
    /// The name this import is referenced by: its alias, or the file stem.
    pub fn local_name(&self) -> &str {
        match &self.alias {
            Some(alias) => alias,
            None => {
                let stem = self.path.rsplit('/').next().unwrap_or(&self.path);
                stem.strip_suffix(".cram").unwrap_or(stem)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptionDecl {
    pub name: String,
    pub value: OptionValue,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Ident(String),
    Int(u64),
    Float(f64),
    Str(String),
    Bool(bool),
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Ident(name) => write!(f, "{name}"),
            OptionValue::Int(value) => write!(f, "{value}"),
            OptionValue::Float(value) => write!(f, "{value}"),
            OptionValue::Str(value) => write!(f, "{value:?}"),
            OptionValue::Bool(value) => write!(f, "{value}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub name: String,
    /// Explicit wire TypeID (`message User @128 { ... }`).
    pub type_id: Option<u32>,
    pub fields: Vec<FieldDecl>,
    pub options: Vec<OptionDecl>,
    pub doc: Vec<String>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeRef,
    pub number: u32,
    pub modifiers: Modifiers,
    pub options: Vec<OptionDecl>,
    pub doc: Vec<String>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub required: bool,
    pub optional: bool,
    pub repeated: bool,
    pub deprecated: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    pub name: String,
    pub values: Vec<EnumValue>,
    pub options: Vec<OptionDecl>,
    pub doc: Vec<String>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumValue {
    pub name: String,
    pub number: u32,
    pub doc: Vec<String>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceDecl {
    pub name: String,
    pub implementations: Vec<InterfaceImpl>,
    pub options: Vec<OptionDecl>,
    pub doc: Vec<String>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceImpl {
    pub type_id: u32,
    pub type_name: QualifiedName,
    pub span: Span,
}

/// A possibly package-qualified type name (`types.Address`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedName {
    pub qualifier: Option<String>,
    pub name: String,
}

impl QualifiedName {
    pub fn local(name: impl Into<String>) -> Self {
        QualifiedName {
            qualifier: None,
            name: name.into(),
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(qualifier) => write!(f, "{qualifier}.{}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// The built-in scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
    String,
    Bytes,
}

impl ScalarType {
    pub fn from_name(name: &str) -> Option<ScalarType> {
        Some(match name {
            "bool" => ScalarType::Bool,
            "int8" => ScalarType::Int8,
            "int16" => ScalarType::Int16,
            "int32" => ScalarType::Int32,
            "int64" => ScalarType::Int64,
            "uint8" => ScalarType::Uint8,
            "uint16" => ScalarType::Uint16,
            "uint32" => ScalarType::Uint32,
            "uint64" => ScalarType::Uint64,
            "float32" => ScalarType::Float32,
            "float64" => ScalarType::Float64,
            "string" => ScalarType::String,
            "bytes" => ScalarType::Bytes,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            ScalarType::Bool => "bool",
            ScalarType::Int8 => "int8",
            ScalarType::Int16 => "int16",
            ScalarType::Int32 => "int32",
            ScalarType::Int64 => "int64",
            ScalarType::Uint8 => "uint8",
            ScalarType::Uint16 => "uint16",
            ScalarType::Uint32 => "uint32",
            ScalarType::Uint64 => "uint64",
            ScalarType::Float32 => "float32",
            ScalarType::Float64 => "float64",
            ScalarType::String => "string",
            ScalarType::Bytes => "bytes",
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            ScalarType::Int8
                | ScalarType::Int16
                | ScalarType::Int32
                | ScalarType::Int64
                | ScalarType::Uint8
                | ScalarType::Uint16
                | ScalarType::Uint32
                | ScalarType::Uint64
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, ScalarType::Float32 | ScalarType::Float64)
    }
}

/// A type reference as written in a field declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeRef {
    Scalar(ScalarType),
    Named(QualifiedName),
    /// `[N]T`; size zero is an unbounded sequence (`[]T`).
    Array { size: u32, element: Box<TypeRef> },
    Map {
        key: Box<TypeRef>,
        value: Box<TypeRef>,
    },
    /// `*T`: an optional wrapper.
    Pointer(Box<TypeRef>),
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Scalar(scalar) => write!(f, "{}", scalar.name()),
            TypeRef::Named(name) => write!(f, "{name}"),
            TypeRef::Array { size: 0, element } => write!(f, "[]{element}"),
            TypeRef::Array { size, element } => write!(f, "[{size}]{element}"),
            TypeRef::Map { key, value } => write!(f, "map[{key}]{value}"),
            TypeRef::Pointer(inner) => write!(f, "*{inner}"),
        }
    }
}

impl TypeRef {
    /// Strip pointer wrappers.
    pub fn without_pointers(&self) -> &TypeRef {
        let mut current = self;
        while let TypeRef::Pointer(inner) = current {
            current = inner;
        }
        current
    }
}
