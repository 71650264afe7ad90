//! Schema language front end for cramberry.
//!
//! `.cram` source files declare messages, enums and interfaces:
//!
//! ```text
//! package example;
//! import "types.cram" as types;
//!
//! message User {
//!     id: int64 = 1 [required];
//!     name: string = 2;
//!     tags: []string = 4;
//!     metadata: map[string]string = 5;
//!     address: *types.Address = 6;
//! }
//!
//! enum Status { UNKNOWN = 0; ACTIVE = 1; }
//!
//! interface Principal {
//!     User = 128;
//!     Admin = 129;
//! }
//! ```
//!
//! The pipeline is lexer → parser → AST → validator, with a formatter to
//! render canonical source text back, a loader that resolves imports
//! transitively, and a compatibility checker that diffs two schemas into
//! breaking changes and warnings.

pub mod ast;
pub mod compat;
pub mod diagnostic;
pub mod format;
pub mod lexer;
pub mod loader;
pub mod parser;
pub mod token;
pub mod validate;

pub use ast::{Schema, TypeRef};
pub use compat::{check_compatibility, are_types_compatible, Breaking, BreakingKind, CompatibilityReport};
pub use diagnostic::{Diagnostic, Severity};
pub use format::{format_schema, format_schema_with, FormatOptions};
pub use loader::{LoadError, LoadedSchema, Loader};
pub use parser::{parse, ParseResult};
pub use validate::{validate, validate_with_imports};
