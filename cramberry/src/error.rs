//! Error taxonomy: stable sentinel kinds plus a rich wrapper that carries
//! the field path, byte offset and type name of the failure site.

use core::fmt;

/// Stable error kinds.
///
/// Every failure in the codec, the registry and the marshal engine bottoms
/// out in one of these. Match on the kind; the surrounding [`Error`] only
/// adds context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ErrorKind {
    #[error("invalid varint encoding")]
    InvalidVarint,
    #[error("value overflows its integer type")]
    Overflow,
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("invalid wire type")]
    InvalidWireType,
    #[error("malformed field tag")]
    InvalidTag,
    #[error("invalid UTF-8 in string")]
    InvalidUtf8,
    #[error("wire type does not match the field's declared type")]
    TypeMismatch,
    #[error("unknown field rejected in strict mode")]
    UnknownField,
    #[error("type id not known to the registry")]
    UnknownType,
    #[error("type not registered")]
    UnregisteredType,
    #[error("conflicting registration")]
    Duplicate,
    #[error("nesting depth limit exceeded")]
    MaxDepthExceeded,
    #[error("message size limit exceeded")]
    MaxSizeExceeded,
    #[error("string length limit exceeded")]
    MaxStringLength,
    #[error("byte blob length limit exceeded")]
    MaxBytesLength,
    #[error("array length limit exceeded")]
    MaxArrayLength,
    #[error("map size limit exceeded")]
    MaxMapSize,
    #[error("required field missing")]
    RequiredFieldMissing,
    #[error("nil pointer")]
    NilPointer,
    #[error("invalid map key")]
    InvalidMapKey,
    #[error("buffer limit exceeded")]
    BufferLimit,
    #[error("input continues past the end of the message")]
    TrailingBytes,
    #[error("stream i/o failure")]
    Io,
    #[error("zero-copy reference outlived its reader generation")]
    StaleReference,
}

// Keep the sentinel kinds a plain byte so `Result<(), ErrorKind>` stays
// register-sized on the primitive decode paths.
static_assertions::assert_eq_size!(ErrorKind, u8);

/// A codec error: a stable [`ErrorKind`] plus whatever context was known at
/// the failure site.
///
/// The field path grows as the error propagates out of nested records, so
/// `user.address.city` reads outermost-first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    type_name: Option<&'static str>,
    path: Option<String>,
    field_number: Option<u32>,
    offset: Option<usize>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Error {
            kind,
            type_name: None,
            path: None,
            field_number: None,
            offset: None,
        }
    }

    /// The stable kind of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// True if this error is of the given kind.
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }

    /// Dot-separated path of the field where the failure occurred, if known.
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Byte offset into the input where the failure was discovered.
    pub fn offset(&self) -> Option<usize> {
        self.offset
    }

    /// Field number at the failure site.
    pub fn field_number(&self) -> Option<u32> {
        self.field_number
    }

    /// Name of the type being processed when the failure occurred.
    pub fn type_name(&self) -> Option<&'static str> {
        self.type_name
    }

    pub(crate) fn with_offset(mut self, offset: usize) -> Self {
        self.offset.get_or_insert(offset);
        self
    }

    pub(crate) fn for_type(mut self, name: &'static str) -> Self {
        // The innermost type wins; outer frames only add path segments.
        self.type_name.get_or_insert(name);
        self
    }

    /// Prepend a field segment as the error climbs out of a nested value.
    pub(crate) fn in_field(mut self, name: &'static str, number: u32) -> Self {
        self.path = Some(match self.path.take() {
            Some(inner) => format!("{name}.{inner}"),
            None => name.to_string(),
        });
        self.field_number.get_or_insert(number);
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(name) = self.type_name {
            write!(f, " (type {name})")?;
        }
        if let Some(path) = &self.path {
            write!(f, " at field {path}")?;
            if let Some(number) = self.field_number {
                write!(f, " ({number})")?;
            }
        }
        if let Some(offset) = self.offset {
            write!(f, " at offset {offset}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error::new(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matching() {
        let err = Error::new(ErrorKind::UnexpectedEof);
        assert!(err.is(ErrorKind::UnexpectedEof));
        assert!(!err.is(ErrorKind::Overflow));
        assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_path_accumulates_outermost_first() {
        let err = Error::new(ErrorKind::TypeMismatch)
            .with_offset(17)
            .in_field("city", 2)
            .in_field("address", 6)
            .for_type("User");

        assert_eq!(err.path(), Some("address.city"));
        assert_eq!(err.field_number(), Some(2));
        assert_eq!(err.offset(), Some(17));

        let rendered = err.to_string();
        assert!(rendered.contains("address.city"), "{rendered}");
        assert!(rendered.contains("offset 17"), "{rendered}");
        assert!(rendered.contains("User"), "{rendered}");
    }

    #[test]
    fn test_innermost_context_wins() {
        let err = Error::new(ErrorKind::UnexpectedEof)
            .with_offset(3)
            .with_offset(9)
            .for_type("Inner")
            .for_type("Outer");
        assert_eq!(err.offset(), Some(3));
        assert_eq!(err.type_name(), Some("Inner"));
    }
}
