//! Enumerations travel as plain varints of their numeric value.

use crate::error::{Error, ErrorKind};
use crate::options::Options;
use crate::reader::Reader;
use crate::varint::VarintCodec;
use crate::wire::{self, WireType};
use crate::writer::Writer;

/// A schema enumeration: a closed set of named numeric values.
///
/// Implemented via `#[derive(Enumeration)]` on fieldless enums with
/// explicit discriminants.
pub trait Enumeration: Copy + Sized {
    /// The enum member for `value`, if one is defined.
    fn from_value(value: u32) -> Option<Self>;

    /// This member's numeric value.
    fn value(self) -> u32;
}

/// Emit one enumeration field. The zero member is elided under
/// `omit_empty`, like any other scalar.
pub fn encode_enum_field<T: Enumeration>(
    number: u32,
    required: bool,
    value: T,
    w: &mut Writer,
) -> Result<(), Error> {
    if !required && w.options().omit_empty && value.value() == 0 {
        return Ok(());
    }
    w.put_tag(number, WireType::Varint)?;
    w.put_uvarint(u64::from(value.value()))
}

/// Encoded size of [`encode_enum_field`].
pub fn encoded_enum_field_len<T: Enumeration>(
    number: u32,
    required: bool,
    value: T,
    opts: &Options,
) -> usize {
    if !required && opts.omit_empty && value.value() == 0 {
        return 0;
    }
    wire::encoded_tag_len(number) + u64::from(value.value()).varint_len()
}

/// Decode one enumeration value.
///
/// An undefined numeric value is an error in strict mode; otherwise it
/// falls back to the default member, the enum equivalent of skipping an
/// unknown field.
pub fn decode_enum_value<T: Enumeration + Default>(r: &mut Reader<'_>) -> Result<T, Error> {
    let raw = r.read_uvarint()?;
    let raw = match u32::try_from(raw) {
        Ok(raw) => raw,
        Err(_) => return Err(r.fail(ErrorKind::Overflow)),
    };
    match T::from_value(raw) {
        Some(value) => Ok(value),
        None if r.strict() => Err(r.fail(ErrorKind::TypeMismatch)),
        None => Ok(T::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    enum Status {
        #[default]
        Unknown,
        Active,
    }

    impl Enumeration for Status {
        fn from_value(value: u32) -> Option<Self> {
            match value {
                0 => Some(Status::Unknown),
                1 => Some(Status::Active),
                _ => None,
            }
        }

        fn value(self) -> u32 {
            match self {
                Status::Unknown => 0,
                Status::Active => 1,
            }
        }
    }

    #[test]
    fn test_enum_roundtrip() {
        let mut w = Writer::new();
        encode_enum_field(3, false, Status::Active, &mut w).unwrap();
        // Tag (field 3, Varint) = 0x30, value 1.
        assert_eq!(w.as_slice(), &[0x30, 0x01]);

        let buf = w.into_bytes();
        let mut r = Reader::new(&buf);
        r.read_tag().unwrap();
        let decoded: Status = decode_enum_value(&mut r).unwrap();
        assert_eq!(decoded, Status::Active);
    }

    #[test]
    fn test_unknown_value_falls_back() {
        let buf = [0x2A]; // 42, not a defined member
        let mut r = Reader::new(&buf);
        let decoded: Status = decode_enum_value(&mut r).unwrap();
        assert_eq!(decoded, Status::Unknown);
    }

    #[test]
    fn test_unknown_value_strict() {
        use crate::options::Options;
        let opts = Options {
            strict: true,
            ..Options::default()
        };
        let buf = [0x2A];
        let mut r = Reader::with_options(&buf, opts);
        let result: Result<Status, Error> = decode_enum_value(&mut r);
        assert!(result.unwrap_err().is(ErrorKind::TypeMismatch));
    }
}
