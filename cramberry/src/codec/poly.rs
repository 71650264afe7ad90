//! Polymorphic slots: type-erased values dispatched through the registry.
//!
//! An interface-typed field holds `Option<Box<dyn AnyRecord>>`. Encoding
//! looks the concrete type up in the registry and emits its TypeID
//! followed by the value; decoding reads the TypeID and asks the registry
//! to instantiate. TypeID zero is nil.

use std::any::Any;
use std::fmt;

use crate::error::{Error, ErrorKind};
use crate::options::Options;
use crate::reader::Reader;
use crate::registry::TypeId;
use crate::varint::VarintCodec;
use crate::wire::{self, WireType};
use crate::writer::Writer;

use super::record::{decode_embedded, Record};
use super::Encode;

/// A type-erased value that can sit in a polymorphic slot.
///
/// Records encode as a length-prefixed body; built-in scalars use their
/// plain scalar encoding. `#[derive(Record)]` emits this impl; the scalar
/// impls live here.
pub trait AnyRecord: Any + fmt::Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;

    /// The Rust type name, for diagnostics.
    fn type_label(&self) -> &'static str;

    /// Encode the value payload (everything after the TypeID varint).
    fn encode_value(&self, w: &mut Writer) -> Result<(), Error>;

    /// Exact size of [`encode_value`](AnyRecord::encode_value) output.
    fn encoded_value_len(&self, opts: &Options) -> Result<usize, Error>;

    fn clone_value(&self) -> Box<dyn AnyRecord>;

    fn value_eq(&self, other: &dyn AnyRecord) -> bool;
}

impl Clone for Box<dyn AnyRecord> {
    fn clone(&self) -> Self {
        self.clone_value()
    }
}

impl PartialEq for Box<dyn AnyRecord> {
    fn eq(&self, other: &Self) -> bool {
        self.value_eq(other.as_ref())
    }
}

macro_rules! impl_any_scalar {
    ($($ty:ty),+) => {$(
        impl AnyRecord for $ty {
            fn as_any(&self) -> &dyn Any {
                self
            }

            fn type_label(&self) -> &'static str {
                std::any::type_name::<$ty>()
            }

            fn encode_value(&self, w: &mut Writer) -> Result<(), Error> {
                Encode::encode(self, w)
            }

            fn encoded_value_len(&self, opts: &Options) -> Result<usize, Error> {
                Encode::encoded_len(self, opts)
            }

            fn clone_value(&self) -> Box<dyn AnyRecord> {
                Box::new(self.clone())
            }

            fn value_eq(&self, other: &dyn AnyRecord) -> bool {
                other
                    .as_any()
                    .downcast_ref::<$ty>()
                    .is_some_and(|other| other == self)
            }
        }
    )+};
}

impl_any_scalar!(bool, u8, u16, u32, u64, i8, i16, i32, i64, String, Vec<u8>);

// Floats compare by bits here: a NaN payload must survive an erase/compare
// round even though NaN != NaN numerically.
macro_rules! impl_any_float {
    ($($ty:ty),+) => {$(
        impl AnyRecord for $ty {
            fn as_any(&self) -> &dyn Any {
                self
            }

            fn type_label(&self) -> &'static str {
                std::any::type_name::<$ty>()
            }

            fn encode_value(&self, w: &mut Writer) -> Result<(), Error> {
                Encode::encode(self, w)
            }

            fn encoded_value_len(&self, opts: &Options) -> Result<usize, Error> {
                Encode::encoded_len(self, opts)
            }

            fn clone_value(&self) -> Box<dyn AnyRecord> {
                Box::new(*self)
            }

            fn value_eq(&self, other: &dyn AnyRecord) -> bool {
                other
                    .as_any()
                    .downcast_ref::<$ty>()
                    .is_some_and(|other| other.to_bits() == self.to_bits())
            }
        }
    )+};
}

impl_any_float!(f32, f64);

/// The reflective decoder installed by `Registry::register`.
pub fn decode_boxed<T>(r: &mut Reader<'_>) -> Result<Box<dyn AnyRecord>, Error>
where
    T: Record + AnyRecord + Default,
{
    let mut value = T::default();
    decode_embedded(r, &mut value)?;
    Ok(Box::new(value))
}

/// Emit one interface-typed field. A `None` slot encodes as TypeID zero.
pub fn encode_poly_field(
    number: u32,
    value: &Option<Box<dyn AnyRecord>>,
    w: &mut Writer,
) -> Result<(), Error> {
    w.put_tag(number, WireType::TypeRef)?;
    match value {
        None => w.put_uvarint(u64::from(TypeId::NIL.0)),
        Some(concrete) => {
            let id = w
                .registry()
                .id_for_rust(concrete.as_any().type_id())
                .ok_or_else(|| Error::new(ErrorKind::UnregisteredType))?;
            w.put_uvarint(u64::from(id.0))?;
            concrete.encode_value(w)
        }
    }
}

/// Encoded size of [`encode_poly_field`].
pub fn encoded_poly_field_len(
    number: u32,
    value: &Option<Box<dyn AnyRecord>>,
    opts: &Options,
) -> Result<usize, Error> {
    let tag = wire::encoded_tag_len(number);
    match value {
        None => Ok(tag + 1),
        Some(concrete) => {
            let id = opts
                .registry()
                .id_for_rust(concrete.as_any().type_id())
                .ok_or_else(|| Error::new(ErrorKind::UnregisteredType))?;
            Ok(tag + u64::from(id.0).varint_len() + concrete.encoded_value_len(opts)?)
        }
    }
}

/// Decode one interface-typed value: TypeID, then the concrete payload.
pub fn decode_poly_value(r: &mut Reader<'_>) -> Result<Option<Box<dyn AnyRecord>>, Error> {
    let raw = r.read_uvarint()?;
    let id = match u32::try_from(raw) {
        Ok(id) => TypeId(id),
        Err(_) => return Err(r.fail(ErrorKind::UnknownType)),
    };
    if id == TypeId::NIL {
        return Ok(None);
    }
    let entry = match r.registry().get(id) {
        Some(entry) => entry,
        None => return Err(r.fail(ErrorKind::UnknownType)),
    };
    (entry.codec().decode)(r).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_erasure() {
        let a: Box<dyn AnyRecord> = Box::new(42i64);
        let b = a.clone();
        assert!(a == b);
        let c: Box<dyn AnyRecord> = Box::new(42u64);
        // Same number, different type: not equal.
        assert!(a != c);
    }

    #[test]
    fn test_nan_erasure_compares_by_bits() {
        let a: Box<dyn AnyRecord> = Box::new(f64::NAN);
        let b = a.clone();
        assert!(a == b);
    }
}
