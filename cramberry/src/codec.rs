//! Encoding and decoding traits for the cramberry wire format, plus the
//! field-level helpers the derive macro leans on.

mod default_check;
mod enumeration;
mod map;
mod optional;
mod poly;
mod record;
mod scalar;
mod seq;

use crate::error::Error;
use crate::options::Options;
use crate::reader::Reader;
use crate::wire::WireType;
use crate::writer::Writer;

/// A type with a fixed wire representation.
pub trait WireValue {
    /// The wire type this value is tagged with.
    const WIRE_TYPE: WireType;
}

/// A type that can be encoded to the wire.
pub trait Encode: WireValue {
    /// Append this value (without a tag) to the writer.
    fn encode(&self, w: &mut Writer) -> Result<(), Error>;

    /// The exact number of bytes [`encode`](Encode::encode) will write.
    ///
    /// Fallible because sizing a polymorphic slot consults the registry.
    fn encoded_len(&self, opts: &Options) -> Result<usize, Error>;
}

/// A type that can be decoded from the wire.
///
/// Decoding merges into `dst`: repeated fields append, singular fields
/// overwrite.
pub trait Decode: WireValue + Sized {
    fn decode_into(r: &mut Reader<'_>, dst: &mut Self) -> Result<(), Error>;
}

// Zero-value checks used for field elision, and their recursion budget.
pub use default_check::{DepthBudget, IsDefault};

// Raw (untagged) scalar elements used by packed sequences.
pub use scalar::ScalarCodec;

// Sequence support: the nested-sequence wrapper and field helpers.
pub use seq::{
    decode_packed_field, decode_repeated_element, encode_packed_field, encode_repeated_field,
    encoded_packed_field_len, encoded_repeated_field_len, Seq,
};

// Mapping support.
pub use map::{CramMap, MapKey};

// Record engine: descriptors, the tag loop, embedded framing.
pub use record::{
    decode_embedded, decode_record_body, descriptor_of, encode_embedded, encode_optional,
    encode_record_body, encode_singular, encoded_embedded_len, encoded_optional_len,
    encoded_record_body_len, encoded_singular_len, FieldOutcome, Record,
};

// Polymorphic slots.
pub use poly::{
    decode_boxed, decode_poly_value, encode_poly_field, encoded_poly_field_len, AnyRecord,
};

// Enumerations.
pub use enumeration::{
    decode_enum_value, encode_enum_field, encoded_enum_field_len, Enumeration,
};
