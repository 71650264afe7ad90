//! The record engine: the tag loop, end-marker framing, required-field
//! tracking and unknown-field skipping.
//!
//! Generated code supplies the per-field dispatch
//! ([`Record::decode_field`]) and emission ([`Record::encode_fields`]);
//! everything structural lives here so the rules are enforced in one
//! place.

use std::any::Any;
use std::any::TypeId as RustTypeId;

use crate::descriptor::{self, RecordDescriptor};
use crate::error::{Error, ErrorKind};
use crate::options::Options;
use crate::reader::Reader;
use crate::varint::VarintCodec;
use crate::wire::{self, DecodedTag, WireType};
use crate::writer::Writer;

use super::{DepthBudget, Encode, IsDefault};

/// What [`Record::decode_field`] did with a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOutcome {
    /// The field was decoded. `required_bit` is its index among the
    /// type's required fields, when it has one.
    Known { required_bit: Option<u8> },
    /// The field number is not in this type's table.
    Unknown,
}

/// A structured value with a field table.
///
/// Implemented via `#[derive(Record)]`; the engine consumes the table the
/// same way whether it was generated or written by hand.
pub trait Record: Any + Default {
    /// The static field table for this type.
    fn descriptor() -> &'static RecordDescriptor
    where
        Self: Sized;

    /// Emit every present field as `(tag, value)` pairs, no end marker.
    fn encode_fields(&self, w: &mut Writer) -> Result<(), Error>;

    /// Exact size of [`encode_fields`](Record::encode_fields) output.
    fn encoded_fields_len(&self, opts: &Options) -> Result<usize, Error>;

    /// Decode the value for `number`, validating `wire_type` against the
    /// field's declared type.
    fn decode_field(
        &mut self,
        r: &mut Reader<'_>,
        number: u32,
        wire_type: WireType,
    ) -> Result<FieldOutcome, Error>;
}

/// The process-wide descriptor cache entry for `T`.
pub fn descriptor_of<T: Record>() -> &'static RecordDescriptor {
    descriptor::cached(RustTypeId::of::<T>(), T::descriptor)
}

/// Encode a record body: fields then the `0x00` end marker.
pub fn encode_record_body<T: Record>(value: &T, w: &mut Writer) -> Result<(), Error> {
    value.encode_fields(w)?;
    w.put_end_marker()
}

/// Exact size of [`encode_record_body`] output.
pub fn encoded_record_body_len<T: Record>(value: &T, opts: &Options) -> Result<usize, Error> {
    Ok(value.encoded_fields_len(opts)? + 1)
}

/// Decode a record body up to and including its end marker.
pub fn decode_record_body<T: Record>(r: &mut Reader<'_>, dst: &mut T) -> Result<(), Error> {
    let descriptor = descriptor_of::<T>();
    r.enter_nested()?;
    let mut seen = 0u64;
    loop {
        match r.read_tag()? {
            DecodedTag::EndMarker => break,
            DecodedTag::Field { number, wire_type } => {
                match dst.decode_field(r, number, wire_type) {
                    Ok(FieldOutcome::Known { required_bit }) => {
                        if let Some(bit) = required_bit {
                            seen |= 1u64 << bit;
                        }
                    }
                    Ok(FieldOutcome::Unknown) => {
                        if r.strict() {
                            return Err(r
                                .fail(ErrorKind::UnknownField)
                                .for_type(descriptor.type_name()));
                        }
                        r.skip_value(wire_type)?;
                    }
                    Err(err) => {
                        let err = match descriptor.field_by_number(number) {
                            Some(field) => err.in_field(field.name, number),
                            None => err,
                        };
                        return Err(err.for_type(descriptor.type_name()));
                    }
                }
            }
        }
    }
    if let Some(missing) = descriptor.missing_required(seen) {
        return Err(r
            .fail(ErrorKind::RequiredFieldMissing)
            .in_field(missing.name, missing.number)
            .for_type(descriptor.type_name()));
    }
    r.exit_nested();
    Ok(())
}

/// Encode a record in field position: a length-prefixed body.
pub fn encode_embedded<T: Record>(value: &T, w: &mut Writer) -> Result<(), Error> {
    let opts = w.options().clone();
    let body = encoded_record_body_len(value, &opts)?;
    w.put_uvarint(body as u64)?;
    encode_record_body(value, w)
}

/// Exact size of [`encode_embedded`] output.
pub fn encoded_embedded_len<T: Record>(value: &T, opts: &Options) -> Result<usize, Error> {
    let body = encoded_record_body_len(value, opts)?;
    Ok((body as u64).varint_len() + body)
}

/// Decode a record in field position.
///
/// The body must fill its declared length exactly, end marker included. A
/// body that runs out before its `0x00` fails with `UnexpectedEOF`.
pub fn decode_embedded<T: Record>(r: &mut Reader<'_>, dst: &mut T) -> Result<(), Error> {
    let len = r.read_length()?;
    let previous = r.push_limit(len)?;
    decode_record_body(r, dst)?;
    r.expect_consumed()?;
    r.pop_limit(previous);
    Ok(())
}

/// Emit one singular field.
///
/// Required fields are always emitted, zero or not. Other singular fields
/// are elided only when `omit_empty` is set and the value is zero. The
/// zero check shares the reader's depth limit.
pub fn encode_singular<T: Encode + IsDefault>(
    number: u32,
    required: bool,
    value: &T,
    w: &mut Writer,
) -> Result<(), Error> {
    if !required && w.options().omit_empty {
        let mut depth = DepthBudget::new(w.options().limits.max_depth);
        if value.is_default(&mut depth)? {
            return Ok(());
        }
    }
    w.put_tag(number, T::WIRE_TYPE)?;
    value.encode(w)
}

/// Encoded size of [`encode_singular`].
pub fn encoded_singular_len<T: Encode + IsDefault>(
    number: u32,
    required: bool,
    value: &T,
    opts: &Options,
) -> Result<usize, Error> {
    if !required && opts.omit_empty {
        let mut depth = DepthBudget::new(opts.limits.max_depth);
        if value.is_default(&mut depth)? {
            return Ok(0);
        }
    }
    Ok(wire::encoded_tag_len(number) + value.encoded_len(opts)?)
}

/// Emit one optional field: absent values are omitted entirely.
pub fn encode_optional<T: Encode>(
    number: u32,
    value: &Option<T>,
    w: &mut Writer,
) -> Result<(), Error> {
    match value {
        Some(inner) => {
            w.put_tag(number, T::WIRE_TYPE)?;
            inner.encode(w)
        }
        None => Ok(()),
    }
}

/// Encoded size of [`encode_optional`].
pub fn encoded_optional_len<T: Encode>(
    number: u32,
    value: &Option<T>,
    opts: &Options,
) -> Result<usize, Error> {
    match value {
        Some(inner) => Ok(wire::encoded_tag_len(number) + inner.encoded_len(opts)?),
        None => Ok(0),
    }
}
