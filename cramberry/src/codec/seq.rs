//! Sequence encoding.
//!
//! Scalar sequences are packed: a single tag, then a payload of
//! `count` followed by raw untagged elements. Everything else gets one tag
//! per element. [`Seq`] wraps a vector for positions that need a
//! standalone sequence value (an element of another sequence, say).

use crate::error::Error;
use crate::options::Options;
use crate::reader::Reader;
use crate::varint::VarintCodec;
use crate::wire::{self, WireType};
use crate::writer::Writer;

use super::{Decode, DepthBudget, Encode, IsDefault, ScalarCodec, WireValue};

/// Emit a packed scalar sequence field. Empty sequences are omitted.
pub fn encode_packed_field<T: ScalarCodec>(
    number: u32,
    values: &[T],
    w: &mut Writer,
) -> Result<(), Error> {
    if values.is_empty() {
        return Ok(());
    }
    w.put_tag(number, WireType::Bytes)?;
    let mut payload = (values.len() as u64).varint_len();
    for value in values {
        payload += value.encoded_raw_len();
    }
    w.put_uvarint(payload as u64)?;
    w.put_packed_header(values.len(), T::MAX_ELEM_SIZE)?;
    for value in values {
        value.encode_raw(w)?;
    }
    Ok(())
}

/// Encoded size of [`encode_packed_field`].
pub fn encoded_packed_field_len<T: ScalarCodec>(number: u32, values: &[T]) -> usize {
    if values.is_empty() {
        return 0;
    }
    let mut payload = (values.len() as u64).varint_len();
    for value in values {
        payload += value.encoded_raw_len();
    }
    wire::encoded_tag_len(number) + (payload as u64).varint_len() + payload
}

/// Decode a packed scalar sequence payload, appending to `dst`.
pub fn decode_packed_field<T: ScalarCodec>(
    r: &mut Reader<'_>,
    dst: &mut Vec<T>,
) -> Result<(), Error> {
    let len = r.read_length()?;
    let previous = r.push_limit(len)?;
    r.enter_nested()?;
    let count = r.read_array_header()?;
    dst.reserve(count);
    for _ in 0..count {
        dst.push(T::decode_raw(r)?);
    }
    r.expect_consumed()?;
    r.exit_nested();
    r.pop_limit(previous);
    Ok(())
}

/// Emit a non-scalar sequence field: one tag per element.
pub fn encode_repeated_field<T: Encode>(
    number: u32,
    values: &[T],
    w: &mut Writer,
) -> Result<(), Error> {
    for value in values {
        w.put_tag(number, T::WIRE_TYPE)?;
        value.encode(w)?;
    }
    Ok(())
}

/// Encoded size of [`encode_repeated_field`].
pub fn encoded_repeated_field_len<T: Encode>(
    number: u32,
    values: &[T],
    opts: &Options,
) -> Result<usize, Error> {
    let mut total = 0;
    for value in values {
        total += wire::encoded_tag_len(number) + value.encoded_len(opts)?;
    }
    Ok(total)
}

/// Decode one element of a tagged repeated field, appending to `dst`.
pub fn decode_repeated_element<T: Decode + Default>(
    r: &mut Reader<'_>,
    dst: &mut Vec<T>,
) -> Result<(), Error> {
    if dst.len() >= r.options().limits.max_array_length {
        return Err(r.fail(crate::error::ErrorKind::MaxArrayLength));
    }
    let mut value = T::default();
    T::decode_into(r, &mut value)?;
    dst.push(value);
    Ok(())
}

/// A standalone sequence value.
///
/// Use this where a sequence appears inside another sequence: the field
/// forms above only apply at field level. Encodes as a Bytes payload of
/// `count` followed by each element's untagged encoding.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Seq<T>(pub Vec<T>);

impl<T> core::ops::Deref for Seq<T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Vec<T> {
        &self.0
    }
}

impl<T> core::ops::DerefMut for Seq<T> {
    fn deref_mut(&mut self) -> &mut Vec<T> {
        &mut self.0
    }
}

impl<T> From<Vec<T>> for Seq<T> {
    fn from(values: Vec<T>) -> Self {
        Seq(values)
    }
}

impl<T> IsDefault for Seq<T> {
    fn is_default(&self, _depth: &mut DepthBudget) -> Result<bool, Error> {
        Ok(self.0.is_empty())
    }
}

impl<T> WireValue for Seq<T> {
    const WIRE_TYPE: WireType = WireType::Bytes;
}

impl<T: Encode> Encode for Seq<T> {
    fn encode(&self, w: &mut Writer) -> Result<(), Error> {
        let opts = w.options().clone();
        let mut payload = (self.0.len() as u64).varint_len();
        for value in &self.0 {
            payload += value.encoded_len(&opts)?;
        }
        w.put_uvarint(payload as u64)?;
        w.put_uvarint(self.0.len() as u64)?;
        for value in &self.0 {
            value.encode(w)?;
        }
        Ok(())
    }

    fn encoded_len(&self, opts: &Options) -> Result<usize, Error> {
        let mut payload = (self.0.len() as u64).varint_len();
        for value in &self.0 {
            payload += value.encoded_len(opts)?;
        }
        Ok((payload as u64).varint_len() + payload)
    }
}

impl<T: Decode + Default> Decode for Seq<T> {
    fn decode_into(r: &mut Reader<'_>, dst: &mut Self) -> Result<(), Error> {
        let len = r.read_length()?;
        let previous = r.push_limit(len)?;
        r.enter_nested()?;
        let count = r.read_array_header()?;
        dst.0.reserve(count);
        for _ in 0..count {
            let mut value = T::default();
            T::decode_into(r, &mut value)?;
            dst.0.push(value);
        }
        r.expect_consumed()?;
        r.exit_nested();
        r.pop_limit(previous);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;
    use crate::wire::DecodedTag;

    use super::*;

    #[test]
    fn test_packed_wire_shape() {
        // Field 1, [-1, 0, 1]: zigzag values 1, 0, 2.
        let mut w = Writer::new();
        encode_packed_field(1, &[-1i64, 0, 1], &mut w).unwrap();
        // Tag (field 1, Bytes) = 0x14, length 4, count 3, body 01 00 02.
        assert_eq!(w.as_slice(), &[0x14, 0x04, 0x03, 0x01, 0x00, 0x02]);
        assert_eq!(encoded_packed_field_len(1, &[-1i64, 0, 1]), w.len());
    }

    #[test]
    fn test_packed_roundtrip() {
        let values = vec![i64::MIN, -1, 0, 1, i64::MAX];
        let mut w = Writer::new();
        encode_packed_field(2, &values, &mut w).unwrap();
        let buf = w.into_bytes();

        let mut r = Reader::new(&buf);
        let tag = r.read_tag().unwrap();
        assert_eq!(
            tag,
            DecodedTag::Field {
                number: 2,
                wire_type: WireType::Bytes
            }
        );
        let mut decoded: Vec<i64> = Vec::new();
        decode_packed_field(&mut r, &mut decoded).unwrap();
        assert_eq!(decoded, values);
        r.expect_consumed().unwrap();
    }

    #[test]
    fn test_empty_sequence_elided() {
        let mut w = Writer::new();
        encode_packed_field::<u32>(1, &[], &mut w).unwrap();
        assert!(w.is_empty());
        assert_eq!(encoded_packed_field_len::<u32>(1, &[]), 0);
    }

    #[test]
    fn test_packed_count_must_match_payload() {
        // Claims 3 elements but carries 2.
        let buf = [0x03, 0x03, 0x01, 0x02];
        let mut r = Reader::new(&buf);
        let mut dst: Vec<u32> = Vec::new();
        assert!(decode_packed_field(&mut r, &mut dst)
            .unwrap_err()
            .is(ErrorKind::UnexpectedEof));
    }

    #[test]
    fn test_repeated_strings() {
        let values = vec![String::from("a"), String::from("bc")];
        let mut w = Writer::new();
        encode_repeated_field(3, &values, &mut w).unwrap();

        let buf = w.into_bytes();
        let mut r = Reader::new(&buf);
        let mut decoded: Vec<String> = Vec::new();
        while !r.is_at_end() {
            let tag = r.read_tag().unwrap();
            assert_eq!(
                tag,
                DecodedTag::Field {
                    number: 3,
                    wire_type: WireType::Bytes
                }
            );
            decode_repeated_element(&mut r, &mut decoded).unwrap();
        }
        assert_eq!(decoded, values);
    }

    #[test]
    fn test_nested_sequences() {
        let value: Seq<Seq<u32>> = Seq(vec![Seq(vec![1, 2]), Seq(vec![]), Seq(vec![3])]);
        let opts = Options::default();
        let mut w = Writer::new();
        value.encode(&mut w).unwrap();
        assert_eq!(w.len(), value.encoded_len(&opts).unwrap());

        let buf = w.into_bytes();
        let mut r = Reader::new(&buf);
        let mut decoded = Seq::default();
        Seq::<Seq<u32>>::decode_into(&mut r, &mut decoded).unwrap();
        assert_eq!(decoded, value);
    }
}
