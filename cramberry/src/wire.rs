//! The cramberry wire format: wire types and compact field tags.
//!
//! A tag identifies a field by number and wire type. Fields 1 through 15
//! fit in a single byte; larger numbers spill into a varint:
//!
//! ```text
//! compact:   [number:4][wire_type:3][0:1]
//! extended:  [0000][wire_type:3][1:1]  varint(number)
//! ```
//!
//! Field number zero is reserved: a single `0x00` byte ends a record body.

use crate::error::ErrorKind;
use crate::varint::VarintCodec;

/// Smallest valid field number.
pub const MIN_FIELD_NUMBER: u32 = 1;
/// Largest valid field number.
pub const MAX_FIELD_NUMBER: u32 = (1 << 29) - 1;
/// Largest field number that fits the single-byte tag form.
const MAX_COMPACT_FIELD: u32 = 15;

/// The byte that terminates a record body.
pub const END_MARKER: u8 = 0x00;

/// The shape of a tagged payload.
///
/// Codes 3 and 4 are reserved and rejected by the decoder.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum WireType {
    /// LEB128 unsigned integer: bool, unsigned ints, enums.
    Varint = 0,
    /// Eight little-endian bytes: float64, 64-bit fixed ints.
    Fixed64 = 1,
    /// Varint length followed by that many bytes: strings, blobs, embedded
    /// records, packed sequences, mappings.
    Bytes = 2,
    /// Four little-endian bytes: float32, 32-bit fixed ints.
    Fixed32 = 5,
    /// ZigZag-encoded signed varint.
    SVarint = 6,
    /// Varint TypeID followed by the concrete value (polymorphic slots).
    TypeRef = 7,
}

impl WireType {
    /// Decode a [`WireType`] from its raw 3-bit code.
    #[inline(always)]
    pub fn try_from_val(value: u8) -> Result<Self, ErrorKind> {
        match value {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::Fixed64),
            2 => Ok(WireType::Bytes),
            5 => Ok(WireType::Fixed32),
            6 => Ok(WireType::SVarint),
            7 => Ok(WireType::TypeRef),
            _ => Err(ErrorKind::InvalidWireType),
        }
    }

    /// The raw 3-bit code of this wire type.
    #[inline(always)]
    pub const fn into_val(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for WireType {
    type Error = ErrorKind;

    #[inline(always)]
    fn try_from(value: u8) -> Result<Self, ErrorKind> {
        WireType::try_from_val(value)
    }
}

/// Result of decoding one tag position.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DecodedTag {
    /// The `0x00` end-of-record marker.
    EndMarker,
    /// A field tag.
    Field { number: u32, wire_type: WireType },
}

/// Append the tag for `(number, wire_type)`, returning the bytes written.
///
/// `number` must be in `[MIN_FIELD_NUMBER, MAX_FIELD_NUMBER]`; zero is the
/// end marker and is written by the record encoder, never as a tag.
#[inline]
pub fn encode_tag<B: bytes::BufMut>(number: u32, wire_type: WireType, buf: &mut B) -> usize {
    debug_assert!((MIN_FIELD_NUMBER..=MAX_FIELD_NUMBER).contains(&number));
    if number <= MAX_COMPACT_FIELD {
        buf.put_u8(((number as u8) << 4) | (wire_type.into_val() << 1));
        1
    } else {
        buf.put_u8((wire_type.into_val() << 1) | 0x01);
        1 + number.encode_varint(buf)
    }
}

/// The number of bytes [`encode_tag`] writes for `number`.
///
/// The wire type never affects tag length.
#[inline]
pub fn encoded_tag_len(number: u32) -> usize {
    if number <= MAX_COMPACT_FIELD {
        1
    } else {
        1 + number.varint_len()
    }
}

/// Decode one tag from the front of `data`.
///
/// Returns the tag and the bytes consumed. On error nothing is consumed.
#[inline]
pub fn decode_tag(data: &[u8]) -> Result<(DecodedTag, usize), ErrorKind> {
    let Some(&lead) = data.first() else {
        return Err(ErrorKind::UnexpectedEof);
    };
    if lead == END_MARKER {
        return Ok((DecodedTag::EndMarker, 1));
    }

    let wire_type = WireType::try_from_val((lead >> 1) & 0x07)?;
    if lead & 0x01 == 0 {
        // Compact form. A zero number nibble can only be the end marker,
        // which was handled above.
        let number = u32::from(lead >> 4);
        if number == 0 {
            return Err(ErrorKind::InvalidTag);
        }
        Ok((DecodedTag::Field { number, wire_type }, 1))
    } else {
        let (number, read) = u32::decode_varint(&data[1..])?;
        if !(MIN_FIELD_NUMBER..=MAX_FIELD_NUMBER).contains(&number) {
            return Err(ErrorKind::InvalidTag);
        }
        Ok((DecodedTag::Field { number, wire_type }, 1 + read))
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_known_tag_bytes() {
        // Field 1, SVarint: (1 << 4) | (6 << 1) = 0x1C.
        let mut buf = Vec::new();
        assert_eq!(encode_tag(1, WireType::SVarint, &mut buf), 1);
        assert_eq!(buf, [0x1C]);

        // Field 2, Bytes: (2 << 4) | (2 << 1) = 0x24.
        buf.clear();
        encode_tag(2, WireType::Bytes, &mut buf);
        assert_eq!(buf, [0x24]);

        // Field 15 is the last compact number.
        buf.clear();
        encode_tag(15, WireType::Varint, &mut buf);
        assert_eq!(buf, [0xF0]);

        // Field 16 spills to the extended form.
        buf.clear();
        encode_tag(16, WireType::Varint, &mut buf);
        assert_eq!(buf, [0x01, 0x10]);
    }

    #[test]
    fn test_end_marker() {
        let (tag, read) = decode_tag(&[END_MARKER, 0xFF]).unwrap();
        assert_eq!(tag, DecodedTag::EndMarker);
        assert_eq!(read, 1);
    }

    #[test]
    fn test_reserved_wire_types_rejected() {
        for code in [3u8, 4u8] {
            assert_eq!(WireType::try_from_val(code), Err(ErrorKind::InvalidWireType));
            // Compact tag byte for field 1 with the reserved code.
            let lead = (1 << 4) | (code << 1);
            assert_eq!(decode_tag(&[lead]), Err(ErrorKind::InvalidWireType));
        }
    }

    #[test]
    fn test_malformed_tags() {
        assert_eq!(decode_tag(&[]), Err(ErrorKind::UnexpectedEof));
        // Nonzero byte with a zero number nibble and no extended bit.
        assert_eq!(decode_tag(&[0x0C]), Err(ErrorKind::InvalidTag));
        // Extended form with a truncated varint.
        assert_eq!(decode_tag(&[0x05, 0x80]), Err(ErrorKind::InvalidVarint));
        // Extended form with a field number past 2^29 - 1.
        let mut buf = vec![0x05];
        (MAX_FIELD_NUMBER + 1).encode_varint(&mut buf);
        assert_eq!(decode_tag(&buf), Err(ErrorKind::InvalidTag));
        // Extended form encoding field zero.
        assert_eq!(decode_tag(&[0x05, 0x00]), Err(ErrorKind::InvalidTag));
    }

    fn arb_wire_type() -> impl Strategy<Value = WireType> {
        prop_oneof![
            Just(WireType::Varint),
            Just(WireType::Fixed64),
            Just(WireType::Bytes),
            Just(WireType::Fixed32),
            Just(WireType::SVarint),
            Just(WireType::TypeRef),
        ]
    }

    #[test]
    fn proptest_tag_roundtrips() {
        let strat = (MIN_FIELD_NUMBER..=MAX_FIELD_NUMBER, arb_wire_type());
        proptest!(|((number, wire_type) in strat)| {
            let mut buf = Vec::new();
            let written = encode_tag(number, wire_type, &mut buf);
            prop_assert_eq!(written, buf.len());
            prop_assert_eq!(encoded_tag_len(number), written);

            let (tag, read) = decode_tag(&buf).unwrap();
            prop_assert_eq!(read, written);
            prop_assert_eq!(tag, DecodedTag::Field { number, wire_type });
        });
    }
}
