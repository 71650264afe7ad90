//! Scalar codec implementations.
//!
//! Unsigned integers, bools and enums ride the Varint wire type; signed
//! integers zigzag through SVarint; floats are fixed-width bit patterns.
//! Strings and byte blobs are length-prefixed.

use crate::error::{Error, ErrorKind};
use crate::float;
use crate::options::Options;
use crate::reader::Reader;
use crate::varint::{self, VarintCodec};
use crate::wire::WireType;
use crate::writer::Writer;

use super::{Decode, Encode, WireValue};

/// A scalar that can be written as a raw, untagged packed element.
///
/// Floats canonicalize here: packed position is one of the two places
/// determinism requires it. The tagged [`Encode`] impls preserve bits.
pub trait ScalarCodec: Copy + Default {
    /// Worst-case encoded size of one element, for the packed cap check.
    const MAX_ELEM_SIZE: usize;

    fn encode_raw(self, w: &mut Writer) -> Result<(), Error>;
    fn decode_raw(r: &mut Reader<'_>) -> Result<Self, Error>;
    fn encoded_raw_len(self) -> usize;
}

macro_rules! impl_unsigned {
    ($($ty:ty),+) => {$(
        impl WireValue for $ty {
            const WIRE_TYPE: WireType = WireType::Varint;
        }

        impl Encode for $ty {
            #[inline]
            fn encode(&self, w: &mut Writer) -> Result<(), Error> {
                w.put_uvarint(u64::from(*self))
            }

            #[inline]
            fn encoded_len(&self, _opts: &Options) -> Result<usize, Error> {
                Ok(u64::from(*self).varint_len())
            }
        }

        impl Decode for $ty {
            #[inline]
            fn decode_into(r: &mut Reader<'_>, dst: &mut Self) -> Result<(), Error> {
                let raw = r.read_uvarint()?;
                *dst = <$ty>::try_from(raw).map_err(|_| r.fail(ErrorKind::Overflow))?;
                Ok(())
            }
        }

        impl ScalarCodec for $ty {
            const MAX_ELEM_SIZE: usize = varint::MAX_VARINT_BYTES;

            #[inline]
            fn encode_raw(self, w: &mut Writer) -> Result<(), Error> {
                w.put_uvarint(u64::from(self))
            }

            #[inline]
            fn decode_raw(r: &mut Reader<'_>) -> Result<Self, Error> {
                let raw = r.read_uvarint()?;
                <$ty>::try_from(raw).map_err(|_| r.fail(ErrorKind::Overflow))
            }

            #[inline]
            fn encoded_raw_len(self) -> usize {
                u64::from(self).varint_len()
            }
        }
    )+};
}

impl_unsigned!(u8, u16, u32, u64);

macro_rules! impl_signed {
    ($($ty:ty),+) => {$(
        impl WireValue for $ty {
            const WIRE_TYPE: WireType = WireType::SVarint;
        }

        impl Encode for $ty {
            #[inline]
            fn encode(&self, w: &mut Writer) -> Result<(), Error> {
                w.put_svarint(i64::from(*self))
            }

            #[inline]
            fn encoded_len(&self, _opts: &Options) -> Result<usize, Error> {
                Ok(varint::zigzag_encode(i64::from(*self)).varint_len())
            }
        }

        impl Decode for $ty {
            #[inline]
            fn decode_into(r: &mut Reader<'_>, dst: &mut Self) -> Result<(), Error> {
                let raw = r.read_svarint()?;
                *dst = <$ty>::try_from(raw).map_err(|_| r.fail(ErrorKind::Overflow))?;
                Ok(())
            }
        }

        impl ScalarCodec for $ty {
            const MAX_ELEM_SIZE: usize = varint::MAX_VARINT_BYTES;

            #[inline]
            fn encode_raw(self, w: &mut Writer) -> Result<(), Error> {
                w.put_svarint(i64::from(self))
            }

            #[inline]
            fn decode_raw(r: &mut Reader<'_>) -> Result<Self, Error> {
                let raw = r.read_svarint()?;
                <$ty>::try_from(raw).map_err(|_| r.fail(ErrorKind::Overflow))
            }

            #[inline]
            fn encoded_raw_len(self) -> usize {
                varint::zigzag_encode(i64::from(self)).varint_len()
            }
        }
    )+};
}

impl_signed!(i8, i16, i32, i64);

impl WireValue for bool {
    const WIRE_TYPE: WireType = WireType::Varint;
}

impl Encode for bool {
    #[inline]
    fn encode(&self, w: &mut Writer) -> Result<(), Error> {
        w.put_uvarint(u64::from(*self))
    }

    #[inline]
    fn encoded_len(&self, _opts: &Options) -> Result<usize, Error> {
        Ok(1)
    }
}

impl Decode for bool {
    #[inline]
    fn decode_into(r: &mut Reader<'_>, dst: &mut Self) -> Result<(), Error> {
        *dst = r.read_uvarint()? != 0;
        Ok(())
    }
}

impl ScalarCodec for bool {
    const MAX_ELEM_SIZE: usize = 1;

    #[inline]
    fn encode_raw(self, w: &mut Writer) -> Result<(), Error> {
        w.put_uvarint(u64::from(self))
    }

    #[inline]
    fn decode_raw(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(r.read_uvarint()? != 0)
    }

    #[inline]
    fn encoded_raw_len(self) -> usize {
        1
    }
}

impl WireValue for f32 {
    const WIRE_TYPE: WireType = WireType::Fixed32;
}

impl Encode for f32 {
    #[inline]
    fn encode(&self, w: &mut Writer) -> Result<(), Error> {
        // Tagged position: bits preserved.
        w.put_float32(*self)
    }

    #[inline]
    fn encoded_len(&self, _opts: &Options) -> Result<usize, Error> {
        Ok(4)
    }
}

impl Decode for f32 {
    #[inline]
    fn decode_into(r: &mut Reader<'_>, dst: &mut Self) -> Result<(), Error> {
        *dst = r.read_float32()?;
        Ok(())
    }
}

impl ScalarCodec for f32 {
    const MAX_ELEM_SIZE: usize = 4;

    #[inline]
    fn encode_raw(self, w: &mut Writer) -> Result<(), Error> {
        // Packed position: canonical bits.
        w.put_fixed32(float::canonical_bits32(self))
    }

    #[inline]
    fn decode_raw(r: &mut Reader<'_>) -> Result<Self, Error> {
        r.read_float32()
    }

    #[inline]
    fn encoded_raw_len(self) -> usize {
        4
    }
}

impl WireValue for f64 {
    const WIRE_TYPE: WireType = WireType::Fixed64;
}

impl Encode for f64 {
    #[inline]
    fn encode(&self, w: &mut Writer) -> Result<(), Error> {
        // Tagged position: bits preserved.
        w.put_float64(*self)
    }

    #[inline]
    fn encoded_len(&self, _opts: &Options) -> Result<usize, Error> {
        Ok(8)
    }
}

impl Decode for f64 {
    #[inline]
    fn decode_into(r: &mut Reader<'_>, dst: &mut Self) -> Result<(), Error> {
        *dst = r.read_float64()?;
        Ok(())
    }
}

impl ScalarCodec for f64 {
    const MAX_ELEM_SIZE: usize = 8;

    #[inline]
    fn encode_raw(self, w: &mut Writer) -> Result<(), Error> {
        // Packed position: canonical bits.
        w.put_fixed64(float::canonical_bits64(self))
    }

    #[inline]
    fn decode_raw(r: &mut Reader<'_>) -> Result<Self, Error> {
        r.read_float64()
    }

    #[inline]
    fn encoded_raw_len(self) -> usize {
        8
    }
}

impl WireValue for String {
    const WIRE_TYPE: WireType = WireType::Bytes;
}

impl Encode for String {
    #[inline]
    fn encode(&self, w: &mut Writer) -> Result<(), Error> {
        w.put_str(self)
    }

    #[inline]
    fn encoded_len(&self, _opts: &Options) -> Result<usize, Error> {
        Ok((self.len() as u64).varint_len() + self.len())
    }
}

impl Decode for String {
    #[inline]
    fn decode_into(r: &mut Reader<'_>, dst: &mut Self) -> Result<(), Error> {
        *dst = r.read_string()?;
        Ok(())
    }
}

impl WireValue for Vec<u8> {
    const WIRE_TYPE: WireType = WireType::Bytes;
}

impl Encode for Vec<u8> {
    #[inline]
    fn encode(&self, w: &mut Writer) -> Result<(), Error> {
        w.put_len_prefixed(self)
    }

    #[inline]
    fn encoded_len(&self, _opts: &Options) -> Result<usize, Error> {
        Ok((self.len() as u64).varint_len() + self.len())
    }
}

impl Decode for Vec<u8> {
    #[inline]
    fn decode_into(r: &mut Reader<'_>, dst: &mut Self) -> Result<(), Error> {
        *dst = r.read_bytes()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip<T>(value: T)
    where
        T: Encode + Decode + Default + PartialEq + core::fmt::Debug,
    {
        let opts = Options::default();
        let mut w = Writer::new();
        value.encode(&mut w).unwrap();
        assert_eq!(w.len(), value.encoded_len(&opts).unwrap());

        let buf = w.into_bytes();
        let mut r = Reader::new(&buf);
        let mut decoded = T::default();
        T::decode_into(&mut r, &mut decoded).unwrap();
        assert_eq!(decoded, value);
        r.expect_consumed().unwrap();
    }

    #[test]
    fn test_integer_roundtrips() {
        roundtrip(0u8);
        roundtrip(u8::MAX);
        roundtrip(0u32);
        roundtrip(u32::MAX);
        roundtrip(u64::MAX);

        roundtrip(0i8);
        roundtrip(i8::MIN);
        roundtrip(-1i32);
        roundtrip(i32::MIN);
        roundtrip(i64::MIN);
        roundtrip(i64::MAX);

        roundtrip(true);
        roundtrip(false);
    }

    #[test]
    fn test_narrow_overflow() {
        let mut w = Writer::new();
        300u64.encode(&mut w).unwrap();
        let buf = w.into_bytes();
        let mut r = Reader::new(&buf);
        let mut dst = 0u8;
        assert!(u8::decode_into(&mut r, &mut dst)
            .unwrap_err()
            .is(ErrorKind::Overflow));
    }

    #[test]
    fn test_float_bits_preserved_when_tagged() {
        // A non-canonical NaN survives tagged encoding untouched.
        let weird = f64::from_bits(0x7ff8_0000_0000_beef);
        let mut w = Writer::new();
        weird.encode(&mut w).unwrap();
        let buf = w.into_bytes();
        let mut r = Reader::new(&buf);
        let mut decoded = 0f64;
        f64::decode_into(&mut r, &mut decoded).unwrap();
        assert_eq!(decoded.to_bits(), weird.to_bits());
    }

    #[test]
    fn test_float_canonical_when_packed() {
        let mut w = Writer::new();
        (-0.0f64).encode_raw(&mut w).unwrap();
        f64::NAN.encode_raw(&mut w).unwrap();
        let buf = w.into_bytes();
        assert_eq!(&buf[..8], &0u64.to_le_bytes());
        assert_eq!(&buf[8..], &crate::float::CANONICAL_NAN_BITS64.to_le_bytes());
    }

    #[test]
    fn test_string_and_bytes() {
        roundtrip(String::new());
        roundtrip(String::from("héllo"));
        roundtrip(Vec::<u8>::new());
        roundtrip(vec![0u8, 1, 2, 255]);
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let buf = [2u8, 0xFF, 0xFE];
        let mut r = Reader::new(&buf);
        let mut dst = String::new();
        assert!(String::decode_into(&mut r, &mut dst)
            .unwrap_err()
            .is(ErrorKind::InvalidUtf8));
    }
}
