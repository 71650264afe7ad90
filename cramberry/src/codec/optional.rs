//! Optional values and boxed indirection.
//!
//! An absent optional is omitted from the wire entirely; decoding a value
//! into an `Option` makes it present.

use crate::error::Error;
use crate::options::Options;
use crate::reader::Reader;
use crate::wire::WireType;
use crate::writer::Writer;

use super::{Decode, Encode, WireValue};

impl<T: WireValue> WireValue for Option<T> {
    const WIRE_TYPE: WireType = T::WIRE_TYPE;
}

impl<T: Encode> Encode for Option<T> {
    #[inline]
    fn encode(&self, w: &mut Writer) -> Result<(), Error> {
        match self {
            Some(value) => value.encode(w),
            None => Ok(()),
        }
    }

    #[inline]
    fn encoded_len(&self, opts: &Options) -> Result<usize, Error> {
        match self {
            Some(value) => value.encoded_len(opts),
            None => Ok(0),
        }
    }
}

impl<T: Decode + Default> Decode for Option<T> {
    #[inline]
    fn decode_into(r: &mut Reader<'_>, dst: &mut Self) -> Result<(), Error> {
        // Merge semantics: decode into the existing value if present.
        let inner = dst.get_or_insert_with(T::default);
        T::decode_into(r, inner)
    }
}

impl<T: WireValue> WireValue for Box<T> {
    const WIRE_TYPE: WireType = T::WIRE_TYPE;
}

impl<T: Encode> Encode for Box<T> {
    #[inline]
    fn encode(&self, w: &mut Writer) -> Result<(), Error> {
        (**self).encode(w)
    }

    #[inline]
    fn encoded_len(&self, opts: &Options) -> Result<usize, Error> {
        (**self).encoded_len(opts)
    }
}

impl<T: Decode + Default> Decode for Box<T> {
    #[inline]
    fn decode_into(r: &mut Reader<'_>, dst: &mut Self) -> Result<(), Error> {
        T::decode_into(r, dst)
    }
}
