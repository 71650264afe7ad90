//! Mapping encoding.
//!
//! A mapping field is a Bytes payload of `count` followed by untagged
//! `key, value` pairs. Entries are emitted in key order so the same map
//! always produces the same bytes; for float keys the order is the
//! NaN-aware total order of [`F64Key`](crate::float::F64Key).

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use crate::error::Error;
use crate::float::{self, F32Key, F64Key};
use crate::options::Options;
use crate::reader::Reader;
use crate::varint::{self, VarintCodec};
use crate::wire::{self, WireType};
use crate::writer::Writer;

use super::{Decode, Encode};

/// Types usable as mapping keys: bool, integers, strings and the float
/// key wrappers. `Ord` doubles as the deterministic emission order.
pub trait MapKey: Ord + Clone {
    fn encode_key(&self, w: &mut Writer) -> Result<(), Error>;
    fn encoded_key_len(&self) -> usize;
    fn decode_key(r: &mut Reader<'_>) -> Result<Self, Error>;
}

macro_rules! impl_unsigned_key {
    ($($ty:ty),+) => {$(
        impl MapKey for $ty {
            #[inline]
            fn encode_key(&self, w: &mut Writer) -> Result<(), Error> {
                w.put_uvarint(u64::from(*self))
            }

            #[inline]
            fn encoded_key_len(&self) -> usize {
                u64::from(*self).varint_len()
            }

            #[inline]
            fn decode_key(r: &mut Reader<'_>) -> Result<Self, Error> {
                let raw = r.read_uvarint()?;
                <$ty>::try_from(raw).map_err(|_| r.fail(crate::error::ErrorKind::Overflow))
            }
        }
    )+};
}

impl_unsigned_key!(u8, u16, u32, u64);

macro_rules! impl_signed_key {
    ($($ty:ty),+) => {$(
        impl MapKey for $ty {
            #[inline]
            fn encode_key(&self, w: &mut Writer) -> Result<(), Error> {
                w.put_svarint(i64::from(*self))
            }

            #[inline]
            fn encoded_key_len(&self) -> usize {
                varint::zigzag_encode(i64::from(*self)).varint_len()
            }

            #[inline]
            fn decode_key(r: &mut Reader<'_>) -> Result<Self, Error> {
                let raw = r.read_svarint()?;
                <$ty>::try_from(raw).map_err(|_| r.fail(crate::error::ErrorKind::Overflow))
            }
        }
    )+};
}

impl_signed_key!(i8, i16, i32, i64);

impl MapKey for bool {
    #[inline]
    fn encode_key(&self, w: &mut Writer) -> Result<(), Error> {
        w.put_uvarint(u64::from(*self))
    }

    #[inline]
    fn encoded_key_len(&self) -> usize {
        1
    }

    #[inline]
    fn decode_key(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(r.read_uvarint()? != 0)
    }
}

impl MapKey for String {
    #[inline]
    fn encode_key(&self, w: &mut Writer) -> Result<(), Error> {
        w.put_str(self)
    }

    #[inline]
    fn encoded_key_len(&self) -> usize {
        (self.len() as u64).varint_len() + self.len()
    }

    #[inline]
    fn decode_key(r: &mut Reader<'_>) -> Result<Self, Error> {
        r.read_string()
    }
}

impl MapKey for F32Key {
    /// Canonical bits: key position is where float determinism applies.
    #[inline]
    fn encode_key(&self, w: &mut Writer) -> Result<(), Error> {
        w.put_fixed32(float::canonical_bits32(self.0))
    }

    #[inline]
    fn encoded_key_len(&self) -> usize {
        4
    }

    #[inline]
    fn decode_key(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(F32Key(r.read_float32()?))
    }
}

impl MapKey for F64Key {
    /// Canonical bits: key position is where float determinism applies.
    #[inline]
    fn encode_key(&self, w: &mut Writer) -> Result<(), Error> {
        w.put_fixed64(float::canonical_bits64(self.0))
    }

    #[inline]
    fn encoded_key_len(&self) -> usize {
        8
    }

    #[inline]
    fn decode_key(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(F64Key(r.read_float64()?))
    }
}

/// Mapping fields, whether backed by `BTreeMap` or `HashMap`.
pub trait CramMap: Default {
    /// Emit the whole field: tag plus length-prefixed payload. Empty maps
    /// are omitted.
    fn encode_map_field(&self, number: u32, w: &mut Writer) -> Result<(), Error>;

    /// Encoded size of [`encode_map_field`](CramMap::encode_map_field).
    fn encoded_map_field_len(&self, number: u32, opts: &Options) -> Result<usize, Error>;

    /// Decode a mapping payload, merging entries into `dst`. Duplicate
    /// keys keep the last value.
    fn decode_map_field(r: &mut Reader<'_>, dst: &mut Self) -> Result<(), Error>;

    fn map_len(&self) -> usize;

    fn is_map_empty(&self) -> bool {
        self.map_len() == 0
    }
}

fn payload_len<'a, K, V>(
    entries: impl Iterator<Item = (&'a K, &'a V)>,
    count: usize,
    opts: &Options,
) -> Result<usize, Error>
where
    K: MapKey + 'a,
    V: Encode + 'a,
{
    let mut payload = (count as u64).varint_len();
    for (key, value) in entries {
        payload += key.encoded_key_len() + value.encoded_len(opts)?;
    }
    Ok(payload)
}

fn encode_entries<'a, K, V>(
    entries: impl Iterator<Item = (&'a K, &'a V)> + Clone,
    count: usize,
    number: u32,
    w: &mut Writer,
) -> Result<(), Error>
where
    K: MapKey + 'a,
    V: Encode + 'a,
{
    let opts = w.options().clone();
    w.put_tag(number, WireType::Bytes)?;
    let payload = payload_len(entries.clone(), count, &opts)?;
    w.put_uvarint(payload as u64)?;
    w.put_uvarint(count as u64)?;
    for (key, value) in entries {
        key.encode_key(w)?;
        value.encode(w)?;
    }
    Ok(())
}

fn decode_entries<K, V, F>(r: &mut Reader<'_>, mut insert: F) -> Result<(), Error>
where
    K: MapKey,
    V: Decode + Default,
    F: FnMut(K, V),
{
    let len = r.read_length()?;
    let previous = r.push_limit(len)?;
    r.enter_nested()?;
    let count = r.read_map_header()?;
    for _ in 0..count {
        let key = K::decode_key(r)?;
        let mut value = V::default();
        V::decode_into(r, &mut value)?;
        insert(key, value);
    }
    r.expect_consumed()?;
    r.exit_nested();
    r.pop_limit(previous);
    Ok(())
}

impl<K, V> CramMap for BTreeMap<K, V>
where
    K: MapKey,
    V: Encode + Decode + Default,
{
    fn encode_map_field(&self, number: u32, w: &mut Writer) -> Result<(), Error> {
        if self.is_empty() {
            return Ok(());
        }
        // BTreeMap iteration is already the deterministic key order.
        encode_entries(self.iter(), self.len(), number, w)
    }

    fn encoded_map_field_len(&self, number: u32, opts: &Options) -> Result<usize, Error> {
        if self.is_empty() {
            return Ok(0);
        }
        let payload = payload_len(self.iter(), self.len(), opts)?;
        Ok(wire::encoded_tag_len(number) + (payload as u64).varint_len() + payload)
    }

    fn decode_map_field(r: &mut Reader<'_>, dst: &mut Self) -> Result<(), Error> {
        decode_entries(r, |key, value| {
            dst.insert(key, value);
        })
    }

    fn map_len(&self) -> usize {
        self.len()
    }
}

impl<K, V> CramMap for HashMap<K, V>
where
    K: MapKey + Hash + Eq,
    V: Encode + Decode + Default,
{
    fn encode_map_field(&self, number: u32, w: &mut Writer) -> Result<(), Error> {
        if self.is_empty() {
            return Ok(());
        }
        if w.options().deterministic {
            let mut entries: Vec<(&K, &V)> = self.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            encode_entries(entries.iter().copied(), self.len(), number, w)
        } else {
            encode_entries(self.iter(), self.len(), number, w)
        }
    }

    fn encoded_map_field_len(&self, number: u32, opts: &Options) -> Result<usize, Error> {
        if self.is_empty() {
            return Ok(0);
        }
        let payload = payload_len(self.iter(), self.len(), opts)?;
        Ok(wire::encoded_tag_len(number) + (payload as u64).varint_len() + payload)
    }

    fn decode_map_field(r: &mut Reader<'_>, dst: &mut Self) -> Result<(), Error> {
        decode_entries(r, |key, value| {
            dst.insert(key, value);
        })
    }

    fn map_len(&self) -> usize {
        self.len()
    }
}

#[cfg(test)]
mod tests {
    use crate::wire::DecodedTag;

    use super::*;

    fn roundtrip_btree<K, V>(map: &BTreeMap<K, V>) -> BTreeMap<K, V>
    where
        K: MapKey + core::fmt::Debug,
        V: Encode + Decode + Default + PartialEq + core::fmt::Debug,
    {
        let opts = Options::default();
        let mut w = Writer::new();
        map.encode_map_field(7, &mut w).unwrap();
        assert_eq!(w.len(), map.encoded_map_field_len(7, &opts).unwrap());

        let buf = w.into_bytes();
        let mut decoded = BTreeMap::new();
        if buf.is_empty() {
            return decoded;
        }
        let mut r = Reader::new(&buf);
        let tag = r.read_tag().unwrap();
        assert_eq!(
            tag,
            DecodedTag::Field {
                number: 7,
                wire_type: WireType::Bytes
            }
        );
        BTreeMap::decode_map_field(&mut r, &mut decoded).unwrap();
        r.expect_consumed().unwrap();
        decoded
    }

    #[test]
    fn test_string_map_roundtrip() {
        let mut map = BTreeMap::new();
        map.insert(String::from("banana"), 3i64);
        map.insert(String::from("apple"), 5);
        map.insert(String::from("cherry"), 7);
        assert_eq!(roundtrip_btree(&map), map);
    }

    #[test]
    fn test_empty_map_elided() {
        let map: BTreeMap<u32, u32> = BTreeMap::new();
        assert!(roundtrip_btree(&map).is_empty());
    }

    #[test]
    fn test_hashmap_matches_btree_bytes() {
        let mut hash = HashMap::new();
        let mut btree = BTreeMap::new();
        for (key, value) in [(9u64, 1i64), (2, 2), (151, 3), (4, 4)] {
            hash.insert(key, value);
            btree.insert(key, value);
        }

        let mut via_hash = Writer::new();
        hash.encode_map_field(1, &mut via_hash).unwrap();
        let mut via_btree = Writer::new();
        btree.encode_map_field(1, &mut via_btree).unwrap();
        assert_eq!(via_hash.as_slice(), via_btree.as_slice());
    }

    #[test]
    fn test_float_keys_canonicalize_and_collapse() {
        let mut map = BTreeMap::new();
        map.insert(F64Key(f64::NAN), 1i64);
        map.insert(F64Key(f64::from_bits(0x7ff8_dead_beef_0000)), 2);
        map.insert(F64Key(-0.0), 3);
        map.insert(F64Key(1.0), 4);
        // NaNs collapsed at insert.
        assert_eq!(map.len(), 3);

        let mut reference = BTreeMap::new();
        reference.insert(F64Key(f64::NAN), 2i64);
        reference.insert(F64Key(0.0), 3);
        reference.insert(F64Key(1.0), 4);

        let mut lhs = Writer::new();
        map.encode_map_field(1, &mut lhs).unwrap();
        let mut rhs = Writer::new();
        reference.encode_map_field(1, &mut rhs).unwrap();
        assert_eq!(lhs.as_slice(), rhs.as_slice());

        // Re-encoding the decoded value yields the same bytes.
        let buf = lhs.into_bytes();
        let mut r = Reader::new(&buf);
        r.read_tag().unwrap();
        let mut decoded: BTreeMap<F64Key, i64> = BTreeMap::new();
        BTreeMap::decode_map_field(&mut r, &mut decoded).unwrap();
        let mut again = Writer::new();
        decoded.encode_map_field(1, &mut again).unwrap();
        assert_eq!(again.as_slice(), &buf[..]);
    }

    #[test]
    fn test_duplicate_key_last_wins() {
        // Hand-build a payload with the same key twice.
        let mut w = Writer::new();
        w.put_tag(1, WireType::Bytes).unwrap();
        let mut body = Writer::new();
        body.put_uvarint(2).unwrap();
        body.put_uvarint(5).unwrap(); // key 5
        body.put_svarint(100).unwrap();
        body.put_uvarint(5).unwrap(); // key 5 again
        body.put_svarint(200).unwrap();
        w.put_uvarint(body.len() as u64).unwrap();
        w.put_raw(body.as_slice()).unwrap();

        let buf = w.into_bytes();
        let mut r = Reader::new(&buf);
        r.read_tag().unwrap();
        let mut decoded: BTreeMap<u64, i64> = BTreeMap::new();
        BTreeMap::decode_map_field(&mut r, &mut decoded).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[&5], 200);
    }
}
