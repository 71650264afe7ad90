//! The encode-side buffer: a growable byte buffer with typed appenders for
//! every wire primitive.
//!
//! A writer is owned by one task for the duration of one marshal. Buffers
//! come from and return to the size-tiered [`pool`](crate::pool); the total
//! encoded size is capped so a runaway encode cannot grow without bound.

use crate::error::{Error, ErrorKind};
use crate::options::Options;
use crate::pool;
use crate::registry::Registry;
use crate::varint::{self, VarintCodec};
use crate::wire::{self, WireType};

/// Hard cap on a single encoded segment (256 MiB).
const MAX_BUFFER_BYTES: usize = 256 * 1024 * 1024;

/// Cap on `count * element_size` for a packed sequence (~4 GiB), checked
/// before any allocation happens.
const PACKED_BYTES_CAP: u64 = u32::MAX as u64;

/// The encode-side cursor.
#[derive(Debug)]
pub struct Writer {
    buf: Vec<u8>,
    opts: Options,
}

impl Writer {
    pub fn new() -> Self {
        Writer::with_options(Options::default())
    }

    pub fn with_options(opts: Options) -> Self {
        Writer {
            buf: Vec::new(),
            opts,
        }
    }

    /// A writer whose buffer comes from the shared pool, pre-sized for
    /// `hint` bytes.
    pub fn pooled(hint: usize, opts: Options) -> Self {
        Writer {
            buf: pool::get(hint),
            opts,
        }
    }

    /// The options this writer encodes under.
    pub fn options(&self) -> &Options {
        &self.opts
    }

    /// The registry polymorphic slots resolve against.
    pub fn registry(&self) -> &Registry {
        self.opts.registry()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Take the encoded bytes out of the writer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Clear the buffer, keeping its capacity for reuse.
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// Return the buffer to the shared pool.
    pub fn recycle(self) {
        pool::put(self.buf);
    }

    /// Check the buffer may grow by `additional` bytes.
    #[inline]
    fn ensure(&mut self, additional: usize) -> Result<(), Error> {
        if self.buf.len().saturating_add(additional) > MAX_BUFFER_BYTES {
            return Err(Error::new(ErrorKind::BufferLimit));
        }
        Ok(())
    }

    #[inline]
    pub fn put_uvarint(&mut self, value: u64) -> Result<(), Error> {
        self.ensure(varint::MAX_VARINT_BYTES)?;
        value.encode_varint(&mut self.buf);
        Ok(())
    }

    #[inline]
    pub fn put_svarint(&mut self, value: i64) -> Result<(), Error> {
        self.ensure(varint::MAX_VARINT_BYTES)?;
        varint::encode_svarint(value, &mut self.buf);
        Ok(())
    }

    #[inline]
    pub fn put_fixed32(&mut self, value: u32) -> Result<(), Error> {
        self.ensure(4)?;
        self.buf.extend_from_slice(&value.to_le_bytes());
        Ok(())
    }

    #[inline]
    pub fn put_fixed64(&mut self, value: u64) -> Result<(), Error> {
        self.ensure(8)?;
        self.buf.extend_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Append a float through its IEEE-754 bit pattern, bits preserved.
    #[inline]
    pub fn put_float32(&mut self, value: f32) -> Result<(), Error> {
        self.put_fixed32(value.to_bits())
    }

    /// Append a float through its IEEE-754 bit pattern, bits preserved.
    #[inline]
    pub fn put_float64(&mut self, value: f64) -> Result<(), Error> {
        self.put_fixed64(value.to_bits())
    }

    #[inline]
    pub fn put_tag(&mut self, number: u32, wire_type: WireType) -> Result<(), Error> {
        self.ensure(1 + varint::MAX_VARINT_BYTES)?;
        wire::encode_tag(number, wire_type, &mut self.buf);
        Ok(())
    }

    /// Append the `0x00` end-of-record marker.
    #[inline]
    pub fn put_end_marker(&mut self) -> Result<(), Error> {
        self.ensure(1)?;
        self.buf.push(wire::END_MARKER);
        Ok(())
    }

    /// Append a length-prefixed byte blob.
    pub fn put_len_prefixed(&mut self, data: &[u8]) -> Result<(), Error> {
        self.ensure(varint::MAX_VARINT_BYTES + data.len())?;
        (data.len() as u64).encode_varint(&mut self.buf);
        self.buf.extend_from_slice(data);
        Ok(())
    }

    /// Append a length-prefixed UTF-8 string.
    #[inline]
    pub fn put_str(&mut self, value: &str) -> Result<(), Error> {
        self.put_len_prefixed(value.as_bytes())
    }

    /// Append raw bytes with no framing.
    pub fn put_raw(&mut self, data: &[u8]) -> Result<(), Error> {
        self.ensure(data.len())?;
        self.buf.extend_from_slice(data);
        Ok(())
    }

    /// Check a packed sequence of `count` elements of at most `elem_size`
    /// bytes each stays under the packed cap, then write the count header.
    pub fn put_packed_header(&mut self, count: usize, elem_size: usize) -> Result<(), Error> {
        let total = (count as u64).saturating_mul(elem_size as u64);
        if total > PACKED_BYTES_CAP {
            return Err(Error::new(ErrorKind::Overflow));
        }
        self.put_uvarint(count as u64)
    }
}

impl Default for Writer {
    fn default() -> Self {
        Writer::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_appenders() {
        let mut w = Writer::new();
        w.put_tag(1, WireType::SVarint).unwrap();
        w.put_svarint(1).unwrap();
        w.put_tag(2, WireType::Bytes).unwrap();
        w.put_str("ab").unwrap();
        w.put_end_marker().unwrap();
        // The worked example from the wire format documentation.
        assert_eq!(w.as_slice(), &[0x1C, 0x02, 0x24, 0x02, 0x61, 0x62, 0x00]);
    }

    #[test]
    fn test_fixed_little_endian() {
        let mut w = Writer::new();
        w.put_fixed32(0x0102_0304).unwrap();
        assert_eq!(w.as_slice(), &[0x04, 0x03, 0x02, 0x01]);

        w.reset();
        w.put_float64(1.0).unwrap();
        assert_eq!(w.as_slice(), &1.0f64.to_bits().to_le_bytes());
    }

    #[test]
    fn test_packed_cap() {
        let mut w = Writer::new();
        let err = w.put_packed_header(usize::MAX, 8).unwrap_err();
        assert!(err.is(ErrorKind::Overflow));
        // A sane header is just the count varint.
        w.reset();
        w.put_packed_header(3, 8).unwrap();
        assert_eq!(w.as_slice(), &[0x03]);
    }

    #[test]
    fn test_reset_keeps_capacity() {
        let mut w = Writer::new();
        w.put_raw(&[0u8; 1024]).unwrap();
        let capacity_before = w.buf.capacity();
        w.reset();
        assert!(w.is_empty());
        assert_eq!(w.buf.capacity(), capacity_before);
    }
}
