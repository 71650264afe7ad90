//! The decode-side cursor: a bounded window over a byte slice with limit
//! enforcement, depth tracking and a sticky error.
//!
//! Once any operation fails the reader is dead: the first error sticks and
//! every later call returns it, so decode loops only need to check at
//! natural boundaries.
//!
//! # Zero-copy tokens
//!
//! [`read_bytes_zc`](Reader::read_bytes_zc) and
//! [`read_str_zc`](Reader::read_str_zc) borrow from the underlying buffer
//! instead of copying. Each token snapshots the reader's generation;
//! [`reset`](Reader::reset) bumps it, after which stale tokens refuse to
//! materialize.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{Error, ErrorKind};
use crate::options::Options;
use crate::registry::Registry;
use crate::varint::{self, VarintCodec};
use crate::wire::{self, DecodedTag, WireType};

/// The decode-side cursor.
#[derive(Debug)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
    /// End of the current window; shrinks while inside an embedded record.
    end: usize,
    depth: u32,
    opts: Options,
    err: Option<Error>,
    epoch: Arc<AtomicU64>,
    generation: u64,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Reader::with_options(buf, Options::default())
    }

    pub fn with_options(buf: &'a [u8], opts: Options) -> Self {
        let mut reader = Reader {
            buf,
            pos: 0,
            end: buf.len(),
            depth: 0,
            opts,
            err: None,
            epoch: Arc::new(AtomicU64::new(0)),
            generation: 0,
        };
        if buf.len() > reader.opts.limits.max_message_size {
            reader.err = Some(Error::new(ErrorKind::MaxSizeExceeded));
        }
        reader
    }

    /// Re-arm this reader over a new buffer.
    ///
    /// Bumps the generation, so zero-copy tokens issued before the reset go
    /// stale.
    pub fn reset(&mut self, buf: &'a [u8]) {
        self.generation = self.epoch.fetch_add(1, Ordering::Release) + 1;
        self.buf = buf;
        self.pos = 0;
        self.end = buf.len();
        self.depth = 0;
        self.err = None;
        if buf.len() > self.opts.limits.max_message_size {
            self.err = Some(Error::new(ErrorKind::MaxSizeExceeded));
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left in the current window.
    pub fn remaining(&self) -> usize {
        self.end - self.pos
    }

    pub fn is_at_end(&self) -> bool {
        self.pos == self.end
    }

    /// The sticky error, if any operation has failed.
    pub fn error(&self) -> Option<&Error> {
        self.err.as_ref()
    }

    pub fn options(&self) -> &Options {
        &self.opts
    }

    /// True when unknown fields must be rejected instead of skipped.
    pub fn strict(&self) -> bool {
        self.opts.strict
    }

    /// The registry polymorphic slots resolve against.
    pub fn registry(&self) -> &Registry {
        self.opts.registry()
    }

    #[inline]
    fn check(&self) -> Result<(), Error> {
        match &self.err {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    /// Record `kind` as the sticky error at the current offset. The cursor
    /// does not advance past a failed operation. Decode impls use this so
    /// their failures stick like the built-in ones.
    #[cold]
    pub fn fail(&mut self, kind: ErrorKind) -> Error {
        let err = Error::new(kind).with_offset(self.pos);
        if self.err.is_none() {
            self.err = Some(err.clone());
        }
        err
    }

    #[inline]
    fn window(&self) -> &'a [u8] {
        &self.buf[self.pos..self.end]
    }

    /// Consume `n` bytes, failing with `UnexpectedEof` if the window is
    /// short.
    #[inline]
    fn take(&mut self, n: usize) -> Result<&'a [u8], Error> {
        self.check()?;
        if self.remaining() < n {
            return Err(self.fail(ErrorKind::UnexpectedEof));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Read one tag, or the end-of-record marker.
    pub fn read_tag(&mut self) -> Result<DecodedTag, Error> {
        self.check()?;
        match wire::decode_tag(self.window()) {
            Ok((tag, read)) => {
                self.pos += read;
                Ok(tag)
            }
            Err(kind) => Err(self.fail(kind)),
        }
    }

    pub fn read_uvarint(&mut self) -> Result<u64, Error> {
        self.check()?;
        match u64::decode_varint(self.window()) {
            Ok((value, read)) => {
                self.pos += read;
                Ok(value)
            }
            Err(kind) => Err(self.fail(kind)),
        }
    }

    pub fn read_svarint(&mut self) -> Result<i64, Error> {
        self.read_uvarint().map(varint::zigzag_decode)
    }

    pub fn read_fixed32(&mut self) -> Result<u32, Error> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_fixed64(&mut self) -> Result<u64, Error> {
        let bytes = self.take(8)?;
        Ok(u64::from_le_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ]))
    }

    pub fn read_float32(&mut self) -> Result<f32, Error> {
        self.read_fixed32().map(f32::from_bits)
    }

    pub fn read_float64(&mut self) -> Result<f64, Error> {
        self.read_fixed64().map(f64::from_bits)
    }

    /// Read a length prefix, comparing in `u64` against the remaining
    /// window before narrowing, so a hostile length cannot wrap the bounds
    /// check.
    pub(crate) fn read_length(&mut self) -> Result<usize, Error> {
        self.check()?;
        match u64::decode_varint(self.window()) {
            Ok((len, read)) => {
                if len > (self.remaining() - read) as u64 {
                    return Err(self.fail(ErrorKind::UnexpectedEof));
                }
                self.pos += read;
                Ok(len as usize)
            }
            Err(kind) => Err(self.fail(kind)),
        }
    }

    /// Read a length-prefixed blob, copying it out.
    pub fn read_bytes(&mut self) -> Result<Vec<u8>, Error> {
        let len = self.read_length()?;
        if len > self.opts.limits.max_bytes_length {
            return Err(self.fail(ErrorKind::MaxBytesLength));
        }
        Ok(self.take(len)?.to_vec())
    }

    /// Read a length-prefixed blob without copying.
    pub fn read_bytes_zc(&mut self) -> Result<ZeroCopyBytes<'a>, Error> {
        let len = self.read_length()?;
        if len > self.opts.limits.max_bytes_length {
            return Err(self.fail(ErrorKind::MaxBytesLength));
        }
        let data = self.take(len)?;
        Ok(ZeroCopyBytes {
            data,
            generation: self.generation,
            epoch: Arc::clone(&self.epoch),
        })
    }

    /// Read a length-prefixed string, copying it out.
    ///
    /// Validates UTF-8 unless disabled in the options, in which case
    /// invalid sequences are replaced.
    pub fn read_string(&mut self) -> Result<String, Error> {
        let len = self.read_length()?;
        if len > self.opts.limits.max_string_length {
            return Err(self.fail(ErrorKind::MaxStringLength));
        }
        let data = self.take(len)?;
        if self.opts.validate_utf8 {
            match core::str::from_utf8(data) {
                Ok(s) => Ok(s.to_string()),
                Err(_) => Err(self.fail(ErrorKind::InvalidUtf8)),
            }
        } else {
            Ok(String::from_utf8_lossy(data).into_owned())
        }
    }

    /// Read a length-prefixed string without copying. Always validates.
    pub fn read_str_zc(&mut self) -> Result<ZeroCopyStr<'a>, Error> {
        let len = self.read_length()?;
        if len > self.opts.limits.max_string_length {
            return Err(self.fail(ErrorKind::MaxStringLength));
        }
        let data = self.take(len)?;
        match core::str::from_utf8(data) {
            Ok(s) => Ok(ZeroCopyStr {
                data: s,
                generation: self.generation,
                epoch: Arc::clone(&self.epoch),
            }),
            Err(_) => Err(self.fail(ErrorKind::InvalidUtf8)),
        }
    }

    /// Read a sequence count header, bounds-checked against the array limit
    /// and pessimistically against the remaining window (every element is
    /// at least one byte).
    pub fn read_array_header(&mut self) -> Result<usize, Error> {
        self.check()?;
        match u64::decode_varint(self.window()) {
            Ok((count, read)) => {
                if count > self.opts.limits.max_array_length as u64 {
                    return Err(self.fail(ErrorKind::MaxArrayLength));
                }
                if count > (self.remaining() - read) as u64 {
                    return Err(self.fail(ErrorKind::UnexpectedEof));
                }
                self.pos += read;
                Ok(count as usize)
            }
            Err(kind) => Err(self.fail(kind)),
        }
    }

    /// Read a mapping count header. Same discipline as
    /// [`read_array_header`](Reader::read_array_header).
    pub fn read_map_header(&mut self) -> Result<usize, Error> {
        self.check()?;
        match u64::decode_varint(self.window()) {
            Ok((count, read)) => {
                if count > self.opts.limits.max_map_size as u64 {
                    return Err(self.fail(ErrorKind::MaxMapSize));
                }
                if count > (self.remaining() - read) as u64 {
                    return Err(self.fail(ErrorKind::UnexpectedEof));
                }
                self.pos += read;
                Ok(count as usize)
            }
            Err(kind) => Err(self.fail(kind)),
        }
    }

    /// Skip one value of the given wire type. This is the forward-compat
    /// path for unknown fields.
    pub fn skip_value(&mut self, wire_type: WireType) -> Result<(), Error> {
        match wire_type {
            WireType::Varint | WireType::SVarint => {
                self.read_uvarint()?;
            }
            WireType::Fixed32 => {
                self.take(4)?;
            }
            WireType::Fixed64 => {
                self.take(8)?;
            }
            WireType::Bytes => {
                let len = self.read_length()?;
                self.take(len)?;
            }
            WireType::TypeRef => {
                let id = self.read_uvarint()?;
                self.skip_type_ref_payload(id)?;
            }
        }
        Ok(())
    }

    /// Skip a TypeRef payload given its TypeID. Built-in scalar ids pin the
    /// payload shape; every user-range id carries a length-prefixed
    /// payload.
    fn skip_type_ref_payload(&mut self, id: u64) -> Result<(), Error> {
        use crate::registry::scalar_ids;
        match id {
            0 => Ok(()),
            scalar_ids::BOOL..=scalar_ids::UINT64 => self.read_uvarint().map(|_| ()),
            scalar_ids::FLOAT32 => self.take(4).map(|_| ()),
            scalar_ids::FLOAT64 => self.take(8).map(|_| ()),
            scalar_ids::STRING | scalar_ids::BYTES => {
                let len = self.read_length()?;
                self.take(len).map(|_| ())
            }
            id if id >= 64 => {
                let len = self.read_length()?;
                self.take(len).map(|_| ())
            }
            _ => Err(self.fail(ErrorKind::UnknownType)),
        }
    }

    /// Enter one level of nesting. Every recursive descent into a record,
    /// sequence or mapping brackets itself with this and
    /// [`exit_nested`](Reader::exit_nested).
    pub fn enter_nested(&mut self) -> Result<(), Error> {
        self.check()?;
        if self.depth >= self.opts.limits.max_depth {
            return Err(self.fail(ErrorKind::MaxDepthExceeded));
        }
        self.depth += 1;
        Ok(())
    }

    pub fn exit_nested(&mut self) {
        debug_assert!(self.depth > 0);
        self.depth = self.depth.saturating_sub(1);
    }

    /// Shrink the window to the next `len` bytes, returning the previous
    /// end for [`pop_limit`](Reader::pop_limit).
    pub fn push_limit(&mut self, len: usize) -> Result<usize, Error> {
        self.check()?;
        if len > self.remaining() {
            return Err(self.fail(ErrorKind::UnexpectedEof));
        }
        let previous = self.end;
        self.end = self.pos + len;
        Ok(previous)
    }

    /// Restore a window saved by [`push_limit`](Reader::push_limit).
    pub fn pop_limit(&mut self, previous: usize) {
        debug_assert!(previous >= self.end);
        self.end = previous;
    }

    /// Fail with `TrailingBytes` unless the window is fully consumed.
    pub fn expect_consumed(&mut self) -> Result<(), Error> {
        self.check()?;
        if self.pos != self.end {
            return Err(self.fail(ErrorKind::TrailingBytes));
        }
        Ok(())
    }
}

/// A byte slice borrowed from a [`Reader`]'s buffer.
///
/// Materializing re-checks the reader's generation: after the reader is
/// reset the token is dead.
#[derive(Debug, Clone)]
pub struct ZeroCopyBytes<'a> {
    data: &'a [u8],
    generation: u64,
    epoch: Arc<AtomicU64>,
}

impl<'a> ZeroCopyBytes<'a> {
    #[inline]
    fn is_live(&self) -> bool {
        self.epoch.load(Ordering::Acquire) == self.generation
    }

    /// The borrowed bytes.
    ///
    /// # Panics
    ///
    /// Panics if the reader has been reset since this token was issued. Use
    /// [`try_get`](ZeroCopyBytes::try_get) to handle staleness.
    pub fn get(&self) -> &'a [u8] {
        match self.try_get() {
            Ok(data) => data,
            Err(_) => panic!("zero-copy bytes read after reader reuse"),
        }
    }

    /// The borrowed bytes, or `StaleReference` if the reader moved on.
    pub fn try_get(&self) -> Result<&'a [u8], Error> {
        if self.is_live() {
            Ok(self.data)
        } else {
            Err(Error::new(ErrorKind::StaleReference))
        }
    }

    /// The borrowed bytes, or an empty slice if the token is stale.
    pub fn get_or_empty(&self) -> &'a [u8] {
        self.try_get().unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A string slice borrowed from a [`Reader`]'s buffer. See
/// [`ZeroCopyBytes`].
#[derive(Debug, Clone)]
pub struct ZeroCopyStr<'a> {
    data: &'a str,
    generation: u64,
    epoch: Arc<AtomicU64>,
}

impl<'a> ZeroCopyStr<'a> {
    #[inline]
    fn is_live(&self) -> bool {
        self.epoch.load(Ordering::Acquire) == self.generation
    }

    /// The borrowed string.
    ///
    /// # Panics
    ///
    /// Panics if the reader has been reset since this token was issued.
    pub fn get(&self) -> &'a str {
        match self.try_get() {
            Ok(data) => data,
            Err(_) => panic!("zero-copy string read after reader reuse"),
        }
    }

    /// The borrowed string, or `StaleReference` if the reader moved on.
    pub fn try_get(&self) -> Result<&'a str, Error> {
        if self.is_live() {
            Ok(self.data)
        } else {
            Err(Error::new(ErrorKind::StaleReference))
        }
    }

    /// The borrowed string, or `""` if the token is stale.
    pub fn get_or_empty(&self) -> &'a str {
        self.try_get().unwrap_or("")
    }
}

impl core::fmt::Display for ZeroCopyStr<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.get())
    }
}

#[cfg(test)]
mod tests {
    use crate::limits::Limits;

    use super::*;

    #[test]
    fn test_sticky_error() {
        let mut r = Reader::new(&[0x80]);
        let err = r.read_uvarint().unwrap_err();
        assert!(err.is(ErrorKind::InvalidVarint));
        // Every later operation reports the same failure.
        assert!(r.read_fixed32().unwrap_err().is(ErrorKind::InvalidVarint));
        assert!(r.error().is_some());
    }

    #[test]
    fn test_no_advance_on_error() {
        let mut r = Reader::new(&[0x03, 0xAA]);
        // Length prefix of 3 with only one byte behind it.
        assert!(r.read_bytes().unwrap_err().is(ErrorKind::UnexpectedEof));
        assert_eq!(r.position(), 0);
    }

    #[test]
    fn test_hostile_length_prefix() {
        // Length 2^64 - 1 must be rejected before any allocation.
        let mut buf = Vec::new();
        crate::varint::VarintCodec::encode_varint(u64::MAX, &mut buf);
        let mut r = Reader::new(&buf);
        assert!(r.read_bytes().unwrap_err().is(ErrorKind::UnexpectedEof));
    }

    #[test]
    fn test_string_limit() {
        let opts = Options {
            limits: Limits {
                max_string_length: 4,
                ..Limits::default()
            },
            ..Options::default()
        };
        let mut buf = vec![5u8];
        buf.extend_from_slice(b"hello");
        let mut r = Reader::with_options(&buf, opts);
        assert!(r.read_string().unwrap_err().is(ErrorKind::MaxStringLength));
    }

    #[test]
    fn test_depth_limit() {
        let opts = Options {
            limits: Limits {
                max_depth: 2,
                ..Limits::default()
            },
            ..Options::default()
        };
        let buf = [0u8; 4];
        let mut r = Reader::with_options(&buf, opts);
        r.enter_nested().unwrap();
        r.enter_nested().unwrap();
        assert!(r.enter_nested().unwrap_err().is(ErrorKind::MaxDepthExceeded));
    }

    #[test]
    fn test_message_size_limit() {
        let opts = Options {
            limits: Limits {
                max_message_size: 2,
                ..Limits::default()
            },
            ..Options::default()
        };
        let mut r = Reader::with_options(&[1, 2, 3], opts);
        assert!(r.read_uvarint().unwrap_err().is(ErrorKind::MaxSizeExceeded));
    }

    #[test]
    fn test_window_bounds_embedded_reads() {
        // Window of 2 bytes inside a 4 byte buffer.
        let buf = [0x01, 0x02, 0x03, 0x04];
        let mut r = Reader::new(&buf);
        let prev = r.push_limit(2).unwrap();
        assert_eq!(r.read_uvarint().unwrap(), 1);
        assert_eq!(r.read_uvarint().unwrap(), 2);
        assert!(r.read_uvarint().unwrap_err().is(ErrorKind::UnexpectedEof));
        r.pop_limit(prev);
    }

    #[test]
    fn test_skip_values() {
        let mut w = crate::writer::Writer::new();
        w.put_uvarint(300).unwrap();
        w.put_fixed32(7).unwrap();
        w.put_len_prefixed(b"abc").unwrap();
        w.put_uvarint(42).unwrap();
        let buf = w.into_bytes();

        let mut r = Reader::new(&buf);
        r.skip_value(WireType::Varint).unwrap();
        r.skip_value(WireType::Fixed32).unwrap();
        r.skip_value(WireType::Bytes).unwrap();
        assert_eq!(r.read_uvarint().unwrap(), 42);
        r.expect_consumed().unwrap();
    }

    #[test]
    fn test_zero_copy_generation() {
        let buf = [3u8, b'a', b'b', b'c'];
        let later = [3u8, b'x', b'y', b'z'];
        let mut r = Reader::new(&buf);
        let token = r.read_str_zc().unwrap();
        assert_eq!(token.try_get().unwrap(), "abc");

        r.reset(&later);
        assert!(token.try_get().unwrap_err().is(ErrorKind::StaleReference));
        assert_eq!(token.get_or_empty(), "");

        // A token issued after the reset is live.
        let fresh = r.read_str_zc().unwrap();
        assert_eq!(fresh.get(), "xyz");
    }

    #[test]
    #[should_panic(expected = "reader reuse")]
    fn test_zero_copy_panicking_accessor() {
        let buf = [1u8, b'a'];
        let mut r = Reader::new(&buf);
        let token = r.read_bytes_zc().unwrap();
        r.reset(&buf);
        let _ = token.get();
    }
}
