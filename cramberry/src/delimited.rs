//! Delimited-stream framing: each message on a byte stream is
//! `varint(length)` followed by exactly that many body bytes.
//!
//! Buffering, flow control and async live above this layer; the only
//! contract here is the header-then-body pairing and the per-frame size
//! cap.

use std::io::{Read, Write};
use std::marker::PhantomData;

use crate::codec::Record;
use crate::error::{Error, ErrorKind};
use crate::options::Options;
use crate::pool;
use crate::varint::{VarintCodec, MAX_VARINT_BYTES};

fn io_error(_: std::io::Error) -> Error {
    Error::new(ErrorKind::Io)
}

/// Write one length-prefixed message.
pub fn write_delimited<W: Write, T: Record>(writer: W, value: &T) -> Result<(), Error> {
    write_delimited_with_options(writer, value, &Options::default())
}

/// Write one length-prefixed message under the given options.
pub fn write_delimited_with_options<W: Write, T: Record>(
    mut writer: W,
    value: &T,
    opts: &Options,
) -> Result<(), Error> {
    let body = crate::marshal_with_options(value, opts)?;
    let mut header = [0u8; MAX_VARINT_BYTES];
    let header_len = (body.len() as u64).encode_varint(&mut &mut header[..]);
    writer.write_all(&header[..header_len]).map_err(io_error)?;
    writer.write_all(&body).map_err(io_error)?;
    pool::put(body);
    Ok(())
}

/// Read one length varint from the stream.
///
/// Returns `None` on a clean end of stream (no header byte at all).
fn read_frame_len<R: Read>(reader: &mut R) -> Result<Option<u64>, Error> {
    let mut value = 0u64;
    for index in 0..MAX_VARINT_BYTES {
        let mut byte = [0u8; 1];
        let read = reader.read(&mut byte).map_err(io_error)?;
        if read == 0 {
            if index == 0 {
                return Ok(None);
            }
            return Err(Error::new(ErrorKind::UnexpectedEof));
        }
        let byte = byte[0];
        if index == MAX_VARINT_BYTES - 1 {
            if byte > 1 {
                return Err(Error::new(ErrorKind::Overflow));
            }
            return Ok(Some(value | (u64::from(byte) << 63)));
        }
        value |= u64::from(byte & 0x7f) << (7 * index);
        if byte < 0x80 {
            return Ok(Some(value));
        }
    }
    Err(Error::new(ErrorKind::InvalidVarint))
}

/// Read one framed body into a pooled buffer.
fn read_frame<R: Read>(reader: &mut R, opts: &Options) -> Result<Option<Vec<u8>>, Error> {
    let Some(len) = read_frame_len(reader)? else {
        return Ok(None);
    };
    // Per-frame cap, checked before allocating.
    if len > opts.limits.max_message_size as u64 {
        return Err(Error::new(ErrorKind::MaxSizeExceeded));
    }
    let len = len as usize;
    let mut body = pool::get(len);
    body.resize(len, 0);
    reader.read_exact(&mut body).map_err(io_error)?;
    Ok(Some(body))
}

/// Read one length-prefixed message.
///
/// A stream that ends before the first header byte fails with
/// `UnexpectedEOF`; use [`messages`] to iterate until the stream drains.
pub fn read_delimited<R: Read, T: Record>(reader: R, dst: &mut T) -> Result<(), Error> {
    read_delimited_with_options(reader, dst, &Options::default())
}

/// Read one length-prefixed message under the given options.
pub fn read_delimited_with_options<R: Read, T: Record>(
    mut reader: R,
    dst: &mut T,
    opts: &Options,
) -> Result<(), Error> {
    match read_frame(&mut reader, opts)? {
        Some(body) => {
            let result = crate::unmarshal_with_options(&body, dst, opts);
            pool::put(body);
            result
        }
        None => Err(Error::new(ErrorKind::UnexpectedEof)),
    }
}

/// Iterate the messages of a delimited stream.
pub fn messages<R: Read, T: Record>(reader: R) -> Messages<R, T> {
    messages_with_options(reader, Options::default())
}

/// Iterate the messages of a delimited stream under the given options.
pub fn messages_with_options<R: Read, T: Record>(reader: R, opts: Options) -> Messages<R, T> {
    Messages {
        reader,
        opts,
        done: false,
        _marker: PhantomData,
    }
}

/// Iterator over the messages of a delimited stream.
///
/// Yields one decoded message per frame and stops cleanly when the stream
/// ends on a frame boundary. Any error ends iteration after being yielded.
#[derive(Debug)]
pub struct Messages<R, T> {
    reader: R,
    opts: Options,
    done: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<R: Read, T: Record> Iterator for Messages<R, T> {
    type Item = Result<T, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match read_frame(&mut self.reader, &self.opts) {
            Ok(Some(body)) => {
                let mut value = T::default();
                let result = crate::unmarshal_with_options(&body, &mut value, &self.opts);
                pool::put(body);
                match result {
                    Ok(()) => Some(Ok(value)),
                    Err(err) => {
                        self.done = true;
                        Some(Err(err))
                    }
                }
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
