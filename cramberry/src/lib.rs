//! Cramberry: schema-driven binary serialization with a deterministic,
//! compact wire format and polymorphic type support.
//!
//! # Wire format
//!
//! A record is a series of `(tag, value)` pairs terminated by a `0x00`
//! end marker. Tags for fields 1 through 15 are one byte. Scalar
//! sequences pack into a single payload; mapping entries are emitted in
//! key order so encoding is bit-identical across runs and machines.
//!
//! ```
//! use cramberry::{marshal, unmarshal, Record};
//!
//! #[derive(Debug, Clone, PartialEq, Default, Record)]
//! struct User {
//!     #[cram(field = 1, required)]
//!     id: i64,
//!     #[cram(field = 2)]
//!     name: String,
//! }
//!
//! let user = User { id: 1, name: "ab".into() };
//! let bytes = marshal(&user).unwrap();
//! assert_eq!(bytes, [0x1C, 0x02, 0x24, 0x02, 0x61, 0x62, 0x00]);
//!
//! let mut decoded = User::default();
//! unmarshal(&bytes, &mut decoded).unwrap();
//! assert_eq!(decoded, user);
//! ```
//!
//! # Polymorphism
//!
//! Interface-typed fields hold `Option<Box<dyn AnyRecord>>` and resolve
//! their concrete type through a [`Registry`] at encode and decode time.

pub mod codec;
pub mod delimited;
pub mod descriptor;
pub mod error;
pub mod float;
pub mod limits;
pub mod options;
pub mod pool;
pub mod reader;
pub mod registry;
pub mod varint;
pub mod wire;
pub mod writer;

pub use codec::{AnyRecord, Enumeration, IsDefault, Record};
pub use delimited::{messages, read_delimited, write_delimited, Messages};
pub use error::{Error, ErrorKind};
pub use float::{F32Key, F64Key};
pub use limits::Limits;
pub use options::Options;
pub use reader::{Reader, ZeroCopyBytes, ZeroCopyStr};
pub use registry::{Registry, TypeId};
pub use writer::Writer;

#[cfg(feature = "derive")]
pub use cramberry_derive::{Enumeration, Record};

/// Encode `value` under default options.
pub fn marshal<T: Record>(value: &T) -> Result<Vec<u8>, Error> {
    marshal_with_options(value, &Options::default())
}

/// Encode `value`.
///
/// For the same value and registry state the output is bit-identical
/// across runs. On error nothing useful is returned; partial output is
/// never surfaced.
pub fn marshal_with_options<T: Record>(value: &T, opts: &Options) -> Result<Vec<u8>, Error> {
    let hint = codec::encoded_record_body_len(value, opts)?;
    let mut w = Writer::pooled(hint, opts.clone());
    codec::encode_record_body(value, &mut w)?;
    Ok(w.into_bytes())
}

/// Decode `bytes` into `dst` under default options.
pub fn unmarshal<T: Record>(bytes: &[u8], dst: &mut T) -> Result<(), Error> {
    unmarshal_with_options(bytes, dst, &Options::default())
}

/// Decode `bytes` into `dst`.
///
/// Decoding merges into `dst`. On error `dst` is left in an unspecified
/// intermediate state. Unknown fields are skipped unless
/// [`Options::strict`] is set. Input past the end marker is an error.
pub fn unmarshal_with_options<T: Record>(
    bytes: &[u8],
    dst: &mut T,
    opts: &Options,
) -> Result<(), Error> {
    let mut r = Reader::with_options(bytes, opts.clone());
    codec::decode_record_body(&mut r, dst)?;
    r.expect_consumed()
}

/// The exact encoded length of `value`, without encoding it.
pub fn size<T: Record>(value: &T) -> Result<usize, Error> {
    codec::encoded_record_body_len(value, &Options::default())
}

/// Register `T` in the process-wide registry. See
/// [`Registry::register`].
pub fn register<T>(name: &str, id: Option<TypeId>) -> Result<TypeId, Error>
where
    T: Record + AnyRecord + Default,
{
    Registry::global().register::<T>(name, id)
}

/// Register `T` in the process-wide registry, returning the existing id
/// if it is already bound. See [`Registry::register_or_get`].
pub fn register_or_get<T>(name: &str, id: Option<TypeId>) -> Result<TypeId, Error>
where
    T: Record + AnyRecord + Default,
{
    Registry::global().register_or_get::<T>(name, id)
}

/// Declare an interface in the process-wide registry. See
/// [`Registry::register_interface`].
pub fn register_interface<I: ?Sized + 'static>(name: &str) -> Result<(), Error> {
    Registry::global().register_interface::<I>(name)
}

/// Register `T` as an implementation of `I` in the process-wide
/// registry. See [`Registry::register_implementation`].
pub fn register_implementation<I, T>(name: &str, id: TypeId) -> Result<TypeId, Error>
where
    I: ?Sized + 'static,
    T: Record + AnyRecord + Default,
{
    Registry::global().register_implementation::<I, T>(name, id)
}
