//! The type registry: bidirectional bindings between a numeric TypeID, a
//! canonical name and a Rust type, plus interface implementation sets.
//!
//! Lookups vastly outnumber registrations, so the whole table sits behind
//! one reader-preferring `RwLock`; nothing on the marshal path ever takes
//! the write half.

use std::any::TypeId as RustTypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::codec::{decode_boxed, descriptor_of, AnyRecord, Decode, Record};
use crate::descriptor::RecordDescriptor;
use crate::error::{Error, ErrorKind};
use crate::reader::Reader;

/// A registered type's numeric identity on the wire.
///
/// `0` is reserved for nil in polymorphic position, `1..=63` for built-in
/// scalars, `64..=127` for standard extensions, and everything from
/// [`TypeId::FIRST_USER`] up for user types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TypeId(pub u32);

impl TypeId {
    /// The nil sentinel in polymorphic position.
    pub const NIL: TypeId = TypeId(0);
    /// First id available for user types.
    pub const FIRST_USER: u32 = 128;
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Built-in scalar TypeIDs. These are wire-format constants: the skip path
/// derives a TypeRef payload's shape from them without registry access.
pub mod scalar_ids {
    pub const BOOL: u64 = 1;
    pub const INT8: u64 = 2;
    pub const INT16: u64 = 3;
    pub const INT32: u64 = 4;
    pub const INT64: u64 = 5;
    pub const UINT8: u64 = 6;
    pub const UINT16: u64 = 7;
    pub const UINT32: u64 = 8;
    pub const UINT64: u64 = 9;
    pub const FLOAT32: u64 = 10;
    pub const FLOAT64: u64 = 11;
    pub const STRING: u64 = 12;
    pub const BYTES: u64 = 13;
}

/// Decoder installed for a registered type.
///
/// The default is the reflective one derived from the type's descriptor;
/// [`Registry::register_with_codec`] installs a custom one.
#[derive(Clone, Copy)]
pub struct Codec {
    /// Decode one value in polymorphic position (after the TypeID varint).
    pub decode: fn(&mut Reader<'_>) -> Result<Box<dyn AnyRecord>, Error>,
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codec").finish_non_exhaustive()
    }
}

/// One registered type.
#[derive(Debug)]
pub struct RegisteredType {
    id: TypeId,
    name: String,
    rust_type: RustTypeId,
    rust_name: &'static str,
    descriptor: Option<&'static RecordDescriptor>,
    codec: Codec,
}

impl RegisteredType {
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Canonical (wire-level) name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rust_type(&self) -> RustTypeId {
        self.rust_type
    }

    pub fn rust_name(&self) -> &'static str {
        self.rust_name
    }

    /// Field table, present for record types.
    pub fn descriptor(&self) -> Option<&'static RecordDescriptor> {
        self.descriptor
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }
}

#[derive(Debug, Default)]
struct Inner {
    by_id: HashMap<u32, Arc<RegisteredType>>,
    by_name: HashMap<String, u32>,
    by_rust: HashMap<RustTypeId, u32>,
    interfaces: HashMap<RustTypeId, InterfaceEntry>,
    next_id: u32,
}

#[derive(Debug)]
struct InterfaceEntry {
    name: String,
    implementations: Vec<TypeId>,
}

/// The registry. See the module docs.
#[derive(Debug)]
pub struct Registry {
    inner: RwLock<Inner>,
}

static GLOBAL: OnceLock<Registry> = OnceLock::new();

impl Registry {
    /// A fresh registry with the built-in scalars installed.
    pub fn new() -> Self {
        let registry = Registry {
            inner: RwLock::new(Inner {
                next_id: TypeId::FIRST_USER,
                ..Inner::default()
            }),
        };
        registry.install_builtins();
        registry
    }

    /// The process-wide registry used when options carry none.
    pub fn global() -> &'static Registry {
        GLOBAL.get_or_init(Registry::new)
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn install_builtins(&self) {
        fn scalar<T>(name: &str, id: u64) -> (String, u32, RustTypeId, &'static str, Codec)
        where
            T: AnyRecord + Decode + Default,
        {
            fn decode_scalar<T: AnyRecord + Decode + Default>(
                r: &mut Reader<'_>,
            ) -> Result<Box<dyn AnyRecord>, Error> {
                let mut value = T::default();
                T::decode_into(r, &mut value)?;
                Ok(Box::new(value))
            }
            (
                name.to_string(),
                id as u32,
                RustTypeId::of::<T>(),
                std::any::type_name::<T>(),
                Codec {
                    decode: decode_scalar::<T>,
                },
            )
        }

        use scalar_ids::*;
        let builtins = [
            scalar::<bool>("bool", BOOL),
            scalar::<i8>("int8", INT8),
            scalar::<i16>("int16", INT16),
            scalar::<i32>("int32", INT32),
            scalar::<i64>("int64", INT64),
            scalar::<u8>("uint8", UINT8),
            scalar::<u16>("uint16", UINT16),
            scalar::<u32>("uint32", UINT32),
            scalar::<u64>("uint64", UINT64),
            scalar::<f32>("float32", FLOAT32),
            scalar::<f64>("float64", FLOAT64),
            scalar::<String>("string", STRING),
            scalar::<Vec<u8>>("bytes", BYTES),
        ];

        let mut inner = self.write();
        for (name, id, rust_type, rust_name, codec) in builtins {
            let entry = Arc::new(RegisteredType {
                id: TypeId(id),
                name: name.clone(),
                rust_type,
                rust_name,
                descriptor: None,
                codec,
            });
            inner.by_name.insert(name, id);
            inner.by_rust.insert(rust_type, id);
            inner.by_id.insert(id, entry);
        }
    }

    /// Register a record type under `name`.
    ///
    /// With `id` unset the next free user id (>= 128) is allocated.
    /// Re-registering the identical binding is a no-op; any conflicting
    /// binding fails with `Duplicate`.
    pub fn register<T>(&self, name: &str, id: Option<TypeId>) -> Result<TypeId, Error>
    where
        T: Record + AnyRecord + Default,
    {
        let descriptor = descriptor_of::<T>();
        descriptor.validate()?;
        self.bind(
            name,
            id,
            RustTypeId::of::<T>(),
            std::any::type_name::<T>(),
            Some(descriptor),
            Codec {
                decode: decode_boxed::<T>,
            },
            false,
        )
    }

    /// Idempotent [`register`](Registry::register): returns the existing id
    /// when the type is already bound, whatever its name or id.
    pub fn register_or_get<T>(&self, name: &str, id: Option<TypeId>) -> Result<TypeId, Error>
    where
        T: Record + AnyRecord + Default,
    {
        // Fast path under the read lock.
        if let Some(&existing) = self.read().by_rust.get(&RustTypeId::of::<T>()) {
            return Ok(TypeId(existing));
        }
        let descriptor = descriptor_of::<T>();
        descriptor.validate()?;
        // Slow path re-checks under the write lock inside `bind`, so two
        // racing callers converge on one id.
        self.bind(
            name,
            id,
            RustTypeId::of::<T>(),
            std::any::type_name::<T>(),
            Some(descriptor),
            Codec {
                decode: decode_boxed::<T>,
            },
            true,
        )
    }

    /// Register a type with a custom decoder instead of the reflective one.
    pub fn register_with_codec<T>(
        &self,
        name: &str,
        id: Option<TypeId>,
        codec: Codec,
    ) -> Result<TypeId, Error>
    where
        T: AnyRecord,
    {
        self.bind(
            name,
            id,
            RustTypeId::of::<T>(),
            std::any::type_name::<T>(),
            None,
            codec,
            false,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn bind(
        &self,
        name: &str,
        id: Option<TypeId>,
        rust_type: RustTypeId,
        rust_name: &'static str,
        descriptor: Option<&'static RecordDescriptor>,
        codec: Codec,
        idempotent: bool,
    ) -> Result<TypeId, Error> {
        let mut inner = self.write();

        if let Some(&existing) = inner.by_rust.get(&rust_type) {
            if idempotent {
                return Ok(TypeId(existing));
            }
            let bound = &inner.by_id[&existing];
            let same_name = bound.name == name;
            let same_id = id.map_or(true, |requested| requested.0 == existing);
            if same_name && same_id {
                return Ok(TypeId(existing));
            }
            return Err(Error::new(ErrorKind::Duplicate));
        }

        if inner.by_name.contains_key(name) {
            // The name is bound to some other type.
            return Err(Error::new(ErrorKind::Duplicate));
        }

        let id = match id {
            Some(requested) => {
                if inner.by_id.contains_key(&requested.0) {
                    return Err(Error::new(ErrorKind::Duplicate));
                }
                requested
            }
            None => {
                let mut candidate = inner.next_id.max(TypeId::FIRST_USER);
                while inner.by_id.contains_key(&candidate) {
                    candidate += 1;
                }
                inner.next_id = candidate + 1;
                TypeId(candidate)
            }
        };

        let entry = Arc::new(RegisteredType {
            id,
            name: name.to_string(),
            rust_type,
            rust_name,
            descriptor,
            codec,
        });
        inner.by_name.insert(name.to_string(), id.0);
        inner.by_rust.insert(rust_type, id.0);
        inner.by_id.insert(id.0, entry);
        Ok(id)
    }

    /// Declare an interface, identified by a marker type.
    pub fn register_interface<I: ?Sized + 'static>(&self, name: &str) -> Result<(), Error> {
        let mut inner = self.write();
        let key = RustTypeId::of::<I>();
        if let Some(existing) = inner.interfaces.get(&key) {
            if existing.name == name {
                return Ok(());
            }
            return Err(Error::new(ErrorKind::Duplicate));
        }
        inner.interfaces.insert(
            key,
            InterfaceEntry {
                name: name.to_string(),
                implementations: Vec::new(),
            },
        );
        Ok(())
    }

    /// Register `T` as an implementation of interface `I` under a fixed id.
    ///
    /// `T` is registered as a concrete type as well, if it was not already.
    pub fn register_implementation<I, T>(&self, name: &str, id: TypeId) -> Result<TypeId, Error>
    where
        I: ?Sized + 'static,
        T: Record + AnyRecord + Default,
    {
        if self.read().interfaces.get(&RustTypeId::of::<I>()).is_none() {
            return Err(Error::new(ErrorKind::UnknownType));
        }
        let bound = match self.register::<T>(name, Some(id)) {
            Ok(bound) => bound,
            Err(err) => return Err(err),
        };
        let mut inner = self.write();
        match inner.interfaces.get_mut(&RustTypeId::of::<I>()) {
            Some(entry) => {
                if !entry.implementations.contains(&bound) {
                    entry.implementations.push(bound);
                }
                Ok(bound)
            }
            None => Err(Error::new(ErrorKind::UnknownType)),
        }
    }

    /// Look up a type by its wire id.
    pub fn get(&self, id: TypeId) -> Option<Arc<RegisteredType>> {
        self.read().by_id.get(&id.0).cloned()
    }

    /// Look up a type by its canonical name.
    pub fn get_by_name(&self, name: &str) -> Option<Arc<RegisteredType>> {
        let inner = self.read();
        let id = inner.by_name.get(name)?;
        inner.by_id.get(id).cloned()
    }

    /// The wire id bound to a Rust type, if any.
    pub fn id_for_rust(&self, rust_type: RustTypeId) -> Option<TypeId> {
        self.read().by_rust.get(&rust_type).copied().map(TypeId)
    }

    /// The wire id bound to `T`, if any.
    pub fn id_of<T: 'static>(&self) -> Option<TypeId> {
        self.id_for_rust(RustTypeId::of::<T>())
    }

    /// Implementations registered against interface `I`, in registration
    /// order.
    pub fn implementations_of<I: ?Sized + 'static>(&self) -> Vec<TypeId> {
        self.read()
            .interfaces
            .get(&RustTypeId::of::<I>())
            .map(|entry| entry.implementations.clone())
            .unwrap_or_default()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_scalars_present() {
        let registry = Registry::new();
        let entry = registry.get(TypeId(scalar_ids::INT64 as u32)).unwrap();
        assert_eq!(entry.name(), "int64");
        assert_eq!(registry.id_of::<i64>(), Some(TypeId(5)));
        assert_eq!(
            registry.get_by_name("string").unwrap().id(),
            TypeId(scalar_ids::STRING as u32)
        );
    }

    #[test]
    fn test_allocated_ids_start_at_128() {
        let registry = Registry::new();
        // The scalar slots below 64 never collide with allocation.
        let inner = registry.read();
        assert!(inner.next_id >= TypeId::FIRST_USER);
    }
}
