//! Field tables consulted by the marshal engine.
//!
//! Each record type carries a static [`RecordDescriptor`]: an ordered list
//! of field descriptors plus a lazily-built index (field-number map and
//! required-field mask). The derive macro emits descriptors; hand-written
//! implementations go through [`RecordDescriptor::validate`] when they are
//! registered.

use std::any::TypeId as RustTypeId;
use std::collections::HashMap;
use std::sync::OnceLock;

use papaya::HashMap as LockFreeConcurrentHashMap;

use crate::error::{Error, ErrorKind};
use crate::wire::{WireType, MAX_FIELD_NUMBER, MIN_FIELD_NUMBER};

/// What a field holds, one level deep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldCategory {
    /// Bool, integer or float.
    Scalar,
    String,
    Bytes,
    /// An embedded record.
    Record,
    /// A sequence; packed when the element is scalar.
    Sequence,
    Mapping,
    /// A polymorphic slot resolved through the registry.
    Interface,
    /// An enumeration carried as a varint.
    Enumeration,
}

/// One field of a record.
#[derive(Debug, Clone, Copy)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub number: u32,
    pub wire_type: WireType,
    pub category: FieldCategory,
    pub required: bool,
    pub optional: bool,
    pub repeated: bool,
    pub deprecated: bool,
    /// Descriptor of the embedded record type, for record-valued fields.
    pub nested: Option<fn() -> &'static RecordDescriptor>,
}

/// Index data derived from the field list once, on first use.
#[derive(Debug)]
struct DescriptorIndex {
    by_number: HashMap<u32, usize>,
    required_mask: u64,
}

/// The precomputed field table for one record type.
#[derive(Debug)]
pub struct RecordDescriptor {
    type_name: &'static str,
    fields: &'static [FieldDescriptor],
    index: OnceLock<DescriptorIndex>,
}

impl RecordDescriptor {
    pub const fn new(type_name: &'static str, fields: &'static [FieldDescriptor]) -> Self {
        RecordDescriptor {
            type_name,
            fields,
            index: OnceLock::new(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn fields(&self) -> &'static [FieldDescriptor] {
        self.fields
    }

    fn index(&self) -> &DescriptorIndex {
        self.index.get_or_init(|| {
            let mut by_number = HashMap::with_capacity(self.fields.len());
            let mut required_mask = 0u64;
            let mut required_bit = 0u32;
            for (position, field) in self.fields.iter().enumerate() {
                by_number.insert(field.number, position);
                if field.required {
                    if required_bit < 64 {
                        required_mask |= 1 << required_bit;
                    }
                    required_bit += 1;
                }
            }
            DescriptorIndex {
                by_number,
                required_mask,
            }
        })
    }

    /// O(1) dispatch from a wire field number to its descriptor.
    pub fn field_by_number(&self, number: u32) -> Option<&'static FieldDescriptor> {
        self.index()
            .by_number
            .get(&number)
            .map(|&position| &self.fields[position])
    }

    /// Bit mask with one bit per `required` field, in declaration order.
    pub fn required_mask(&self) -> u64 {
        self.index().required_mask
    }

    /// The first required field whose bit is missing from `seen`.
    pub fn missing_required(&self, seen: u64) -> Option<&'static FieldDescriptor> {
        let mut required_bit = 0u32;
        for field in self.fields {
            if field.required {
                if required_bit < 64 && seen & (1 << required_bit) == 0 {
                    return Some(field);
                }
                required_bit += 1;
            }
        }
        None
    }

    /// Enforce the table invariants: unique in-range field numbers, no
    /// `required`+`optional` conflicts, at most 64 required fields.
    pub fn validate(&self) -> Result<(), Error> {
        let mut seen = HashMap::with_capacity(self.fields.len());
        let mut required_count = 0u32;
        for field in self.fields {
            if !(MIN_FIELD_NUMBER..=MAX_FIELD_NUMBER).contains(&field.number) {
                return Err(Error::new(ErrorKind::InvalidTag));
            }
            if seen.insert(field.number, field.name).is_some() {
                return Err(Error::new(ErrorKind::Duplicate));
            }
            if field.required && field.optional {
                return Err(Error::new(ErrorKind::Duplicate));
            }
            if field.required {
                required_count += 1;
            }
        }
        if required_count > 64 {
            return Err(Error::new(ErrorKind::Overflow));
        }
        Ok(())
    }
}

static DESCRIPTOR_CACHE: OnceLock<LockFreeConcurrentHashMap<RustTypeId, &'static RecordDescriptor>> =
    OnceLock::new();

/// Look up (or populate) the process-wide descriptor cache.
///
/// Reads are lock-free; racing writers both build the same deterministic
/// descriptor and one wins the insert.
pub fn cached(
    type_id: RustTypeId,
    build: impl FnOnce() -> &'static RecordDescriptor,
) -> &'static RecordDescriptor {
    let cache = DESCRIPTOR_CACHE.get_or_init(LockFreeConcurrentHashMap::new);
    *cache.pin().get_or_insert_with(type_id, build)
}
