//! Marshal/unmarshal options.

use std::sync::Arc;

use crate::limits::Limits;
use crate::registry::Registry;

/// Knobs shared by `marshal_with_options` and `unmarshal_with_options`.
#[derive(Debug, Clone)]
pub struct Options {
    /// Decode resource caps.
    pub limits: Limits,
    /// Reject unknown fields instead of skipping them.
    pub strict: bool,
    /// Validate UTF-8 when reading owned strings. When off, invalid bytes
    /// are replaced rather than rejected.
    pub validate_utf8: bool,
    /// Elide singular fields that equal their zero value even without an
    /// `optional` marker.
    pub omit_empty: bool,
    /// Emit mapping entries in the deterministic key order. When off, hash
    /// map iteration order is used (stable within one encode only).
    pub deterministic: bool,
    /// Registry for polymorphic slots; the process-wide registry if unset.
    pub registry: Option<Arc<Registry>>,
}

impl Options {
    pub fn new() -> Self {
        Options {
            limits: Limits::default(),
            strict: false,
            validate_utf8: true,
            omit_empty: false,
            deterministic: true,
            registry: None,
        }
    }

    /// The registry polymorphic slots resolve against.
    pub fn registry(&self) -> &Registry {
        match &self.registry {
            Some(registry) => registry,
            None => Registry::global(),
        }
    }
}

impl Default for Options {
    /// `validate_utf8` and `deterministic` default on.
    fn default() -> Self {
        Options::new()
    }
}
