//! Parsing and validation of `#[cram(...)]` field attributes.

use core::ops::RangeInclusive;
use darling::FromMeta;
use syn::{Field, Ident, Result, Type};

/// Smallest valid field number.
const MIN_FIELD_NUMBER: u32 = 1;
/// Largest valid field number.
const MAX_FIELD_NUMBER: u32 = (1 << 29) - 1;
/// Field numbers reserved for internal use.
const RESERVED_FIELD_RANGE: RangeInclusive<u32> = 19000..=19999;

/// Metadata for a single field annotated with `#[cram(...)]`.
pub struct FieldMeta<'a> {
    pub name: &'a Ident,
    pub ty: &'a Type,
    pub number: u32,
    pub kind: FieldKind,
    pub required: bool,
    pub optional: bool,
    pub deprecated: bool,
}

/// How a field travels on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Plain value: scalar, string, blob or embedded record.
    Singular,
    /// `Option<T>`; absent values are omitted.
    Optional,
    /// `Vec<scalar>`: packed into one payload.
    RepeatedPacked,
    /// `Vec<T>` for non-scalar `T`: one tag per element.
    Repeated,
    /// `BTreeMap` or `HashMap`.
    Map,
    /// `Option<Box<dyn AnyRecord>>`, dispatched through the registry.
    Interface,
    /// A fieldless enum carried as a varint.
    Enumeration,
}

/// Raw attributes parsed from `#[cram(...)]` on a field.
#[derive(Debug, Default, FromMeta)]
#[darling(default)]
struct RawCramFieldAttrs {
    field: Option<u32>,
    required: bool,
    optional: bool,
    repeated: bool,
    map: bool,
    interface: bool,
    enumeration: bool,
    deprecated: bool,
}

/// Parse and validate the `#[cram(...)]` attribute of one struct field.
pub fn parse_field_meta(field: &Field) -> Result<FieldMeta<'_>> {
    let raw = field
        .attrs
        .iter()
        .find(|attr| attr.path().is_ident("cram"))
        .map(|attr| RawCramFieldAttrs::from_meta(&attr.meta))
        .transpose()
        .map_err(|e| syn::Error::new_spanned(field, e.to_string()))?
        .ok_or_else(|| syn::Error::new_spanned(field, "missing #[cram(field = N)] attribute"))?;

    let Some(number) = raw.field else {
        return Err(syn::Error::new_spanned(
            field,
            "missing #[cram(field = N)] attribute",
        ));
    };
    validate_field_number(number, field)?;

    if raw.required && raw.optional {
        return Err(syn::Error::new_spanned(
            field,
            "'required' and 'optional' are mutually exclusive",
        ));
    }

    let flag_count = [raw.repeated, raw.map, raw.interface, raw.enumeration]
        .iter()
        .filter(|flag| **flag)
        .count();
    if flag_count > 1 {
        return Err(syn::Error::new_spanned(field, "conflicting field attributes"));
    }

    let kind = if raw.interface {
        FieldKind::Interface
    } else if raw.map {
        FieldKind::Map
    } else if raw.enumeration {
        FieldKind::Enumeration
    } else if raw.repeated {
        match vec_element(&field.ty) {
            Some(element) if is_scalar(element) => FieldKind::RepeatedPacked,
            Some(_) => FieldKind::Repeated,
            None => {
                return Err(syn::Error::new_spanned(
                    field,
                    "'repeated' fields must be Vec<T>",
                ));
            }
        }
    } else if raw.optional || option_inner(&field.ty).is_some() {
        FieldKind::Optional
    } else {
        FieldKind::Singular
    };

    if raw.required && !matches!(kind, FieldKind::Singular | FieldKind::Enumeration) {
        return Err(syn::Error::new_spanned(
            field,
            "'required' only applies to singular fields",
        ));
    }

    if kind == FieldKind::Optional && option_inner(&field.ty).is_none() {
        return Err(syn::Error::new_spanned(
            field,
            "'optional' fields must be Option<T>",
        ));
    }

    Ok(FieldMeta {
        name: field.ident.as_ref().expect("named field"),
        ty: &field.ty,
        number,
        kind,
        required: raw.required,
        optional: raw.optional || matches!(kind, FieldKind::Optional),
        deprecated: raw.deprecated,
    })
}

/// Validates a field number is in range and outside the reserved band.
pub fn validate_field_number(number: u32, field: &Field) -> Result<()> {
    if !(MIN_FIELD_NUMBER..=MAX_FIELD_NUMBER).contains(&number)
        || RESERVED_FIELD_RANGE.contains(&number)
    {
        let msg = format!(
            "field number '{}' is invalid; valid numbers are [{}, {}] excluding [{}, {}]",
            number,
            MIN_FIELD_NUMBER,
            MAX_FIELD_NUMBER,
            RESERVED_FIELD_RANGE.start(),
            RESERVED_FIELD_RANGE.end(),
        );
        return Err(syn::Error::new_spanned(field, msg));
    }
    Ok(())
}

/// The element type of `Vec<T>`, if `ty` is one.
pub fn vec_element(ty: &Type) -> Option<&Type> {
    generic_arg(ty, "Vec")
}

/// The inner type of `Option<T>`, if `ty` is one.
pub fn option_inner(ty: &Type) -> Option<&Type> {
    generic_arg(ty, "Option")
}

fn generic_arg<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    let syn::PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        syn::GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}

/// True for the built-in scalar types that pack.
pub fn is_scalar(ty: &Type) -> bool {
    let Type::Path(path) = ty else {
        return false;
    };
    let Some(segment) = path.path.segments.last() else {
        return false;
    };
    matches!(
        segment.ident.to_string().as_str(),
        "bool" | "u8" | "u16" | "u32" | "u64" | "i8" | "i16" | "i32" | "i64" | "f32" | "f64"
    )
}

/// True for `String`.
pub fn is_string(ty: &Type) -> bool {
    matches!(ty, Type::Path(path) if path.path.segments.last().is_some_and(|s| s.ident == "String"))
}

/// True for `Vec<u8>`.
pub fn is_blob(ty: &Type) -> bool {
    vec_element(ty).is_some_and(|element| {
        matches!(element, Type::Path(path) if path.path.segments.last().is_some_and(|s| s.ident == "u8"))
    })
}
