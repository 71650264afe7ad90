//! Derive macros for cramberry.
//!
//! `#[derive(Record)]` generates the field table and codec impls the
//! marshal engine consumes; `#[derive(Enumeration)]` maps a fieldless
//! enum onto its varint values.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{DeriveInput, Result};

mod support;
use support::{
    is_blob, is_scalar, is_string, option_inner, parse_field_meta, vec_element, FieldKind,
    FieldMeta,
};

/// Derive macro implementing the `Record`, `Encode`, `Decode`,
/// `IsDefault` and `AnyRecord` traits.
///
/// The type must also implement `Default`, `Debug`, `Clone` and
/// `PartialEq`.
///
/// # Example
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Default, Record)]
/// pub struct User {
///     #[cram(field = 1, required)]
///     id: i64,
///     #[cram(field = 2)]
///     name: String,
///     #[cram(field = 3, repeated)]
///     tags: Vec<String>,
///     #[cram(field = 4, map)]
///     metadata: BTreeMap<String, String>,
///     #[cram(field = 5, interface)]
///     principal: Option<Box<dyn AnyRecord>>,
/// }
/// ```
#[proc_macro_derive(Record, attributes(cram))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    match impl_record(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn impl_record(input: &DeriveInput) -> Result<TokenStream2> {
    let name = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "generic records are not supported",
        ));
    }

    let fields = match &input.data {
        syn::Data::Struct(data) => match &data.fields {
            syn::Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "only structs with named fields are supported",
                ))
            }
        },
        _ => return Err(syn::Error::new_spanned(input, "only structs are supported")),
    };

    let metas: Vec<FieldMeta> = fields
        .iter()
        .map(parse_field_meta)
        .collect::<Result<Vec<_>>>()?;

    // Field numbers must be unique within the record.
    let mut seen_numbers = std::collections::BTreeSet::new();
    for meta in &metas {
        if !seen_numbers.insert(meta.number) {
            let msg = format!("duplicate field number '{}'", meta.number);
            return Err(syn::Error::new_spanned(meta.name, msg));
        }
    }

    // Assign required-tracking bits in declaration order.
    let mut required_bits = Vec::with_capacity(metas.len());
    let mut next_bit = 0u8;
    for meta in &metas {
        if meta.required {
            if next_bit >= 64 {
                return Err(syn::Error::new_spanned(
                    meta.name,
                    "at most 64 required fields are supported",
                ));
            }
            required_bits.push(Some(next_bit));
            next_bit += 1;
        } else {
            required_bits.push(None);
        }
    }

    let descriptor_impl = generate_descriptor(name, &metas)?;
    let encode_impl = generate_encode_fields(&metas);
    let len_impl = generate_encoded_fields_len(&metas);
    let decode_impl = generate_decode_field(&metas, &required_bits);
    let is_default_impl = generate_is_default(&metas);

    Ok(quote! {
        impl cramberry::codec::WireValue for #name {
            const WIRE_TYPE: cramberry::wire::WireType = cramberry::wire::WireType::Bytes;
        }

        impl cramberry::codec::Encode for #name {
            fn encode(&self, w: &mut cramberry::Writer) -> Result<(), cramberry::Error> {
                cramberry::codec::encode_embedded(self, w)
            }

            fn encoded_len(&self, opts: &cramberry::Options) -> Result<usize, cramberry::Error> {
                cramberry::codec::encoded_embedded_len(self, opts)
            }
        }

        impl cramberry::codec::Decode for #name {
            fn decode_into(
                r: &mut cramberry::Reader<'_>,
                dst: &mut Self,
            ) -> Result<(), cramberry::Error> {
                cramberry::codec::decode_embedded(r, dst)
            }
        }

        impl cramberry::codec::Record for #name {
            #descriptor_impl
            #encode_impl
            #len_impl
            #decode_impl
        }

        impl cramberry::codec::IsDefault for #name {
            #is_default_impl
        }

        impl cramberry::codec::AnyRecord for #name {
            fn as_any(&self) -> &dyn ::core::any::Any {
                self
            }

            fn type_label(&self) -> &'static str {
                ::core::any::type_name::<#name>()
            }

            fn encode_value(&self, w: &mut cramberry::Writer) -> Result<(), cramberry::Error> {
                cramberry::codec::Encode::encode(self, w)
            }

            fn encoded_value_len(
                &self,
                opts: &cramberry::Options,
            ) -> Result<usize, cramberry::Error> {
                cramberry::codec::Encode::encoded_len(self, opts)
            }

            fn clone_value(&self) -> Box<dyn cramberry::codec::AnyRecord> {
                Box::new(self.clone())
            }

            fn value_eq(&self, other: &dyn cramberry::codec::AnyRecord) -> bool {
                other
                    .as_any()
                    .downcast_ref::<#name>()
                    .is_some_and(|other| other == self)
            }
        }
    })
}

/// The wire type a field's tag carries.
fn wire_type_expr(meta: &FieldMeta) -> TokenStream2 {
    match meta.kind {
        FieldKind::Singular => {
            let ty = meta.ty;
            quote!(<#ty as cramberry::codec::WireValue>::WIRE_TYPE)
        }
        FieldKind::Optional => {
            let inner = option_inner(meta.ty).expect("validated Option");
            quote!(<#inner as cramberry::codec::WireValue>::WIRE_TYPE)
        }
        FieldKind::Repeated => {
            // Repeated elements are tagged individually with the element's
            // wire type.
            let element = vec_element(meta.ty).expect("validated Vec");
            quote!(<#element as cramberry::codec::WireValue>::WIRE_TYPE)
        }
        FieldKind::RepeatedPacked | FieldKind::Map => {
            quote!(cramberry::wire::WireType::Bytes)
        }
        FieldKind::Interface => quote!(cramberry::wire::WireType::TypeRef),
        FieldKind::Enumeration => quote!(cramberry::wire::WireType::Varint),
    }
}

/// Strip `Box<...>` if present.
fn peel_box(ty: &syn::Type) -> &syn::Type {
    let syn::Type::Path(path) = ty else { return ty };
    let Some(segment) = path.path.segments.last() else {
        return ty;
    };
    if segment.ident != "Box" {
        return ty;
    }
    let syn::PathArguments::AngleBracketed(args) = &segment.arguments else {
        return ty;
    };
    match args.args.first() {
        Some(syn::GenericArgument::Type(inner)) => inner,
        _ => ty,
    }
}

/// The `(category, nested)` pair for the descriptor table.
fn category_exprs(meta: &FieldMeta) -> (TokenStream2, TokenStream2) {
    fn value_category(ty: &syn::Type) -> (TokenStream2, TokenStream2) {
        let ty = peel_box(ty);
        if is_scalar(ty) {
            (
                quote!(cramberry::descriptor::FieldCategory::Scalar),
                quote!(None),
            )
        } else if is_string(ty) {
            (
                quote!(cramberry::descriptor::FieldCategory::String),
                quote!(None),
            )
        } else if is_blob(ty) {
            (
                quote!(cramberry::descriptor::FieldCategory::Bytes),
                quote!(None),
            )
        } else {
            (
                quote!(cramberry::descriptor::FieldCategory::Record),
                quote!(Some(<#ty as cramberry::codec::Record>::descriptor)),
            )
        }
    }

    match meta.kind {
        FieldKind::Singular => value_category(meta.ty),
        FieldKind::Optional => value_category(option_inner(meta.ty).expect("validated Option")),
        FieldKind::RepeatedPacked | FieldKind::Repeated => (
            quote!(cramberry::descriptor::FieldCategory::Sequence),
            quote!(None),
        ),
        FieldKind::Map => (
            quote!(cramberry::descriptor::FieldCategory::Mapping),
            quote!(None),
        ),
        FieldKind::Interface => (
            quote!(cramberry::descriptor::FieldCategory::Interface),
            quote!(None),
        ),
        FieldKind::Enumeration => (
            quote!(cramberry::descriptor::FieldCategory::Enumeration),
            quote!(None),
        ),
    }
}

fn generate_descriptor(name: &syn::Ident, metas: &[FieldMeta]) -> Result<TokenStream2> {
    let type_name = name.to_string();
    let entries = metas.iter().map(|meta| {
        let field_name = meta.name.to_string();
        let number = meta.number;
        let wire_type = wire_type_expr(meta);
        let (category, nested) = category_exprs(meta);
        let required = meta.required;
        let optional = meta.optional;
        let repeated = matches!(meta.kind, FieldKind::Repeated | FieldKind::RepeatedPacked);
        let deprecated = meta.deprecated;
        quote! {
            cramberry::descriptor::FieldDescriptor {
                name: #field_name,
                number: #number,
                wire_type: #wire_type,
                category: #category,
                required: #required,
                optional: #optional,
                repeated: #repeated,
                deprecated: #deprecated,
                nested: #nested,
            }
        }
    });

    Ok(quote! {
        fn descriptor() -> &'static cramberry::descriptor::RecordDescriptor {
            static FIELDS: &[cramberry::descriptor::FieldDescriptor] = &[#(#entries),*];
            static DESCRIPTOR: cramberry::descriptor::RecordDescriptor =
                cramberry::descriptor::RecordDescriptor::new(#type_name, FIELDS);
            &DESCRIPTOR
        }
    })
}

fn generate_encode_fields(metas: &[FieldMeta]) -> TokenStream2 {
    let stmts = metas.iter().map(|meta| {
        let name = meta.name;
        let number = meta.number;
        let required = meta.required;
        match meta.kind {
            FieldKind::Singular => quote! {
                cramberry::codec::encode_singular(#number, #required, &self.#name, w)?;
            },
            FieldKind::Optional => quote! {
                cramberry::codec::encode_optional(#number, &self.#name, w)?;
            },
            FieldKind::RepeatedPacked => quote! {
                cramberry::codec::encode_packed_field(#number, &self.#name, w)?;
            },
            FieldKind::Repeated => quote! {
                cramberry::codec::encode_repeated_field(#number, &self.#name, w)?;
            },
            FieldKind::Map => quote! {
                cramberry::codec::CramMap::encode_map_field(&self.#name, #number, w)?;
            },
            FieldKind::Interface => quote! {
                cramberry::codec::encode_poly_field(#number, &self.#name, w)?;
            },
            FieldKind::Enumeration => quote! {
                cramberry::codec::encode_enum_field(#number, #required, self.#name, w)?;
            },
        }
    });

    quote! {
        fn encode_fields(&self, w: &mut cramberry::Writer) -> Result<(), cramberry::Error> {
            let _ = &w;
            #(#stmts)*
            Ok(())
        }
    }
}

fn generate_encoded_fields_len(metas: &[FieldMeta]) -> TokenStream2 {
    let stmts = metas.iter().map(|meta| {
        let name = meta.name;
        let number = meta.number;
        let required = meta.required;
        match meta.kind {
            FieldKind::Singular => quote! {
                total += cramberry::codec::encoded_singular_len(#number, #required, &self.#name, opts)?;
            },
            FieldKind::Optional => quote! {
                total += cramberry::codec::encoded_optional_len(#number, &self.#name, opts)?;
            },
            FieldKind::RepeatedPacked => quote! {
                total += cramberry::codec::encoded_packed_field_len(#number, &self.#name);
            },
            FieldKind::Repeated => quote! {
                total += cramberry::codec::encoded_repeated_field_len(#number, &self.#name, opts)?;
            },
            FieldKind::Map => quote! {
                total += cramberry::codec::CramMap::encoded_map_field_len(&self.#name, #number, opts)?;
            },
            FieldKind::Interface => quote! {
                total += cramberry::codec::encoded_poly_field_len(#number, &self.#name, opts)?;
            },
            FieldKind::Enumeration => quote! {
                total += cramberry::codec::encoded_enum_field_len(#number, #required, self.#name, opts);
            },
        }
    });

    quote! {
        fn encoded_fields_len(&self, opts: &cramberry::Options) -> Result<usize, cramberry::Error> {
            let _ = &opts;
            let mut total = 0usize;
            #(#stmts)*
            Ok(total)
        }
    }
}

fn generate_decode_field(metas: &[FieldMeta], required_bits: &[Option<u8>]) -> TokenStream2 {
    let arms = metas.iter().zip(required_bits).map(|(meta, bit)| {
        let name = meta.name;
        let number = meta.number;
        let expected = wire_type_expr(meta);
        let bit_expr = match bit {
            Some(bit) => quote!(Some(#bit)),
            None => quote!(None),
        };
        let decode = match meta.kind {
            FieldKind::Singular | FieldKind::Optional => quote! {
                cramberry::codec::Decode::decode_into(r, &mut self.#name)?;
            },
            FieldKind::RepeatedPacked => quote! {
                cramberry::codec::decode_packed_field(r, &mut self.#name)?;
            },
            FieldKind::Repeated => quote! {
                cramberry::codec::decode_repeated_element(r, &mut self.#name)?;
            },
            FieldKind::Map => quote! {
                cramberry::codec::CramMap::decode_map_field(r, &mut self.#name)?;
            },
            FieldKind::Interface => quote! {
                self.#name = cramberry::codec::decode_poly_value(r)?;
            },
            FieldKind::Enumeration => quote! {
                self.#name = cramberry::codec::decode_enum_value(r)?;
            },
        };
        quote! {
            #number => {
                if wire_type != #expected {
                    return Err(r.fail(cramberry::ErrorKind::TypeMismatch));
                }
                #decode
                Ok(cramberry::codec::FieldOutcome::Known { required_bit: #bit_expr })
            }
        }
    });

    quote! {
        fn decode_field(
            &mut self,
            r: &mut cramberry::Reader<'_>,
            number: u32,
            wire_type: cramberry::wire::WireType,
        ) -> Result<cramberry::codec::FieldOutcome, cramberry::Error> {
            let _ = (&r, &wire_type);
            match number {
                #(#arms)*
                _ => Ok(cramberry::codec::FieldOutcome::Unknown),
            }
        }
    }
}

fn generate_is_default(metas: &[FieldMeta]) -> TokenStream2 {
    let checks = metas.iter().map(|meta| {
        let name = meta.name;
        match meta.kind {
            FieldKind::Enumeration => quote! {
                (cramberry::codec::Enumeration::value(self.#name) == 0)
            },
            _ => quote! {
                cramberry::codec::IsDefault::is_default(&self.#name, depth)?
            },
        }
    });

    // One budget charge per record level; field checks share the budget.
    quote! {
        fn is_default(
            &self,
            depth: &mut cramberry::codec::DepthBudget,
        ) -> Result<bool, cramberry::Error> {
            depth.enter()?;
            let result = true #(&& #checks)*;
            depth.exit();
            Ok(result)
        }
    }
}

/// Derive macro implementing the `Enumeration` trait for a fieldless enum
/// with explicit discriminants.
///
/// # Example
///
/// ```ignore
/// #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Enumeration)]
/// pub enum Status {
///     #[default]
///     Unknown = 0,
///     Active = 1,
/// }
/// ```
#[proc_macro_derive(Enumeration)]
pub fn derive_enumeration(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    match impl_enumeration(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn impl_enumeration(input: &DeriveInput) -> Result<TokenStream2> {
    let name = &input.ident;
    let syn::Data::Enum(data) = &input.data else {
        return Err(syn::Error::new_spanned(input, "only enums are supported"));
    };

    let mut arms = Vec::with_capacity(data.variants.len());
    let mut seen_values = std::collections::BTreeSet::new();
    for variant in &data.variants {
        if !matches!(variant.fields, syn::Fields::Unit) {
            return Err(syn::Error::new_spanned(
                variant,
                "only fieldless variants are supported",
            ));
        }
        let Some((_, discriminant)) = &variant.discriminant else {
            return Err(syn::Error::new_spanned(
                variant,
                "every variant needs an explicit numeric value",
            ));
        };
        let syn::Expr::Lit(syn::ExprLit {
            lit: syn::Lit::Int(lit),
            ..
        }) = discriminant
        else {
            return Err(syn::Error::new_spanned(
                discriminant,
                "variant values must be integer literals",
            ));
        };
        let value: u32 = lit.base10_parse()?;
        if !seen_values.insert(value) {
            let msg = format!("duplicate enum value '{value}'");
            return Err(syn::Error::new_spanned(variant, msg));
        }
        let ident = &variant.ident;
        arms.push(quote!(#value => Some(#name::#ident)));
    }

    Ok(quote! {
        impl cramberry::codec::Enumeration for #name {
            fn from_value(value: u32) -> Option<Self> {
                match value {
                    #(#arms,)*
                    _ => None,
                }
            }

            fn value(self) -> u32 {
                self as u32
            }
        }
    })
}
