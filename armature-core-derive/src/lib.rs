//! Derive macro for `armature-core` components.
//!
//! This is the "thin shim" the core's design notes call for: it never
//! inspects anything beyond the annotated struct, and its only effect is to
//! emit a small amount of metadata (`InjectionPoint`s and a component name)
//! that a discovery collaborator hands to the container via `register`. The
//! core itself never invokes this macro or imports user modules.
//!
//! # Example
//!
//! ```rust,ignore
//! use armature_core::Component;
//! use armature_core_derive::Component;
//!
//! #[derive(Component)]
//! #[component(name = "user_service")]
//! struct UserService {
//!     #[inject]
//!     db: DbPool,
//!     #[inject(name = "cache")]
//!     cache_handle: CacheHandle,
//!     #[inject(optional)]
//!     metrics: Option<MetricsSink>,
//!     request_count: u64,
//! }
//! ```

use proc_macro::TokenStream;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Fields, LitStr, parse_macro_input};

#[derive(Default)]
struct InjectAttr {
    present: bool,
    name: Option<String>,
    optional: bool,
    by_type: bool,
}

fn parse_inject_attr(attrs: &[Attribute]) -> syn::Result<InjectAttr> {
    let mut found = InjectAttr::default();

    for attr in attrs {
        if !attr.path().is_ident("inject") {
            continue;
        }
        found.present = true;

        if attr.meta.require_path_only().is_ok() {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let lit: LitStr = meta.value()?.parse()?;
                found.name = Some(lit.value());
            } else if meta.path.is_ident("optional") {
                found.optional = true;
            } else if meta.path.is_ident("type") {
                found.by_type = true;
            }
            Ok(())
        })?;
    }

    Ok(found)
}

fn component_name_attr(attrs: &[Attribute], default_name: &syn::Ident) -> syn::Result<String> {
    for attr in attrs {
        if !attr.path().is_ident("component") {
            continue;
        }
        let mut name = None;
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let lit: LitStr = meta.value()?.parse()?;
                name = Some(lit.value());
            }
            Ok(())
        })?;
        if let Some(name) = name {
            return Ok(name);
        }
    }
    Ok(to_snake_case(&default_name.to_string()))
}

fn to_snake_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 4);
    for (i, ch) in input.char_indices() {
        if ch.is_uppercase() {
            if i != 0 {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Derive macro implementing `armature_core::Component` for a struct.
///
/// Struct-level `#[component(name = "...")]` overrides the registered name
/// (default: the struct name converted to `snake_case`). Field-level
/// `#[inject]` marks an injection point; `#[inject(name = "...")]` resolves
/// by name, `#[inject(optional)]` marks it non-fatal when unresolved, and
/// `#[inject(type)]` forces resolution by declared type instead of the
/// default auto (name-first, type-fallback) strategy. Fields without
/// `#[inject]` are not injection points.
#[proc_macro_derive(Component, attributes(component, inject))]
pub fn derive_component(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;
    let generics = &input.generics;
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let component_name = match component_name_attr(&input.attrs, name) {
        Ok(n) => n,
        Err(e) => return e.to_compile_error().into(),
    };

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return syn::Error::new_spanned(
                    &input,
                    "Component can only be derived for structs with named fields",
                )
                .to_compile_error()
                .into();
            }
        },
        _ => {
            return syn::Error::new_spanned(&input, "Component can only be derived for structs")
                .to_compile_error()
                .into();
        }
    };

    let mut points = Vec::new();
    for field in fields.iter() {
        let attr = match parse_inject_attr(&field.attrs) {
            Ok(a) => a,
            Err(e) => return e.to_compile_error().into(),
        };
        if !attr.present {
            continue;
        }

        let field_name = field.ident.as_ref().unwrap();
        let attribute_name = field_name.to_string();
        let field_ty = &field.ty;
        let required = !attr.optional;

        let resolve_key = if let Some(explicit_name) = &attr.name {
            quote! { ::armature_core::ResolveKey::Name(::std::string::String::from(#explicit_name)) }
        } else if attr.by_type {
            quote! {
                ::armature_core::ResolveKey::Type(
                    ::std::any::TypeId::of::<#field_ty>(),
                    ::std::any::type_name::<#field_ty>(),
                )
            }
        } else {
            quote! { ::armature_core::ResolveKey::Auto }
        };

        points.push(quote! {
            ::armature_core::InjectionPoint {
                attribute_name: #attribute_name,
                resolve_key: #resolve_key,
                required: #required,
            }
        });
    }

    let expanded = quote! {
        impl #impl_generics ::armature_core::Component for #name #ty_generics #where_clause {
            fn component_name() -> &'static str {
                #component_name
            }

            fn injection_points() -> ::std::vec::Vec<::armature_core::InjectionPoint> {
                ::std::vec![ #(#points),* ]
            }
        }
    };

    TokenStream::from(expanded)
}
