// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 weftworks

extern crate proc_macro;

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, Visibility};

/// `#[derive(Fields)]` macro: generates the `FieldAccess` impl for a struct.
///
/// Emits one set/get accessor pair per externally visible field. A field is
/// included when it is `pub` and not annotated `#[fields(skip)]`; everything
/// else is excluded from the descriptor at build time and indistinguishable
/// from a nonexistent field at the call site.
///
/// Field types must implement `Clone` (readers copy the value out) and be
/// `'static`.
///
/// Example:
/// ```ignore
/// use weft::fields::Fields;
///
/// #[derive(Clone, Fields)]
/// struct Profile {
///     pub name: String,
///     pub email: String,
///     pub age: u32,
///     revision: u64, // not pub: excluded
/// }
/// ```
#[proc_macro_derive(Fields, attributes(fields))]
pub fn derive_fields(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let name = &input.ident;
    let type_name = name.to_string();

    if !input.generics.params.is_empty() {
        return syn::Error::new_spanned(
            &input.generics,
            "#[derive(Fields)] does not support generic structs",
        )
        .to_compile_error()
        .into();
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(f) => &f.named,
            _ => {
                return syn::Error::new_spanned(&input, "Only named fields are supported")
                    .to_compile_error()
                    .into()
            }
        },
        _ => {
            return syn::Error::new_spanned(&input, "Only structs are supported")
                .to_compile_error()
                .into()
        }
    };

    let mut descriptors = Vec::new();

    for field in fields {
        let Some(field_ident) = field.ident.as_ref() else {
            return syn::Error::new_spanned(field, "Field must have a name")
                .to_compile_error()
                .into();
        };

        // Non-pub fields are not externally visible and carry no accessors.
        if !matches!(field.vis, Visibility::Public(_)) {
            continue;
        }

        match has_skip_attribute(field) {
            Ok(true) => continue,
            Ok(false) => {}
            Err(err) => return err.to_compile_error().into(),
        }

        let field_name = field_ident.to_string();
        let field_ty = &field.ty;

        descriptors.push(quote! {
            ::weft::fields::FieldDescriptor::new(
                #field_name,
                ::std::any::type_name::<#field_ty>(),
                |record, value| {
                    let record = match record.downcast_mut::<#name>() {
                        ::std::option::Option::Some(record) => record,
                        ::std::option::Option::None => {
                            return ::std::result::Result::Err(
                                ::weft::fields::FieldError::Record { expected: #type_name },
                            )
                        }
                    };
                    match value.downcast::<#field_ty>() {
                        ::std::result::Result::Ok(value) => {
                            record.#field_ident = *value;
                            ::std::result::Result::Ok(())
                        }
                        ::std::result::Result::Err(_) => ::std::result::Result::Err(
                            ::weft::fields::FieldError::TypeMismatch {
                                type_name: #type_name,
                                field: #field_name,
                                expected: ::std::any::type_name::<#field_ty>(),
                            },
                        ),
                    }
                },
                |record| {
                    let record = match record.downcast_ref::<#name>() {
                        ::std::option::Option::Some(record) => record,
                        ::std::option::Option::None => {
                            return ::std::result::Result::Err(
                                ::weft::fields::FieldError::Record { expected: #type_name },
                            )
                        }
                    };
                    ::std::result::Result::Ok(::std::boxed::Box::new(
                        ::std::clone::Clone::clone(&record.#field_ident),
                    ) as ::std::boxed::Box<dyn ::std::any::Any>)
                },
            )
        });
    }

    let expanded = quote! {
        impl ::weft::fields::FieldAccess for #name {
            fn field_descriptor() -> ::std::result::Result<
                ::weft::fields::TypeDescriptor,
                ::weft::fields::DescriptorError,
            > {
                ::std::result::Result::Ok(::weft::fields::TypeDescriptor::from_parts(
                    #type_name,
                    ::std::vec![#(#descriptors),*],
                ))
            }
        }
    };

    TokenStream::from(expanded)
}

/// Check for `#[fields(skip)]` on a field.
fn has_skip_attribute(field: &syn::Field) -> Result<bool, syn::Error> {
    for attr in &field.attrs {
        if !attr.path().is_ident("fields") {
            continue;
        }
        let ident: syn::Ident = attr.parse_args()?;
        if ident == "skip" {
            return Ok(true);
        }
        return Err(syn::Error::new_spanned(
            attr,
            "unknown #[fields(..)] option; expected `skip`",
        ));
    }
    Ok(false)
}
