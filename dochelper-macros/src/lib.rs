//! Procedural macros for the dochelper project.
//!
//! Provides `#[derive(Model)]`, which implements `dochelper::model::Model` for a struct with a
//! single identity field. The identity field is the one marked `#[model(id)]`, or else the field
//! named `id`. It must be either:
//!
//! - `Option<T>`: absent when `None`, and `T` becomes the model's `Id` type
//! - `String`: absent when empty
//!
//! ```ignore
//! use dochelper::Model;
//! use bson::oid::ObjectId;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize, Model)]
//! pub struct Country {
//!     #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
//!     #[model(id)]
//!     pub key: Option<ObjectId>,
//!     pub code: String,
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as dochelper_macros;

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    Data, DeriveInput, Field, Fields, GenericArgument, PathArguments, Type, parse_macro_input,
    spanned::Spanned,
};

#[proc_macro_derive(Model, attributes(model))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    expand_model(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand_model(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new(
                    input.ident.span(),
                    "Model can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new(
                input.ident.span(),
                "Model can only be derived for structs",
            ));
        }
    };

    let id_field = identity_field(fields.iter())?.ok_or_else(|| {
        syn::Error::new(
            input.ident.span(),
            "Model needs an identity field: mark one with #[model(id)] or name it `id`",
        )
    })?;

    let field = id_field.ident.as_ref().ok_or_else(|| {
        syn::Error::new(id_field.span(), "identity field must be named")
    })?;

    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let body = match option_inner(&id_field.ty) {
        Some(inner) => quote! {
            type Id = #inner;

            fn id(&self) -> ::core::option::Option<Self::Id> {
                ::core::clone::Clone::clone(&self.#field)
            }

            fn set_id(&mut self, id: Self::Id) {
                self.#field = ::core::option::Option::Some(id);
            }
        },
        None if is_string(&id_field.ty) => quote! {
            type Id = ::std::string::String;

            fn id(&self) -> ::core::option::Option<Self::Id> {
                if self.#field.is_empty() {
                    ::core::option::Option::None
                } else {
                    ::core::option::Option::Some(::core::clone::Clone::clone(&self.#field))
                }
            }

            fn set_id(&mut self, id: Self::Id) {
                self.#field = id;
            }
        },
        None => {
            return Err(syn::Error::new(
                id_field.ty.span(),
                "identity field must be an Option<T> or a String",
            ));
        }
    };

    Ok(quote! {
        impl #impl_generics ::dochelper::model::Model for #name #ty_generics #where_clause {
            #body
        }
    })
}

/// Picks the field marked `#[model(id)]`, falling back to a field named `id`.
fn identity_field<'a>(
    fields: impl Iterator<Item = &'a Field> + Clone,
) -> syn::Result<Option<&'a Field>> {
    let mut marked = None;

    for field in fields.clone() {
        for attr in field.attrs.iter().filter(|attr| attr.path().is_ident("model")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("id") {
                    if marked.is_some() {
                        return Err(meta.error("only one field can be marked #[model(id)]"));
                    }
                    marked = Some(field);
                    Ok(())
                } else {
                    Err(meta.error("unsupported model attribute"))
                }
            })?;
        }
    }

    if marked.is_some() {
        return Ok(marked);
    }

    Ok(fields.into_iter().find(|field| {
        field.ident.as_ref().is_some_and(|ident| ident == "id")
    }))
}

fn last_segment(ty: &Type) -> Option<&syn::PathSegment> {
    match ty {
        Type::Path(path) if path.qself.is_none() => path.path.segments.last(),
        _ => None,
    }
}

fn option_inner(ty: &Type) -> Option<&Type> {
    let segment = last_segment(ty)?;
    if segment.ident != "Option" {
        return None;
    }

    match &segment.arguments {
        PathArguments::AngleBracketed(args) if args.args.len() == 1 => match args.args.first()? {
            GenericArgument::Type(inner) => Some(inner),
            _ => None,
        },
        _ => None,
    }
}

fn is_string(ty: &Type) -> bool {
    last_segment(ty).is_some_and(|segment| {
        segment.ident == "String" && matches!(segment.arguments, PathArguments::None)
    })
}
