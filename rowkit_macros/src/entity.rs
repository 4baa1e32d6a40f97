use std::collections::HashSet;

use darling::{ast::Data, util::Ignored, FromDeriveInput, FromField};
use proc_macro2::{Ident, TokenStream};
use quote::quote;
use syn::{DeriveInput, Error, Generics, Type};

use crate::{
    data_type::{option_inner, DataType},
    utils::ident_generator::IdentGenerator,
};

/// Property names owned by the row itself.
const RESERVED_NAMES: [&str; 5] = ["Key", "PartitionKey", "RowKey", "Timestamp", "ETag"];

#[derive(Debug, FromDeriveInput)]
#[darling(attributes(entity), supports(struct_named))]
struct EntityOpts {
    ident: Ident,
    generics: Generics,
    data: Data<Ignored, EntityFieldOpt>,
}

#[derive(Debug, FromField)]
#[darling(attributes(entity))]
struct EntityFieldOpt {
    ident: Option<Ident>,
    ty: Type,
    #[darling(default)]
    key: bool,
    #[darling(default)]
    etag: bool,
    #[darling(default)]
    timestamp: bool,
    #[darling(default)]
    skip: bool,
    #[darling(default)]
    json: bool,
    #[darling(default)]
    rename: Option<String>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Role {
    Key,
    ETag,
    Timestamp,
    Property,
    Skipped,
}

impl EntityFieldOpt {
    fn name(&self) -> &Ident {
        self.ident.as_ref().expect("expect named struct field")
    }

    fn role(&self) -> Role {
        let name = self.name();
        if self.skip {
            Role::Skipped
        } else if self.key {
            Role::Key
        } else if self.etag {
            Role::ETag
        } else if self.timestamp {
            Role::Timestamp
        } else if name == "key" {
            Role::Key
        } else if name == "etag" {
            Role::ETag
        } else if name == "timestamp" {
            Role::Timestamp
        } else {
            Role::Property
        }
    }

    fn property_name(&self) -> String {
        self.rename
            .clone()
            .unwrap_or_else(|| self.name().to_string().trim_start_matches("r#").to_string())
    }

    /// Storage kind plus the inner type when the field is an `Option`.
    fn to_data_type(&self) -> (DataType, Option<&Type>) {
        let inner = option_inner(&self.ty);
        let data_type = if self.json {
            DataType::Json
        } else {
            DataType::from_type(inner.unwrap_or(&self.ty))
        };
        (data_type, inner)
    }
}

pub(crate) fn handle(ast: DeriveInput) -> Result<TokenStream, Error> {
    let entity_opts: EntityOpts = EntityOpts::from_derive_input(&ast)?;

    let struct_name = &entity_opts.ident;
    if !entity_opts.generics.params.is_empty() {
        return Err(Error::new_spanned(
            &entity_opts.generics,
            "generic entities are not supported",
        ));
    }
    let Data::Struct(data_struct) = entity_opts.data else {
        return Err(Error::new_spanned(struct_name, "enum is not supported"));
    };

    let mut key_field = None;
    let mut etag_field = None;
    let mut timestamp_field = None;
    let mut properties = Vec::new();
    for field in data_struct.fields.iter() {
        let slot = match field.role() {
            Role::Key => &mut key_field,
            Role::ETag => &mut etag_field,
            Role::Timestamp => &mut timestamp_field,
            Role::Property => {
                properties.push(field);
                continue;
            }
            Role::Skipped => continue,
        };
        if slot.is_some() {
            return Err(Error::new_spanned(
                field.name(),
                "duplicate key, etag or timestamp field",
            ));
        }
        *slot = Some(field);
    }

    let Some(key_field) = key_field else {
        return Err(Error::new_spanned(
            struct_name,
            "missing key field, name a String field `key` or use #[entity(key)]",
        ));
    };
    if !matches!(key_field.to_data_type(), (DataType::String, None)) {
        return Err(Error::new_spanned(&key_field.ty, "key field must be a String"));
    }

    let key_codegen = key_codegen(struct_name, key_field);
    let etag_codegen = etag_field
        .map(|field| etag_codegen(struct_name, field))
        .transpose()?;
    let timestamp_codegen = timestamp_field
        .map(|field| timestamp_codegen(struct_name, field))
        .transpose()?;

    let mut seen = HashSet::new();
    let mut field_fns = Vec::new();
    let mut field_descriptors = Vec::new();
    for field in properties {
        let property_name = field.property_name();
        if RESERVED_NAMES.contains(&property_name.as_str()) {
            return Err(Error::new_spanned(
                field.name(),
                format!("`{property_name}` is a reserved property name"),
            ));
        }
        if !seen.insert(property_name.clone()) {
            return Err(Error::new_spanned(
                field.name(),
                format!("property `{property_name}` is declared twice"),
            ));
        }
        let (fns, descriptor) = property_codegen(struct_name, field, &property_name);
        field_fns.push(fns);
        field_descriptors.push(descriptor);
    }

    let (etag_fns, etag_chain) = etag_codegen.unwrap_or_default();
    let (timestamp_fns, timestamp_chain) = timestamp_codegen.unwrap_or_default();

    let gen = quote! {
        impl ::rowkit::TableEntity for #struct_name {
            fn descriptor() -> &'static ::rowkit::EntityDescriptor<Self> {
                static DESCRIPTOR: ::rowkit::__private::OnceCell<::rowkit::EntityDescriptor<#struct_name>> =
                    ::rowkit::__private::OnceCell::new();

                DESCRIPTOR.get_or_init(|| {
                    #key_codegen
                    #etag_fns
                    #timestamp_fns
                    #(#field_fns)*

                    ::rowkit::EntityDescriptor::new(
                        stringify!(#struct_name),
                        __key,
                        __set_key,
                        vec![#(#field_descriptors),*],
                    )
                    #etag_chain
                    #timestamp_chain
                })
            }
        }
    };

    Ok(gen)
}

fn key_codegen(struct_name: &Ident, field: &EntityFieldOpt) -> TokenStream {
    let field_name = field.name();
    quote! {
        fn __key(entity: &#struct_name) -> &str {
            &entity.#field_name
        }

        fn __set_key(entity: &mut #struct_name, key: ::std::string::String) {
            entity.#field_name = key;
        }
    }
}

fn etag_codegen(
    struct_name: &Ident,
    field: &EntityFieldOpt,
) -> Result<(TokenStream, TokenStream), Error> {
    if !matches!(field.to_data_type(), (DataType::String, Some(_))) {
        return Err(Error::new_spanned(&field.ty, "etag field must be an Option<String>"));
    }
    let field_name = field.name();
    let fns = quote! {
        fn __etag(entity: &#struct_name) -> ::core::option::Option<&str> {
            entity.#field_name.as_deref()
        }

        fn __set_etag(entity: &mut #struct_name, etag: ::core::option::Option<::std::string::String>) {
            entity.#field_name = etag;
        }
    };
    Ok((fns, quote!(.with_etag(__etag, __set_etag))))
}

fn timestamp_codegen(
    struct_name: &Ident,
    field: &EntityFieldOpt,
) -> Result<(TokenStream, TokenStream), Error> {
    if !matches!(field.to_data_type(), (DataType::DateTime, Some(_))) {
        return Err(Error::new_spanned(
            &field.ty,
            "timestamp field must be an Option<DateTime<Utc>>",
        ));
    }
    let field_name = field.name();
    let fns = quote! {
        fn __timestamp(
            entity: &#struct_name,
        ) -> ::core::option::Option<::rowkit::__private::DateTime<::rowkit::__private::Utc>> {
            entity.#field_name
        }

        fn __set_timestamp(
            entity: &mut #struct_name,
            timestamp: ::core::option::Option<::rowkit::__private::DateTime<::rowkit::__private::Utc>>,
        ) {
            entity.#field_name = timestamp;
        }
    };
    Ok((fns, quote!(.with_timestamp(__timestamp, __set_timestamp))))
}

fn property_codegen(
    struct_name: &Ident,
    field: &EntityFieldOpt,
    property_name: &str,
) -> (TokenStream, TokenStream) {
    let field_name = field.name();
    let field_ty = &field.ty;
    let getter = field_name.to_getter_ident();
    let setter = field_name.to_setter_ident();
    let (data_type, inner_ty) = field.to_data_type();
    let value_kind = data_type.to_value_kind();

    let (get_body, set_body) = if data_type.is_native() {
        (
            quote! {
                ::core::result::Result::Ok(
                    <#field_ty as ::rowkit::PropertyCodec>::encode(&entity.#field_name),
                )
            },
            quote! {
                entity.#field_name = <#field_ty as ::rowkit::PropertyCodec>::decode(#property_name, value)?;
            },
        )
    } else if let Some(inner_ty) = inner_ty {
        (
            quote! {
                match &entity.#field_name {
                    ::core::option::Option::Some(inner) => {
                        ::rowkit::entity::json::encode(#property_name, inner).map(::core::option::Option::Some)
                    }
                    ::core::option::Option::None => ::core::result::Result::Ok(::core::option::Option::None),
                }
            },
            quote! {
                entity.#field_name = ::core::option::Option::Some(
                    ::rowkit::entity::json::decode::<#inner_ty>(#property_name, value)?,
                );
            },
        )
    } else {
        (
            quote! {
                ::rowkit::entity::json::encode(#property_name, &entity.#field_name)
                    .map(::core::option::Option::Some)
            },
            quote! {
                entity.#field_name = ::rowkit::entity::json::decode::<#field_ty>(#property_name, value)?;
            },
        )
    };

    let fns = quote! {
        fn #getter(
            entity: &#struct_name,
        ) -> ::core::result::Result<::core::option::Option<::rowkit::Value>, ::rowkit::EntityError> {
            #get_body
        }

        fn #setter(
            entity: &mut #struct_name,
            value: ::rowkit::Value,
        ) -> ::core::result::Result<(), ::rowkit::EntityError> {
            #set_body
            ::core::result::Result::Ok(())
        }
    };
    let descriptor = quote! {
        ::rowkit::FieldDescriptor::new(#property_name, #value_kind, #getter, #setter)
    };
    (fns, descriptor)
}
