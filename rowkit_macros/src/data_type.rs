use proc_macro2::TokenStream;
use quote::quote;
use syn::{GenericArgument, PathArguments, Type};

/// Storage kind chosen for a field from its declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DataType {
    String,
    Int32,
    Int64,
    Double,
    Boolean,
    Guid,
    DateTime,
    DateTimeOffset,
    Binary,
    Json,
}

impl DataType {
    pub(crate) fn from_type(ty: &Type) -> Self {
        let Some(segment) = last_segment(ty) else {
            return DataType::Json;
        };
        let ident = &segment.ident;
        if ident == "String" {
            DataType::String
        } else if ident == "i32" {
            DataType::Int32
        } else if ident == "i64" {
            DataType::Int64
        } else if ident == "f64" {
            DataType::Double
        } else if ident == "bool" {
            DataType::Boolean
        } else if ident == "Uuid" {
            DataType::Guid
        } else if ident == "DateTime" {
            match single_type_argument(segment).and_then(last_segment) {
                Some(tz) if tz.ident == "Utc" => DataType::DateTime,
                Some(tz) if tz.ident == "FixedOffset" => DataType::DateTimeOffset,
                _ => DataType::Json,
            }
        } else if ident == "Vec" {
            match single_type_argument(segment).and_then(last_segment) {
                Some(inner) if inner.ident == "u8" => DataType::Binary,
                _ => DataType::Json,
            }
        } else {
            DataType::Json
        }
    }

    pub(crate) fn is_native(&self) -> bool {
        !matches!(self, DataType::Json)
    }

    pub(crate) fn to_value_kind(self) -> TokenStream {
        match self {
            DataType::String => quote!(::rowkit::ValueKind::String),
            DataType::Int32 => quote!(::rowkit::ValueKind::Int32),
            DataType::Int64 => quote!(::rowkit::ValueKind::Int64),
            DataType::Double => quote!(::rowkit::ValueKind::Double),
            DataType::Boolean => quote!(::rowkit::ValueKind::Bool),
            DataType::Guid => quote!(::rowkit::ValueKind::Guid),
            DataType::DateTime => quote!(::rowkit::ValueKind::DateTime),
            DataType::DateTimeOffset => quote!(::rowkit::ValueKind::DateTimeOffset),
            DataType::Binary => quote!(::rowkit::ValueKind::Binary),
            DataType::Json => quote!(::rowkit::ValueKind::Json),
        }
    }
}

/// Returns the `T` of an `Option<T>`.
pub(crate) fn option_inner(ty: &Type) -> Option<&Type> {
    let segment = last_segment(ty)?;
    if segment.ident != "Option" {
        return None;
    }
    single_type_argument(segment)
}

fn last_segment(ty: &Type) -> Option<&syn::PathSegment> {
    match ty {
        Type::Path(type_path) if type_path.qself.is_none() => type_path.path.segments.last(),
        _ => None,
    }
}

fn single_type_argument(segment: &syn::PathSegment) -> Option<&Type> {
    let PathArguments::AngleBracketed(generic_args) = &segment.arguments else {
        return None;
    };
    if generic_args.args.len() != 1 {
        return None;
    }
    match &generic_args.args[0] {
        GenericArgument::Type(ty) => Some(ty),
        _ => None,
    }
}
