use quote::format_ident;
use syn::Ident;

pub(crate) trait IdentGenerator {
    fn to_getter_ident(&self) -> Ident;

    fn to_setter_ident(&self) -> Ident;
}

impl IdentGenerator for proc_macro2::Ident {
    fn to_getter_ident(&self) -> Ident {
        format_ident!("__get_{}", self)
    }

    fn to_setter_ident(&self) -> Ident {
        format_ident!("__set_{}", self)
    }
}
