mod entity;

pub(crate) mod data_type;
pub(crate) mod utils;

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

/// Derives `rowkit::TableEntity`, generating the type's field descriptor.
///
/// The key field defaults to `key` and must be a `String` holding
/// `"partition/row"`. Fields named `etag` (`Option<String>`) and `timestamp`
/// (`Option<DateTime<Utc>>`) receive row metadata and are not stored.
///
/// # Example
///
/// ```no_rust
/// use rowkit::TableEntity;
///
/// #[derive(TableEntity, Default)]
/// pub struct Device {
///     pub key: String,
///     #[entity(rename = "Name")]
///     pub name: String,
///     pub firmware: Option<i32>,
///     pub tags: Vec<String>,
/// }
/// ```
#[proc_macro_derive(TableEntity, attributes(entity))]
pub fn table_entity(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);

    let result = entity::handle(ast);
    match result {
        Ok(codegen) => codegen.into(),
        Err(e) => e.to_compile_error().into(),
    }
}
