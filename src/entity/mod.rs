//! Typed entity ⇄ wide-column row mapping.
//!
//! Entity types describe themselves once through an [`EntityDescriptor`],
//! normally generated by `#[derive(TableEntity)]` and cached in a static for
//! the lifetime of the process. [`to_row`] and [`from_row`] walk that
//! descriptor, so no per-table schema or hand-written conversion exists.
//!
//! Field kinds are fixed when the descriptor is built. Native kinds are, in
//! dispatch order: `String`, `i32`, `i64`, `f64`, `bool`, `Uuid`,
//! `DateTime<Utc>`, `DateTime<FixedOffset>` and `Vec<u8>`, each optionally
//! wrapped in `Option`. Every other type is stored as JSON text and decoded
//! with the declared type on read. Changing a field between a native kind and
//! the JSON fallback changes its stored format, so the list is kept stable.

mod codec;
/// JSON-text encoding for non-native field types.
pub mod json;

use std::{collections::HashMap, fmt};

use chrono::{DateTime, Utc};
pub use codec::PropertyCodec;
use thiserror::Error;

use crate::{
    key::{CompositeKey, KeyError},
    row::Row,
    value::{Value, ValueKind},
};

/// Failures converting between an entity and a [`Row`].
#[derive(Debug, Error)]
pub enum EntityError {
    /// The entity's key field does not hold a valid composite key.
    #[error("entity {entity}: {source}")]
    Key {
        /// Entity type name.
        entity: &'static str,
        /// Why the key was rejected.
        #[source]
        source: KeyError,
    },
    /// A stored property has a different kind than the field declares.
    #[error("field {field}: expected {expected} value, found {actual}")]
    TypeMismatch {
        /// Property name.
        field: &'static str,
        /// Kind the field declares.
        expected: ValueKind,
        /// Kind found in the row.
        actual: ValueKind,
    },
    /// JSON encoding or decoding of a fallback field failed.
    #[error("field {field}: json fallback failed: {source}")]
    Json {
        /// Property name.
        field: &'static str,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },
}

/// Reads a field as a property value; `None` leaves the property out of the row.
pub type FieldGetter<T> = fn(&T) -> Result<Option<Value>, EntityError>;

/// Writes a property value back into a field.
pub type FieldSetter<T> = fn(&mut T, Value) -> Result<(), EntityError>;

/// Name, kind and accessors of one stored property.
pub struct FieldDescriptor<T> {
    name: &'static str,
    kind: ValueKind,
    get: FieldGetter<T>,
    set: FieldSetter<T>,
}

impl<T> FieldDescriptor<T> {
    /// Describes the property `name` of kind `kind`.
    pub fn new(
        name: &'static str,
        kind: ValueKind,
        get: FieldGetter<T>,
        set: FieldSetter<T>,
    ) -> Self {
        Self {
            name,
            kind,
            get,
            set,
        }
    }

    /// Stored property name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Declared value kind.
    pub fn kind(&self) -> ValueKind {
        self.kind
    }
}

impl<T> fmt::Debug for FieldDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Field layout of one entity type.
pub struct EntityDescriptor<T> {
    type_name: &'static str,
    key: fn(&T) -> &str,
    set_key: fn(&mut T, String),
    fields: Vec<FieldDescriptor<T>>,
    by_name: HashMap<&'static str, usize>,
    etag: Option<(fn(&T) -> Option<&str>, fn(&mut T, Option<String>))>,
    timestamp: Option<(fn(&T) -> Option<DateTime<Utc>>, fn(&mut T, Option<DateTime<Utc>>))>,
}

impl<T> EntityDescriptor<T> {
    /// Descriptor with key accessors and the stored properties.
    pub fn new(
        type_name: &'static str,
        key: fn(&T) -> &str,
        set_key: fn(&mut T, String),
        fields: Vec<FieldDescriptor<T>>,
    ) -> Self {
        let by_name = fields
            .iter()
            .enumerate()
            .map(|(index, field)| (field.name, index))
            .collect();
        Self {
            type_name,
            key,
            set_key,
            fields,
            by_name,
            etag: None,
            timestamp: None,
        }
    }

    /// Adds accessors for the field that receives the row's etag.
    pub fn with_etag(mut self, get: fn(&T) -> Option<&str>, set: fn(&mut T, Option<String>)) -> Self {
        self.etag = Some((get, set));
        self
    }

    /// Adds accessors for the field that receives the row's timestamp.
    pub fn with_timestamp(
        mut self,
        get: fn(&T) -> Option<DateTime<Utc>>,
        set: fn(&mut T, Option<DateTime<Utc>>),
    ) -> Self {
        self.timestamp = Some((get, set));
        self
    }

    /// Rust type name of the entity.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Stored properties, in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor<T>] {
        &self.fields
    }

    /// Property named `name`.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor<T>> {
        self.by_name.get(name).map(|index| &self.fields[*index])
    }

    /// Stored property names, in declaration order.
    pub fn columns(&self) -> Vec<String> {
        self.fields.iter().map(|field| field.name.to_string()).collect()
    }
}

impl<T> fmt::Debug for EntityDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDescriptor")
            .field("type_name", &self.type_name)
            .field("fields", &self.fields)
            .field("etag", &self.etag.is_some())
            .field("timestamp", &self.timestamp.is_some())
            .finish()
    }
}

/// A record type that maps to wide-column rows.
///
/// Implement with `#[derive(TableEntity)]`. The key field holds the external
/// key form `"partition/row"`.
pub trait TableEntity: Default + Send + Sync + Sized + 'static {
    /// Field layout shared by every instance of the type.
    fn descriptor() -> &'static EntityDescriptor<Self>;

    /// External key form held by the key field.
    fn key(&self) -> &str {
        (Self::descriptor().key)(self)
    }

    /// Etag of the row this entity was read from, if any.
    fn etag(&self) -> Option<&str> {
        Self::descriptor()
            .etag
            .and_then(|(get, _)| get(self))
    }
}

/// Converts an entity into a row, failing on a malformed key.
pub fn to_row<T: TableEntity>(entity: &T) -> Result<Row, EntityError> {
    let descriptor = T::descriptor();
    let key = CompositeKey::parse((descriptor.key)(entity)).map_err(|source| EntityError::Key {
        entity: descriptor.type_name,
        source,
    })?;

    let mut row = Row::new(key);
    for field in &descriptor.fields {
        if let Some(value) = (field.get)(entity)? {
            row.insert(field.name, value);
        }
    }
    if let Some((get, _)) = descriptor.etag {
        row.etag = get(entity).map(str::to_string);
    }
    if let Some((get, _)) = descriptor.timestamp {
        row.timestamp = get(entity);
    }
    Ok(row)
}

/// Rebuilds an entity from a row.
///
/// Properties without a matching field are ignored so stored rows may carry
/// columns the current type no longer declares.
pub fn from_row<T: TableEntity>(row: Row) -> Result<T, EntityError> {
    let descriptor = T::descriptor();
    let mut entity = T::default();
    (descriptor.set_key)(&mut entity, row.key());

    if let Some((_, set)) = descriptor.etag {
        set(&mut entity, row.etag.clone());
    }
    if let Some((_, set)) = descriptor.timestamp {
        set(&mut entity, row.timestamp);
    }
    for (name, value) in row.into_properties() {
        if let Some(field) = descriptor.field(&name) {
            (field.set)(&mut entity, value)?;
        }
    }
    Ok(entity)
}

#[cfg(test)]
mod tests {
    use super::{from_row, to_row, EntityDescriptor, EntityError, FieldDescriptor, TableEntity};
    use crate::{
        entity::PropertyCodec,
        key::CompositeKey,
        row::Row,
        value::{Value, ValueKind},
    };

    // Hand-written descriptor, the same shape the derive macro emits.
    #[derive(Debug, Default, PartialEq)]
    struct Counter {
        key: String,
        hits: i64,
        label: Option<String>,
    }

    impl TableEntity for Counter {
        fn descriptor() -> &'static EntityDescriptor<Self> {
            static DESCRIPTOR: once_cell::sync::OnceCell<EntityDescriptor<Counter>> =
                once_cell::sync::OnceCell::new();
            DESCRIPTOR.get_or_init(|| {
                fn key(entity: &Counter) -> &str {
                    &entity.key
                }
                fn set_key(entity: &mut Counter, key: String) {
                    entity.key = key;
                }
                fn get_hits(entity: &Counter) -> Result<Option<Value>, EntityError> {
                    Ok(entity.hits.encode())
                }
                fn set_hits(entity: &mut Counter, value: Value) -> Result<(), EntityError> {
                    entity.hits = <i64 as PropertyCodec>::decode("hits", value)?;
                    Ok(())
                }
                fn get_label(entity: &Counter) -> Result<Option<Value>, EntityError> {
                    Ok(entity.label.encode())
                }
                fn set_label(entity: &mut Counter, value: Value) -> Result<(), EntityError> {
                    entity.label = <Option<String> as PropertyCodec>::decode("label", value)?;
                    Ok(())
                }
                EntityDescriptor::new(
                    "Counter",
                    key,
                    set_key,
                    vec![
                        FieldDescriptor::new("hits", ValueKind::Int64, get_hits, set_hits),
                        FieldDescriptor::new("label", ValueKind::String, get_label, set_label),
                    ],
                )
            })
        }
    }

    #[test]
    fn descriptor_is_built_once() {
        let first = Counter::descriptor() as *const _;
        let second = Counter::descriptor() as *const _;
        assert_eq!(first, second);
        assert_eq!(Counter::descriptor().columns(), vec!["hits", "label"]);
    }

    #[test]
    fn round_trips_through_row() {
        let counter = Counter {
            key: "daily/2024-05-01".to_string(),
            hits: 42,
            label: Some("home".to_string()),
        };
        let row = to_row(&counter).unwrap();
        assert_eq!(row.partition_key, "daily");
        assert_eq!(row.row_key, "2024-05-01");
        assert_eq!(row.get("hits"), Some(&Value::Int64(42)));
        assert_eq!(from_row::<Counter>(row).unwrap(), counter);
    }

    #[test]
    fn none_fields_are_omitted() {
        let counter = Counter {
            key: "a/b".to_string(),
            ..Default::default()
        };
        let row = to_row(&counter).unwrap();
        assert!(row.get("label").is_none());
        assert!(row.get("Key").is_none());
    }

    #[test]
    fn malformed_key_is_rejected() {
        let counter = Counter {
            key: "no-separator".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            to_row(&counter),
            Err(EntityError::Key {
                entity: "Counter",
                ..
            })
        ));
    }

    #[test]
    fn unknown_properties_are_ignored_and_int32_widens() {
        let mut row = Row::new(CompositeKey::parse("a/b").unwrap());
        row.insert("hits", 7i32);
        row.insert("retired_column", "stale");
        let counter: Counter = from_row(row).unwrap();
        assert_eq!(counter.hits, 7);
        assert_eq!(counter.key, "a/b");
    }

    #[test]
    fn mismatched_kind_is_reported() {
        let mut row = Row::new(CompositeKey::parse("a/b").unwrap());
        row.insert("hits", "many");
        let err = from_row::<Counter>(row).unwrap_err();
        assert!(matches!(
            err,
            EntityError::TypeMismatch {
                field: "hits",
                expected: ValueKind::Int64,
                actual: ValueKind::String,
            }
        ));
    }
}
