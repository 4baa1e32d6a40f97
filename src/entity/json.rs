//! JSON-text fallback for field types without a native property kind.
//!
//! Values are written with `serde_json`'s default settings. Those settings are
//! part of the stored format and must not change, or rows written earlier stop
//! decoding.

use serde::{de::DeserializeOwned, Serialize};

use super::EntityError;
use crate::value::{Value, ValueKind};

/// Serializes `value` into a string property.
pub fn encode<V>(field: &'static str, value: &V) -> Result<Value, EntityError>
where
    V: Serialize + ?Sized,
{
    serde_json::to_string(value)
        .map(Value::String)
        .map_err(|source| EntityError::Json { field, source })
}

/// Parses a string property as `V`.
pub fn decode<V>(field: &'static str, value: Value) -> Result<V, EntityError>
where
    V: DeserializeOwned,
{
    match value {
        Value::String(text) => {
            serde_json::from_str(&text).map_err(|source| EntityError::Json { field, source })
        }
        other => Err(EntityError::TypeMismatch {
            field,
            expected: ValueKind::Json,
            actual: other.kind(),
        }),
    }
}
