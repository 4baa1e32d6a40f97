use chrono::{DateTime, FixedOffset, Utc};
use uuid::Uuid;

use super::EntityError;
use crate::value::{Value, ValueKind};

mod seal {
    pub trait Sealed {}
}

/// Conversion between a native field type and a [`Value`].
///
/// Implemented for the native kinds only; the derive macro routes every other
/// field type through [`json`](super::json).
pub trait PropertyCodec: seal::Sealed + Sized {
    /// Kind every value of this type is stored as.
    const KIND: ValueKind;

    /// Property value, or `None` to leave the property out of the row.
    fn encode(&self) -> Option<Value>;

    /// Reads the property `field` back from `value`.
    fn decode(field: &'static str, value: Value) -> Result<Self, EntityError>;
}

fn mismatch(field: &'static str, expected: ValueKind, value: &Value) -> EntityError {
    EntityError::TypeMismatch {
        field,
        expected,
        actual: value.kind(),
    }
}

macro_rules! impl_property_codec {
    ($ty:ty, $kind:ident, |$v:ident| $encode:expr) => {
        impl seal::Sealed for $ty {}

        impl PropertyCodec for $ty {
            const KIND: ValueKind = ValueKind::$kind;

            fn encode(&self) -> Option<Value> {
                let $v = self;
                Some(Value::$kind($encode))
            }

            fn decode(field: &'static str, value: Value) -> Result<Self, EntityError> {
                match value {
                    Value::$kind(v) => Ok(v),
                    other => Err(mismatch(field, ValueKind::$kind, &other)),
                }
            }
        }
    };
}

impl_property_codec!(String, String, |v| v.clone());
impl_property_codec!(i32, Int32, |v| *v);
impl_property_codec!(f64, Double, |v| *v);
impl_property_codec!(bool, Bool, |v| *v);
impl_property_codec!(Uuid, Guid, |v| *v);
impl_property_codec!(Vec<u8>, Binary, |v| v.clone());

impl seal::Sealed for i64 {}

impl PropertyCodec for i64 {
    const KIND: ValueKind = ValueKind::Int64;

    fn encode(&self) -> Option<Value> {
        Some(Value::Int64(*self))
    }

    fn decode(field: &'static str, value: Value) -> Result<Self, EntityError> {
        value
            .as_i64()
            .ok_or_else(|| mismatch(field, ValueKind::Int64, &value))
    }
}

impl seal::Sealed for DateTime<Utc> {}

impl PropertyCodec for DateTime<Utc> {
    const KIND: ValueKind = ValueKind::DateTime;

    fn encode(&self) -> Option<Value> {
        Some(Value::DateTime(*self))
    }

    fn decode(field: &'static str, value: Value) -> Result<Self, EntityError> {
        match value {
            Value::DateTime(v) => Ok(v),
            Value::DateTimeOffset(v) => Ok(v.with_timezone(&Utc)),
            other => Err(mismatch(field, ValueKind::DateTime, &other)),
        }
    }
}

impl seal::Sealed for DateTime<FixedOffset> {}

impl PropertyCodec for DateTime<FixedOffset> {
    const KIND: ValueKind = ValueKind::DateTimeOffset;

    fn encode(&self) -> Option<Value> {
        Some(Value::DateTimeOffset(*self))
    }

    fn decode(field: &'static str, value: Value) -> Result<Self, EntityError> {
        match value {
            Value::DateTimeOffset(v) => Ok(v),
            // stores without offset support hand back UTC
            Value::DateTime(v) => Ok(v.fixed_offset()),
            other => Err(mismatch(field, ValueKind::DateTimeOffset, &other)),
        }
    }
}

impl<T: PropertyCodec> seal::Sealed for Option<T> {}

impl<T: PropertyCodec> PropertyCodec for Option<T> {
    const KIND: ValueKind = T::KIND;

    fn encode(&self) -> Option<Value> {
        self.as_ref().and_then(T::encode)
    }

    fn decode(field: &'static str, value: Value) -> Result<Self, EntityError> {
        T::decode(field, value).map(Some)
    }
}
