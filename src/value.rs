use std::fmt;

use chrono::{DateTime, FixedOffset, Utc};
use uuid::Uuid;

/// Native property kinds of a wide-column row.
///
/// `Json` is not a storage kind: fields of that kind are written as
/// [`Value::String`] holding JSON text and decoded with the field's declared
/// type on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// UTF-8 text.
    String,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 64-bit float.
    Double,
    /// Boolean.
    Bool,
    /// 128-bit identifier.
    Guid,
    /// Instant in UTC.
    DateTime,
    /// Instant carrying its original offset.
    DateTimeOffset,
    /// Raw bytes.
    Binary,
    /// Serialized as JSON text in a string property.
    Json,
}

impl ValueKind {
    /// Name of the kind as the remote store spells it.
    pub fn edm_name(&self) -> &'static str {
        match self {
            ValueKind::String | ValueKind::Json => "Edm.String",
            ValueKind::Int32 => "Edm.Int32",
            ValueKind::Int64 => "Edm.Int64",
            ValueKind::Double => "Edm.Double",
            ValueKind::Bool => "Edm.Boolean",
            ValueKind::Guid => "Edm.Guid",
            ValueKind::DateTime | ValueKind::DateTimeOffset => "Edm.DateTime",
            ValueKind::Binary => "Edm.Binary",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::String => "string",
            ValueKind::Int32 => "int32",
            ValueKind::Int64 => "int64",
            ValueKind::Double => "double",
            ValueKind::Bool => "bool",
            ValueKind::Guid => "guid",
            ValueKind::DateTime => "datetime",
            ValueKind::DateTimeOffset => "datetime-offset",
            ValueKind::Binary => "binary",
            ValueKind::Json => "json",
        };
        f.write_str(name)
    }
}

/// A typed property value stored in a [`Row`](crate::Row).
#[derive(Debug, Clone)]
pub enum Value {
    /// See [`ValueKind::String`].
    String(String),
    /// See [`ValueKind::Int32`].
    Int32(i32),
    /// See [`ValueKind::Int64`].
    Int64(i64),
    /// See [`ValueKind::Double`].
    Double(f64),
    /// See [`ValueKind::Bool`].
    Bool(bool),
    /// See [`ValueKind::Guid`].
    Guid(Uuid),
    /// See [`ValueKind::DateTime`].
    DateTime(DateTime<Utc>),
    /// See [`ValueKind::DateTimeOffset`].
    DateTimeOffset(DateTime<FixedOffset>),
    /// See [`ValueKind::Binary`].
    Binary(Vec<u8>),
}

impl Value {
    /// Storage kind of the value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::String(_) => ValueKind::String,
            Value::Int32(_) => ValueKind::Int32,
            Value::Int64(_) => ValueKind::Int64,
            Value::Double(_) => ValueKind::Double,
            Value::Bool(_) => ValueKind::Bool,
            Value::Guid(_) => ValueKind::Guid,
            Value::DateTime(_) => ValueKind::DateTime,
            Value::DateTimeOffset(_) => ValueKind::DateTimeOffset,
            Value::Binary(_) => ValueKind::Binary,
        }
    }

    /// Text, when the value is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    /// Integer, when the value is an `Int32`.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int32(v) => Some(*v),
            _ => None,
        }
    }

    /// Also widens `Int32`, since stores may narrow small integers.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(v) => Some(*v),
            Value::Int32(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    /// Float, when the value is a `Double`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Flag, when the value is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Identifier, when the value is a `Guid`.
    pub fn as_guid(&self) -> Option<&Uuid> {
        match self {
            Value::Guid(v) => Some(v),
            _ => None,
        }
    }

    /// Bytes, when the value is `Binary`.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Binary(v) => Some(v),
            _ => None,
        }
    }
}

impl Eq for Value {}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Int32(a), Value::Int32(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Guid(a), Value::Guid(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::DateTimeOffset(a), Value::DateTimeOffset(b)) => {
                a == b && a.offset() == b.offset()
            }
            (Value::Binary(a), Value::Binary(b)) => a == b,
            _ => false,
        }
    }
}

macro_rules! impl_from_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value)
                }
            }
        )*
    };
}

impl_from_value! {
    String => String,
    i32 => Int32,
    i64 => Int64,
    f64 => Double,
    bool => Bool,
    Uuid => Guid,
    DateTime<Utc> => DateTime,
    DateTime<FixedOffset> => DateTimeOffset,
    Vec<u8> => Binary,
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}
