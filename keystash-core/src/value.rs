//! Payload types held by the cache and the backing store.
//!
//! A [`Value`] is a closed set of payload kinds. Equality is defined per
//! kind and values of different kinds never compare equal, so an
//! `Integer(1)` and a `Float(1.0)` are distinct payloads. Types outside the
//! closed set go through the [`OpaqueValue`] extension point.

use chrono::{DateTime, Utc};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use url::Url;

// ============================================================================
// OPAQUE EXTENSION POINT
// ============================================================================

/// Extension point for payloads outside the built-in kinds.
///
/// Implementations decide equality against another opaque payload. Two
/// payloads of different dynamic types must never be equal. A payload that
/// cannot be compared must answer `false`, which makes every write of it
/// reach the backing store.
pub trait OpaqueValue: Any + fmt::Debug + Send + Sync {
    /// Upcast used for downcasting to the concrete type.
    fn as_any(&self) -> &dyn Any;

    /// Compare against another opaque payload.
    fn opaque_eq(&self, other: &dyn OpaqueValue) -> bool;
}

/// Opaque payload compared with its own `PartialEq`.
#[derive(Debug)]
struct Comparable<T>(T);

impl<T> OpaqueValue for Comparable<T>
where
    T: PartialEq + fmt::Debug + Send + Sync + 'static,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn opaque_eq(&self, other: &dyn OpaqueValue) -> bool {
        other
            .as_any()
            .downcast_ref::<Self>()
            .is_some_and(|other| other.0 == self.0)
    }
}

/// Opaque payload without an equality capability. Never equal to anything.
#[derive(Debug)]
struct Incomparable<T>(T);

impl<T> OpaqueValue for Incomparable<T>
where
    T: fmt::Debug + Send + Sync + 'static,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn opaque_eq(&self, _other: &dyn OpaqueValue) -> bool {
        false
    }
}

// ============================================================================
// VALUE
// ============================================================================

/// A payload stored under a key.
#[derive(Debug, Clone)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Bytes(Vec<u8>),
    Date(DateTime<Utc>),
    Url(Url),
    Array(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Opaque(Arc<dyn OpaqueValue>),
}

impl Value {
    /// Wrap a comparable type that has no built-in kind.
    pub fn opaque<T>(value: T) -> Self
    where
        T: PartialEq + fmt::Debug + Send + Sync + 'static,
    {
        Value::Opaque(Arc::new(Comparable(value)))
    }

    /// Wrap a type that cannot be compared. Writes of it are never skipped.
    pub fn incomparable<T>(value: T) -> Self
    where
        T: fmt::Debug + Send + Sync + 'static,
    {
        Value::Opaque(Arc::new(Incomparable(value)))
    }

    /// Borrow the concrete type behind an opaque payload.
    pub fn downcast_opaque<T: 'static>(&self) -> Option<&T> {
        let Value::Opaque(inner) = self else {
            return None;
        };
        let any = inner.as_any();
        any.downcast_ref::<Comparable<T>>()
            .map(|c| &c.0)
            .or_else(|| any.downcast_ref::<Incomparable<T>>().map(|i| &i.0))
    }

    /// Short name of the payload kind, used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Bytes(_) => "bytes",
            Value::Date(_) => "date",
            Value::Url(_) => "url",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
            Value::Opaque(_) => "opaque",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Url(a), Value::Url(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Opaque(a), Value::Opaque(b)) => a.opaque_eq(b.as_ref()),
            _ => false,
        }
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(f64::from(value))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(value)
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Value::Bytes(value.to_vec())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Date(value)
    }
}

impl From<Url> for Value {
    fn from(value: Url) -> Self {
        Value::Url(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::Array(value)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(value: BTreeMap<String, Value>) -> Self {
        Value::Map(value)
    }
}

// ============================================================================
// TYPED CONVERSION
// ============================================================================

/// Conversion between a Rust type and a [`Value`].
///
/// `from_value` returns `None` when the payload is of another kind; typed
/// reads treat that the same as a missing value.
pub trait SettingValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;
    fn into_value(self) -> Value;
}

macro_rules! setting_value {
    ($ty:ty, $variant:ident) => {
        impl SettingValue for $ty {
            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::$variant(inner) => Some(inner.clone()),
                    _ => None,
                }
            }

            fn into_value(self) -> Value {
                Value::$variant(self)
            }
        }
    };
}

setting_value!(String, String);
setting_value!(i64, Integer);
setting_value!(f64, Float);
setting_value!(bool, Bool);
setting_value!(Vec<u8>, Bytes);
setting_value!(DateTime<Utc>, Date);
setting_value!(Url, Url);
setting_value!(Vec<Value>, Array);
setting_value!(BTreeMap<String, Value>, Map);

impl SettingValue for f32 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(f) => Some(*f as f32),
            _ => None,
        }
    }

    fn into_value(self) -> Value {
        Value::Float(f64::from(self))
    }
}

impl SettingValue for Value {
    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }

    fn into_value(self) -> Value {
        self
    }
}
