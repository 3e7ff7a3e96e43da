//! Field values and the field mapping.
//!
//! Entities carry an explicit ordered mapping from field name to a tagged
//! value type instead of a dynamic attribute bag. Attribute access is a map
//! lookup returning an `Option`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Ordered mapping from field name to value — the payload of an entity.
pub type Fields = BTreeMap<String, Value>;

/// Possible values an entity field can hold.
///
/// # Examples
///
/// ```
/// use kvorm::Value;
///
/// let name = Value::from("John Doe");
/// let age = Value::from(30);
///
/// assert!(name.is_string());
/// assert_eq!(age.as_int(), Some(30));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// Boolean.
    Bool(bool),
    /// Signed 64-bit integer.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Opaque byte blob.
    Bytes(Vec<u8>),
    /// Nested field mapping.
    Map(Fields),
    /// Explicit absence of a value.
    Null,
}

impl Value {
    /// True if this is a boolean.
    pub const fn is_bool(&self) -> bool {
        matches!(self, Self::Bool(_))
    }

    /// True if this is an integer.
    pub const fn is_int(&self) -> bool {
        matches!(self, Self::Int(_))
    }

    /// True if this is a float.
    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Float(_))
    }

    /// True if this is a string.
    pub const fn is_string(&self) -> bool {
        matches!(self, Self::String(_))
    }

    /// True if this is a byte blob.
    pub const fn is_bytes(&self) -> bool {
        matches!(self, Self::Bytes(_))
    }

    /// True if this is a nested map.
    pub const fn is_map(&self) -> bool {
        matches!(self, Self::Map(_))
    }

    /// True if this is null.
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The boolean value, if this is a boolean.
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// The integer value, if this is an integer.
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The numeric value as a float. Integers widen.
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// The string slice, if this is a string.
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// The byte slice, if this is a byte blob.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(v) => Some(v),
            _ => None,
        }
    }

    /// The nested fields, if this is a map.
    pub const fn as_map(&self) -> Option<&Fields> {
        match self {
            Self::Map(v) => Some(v),
            _ => None,
        }
    }

    /// Returns a human-readable type name.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Map(_) => "map",
            Self::Null => "null",
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::Null
    }
}

/// Display renders the bare scalar text. Attribute-derived tags are built
/// from this representation (`"age:30"`, `"name:John Doe"`), so strings are
/// not quoted.
impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v}"),
            Self::Bytes(v) => write!(f, "bytes[{}]", v.len()),
            Self::Map(v) => write!(f, "map[{}]", v.len()),
            Self::Null => write!(f, "null"),
        }
    }
}

// Convenient From implementations
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<Fields> for Value {
    fn from(v: Fields) -> Self {
        Self::Map(v)
    }
}
