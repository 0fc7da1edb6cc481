//! Node values and the per-node value cache.

use core::fmt;

use swissknife::Number;

/// A node's value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Value {
    /// Integer, enumeration, and integer register values.
    Integer(i64),
    /// Floating point values.
    Float(f64),
    /// Boolean values.
    Boolean(bool),
    /// String values.
    String(String),
    /// Raw register contents.
    Bytes(Vec<u8>),
}

impl Value {
    /// Short name of the variant, used in error messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::Boolean(_) => "boolean",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
        }
    }

    /// Integer payload; booleans map to `0`/`1`.
    #[must_use]
    pub const fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            Self::Boolean(value) => Some(*value as i64),
            _ => None,
        }
    }

    /// Float payload; integers are widened.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            Self::Integer(value) => Some(*value as f64),
            _ => None,
        }
    }

    /// Boolean payload.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    /// String payload.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    /// Raw bytes payload.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(value) => Some(value),
            _ => None,
        }
    }

    /// Numeric view used when the value feeds a formula or a bound.
    pub(crate) const fn as_number(&self) -> Option<Number> {
        match self {
            Self::Integer(value) => Some(Number::Integer(*value)),
            Self::Float(value) => Some(Number::Float(*value)),
            Self::Boolean(value) => Some(Number::Integer(*value as i64)),
            Self::String(_) | Self::Bytes(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Boolean(value) => write!(f, "{value}"),
            Self::String(value) => f.write_str(value),
            Self::Bytes(bytes) => {
                f.write_str("0x")?;
                bytes.iter().try_for_each(|byte| write!(f, "{byte:02X}"))
            }
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Self::Bytes(value.to_vec())
    }
}

/// Last computed value of a node plus its validity flag.
///
/// Invalidation keeps the stale value around for diagnostics but [`get`]
/// stops returning it until the next [`store`].
///
/// [`get`]: ValueCache::get
/// [`store`]: ValueCache::store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueCache {
    value: Option<Value>,
    valid: bool,
}

impl ValueCache {
    /// Creates an empty, invalid cache.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            value: None,
            valid: false,
        }
    }

    /// Returns the cached value while valid.
    #[must_use]
    pub fn get(&self) -> Option<&Value> {
        if self.valid {
            self.value.as_ref()
        } else {
            None
        }
    }

    /// Stores `value` and marks the cache valid.
    pub fn store(&mut self, value: Value) {
        self.value = Some(value);
        self.valid = true;
    }

    /// Marks the cache invalid. Returns whether it was valid before.
    pub fn invalidate(&mut self) -> bool {
        core::mem::replace(&mut self.valid, false)
    }

    /// Whether the next read may be served from the cache.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.valid
    }

    /// Last stored value regardless of validity.
    #[must_use]
    pub const fn last(&self) -> Option<&Value> {
        self.value.as_ref()
    }
}
