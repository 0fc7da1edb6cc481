//! Scalar values produced and consumed by formula evaluation.

use crate::{FormulaError, FormulaErrorKind};

/// Scalar formula value: integer or IEEE-754 double.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    /// Signed 64-bit integer.
    Integer(i64),
    /// Double precision float.
    Float(f64),
}

impl Number {
    /// Returns the value widened to `f64`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Integer(value) => value as f64,
            Self::Float(value) => value,
        }
    }

    /// Returns the value as an integer, truncating floats toward zero.
    ///
    /// # Errors
    ///
    /// Returns [`FormulaErrorKind::Overflow`] when a float is not finite or
    /// does not fit in `i64`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn to_i64(self) -> Result<i64, FormulaError> {
        match self {
            Self::Integer(value) => Ok(value),
            Self::Float(value) => {
                let truncated = value.trunc();
                if truncated.is_finite()
                    && truncated >= i64::MIN as f64
                    && truncated < i64::MAX as f64
                {
                    Ok(truncated as i64)
                } else {
                    Err(FormulaError::runtime(FormulaErrorKind::Overflow))
                }
            }
        }
    }

    /// Non-zero values are true.
    #[must_use]
    pub fn is_truthy(self) -> bool {
        match self {
            Self::Integer(value) => value != 0,
            Self::Float(value) => value != 0.0,
        }
    }

    /// Returns `true` for the integer variant.
    #[must_use]
    pub const fn is_integer(self) -> bool {
        matches!(self, Self::Integer(_))
    }

    pub(crate) const fn from_bool(flag: bool) -> Self {
        if flag {
            Self::Integer(1)
        } else {
            Self::Integer(0)
        }
    }
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Number {
    fn from(value: bool) -> Self {
        Self::from_bool(value)
    }
}
