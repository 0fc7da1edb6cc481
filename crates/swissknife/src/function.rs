//! Built-in functions and named constants.

use std::cmp::Ordering;

use crate::{FormulaError, FormulaErrorKind, Number};

/// Built-in formula functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    /// Sign: -1, 0, or 1.
    Sgn,
    /// Negation.
    Neg,
    /// Absolute value.
    Abs,
    /// Square root.
    Sqrt,
    /// Natural exponential.
    Exp,
    /// Natural logarithm.
    Ln,
    /// Base-10 logarithm.
    Lg,
    /// Sine (radians).
    Sin,
    /// Cosine (radians).
    Cos,
    /// Tangent (radians).
    Tan,
    /// Arc sine.
    Asin,
    /// Arc cosine.
    Acos,
    /// Arc tangent.
    Atan,
    /// Truncate toward zero.
    Trunc,
    /// Round toward negative infinity.
    Floor,
    /// Round toward positive infinity.
    Ceil,
    /// Round half away from zero, optionally to a number of decimals.
    Round,
    /// Smaller of two values.
    Min,
    /// Larger of two values.
    Max,
}

impl Function {
    /// Resolves a function name, ignoring ASCII case.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let function = match name.to_ascii_uppercase().as_str() {
            "SGN" => Self::Sgn,
            "NEG" => Self::Neg,
            "ABS" => Self::Abs,
            "SQRT" => Self::Sqrt,
            "EXP" => Self::Exp,
            "LN" => Self::Ln,
            "LG" => Self::Lg,
            "SIN" => Self::Sin,
            "COS" => Self::Cos,
            "TAN" => Self::Tan,
            "ASIN" => Self::Asin,
            "ACOS" => Self::Acos,
            "ATAN" => Self::Atan,
            "TRUNC" => Self::Trunc,
            "FLOOR" => Self::Floor,
            "CEIL" => Self::Ceil,
            "ROUND" => Self::Round,
            "MIN" => Self::Min,
            "MAX" => Self::Max,
            _ => return None,
        };
        Some(function)
    }

    /// Inclusive range of accepted argument counts.
    #[must_use]
    pub const fn arity(self) -> (usize, usize) {
        match self {
            Self::Round => (1, 2),
            Self::Min | Self::Max => (2, 2),
            _ => (1, 1),
        }
    }

    pub(crate) fn apply(self, args: &[Number]) -> Result<Number, FormulaError> {
        let overflow = || FormulaError::runtime(FormulaErrorKind::Overflow);
        let x = args[0];
        let value = match (self, x) {
            (Self::Sgn, Number::Integer(v)) => Number::Integer(v.signum()),
            (Self::Sgn, Number::Float(v)) => {
                Number::Integer(if v > 0.0 { 1 } else if v < 0.0 { -1 } else { 0 })
            }
            (Self::Neg, Number::Integer(v)) => {
                Number::Integer(v.checked_neg().ok_or_else(overflow)?)
            }
            (Self::Neg, Number::Float(v)) => Number::Float(-v),
            (Self::Abs, Number::Integer(v)) => {
                Number::Integer(v.checked_abs().ok_or_else(overflow)?)
            }
            (Self::Abs, Number::Float(v)) => Number::Float(v.abs()),
            (Self::Trunc | Self::Floor | Self::Ceil, Number::Integer(_)) => x,
            (Self::Round, Number::Integer(_)) if args.len() == 1 => x,
            (Self::Trunc, Number::Float(v)) => Number::Float(v.trunc()),
            (Self::Floor, Number::Float(v)) => Number::Float(v.floor()),
            (Self::Ceil, Number::Float(v)) => Number::Float(v.ceil()),
            (Self::Round, _) => round(x, args.get(1).copied())?,
            (Self::Min, _) => min_max(x, args[1], Ordering::Less),
            (Self::Max, _) => min_max(x, args[1], Ordering::Greater),
            (Self::Sqrt, _) => Number::Float(x.as_f64().sqrt()),
            (Self::Exp, _) => Number::Float(x.as_f64().exp()),
            (Self::Ln, _) => Number::Float(x.as_f64().ln()),
            (Self::Lg, _) => Number::Float(x.as_f64().log10()),
            (Self::Sin, _) => Number::Float(x.as_f64().sin()),
            (Self::Cos, _) => Number::Float(x.as_f64().cos()),
            (Self::Tan, _) => Number::Float(x.as_f64().tan()),
            (Self::Asin, _) => Number::Float(x.as_f64().asin()),
            (Self::Acos, _) => Number::Float(x.as_f64().acos()),
            (Self::Atan, _) => Number::Float(x.as_f64().atan()),
        };
        Ok(value)
    }
}

fn min_max(a: Number, b: Number, keep: Ordering) -> Number {
    match (a, b) {
        (Number::Integer(x), Number::Integer(y)) => {
            if x == y || x.cmp(&y) == keep {
                a
            } else {
                b
            }
        }
        _ => {
            let (x, y) = (a.as_f64(), b.as_f64());
            let keep_first = match keep {
                Ordering::Less => x <= y,
                _ => x >= y,
            };
            Number::Float(if keep_first { x } else { y })
        }
    }
}

fn round(x: Number, decimals: Option<Number>) -> Result<Number, FormulaError> {
    let places = match decimals {
        Some(places) => places.to_i64()?,
        None => 0,
    };
    if places == 0 {
        return Ok(match x {
            Number::Integer(_) => x,
            Number::Float(v) => Number::Float(v.round()),
        });
    }
    let places =
        i32::try_from(places).map_err(|_| FormulaError::runtime(FormulaErrorKind::Overflow))?;
    let scale = 10_f64.powi(places);
    Ok(Number::Float((x.as_f64() * scale).round() / scale))
}

/// Resolves a named constant (`PI`, `E`), ignoring ASCII case.
#[must_use]
pub fn constant(name: &str) -> Option<f64> {
    match name.to_ascii_uppercase().as_str() {
        "PI" => Some(std::f64::consts::PI),
        "E" => Some(std::f64::consts::E),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{constant, Function};
    use crate::Number;

    #[test]
    fn names_resolve_case_insensitively() {
        assert_eq!(Function::from_name("sqrt"), Some(Function::Sqrt));
        assert_eq!(Function::from_name("MAX"), Some(Function::Max));
        assert_eq!(Function::from_name("Gain"), None);
        assert!(constant("pi").is_some());
    }

    #[test]
    fn integer_min_max_keep_integer_type() {
        let min = Function::Min.apply(&[Number::Integer(7), Number::Integer(-3)]);
        assert_eq!(min, Ok(Number::Integer(-3)));
        let max = Function::Max.apply(&[Number::Integer(7), Number::Integer(-3)]);
        assert_eq!(max, Ok(Number::Integer(7)));
    }

    #[test]
    fn round_with_decimals() {
        let rounded = Function::Round.apply(&[Number::Float(2.345), Number::Integer(1)]);
        assert_eq!(rounded, Ok(Number::Float(2.3)));
        let rounded = Function::Round.apply(&[Number::Float(-2.5)]);
        assert_eq!(rounded, Ok(Number::Float(-3.0)));
    }
}
