//! Immutable expression tree and its evaluator.

use crate::function::Function;
use crate::{FormulaError, FormulaErrorKind, Number};

/// Arithmetic mode of a compiled formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EvalMode {
    /// Integer arithmetic with checked overflow; floats only where a float
    /// literal or transcendental function introduces one.
    #[default]
    Integer,
    /// Every operand and literal is widened to `f64` before use.
    Float,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// Arithmetic negation.
    Negate,
    /// Logical not.
    Not,
    /// Bitwise complement.
    BitNot,
}

/// Binary operators, excluding the short-circuiting logical forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    BitAnd,
    BitOr,
    BitXor,
    ShiftLeft,
    ShiftRight,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

/// Expression tree node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal or folded named constant.
    Literal(Number),
    /// Bound operand, by index into the formula's variable table.
    Variable(usize),
    /// Unary operation.
    Unary(UnaryOp, Box<Expr>),
    /// Binary operation.
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    /// Short-circuiting `&&`.
    And(Box<Expr>, Box<Expr>),
    /// Short-circuiting `||`.
    Or(Box<Expr>, Box<Expr>),
    /// `condition ? then : otherwise`.
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
    /// Built-in function call.
    Call(Function, Vec<Expr>),
}

impl Expr {
    /// Evaluates the tree, resolving operands through `resolve`.
    ///
    /// # Errors
    ///
    /// Propagates resolver errors and reports division by zero or overflow.
    pub fn evaluate<E>(
        &self,
        mode: EvalMode,
        resolve: &mut dyn FnMut(usize) -> Result<Number, E>,
    ) -> Result<Number, E>
    where
        E: From<FormulaError>,
    {
        let value = match self {
            Self::Literal(number) => *number,
            Self::Variable(index) => resolve(*index)?,
            Self::Unary(op, operand) => {
                let value = widen(mode, operand.evaluate(mode, resolve)?);
                unary(*op, value)?
            }
            Self::Binary(op, lhs, rhs) => {
                let lhs = widen(mode, lhs.evaluate(mode, resolve)?);
                let rhs = widen(mode, rhs.evaluate(mode, resolve)?);
                binary(*op, lhs, rhs)?
            }
            Self::And(lhs, rhs) => Number::from_bool(
                lhs.evaluate(mode, resolve)?.is_truthy()
                    && rhs.evaluate(mode, resolve)?.is_truthy(),
            ),
            Self::Or(lhs, rhs) => Number::from_bool(
                lhs.evaluate(mode, resolve)?.is_truthy()
                    || rhs.evaluate(mode, resolve)?.is_truthy(),
            ),
            Self::Ternary(condition, then, otherwise) => {
                if condition.evaluate(mode, resolve)?.is_truthy() {
                    then.evaluate(mode, resolve)?
                } else {
                    otherwise.evaluate(mode, resolve)?
                }
            }
            Self::Call(function, args) => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(widen(mode, arg.evaluate(mode, resolve)?));
                }
                function.apply(&values)?
            }
        };
        finite(widen(mode, value)).map_err(E::from)
    }

    /// Collects the operand indices referenced anywhere in the tree.
    pub fn collect_variables(&self, out: &mut Vec<usize>) {
        match self {
            Self::Literal(_) => {}
            Self::Variable(index) => {
                if !out.contains(index) {
                    out.push(*index);
                }
            }
            Self::Unary(_, operand) => operand.collect_variables(out),
            Self::Binary(_, lhs, rhs) | Self::And(lhs, rhs) | Self::Or(lhs, rhs) => {
                lhs.collect_variables(out);
                rhs.collect_variables(out);
            }
            Self::Ternary(condition, then, otherwise) => {
                condition.collect_variables(out);
                then.collect_variables(out);
                otherwise.collect_variables(out);
            }
            Self::Call(_, args) => {
                for arg in args {
                    arg.collect_variables(out);
                }
            }
        }
    }
}

fn widen(mode: EvalMode, value: Number) -> Number {
    match (mode, value) {
        (EvalMode::Float, Number::Integer(_)) => Number::Float(value.as_f64()),
        _ => value,
    }
}

fn finite(value: Number) -> Result<Number, FormulaError> {
    match value {
        Number::Float(v) if !v.is_finite() => Err(overflow()),
        _ => Ok(value),
    }
}

const fn overflow() -> FormulaError {
    FormulaError::runtime(FormulaErrorKind::Overflow)
}

const fn division_by_zero() -> FormulaError {
    FormulaError::runtime(FormulaErrorKind::DivisionByZero)
}

fn unary(op: UnaryOp, value: Number) -> Result<Number, FormulaError> {
    match (op, value) {
        (UnaryOp::Negate, Number::Integer(v)) => {
            v.checked_neg().map(Number::Integer).ok_or_else(overflow)
        }
        (UnaryOp::Negate, Number::Float(v)) => Ok(Number::Float(-v)),
        (UnaryOp::Not, _) => Ok(Number::from_bool(!value.is_truthy())),
        (UnaryOp::BitNot, _) => Ok(Number::Integer(!value.to_i64()?)),
    }
}

fn binary(op: BinaryOp, lhs: Number, rhs: Number) -> Result<Number, FormulaError> {
    match op {
        BinaryOp::Equal => return Ok(Number::from_bool(compare(lhs, rhs).is_eq())),
        BinaryOp::NotEqual => return Ok(Number::from_bool(compare(lhs, rhs).is_ne())),
        BinaryOp::Less => return Ok(Number::from_bool(compare(lhs, rhs).is_lt())),
        BinaryOp::LessEqual => return Ok(Number::from_bool(compare(lhs, rhs).is_le())),
        BinaryOp::Greater => return Ok(Number::from_bool(compare(lhs, rhs).is_gt())),
        BinaryOp::GreaterEqual => return Ok(Number::from_bool(compare(lhs, rhs).is_ge())),
        BinaryOp::BitAnd
        | BinaryOp::BitOr
        | BinaryOp::BitXor
        | BinaryOp::ShiftLeft
        | BinaryOp::ShiftRight => {
            return bitwise(op, lhs.to_i64()?, rhs.to_i64()?);
        }
        _ => {}
    }

    match (lhs, rhs) {
        (Number::Integer(a), Number::Integer(b)) => integer_arithmetic(op, a, b),
        _ => float_arithmetic(op, lhs.as_f64(), rhs.as_f64()),
    }
}

fn compare(lhs: Number, rhs: Number) -> std::cmp::Ordering {
    match (lhs, rhs) {
        (Number::Integer(a), Number::Integer(b)) => a.cmp(&b),
        _ => lhs
            .as_f64()
            .partial_cmp(&rhs.as_f64())
            .unwrap_or(std::cmp::Ordering::Less),
    }
}

fn bitwise(op: BinaryOp, a: i64, b: i64) -> Result<Number, FormulaError> {
    let shift = || u32::try_from(b).ok().filter(|s| *s < 64).ok_or_else(overflow);
    let value = match op {
        BinaryOp::BitAnd => a & b,
        BinaryOp::BitOr => a | b,
        BinaryOp::BitXor => a ^ b,
        BinaryOp::ShiftLeft => {
            let s = shift()?;
            let shifted = a << s;
            // bits shifted out, sign bit included, are an overflow
            if shifted >> s != a {
                return Err(overflow());
            }
            shifted
        }
        BinaryOp::ShiftRight => a.checked_shr(shift()?).ok_or_else(overflow)?,
        _ => unreachable!("non-bitwise operator routed to bitwise"),
    };
    Ok(Number::Integer(value))
}

#[allow(clippy::cast_precision_loss)]
fn integer_arithmetic(op: BinaryOp, a: i64, b: i64) -> Result<Number, FormulaError> {
    let value = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        BinaryOp::Div => {
            if b == 0 {
                return Err(division_by_zero());
            }
            a.checked_div(b)
        }
        BinaryOp::Rem => {
            if b == 0 {
                return Err(division_by_zero());
            }
            a.checked_rem(b)
        }
        BinaryOp::Pow => match u32::try_from(b) {
            Ok(exponent) => a.checked_pow(exponent),
            Err(_) if b < 0 => return float_arithmetic(op, a as f64, b as f64),
            Err(_) => None,
        },
        _ => unreachable!("comparison or bitwise operator routed to arithmetic"),
    };
    value.map(Number::Integer).ok_or_else(overflow)
}

fn float_arithmetic(op: BinaryOp, a: f64, b: f64) -> Result<Number, FormulaError> {
    let value = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if b == 0.0 {
                return Err(division_by_zero());
            }
            a / b
        }
        BinaryOp::Rem => {
            if b == 0.0 {
                return Err(division_by_zero());
            }
            a % b
        }
        BinaryOp::Pow => a.powf(b),
        _ => unreachable!("comparison or bitwise operator routed to arithmetic"),
    };
    finite(Number::Float(value))
}
