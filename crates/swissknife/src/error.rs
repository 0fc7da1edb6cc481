//! Compile-time and evaluation-time formula failures.

use thiserror::Error;

/// Classification of formula failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormulaErrorKind {
    /// Malformed token stream, mismatched brackets, or wrong call arity.
    #[error("{0}")]
    Syntax(String),
    /// Identifier is neither a bound operand, a constant, nor a function.
    #[error("{0} - Unknown function/variable")]
    UnknownReference(String),
    /// Division or modulo by a runtime zero.
    #[error("division by zero")]
    DivisionByZero,
    /// Checked integer arithmetic overflowed or a float result was not finite.
    #[error("arithmetic overflow")]
    Overflow,
}

/// Formula failure with the source column where it was detected, if known.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}")]
pub struct FormulaError {
    /// Kind of failure.
    pub kind: FormulaErrorKind,
    /// 1-indexed column in the formula text, `None` for evaluation failures.
    pub column: Option<usize>,
}

impl FormulaError {
    /// Creates a compile error anchored at `column`.
    #[must_use]
    pub const fn at(kind: FormulaErrorKind, column: usize) -> Self {
        Self {
            kind,
            column: Some(column),
        }
    }

    /// Creates an evaluation error with no source location.
    #[must_use]
    pub const fn runtime(kind: FormulaErrorKind) -> Self {
        Self { kind, column: None }
    }

    pub(crate) fn syntax(message: impl Into<String>, column: usize) -> Self {
        Self::at(FormulaErrorKind::Syntax(message.into()), column)
    }

    /// Formats the error with its column prefix, e.g. `3: Brackets do not match`.
    #[must_use]
    pub fn format_with_column(&self) -> String {
        self.column.map_or_else(
            || self.kind.to_string(),
            |column| format!("{column}: {}", self.kind),
        )
    }
}
