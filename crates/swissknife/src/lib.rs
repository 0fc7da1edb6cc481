//! SwissKnife formula compiler and evaluator.
//!
//! A [`Formula`] is compiled once from text plus an ordered operand table and
//! is immutable afterwards. Evaluation resolves each operand through a
//! caller-supplied closure, so the formula itself never holds mutable state
//! and can be evaluated concurrently.

/// Compile and evaluation error types.
pub mod error;
pub use error::{FormulaError, FormulaErrorKind};

/// Scalar values.
pub mod number;
pub use number::Number;

/// Tokenizer.
pub mod token;
pub use token::{tokenize, Symbol, Token, TokenKind};

/// Expression tree and evaluator.
pub mod expr;
pub use expr::{BinaryOp, EvalMode, Expr, UnaryOp};

/// Built-in functions and constants.
pub mod function;
pub use function::Function;

/// Token-to-tree parser.
pub mod parser;

#[cfg(test)]
use proptest as _;

/// A compiled, immutable formula.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    source: String,
    variables: Vec<String>,
    root: Expr,
    mode: EvalMode,
}

impl Formula {
    /// Compiles `source` against the ordered operand names in `variables`.
    ///
    /// # Errors
    ///
    /// Returns [`FormulaErrorKind::Syntax`] for a malformed token stream or
    /// mismatched brackets and [`FormulaErrorKind::UnknownReference`] for an
    /// identifier that is neither an operand, a constant, nor a function.
    pub fn compile<S: AsRef<str>>(
        source: &str,
        variables: &[S],
        mode: EvalMode,
    ) -> Result<Self, FormulaError> {
        let variables: Vec<String> = variables.iter().map(|v| v.as_ref().to_string()).collect();
        let tokens = tokenize(source)?;
        let root = parser::parse(&tokens, &variables, source.chars().count())?;
        Ok(Self {
            source: source.to_string(),
            variables,
            root,
            mode,
        })
    }

    /// Original formula text.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Ordered operand names; resolver indices refer to this table.
    #[must_use]
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Arithmetic mode.
    #[must_use]
    pub const fn mode(&self) -> EvalMode {
        self.mode
    }

    /// Compiled expression tree.
    #[must_use]
    pub const fn expr(&self) -> &Expr {
        &self.root
    }

    /// Operand indices actually referenced by the expression.
    #[must_use]
    pub fn referenced_variables(&self) -> Vec<usize> {
        let mut out = Vec::new();
        self.root.collect_variables(&mut out);
        out.sort_unstable();
        out
    }

    /// Evaluates the formula, resolving operand `i` through `resolve(i)`.
    ///
    /// # Errors
    ///
    /// Propagates resolver errors and reports
    /// [`FormulaErrorKind::DivisionByZero`] or [`FormulaErrorKind::Overflow`].
    pub fn evaluate<E, F>(&self, mut resolve: F) -> Result<Number, E>
    where
        E: From<FormulaError>,
        F: FnMut(usize) -> Result<Number, E>,
    {
        self.root.evaluate(self.mode, &mut resolve)
    }

    /// Evaluates against a fixed slice of operand values.
    ///
    /// # Errors
    ///
    /// Reports evaluation failures; a missing operand value is treated as an
    /// unknown reference.
    pub fn evaluate_with(&self, values: &[Number]) -> Result<Number, FormulaError> {
        self.evaluate(|index| {
            values.get(index).copied().ok_or_else(|| {
                FormulaError::runtime(FormulaErrorKind::UnknownReference(
                    self.variables.get(index).cloned().unwrap_or_default(),
                ))
            })
        })
    }
}
