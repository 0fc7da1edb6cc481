use swissknife::{FormulaError, FormulaErrorKind};
use thiserror::Error;

use crate::{AccessMode, Capability};

/// Stable error classification shared by every node map operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ErrorKind {
    /// Name lookup failed.
    NotFound,
    /// Effective access mode forbids the operation.
    AccessDenied,
    /// Value outside bounds or not aligned to the increment.
    RangeError,
    /// Register buffer length differs from the register length.
    SizeMismatch,
    /// Formula text failed to compile.
    SyntaxError,
    /// Formula referenced an unknown operand or function.
    UnknownReference,
    /// Formula divided by zero at evaluation time.
    DivisionByZero,
    /// Arithmetic overflow or non-finite result.
    Overflow,
    /// Port access outside its address extent.
    OutOfRange,
    /// Computed node without an inverse formula.
    NotWritable,
    /// Node does not carry the requested capability.
    WrongInterface,
    /// Value variant does not match the node's value type.
    TypeMismatch,
    /// Evaluation re-entered a node or exceeded the depth limit.
    DependencyCycle,
    /// Port transport reported a failure.
    Transport,
}

/// Failure of a node map operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeMapError {
    /// No node carries the requested name.
    #[error("node `{0}` not found")]
    NotFound(String),
    /// The node's effective access mode forbids the operation.
    #[error("access denied: `{node}` is {mode}")]
    AccessDenied {
        /// Node name.
        node: String,
        /// Effective access mode at the time of the call.
        mode: AccessMode,
    },
    /// Value outside `[min, max]`, misaligned, or too long.
    #[error("`{node}`: {detail}")]
    Range {
        /// Node name.
        node: String,
        /// Human readable reason.
        detail: String,
    },
    /// Register access with a buffer of the wrong length.
    #[error("`{node}`: register is {expected} bytes, buffer is {actual}")]
    SizeMismatch {
        /// Node name.
        node: String,
        /// Register length.
        expected: usize,
        /// Caller buffer length.
        actual: usize,
    },
    /// Formula compile or evaluation failure.
    #[error("`{node}`: {}", .source.format_with_column())]
    Formula {
        /// Node name.
        node: String,
        /// Underlying formula failure.
        source: FormulaError,
    },
    /// Port access outside the port's extent.
    #[error("port `{port}`: {length} bytes at 0x{address:X} exceed extent 0x{extent:X}")]
    OutOfRange {
        /// Port node name.
        port: String,
        /// Start address of the access.
        address: u64,
        /// Length of the access in bytes.
        length: usize,
        /// Addressable extent of the port.
        extent: u64,
    },
    /// Computed node has no inverse formula.
    #[error("`{node}` has no inverse formula")]
    NotWritable {
        /// Node name.
        node: String,
    },
    /// Node lacks the requested capability.
    #[error("`{node}` does not implement {interface}")]
    WrongInterface {
        /// Node name.
        node: String,
        /// Requested capability.
        interface: Capability,
    },
    /// Written value variant does not fit the node.
    #[error("`{node}` expects {expected}, got {actual}")]
    TypeMismatch {
        /// Node name.
        node: String,
        /// Expected value type.
        expected: &'static str,
        /// Provided value type.
        actual: &'static str,
    },
    /// Register value not representable as a 64-bit signed integer.
    #[error("`{node}`: register value exceeds the integer range")]
    Overflow {
        /// Node name.
        node: String,
    },
    /// Evaluation re-entered a node already on the evaluation stack.
    #[error("dependency cycle while evaluating `{node}`")]
    DependencyCycle {
        /// Node at which the cycle was detected.
        node: String,
    },
    /// Port transport failure.
    #[error("port `{port}`: {message}")]
    Transport {
        /// Port node name.
        port: String,
        /// Transport message.
        message: String,
    },
}

impl NodeMapError {
    /// Returns the stable classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::AccessDenied { .. } => ErrorKind::AccessDenied,
            Self::Range { .. } => ErrorKind::RangeError,
            Self::SizeMismatch { .. } => ErrorKind::SizeMismatch,
            Self::Formula { source, .. } => match source.kind {
                FormulaErrorKind::Syntax(_) => ErrorKind::SyntaxError,
                FormulaErrorKind::UnknownReference(_) => ErrorKind::UnknownReference,
                FormulaErrorKind::DivisionByZero => ErrorKind::DivisionByZero,
                FormulaErrorKind::Overflow => ErrorKind::Overflow,
            },
            Self::OutOfRange { .. } => ErrorKind::OutOfRange,
            Self::NotWritable { .. } => ErrorKind::NotWritable,
            Self::WrongInterface { .. } => ErrorKind::WrongInterface,
            Self::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            Self::Overflow { .. } => ErrorKind::Overflow,
            Self::DependencyCycle { .. } => ErrorKind::DependencyCycle,
            Self::Transport { .. } => ErrorKind::Transport,
        }
    }

    pub(crate) fn range(node: &str, detail: impl Into<String>) -> Self {
        Self::Range {
            node: node.to_string(),
            detail: detail.into(),
        }
    }

    pub(crate) fn formula(node: &str, source: FormulaError) -> Self {
        Self::Formula {
            node: node.to_string(),
            source,
        }
    }
}

/// Structural failure detected while building a node map.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// Two descriptions share a name.
    #[error("duplicate node name `{0}`")]
    DuplicateNode(String),
    /// A description references a node that does not exist.
    #[error("`{node}` references unknown node `{reference}`")]
    UnknownNode {
        /// Referencing node.
        node: String,
        /// Missing name.
        reference: String,
    },
    /// A register's port reference names a node that is not a port.
    #[error("`{node}` uses `{reference}` as a port but it is not one")]
    NotAPort {
        /// Register node.
        node: String,
        /// Referenced node.
        reference: String,
    },
    /// A device port has no transport bound to it.
    #[error("port `{0}` has no bound transport")]
    UnboundPort(String),
    /// A transport was bound to a name that is not a device port node.
    #[error("transport bound to `{0}`, which is not a device port")]
    UnexpectedPortBinding(String),
    /// Register length, bit field, or operand layout is unusable.
    #[error("`{node}`: {reason}")]
    InvalidNode {
        /// Node name.
        node: String,
        /// Reason.
        reason: String,
    },
    /// Non-formula nodes depend on each other in a loop.
    #[error("dependency cycle: {}", .path.join(" -> "))]
    DependencyCycle {
        /// Node names along the cycle, first name repeated at the end.
        path: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::{ErrorKind, NodeMapError};
    use crate::{AccessMode, Capability};
    use swissknife::{FormulaError, FormulaErrorKind};

    #[test]
    fn formula_errors_map_to_their_kind() {
        let cases = [
            (
                FormulaErrorKind::Syntax("Brackets do not match".into()),
                ErrorKind::SyntaxError,
            ),
            (
                FormulaErrorKind::UnknownReference("X".into()),
                ErrorKind::UnknownReference,
            ),
            (FormulaErrorKind::DivisionByZero, ErrorKind::DivisionByZero),
            (FormulaErrorKind::Overflow, ErrorKind::Overflow),
        ];
        for (source, expected) in cases {
            let error = NodeMapError::formula("Gain", FormulaError::runtime(source));
            assert_eq!(error.kind(), expected);
        }
    }

    #[test]
    fn compile_column_is_part_of_the_message() {
        let error = NodeMapError::formula(
            "Gain",
            FormulaError::at(FormulaErrorKind::Syntax("Brackets do not match".into()), 3),
        );
        assert_eq!(error.to_string(), "`Gain`: 3: Brackets do not match");
    }

    #[test]
    fn messages_name_the_node() {
        let denied = NodeMapError::AccessDenied {
            node: "Width".into(),
            mode: AccessMode::ReadOnly,
        };
        assert_eq!(denied.to_string(), "access denied: `Width` is RO");
        let wrong = NodeMapError::WrongInterface {
            node: "Width".into(),
            interface: Capability::Float,
        };
        assert_eq!(wrong.to_string(), "`Width` does not implement IFloat");
        assert_eq!(wrong.kind(), ErrorKind::WrongInterface);
    }
}
