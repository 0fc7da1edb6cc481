use crate::graph::{NodeId, Producer};
use crate::{NodeMap, NodeMapError, NodeRef, Value};

/// `IString` access.
#[derive(Debug, Clone, Copy)]
pub struct StringView<'a> {
    map: &'a NodeMap,
    id: NodeId,
}

impl<'a> StringView<'a> {
    pub(crate) const fn new(map: &'a NodeMap, id: NodeId) -> Self {
        Self { map, id }
    }

    /// Underlying node.
    #[must_use]
    pub const fn node(&self) -> NodeRef<'a> {
        self.map.node_ref(self.id)
    }

    /// Current value.
    ///
    /// # Errors
    ///
    /// Propagates read failures.
    pub fn value(&self) -> Result<String, NodeMapError> {
        let id = self.id;
        match self.map.with_engine(|engine| engine.read(id))? {
            Value::String(text) => Ok(text),
            other => Err(NodeMapError::TypeMismatch {
                node: self.node().name().to_string(),
                expected: "string",
                actual: other.type_name(),
            }),
        }
    }

    /// Writes `value`.
    ///
    /// # Errors
    ///
    /// Returns [`NodeMapError::Range`] when `value` is longer than
    /// [`max_length`](Self::max_length) and propagates write failures.
    pub fn set_value(&self, value: &str) -> Result<(), NodeMapError> {
        let id = self.id;
        let value = Value::String(value.to_string());
        self.map.with_engine(|engine| engine.write(id, value))
    }

    /// Longest accepted value in bytes.
    #[must_use]
    pub fn max_length(&self) -> Option<usize> {
        match &self.map.graph().node(self.id).producer {
            Producer::String { max_length, .. } => *max_length,
            Producer::StringReg(mapping) => Some(mapping.length),
            _ => None,
        }
    }
}
