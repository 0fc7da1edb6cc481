use crate::graph::NodeId;
use crate::{NodeMap, NodeMapError, NodeRef, Value};

/// `IBoolean` access.
#[derive(Debug, Clone, Copy)]
pub struct BooleanView<'a> {
    map: &'a NodeMap,
    id: NodeId,
}

impl<'a> BooleanView<'a> {
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
    pub fn value(&self) -> Result<bool, NodeMapError> {
        let id = self.id;
        self.map.with_engine(|engine| engine.read(id)).and_then(|value| {
            value.as_bool().ok_or_else(|| NodeMapError::TypeMismatch {
                node: self.node().name().to_string(),
                expected: "boolean",
                actual: value.type_name(),
            })
        })
    }

    /// Writes `value`; a delegate node receives the on or off value.
    ///
    /// # Errors
    ///
    /// Propagates write failures.
    pub fn set_value(&self, value: bool) -> Result<(), NodeMapError> {
        let id = self.id;
        self.map.with_engine(|engine| engine.write(id, Value::Boolean(value)))
    }
}
