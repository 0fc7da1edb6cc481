use crate::graph::NodeId;
use crate::{NodeMap, NodeMapError, NodeRef};

/// `ICommand` access.
#[derive(Debug, Clone, Copy)]
pub struct CommandView<'a> {
    map: &'a NodeMap,
    id: NodeId,
}

impl<'a> CommandView<'a> {
    pub(crate) const fn new(map: &'a NodeMap, id: NodeId) -> Self {
        Self { map, id }
    }

    /// Underlying node.
    #[must_use]
    pub const fn node(&self) -> NodeRef<'a> {
        self.map.node_ref(self.id)
    }

    /// Writes the command value to the command register.
    ///
    /// # Errors
    ///
    /// Returns [`NodeMapError::AccessDenied`] when the command is not
    /// writable and propagates write failures.
    pub fn execute(&self) -> Result<(), NodeMapError> {
        let id = self.id;
        self.map.with_engine(|engine| engine.execute(id))
    }

    /// Whether the device has finished the last execution.
    ///
    /// # Errors
    ///
    /// Propagates failures re-reading the command register.
    pub fn is_done(&self) -> Result<bool, NodeMapError> {
        let id = self.id;
        self.map.with_engine(|engine| engine.is_done(id))
    }
}
