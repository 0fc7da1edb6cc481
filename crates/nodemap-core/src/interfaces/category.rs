use crate::graph::{NodeId, Producer};
use crate::{NodeMap, NodeRef};

/// `ICategory` access.
#[derive(Debug, Clone, Copy)]
pub struct CategoryView<'a> {
    map: &'a NodeMap,
    id: NodeId,
}

impl<'a> CategoryView<'a> {
    pub(crate) const fn new(map: &'a NodeMap, id: NodeId) -> Self {
        Self { map, id }
    }

    /// Underlying node.
    #[must_use]
    pub const fn node(&self) -> NodeRef<'a> {
        self.map.node_ref(self.id)
    }

    /// Member features in declaration order.
    #[must_use]
    pub fn features(&self) -> Vec<NodeRef<'a>> {
        match &self.map.graph().node(self.id).producer {
            Producer::Category(features) => self.map.resolve_ids(features),
            _ => Vec::new(),
        }
    }
}
