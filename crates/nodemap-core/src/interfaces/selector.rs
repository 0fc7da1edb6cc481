use crate::graph::NodeId;
use crate::{NodeMap, NodeRef};

/// `ISelector` access: the features whose meaning depends on this node.
#[derive(Debug, Clone, Copy)]
pub struct SelectorView<'a> {
    map: &'a NodeMap,
    id: NodeId,
}

impl<'a> SelectorView<'a> {
    pub(crate) const fn new(map: &'a NodeMap, id: NodeId) -> Self {
        Self { map, id }
    }

    /// Underlying node.
    #[must_use]
    pub const fn node(&self) -> NodeRef<'a> {
        self.map.node_ref(self.id)
    }

    /// Features selected by this node.
    #[must_use]
    pub fn selected_features(&self) -> Vec<NodeRef<'a>> {
        self.map
            .resolve_ids(&self.map.graph().node(self.id).selected)
    }
}
