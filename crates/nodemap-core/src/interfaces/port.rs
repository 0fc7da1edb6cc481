use crate::graph::NodeId;
use crate::{NodeMap, NodeMapError, NodeRef};

/// `IPort` access to a port node's transport.
#[derive(Debug, Clone, Copy)]
pub struct PortView<'a> {
    map: &'a NodeMap,
    id: NodeId,
}

impl<'a> PortView<'a> {
    pub(crate) const fn new(map: &'a NodeMap, id: NodeId) -> Self {
        Self { map, id }
    }

    /// Underlying node.
    #[must_use]
    pub const fn node(&self) -> NodeRef<'a> {
        self.map.node_ref(self.id)
    }

    /// Addressable extent; for chunk ports the length of the current payload.
    ///
    /// # Errors
    ///
    /// Returns [`NodeMapError::WrongInterface`] for non-port nodes.
    pub fn extent(&self) -> Result<u64, NodeMapError> {
        let id = self.id;
        self.map.with_engine(|engine| engine.port_extent(id))
    }

    /// Reads `buffer.len()` bytes at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`NodeMapError::OutOfRange`] past the extent and
    /// [`NodeMapError::Transport`] for transport failures.
    pub fn read(&self, address: u64, buffer: &mut [u8]) -> Result<(), NodeMapError> {
        let id = self.id;
        self.map
            .with_engine(|engine| engine.read_port(id, address, buffer))
    }

    /// Writes `data` at `address` and invalidates every node mapped onto the
    /// port.
    ///
    /// # Errors
    ///
    /// Returns [`NodeMapError::OutOfRange`] past the extent and
    /// [`NodeMapError::Transport`] for transport failures.
    pub fn write(&self, address: u64, data: &[u8]) -> Result<(), NodeMapError> {
        let id = self.id;
        self.map
            .with_engine(|engine| engine.write_port(id, address, data))
    }
}
