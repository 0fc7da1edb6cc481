use crate::graph::NodeId;
use crate::{NodeMap, NodeMapError, NodeRef};

/// `IRegister` access to the raw bytes behind a register node.
///
/// Raw accesses always go to the port; they never read the value cache.
#[derive(Debug, Clone, Copy)]
pub struct RegisterView<'a> {
    map: &'a NodeMap,
    id: NodeId,
}

impl<'a> RegisterView<'a> {
    pub(crate) const fn new(map: &'a NodeMap, id: NodeId) -> Self {
        Self { map, id }
    }

    /// Underlying node.
    #[must_use]
    pub const fn node(&self) -> NodeRef<'a> {
        self.map.node_ref(self.id)
    }

    /// Register length in bytes.
    ///
    /// # Errors
    ///
    /// Returns [`NodeMapError::WrongInterface`] for nodes without a mapping.
    pub fn length(&self) -> Result<usize, NodeMapError> {
        let id = self.id;
        self.map.with_engine(|engine| engine.register_length(id))
    }

    /// Effective address including address and index nodes.
    ///
    /// # Errors
    ///
    /// Propagates failures evaluating address or index nodes.
    pub fn address(&self) -> Result<u64, NodeMapError> {
        let id = self.id;
        self.map.with_engine(|engine| engine.register_address(id))
    }

    /// Fills `buffer` with the register contents.
    ///
    /// # Errors
    ///
    /// Returns [`NodeMapError::SizeMismatch`] unless `buffer` is exactly
    /// [`length`](Self::length) bytes, and propagates port failures.
    pub fn get(&self, buffer: &mut [u8]) -> Result<(), NodeMapError> {
        let id = self.id;
        self.map.with_engine(|engine| engine.read_register(id, buffer))
    }

    /// Writes `data` and invalidates the node and its dependents.
    ///
    /// # Errors
    ///
    /// Returns [`NodeMapError::SizeMismatch`] unless `data` is exactly
    /// [`length`](Self::length) bytes, and propagates port failures.
    pub fn set(&self, data: &[u8]) -> Result<(), NodeMapError> {
        let id = self.id;
        self.map.with_engine(|engine| engine.write_register(id, data))
    }

    /// Reads the whole register into a new buffer.
    ///
    /// # Errors
    ///
    /// Propagates port failures.
    pub fn to_vec(&self) -> Result<Vec<u8>, NodeMapError> {
        let mut buffer = vec![0; self.length()?];
        self.get(&mut buffer)?;
        Ok(buffer)
    }
}
