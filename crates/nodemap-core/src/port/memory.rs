use super::{access, Port, PortError};

/// Port backed by an in-process byte vector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryPort {
    bytes: Vec<u8>,
}

impl MemoryPort {
    /// Creates a zero-filled port of `extent` bytes.
    #[must_use]
    pub fn new(extent: usize) -> Self {
        Self {
            bytes: vec![0; extent],
        }
    }

    /// Creates a port initialised with `bytes`.
    #[must_use]
    pub const fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Current contents.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl Port for MemoryPort {
    fn extent(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn read(&mut self, address: u64, buffer: &mut [u8]) -> Result<(), PortError> {
        let start = access::offset(address, buffer.len(), self.extent())?;
        buffer.copy_from_slice(&self.bytes[start..start + buffer.len()]);
        Ok(())
    }

    fn write(&mut self, address: u64, data: &[u8]) -> Result<(), PortError> {
        let start = access::offset(address, data.len(), self.extent())?;
        self.bytes[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }
}
