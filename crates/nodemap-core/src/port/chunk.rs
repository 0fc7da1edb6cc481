use super::{access, Port, PortError};

/// Port serving the payload of the most recent event or chunk delivery.
///
/// The scratch buffer grows to the largest payload seen and is never shrunk;
/// the extent always equals the length of the current payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkPort {
    buffer: Vec<u8>,
    len: usize,
}

impl ChunkPort {
    /// Creates an empty port with zero extent.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffer: Vec::new(),
            len: 0,
        }
    }

    /// Replaces the current payload with a copy of `payload`.
    pub fn inject(&mut self, payload: &[u8]) {
        if self.buffer.len() < payload.len() {
            self.buffer.resize(payload.len(), 0);
        }
        self.buffer[..payload.len()].copy_from_slice(payload);
        self.len = payload.len();
    }

    /// Current payload.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.buffer[..self.len]
    }

    /// Bytes reserved by the scratch buffer.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }
}

impl Port for ChunkPort {
    fn extent(&self) -> u64 {
        self.len as u64
    }

    fn read(&mut self, address: u64, buffer: &mut [u8]) -> Result<(), PortError> {
        let start = access::offset(address, buffer.len(), self.extent())?;
        buffer.copy_from_slice(&self.buffer[start..start + buffer.len()]);
        Ok(())
    }

    fn write(&mut self, address: u64, data: &[u8]) -> Result<(), PortError> {
        let start = access::offset(address, data.len(), self.extent())?;
        self.buffer[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::ChunkPort;
    use crate::Port;

    #[test]
    fn scratch_buffer_grows_but_never_shrinks() {
        let mut port = ChunkPort::new();
        port.inject(&[1, 2, 3, 4, 5, 6]);
        assert_eq!(port.capacity(), 6);
        port.inject(&[7, 8]);
        assert_eq!(port.capacity(), 6);
        assert_eq!(port.extent(), 2);
        assert_eq!(port.payload(), &[7, 8]);
    }

    #[test]
    fn reads_are_bounded_by_the_current_payload() {
        let mut port = ChunkPort::new();
        port.inject(&[1, 2, 3, 4]);
        port.inject(&[9]);
        let mut buffer = [0_u8; 2];
        assert!(port.read(0, &mut buffer).is_err());
        let mut one = [0_u8; 1];
        port.read(0, &mut one).expect("in range");
        assert_eq!(one, [9]);
    }
}
