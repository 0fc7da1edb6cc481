//! Byte-addressed register transports.

use thiserror::Error;

mod access;
pub use access::{checked_end, validate_range};

mod chunk;
pub use chunk::ChunkPort;

mod memory;
pub use memory::MemoryPort;

/// Port transport failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortError {
    /// Access extends past the port's extent.
    #[error("{length} bytes at 0x{address:X} exceed extent 0x{extent:X}")]
    OutOfRange {
        /// Start address.
        address: u64,
        /// Access length in bytes.
        length: usize,
        /// Port extent.
        extent: u64,
    },
    /// Device or transport failure.
    #[error("{0}")]
    Transport(String),
}

/// A byte-addressable register space, typically backed by a device link.
///
/// Implementations see only in-range accesses when driven by a node map;
/// direct callers should check [`validate_range`] themselves.
pub trait Port: Send {
    /// Number of addressable bytes.
    fn extent(&self) -> u64;

    /// Fills `buffer` with the bytes starting at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::OutOfRange`] for accesses past the extent and
    /// [`PortError::Transport`] when the device cannot complete the read.
    fn read(&mut self, address: u64, buffer: &mut [u8]) -> Result<(), PortError>;

    /// Writes `data` starting at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::OutOfRange`] for accesses past the extent and
    /// [`PortError::Transport`] when the device cannot complete the write.
    fn write(&mut self, address: u64, data: &[u8]) -> Result<(), PortError>;
}

impl<P: Port + ?Sized> Port for Box<P> {
    fn extent(&self) -> u64 {
        (**self).extent()
    }

    fn read(&mut self, address: u64, buffer: &mut [u8]) -> Result<(), PortError> {
        (**self).read(address, buffer)
    }

    fn write(&mut self, address: u64, data: &[u8]) -> Result<(), PortError> {
        (**self).write(address, data)
    }
}

/// Transport occupying one port slot of a node map.
pub(crate) enum PortSlot {
    Device(Box<dyn Port>),
    Chunk(ChunkPort),
}

impl PortSlot {
    pub(crate) fn as_port(&mut self) -> &mut dyn Port {
        match self {
            Self::Device(port) => port.as_mut(),
            Self::Chunk(port) => port,
        }
    }

    pub(crate) fn extent(&self) -> u64 {
        match self {
            Self::Device(port) => port.extent(),
            Self::Chunk(port) => port.extent(),
        }
    }

    pub(crate) fn as_chunk_mut(&mut self) -> Option<&mut ChunkPort> {
        match self {
            Self::Chunk(port) => Some(port),
            Self::Device(_) => None,
        }
    }
}

impl core::fmt::Debug for PortSlot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Device(port) => f
                .debug_struct("Device")
                .field("extent", &port.extent())
                .finish(),
            Self::Chunk(port) => f.debug_tuple("Chunk").field(port).finish(),
        }
    }
}
