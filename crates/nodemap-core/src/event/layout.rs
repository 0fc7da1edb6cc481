//! Trailer-based chunk layout of a payload buffer.
//!
//! Each chunk is stored as `[data][id: u32 BE][length: u32 BE]`; the buffer is
//! walked from its end toward its start.

use core::ops::Range;

use thiserror::Error;

/// Bytes occupied by one chunk trailer.
pub const CHUNK_TRAILER_BYTES: usize = 8;

/// Malformed chunk layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChunkLayoutError {
    /// Fewer than [`CHUNK_TRAILER_BYTES`] bytes left before a trailer.
    #[error("truncated chunk trailer at offset {offset}")]
    TruncatedTrailer {
        /// Offset where the trailer would start.
        offset: usize,
    },
    /// A trailer declares more data than precedes it.
    #[error("chunk {id:X} declares {declared} bytes but only {available} precede its trailer")]
    LengthOverrun {
        /// Chunk id.
        id: u32,
        /// Declared data length.
        declared: u32,
        /// Bytes available before the trailer.
        available: usize,
    },
}

/// One chunk located in a payload buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRecord {
    /// Chunk id, formatted as uppercase hexadecimal to match port event ids.
    pub id: String,
    /// Byte range of the chunk data inside the buffer.
    pub data: Range<usize>,
}

fn read_u32_be(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .take(4)
        .fold(0, |value, byte| (value << 8) | u32::from(*byte))
}

/// Iterator over the chunks of a buffer, last chunk first.
///
/// Yields at most one error, after which it is exhausted.
#[derive(Debug, Clone)]
pub struct Chunks<'b> {
    buffer: &'b [u8],
    end: usize,
}

impl<'b> Chunks<'b> {
    /// Starts walking `buffer` from its end.
    #[must_use]
    pub const fn new(buffer: &'b [u8]) -> Self {
        Self {
            buffer,
            end: buffer.len(),
        }
    }

    /// The walked buffer.
    #[must_use]
    pub const fn buffer(&self) -> &'b [u8] {
        self.buffer
    }

    fn next_record(&mut self) -> Result<ChunkRecord, ChunkLayoutError> {
        let end = self.end;
        let trailer = end
            .checked_sub(CHUNK_TRAILER_BYTES)
            .ok_or(ChunkLayoutError::TruncatedTrailer { offset: 0 })?;
        let id = read_u32_be(&self.buffer[trailer..trailer + 4]);
        let declared = read_u32_be(&self.buffer[trailer + 4..end]);
        let start = usize::try_from(declared)
            .ok()
            .and_then(|length| trailer.checked_sub(length))
            .ok_or(ChunkLayoutError::LengthOverrun {
                id,
                declared,
                available: trailer,
            })?;
        self.end = start;
        Ok(ChunkRecord {
            id: format!("{id:X}"),
            data: start..trailer,
        })
    }
}

impl Iterator for Chunks<'_> {
    type Item = Result<ChunkRecord, ChunkLayoutError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.end == 0 {
            return None;
        }
        let record = self.next_record();
        if record.is_err() {
            self.end = 0;
        }
        Some(record)
    }
}

/// Splits `buffer` into chunks, last chunk first.
///
/// # Errors
///
/// Returns [`ChunkLayoutError`] when a trailer is truncated or a declared
/// length runs past the start of the buffer.
pub fn parse_chunks(buffer: &[u8]) -> Result<Vec<ChunkRecord>, ChunkLayoutError> {
    Chunks::new(buffer).collect()
}
