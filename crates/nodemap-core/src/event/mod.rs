//! Delivery of asynchronous event and chunk payloads into the graph.
//!
//! A transport hands `(identifier, payload)` pairs to an [`EventAdapter`],
//! which copies the payload into every chunk port declared with that event
//! id and invalidates the ports' dependents. Identifiers that match no port
//! are dropped without error.

use parking_lot::Mutex;

use crate::{NodeMap, NodeMapError};

mod diag;
pub use diag::AdapterDiagnostics;

mod layout;
pub use layout::{parse_chunks, ChunkLayoutError, ChunkRecord, Chunks, CHUNK_TRAILER_BYTES};

/// Result of dispatching one payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The payload reached at least one port.
    Delivered {
        /// Ports that received the payload.
        ports: usize,
        /// Nodes invalidated as a consequence.
        invalidated: usize,
    },
    /// No port is registered for the identifier.
    Dropped,
}

impl DispatchOutcome {
    /// Whether the payload reached a port.
    #[must_use]
    pub const fn is_delivered(self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

/// Routes event payloads to the chunk ports of one node map.
#[derive(Debug)]
pub struct EventAdapter<'m> {
    map: &'m NodeMap,
    diagnostics: Mutex<AdapterDiagnostics>,
}

impl<'m> EventAdapter<'m> {
    /// Creates an adapter feeding `map`.
    #[must_use]
    pub fn new(map: &'m NodeMap) -> Self {
        Self {
            map,
            diagnostics: Mutex::new(AdapterDiagnostics::new()),
        }
    }

    /// Node map the adapter feeds.
    #[must_use]
    pub const fn node_map(&self) -> &'m NodeMap {
        self.map
    }

    /// Injects `payload` into every port registered for `event_id` and
    /// invalidates their dependents, all under one acquisition of the node
    /// map lock. Identifiers compare case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns whatever the node map reports while invalidating; injection
    /// itself cannot fail.
    pub fn dispatch(
        &self,
        event_id: &str,
        payload: &[u8],
    ) -> Result<DispatchOutcome, NodeMapError> {
        let key = event_id.to_ascii_uppercase();
        let ports = self.map.event_ports(&key);
        tracing::trace!(event_id = %key, bytes = payload.len(), "parsing event");
        if ports.is_empty() {
            tracing::debug!(event_id = %key, "no port registered for event, dropping");
            self.diagnostics.lock().record_drop();
            return Ok(DispatchOutcome::Dropped);
        }
        tracing::trace!(event_id = %key, ports = ports.len(), "dispatching event");
        let invalidated = self.map.with_engine(|engine| {
            Ok(ports
                .iter()
                .map(|port| engine.inject(*port, payload))
                .sum::<usize>())
        })?;
        self.diagnostics
            .lock()
            .record_delivery(&key, ports.len(), payload.len(), invalidated);
        tracing::trace!(event_id = %key, invalidated, "event delivered");
        Ok(DispatchOutcome::Delivered {
            ports: ports.len(),
            invalidated,
        })
    }

    /// Splits a trailer-framed chunk buffer and dispatches every chunk as an
    /// independent delivery, last chunk first.
    ///
    /// Chunks found before a malformed trailer are delivered; nothing past
    /// it is.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::Layout`] for a malformed trailer and
    /// [`EventError::NodeMap`] when a dispatch fails.
    pub fn deliver_chunk_data(&self, buffer: &[u8]) -> Result<Vec<DispatchOutcome>, EventError> {
        Chunks::new(buffer)
            .map(|record| {
                let record = record?;
                Ok(self.dispatch(&record.id, &buffer[record.data])?)
            })
            .collect()
    }

    /// Snapshot of the delivery counters.
    #[must_use]
    pub fn diagnostics(&self) -> AdapterDiagnostics {
        self.diagnostics.lock().clone()
    }
}

/// Failure while delivering a chunk buffer.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    /// The buffer's chunk trailers are malformed.
    #[error(transparent)]
    Layout(#[from] ChunkLayoutError),
    /// A dispatch failed inside the node map.
    #[error(transparent)]
    NodeMap(#[from] NodeMapError),
}
