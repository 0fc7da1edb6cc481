//! Feature node map engine.
//!
//! A [`NodeMap`] is built once from [`schema`] descriptions by a
//! [`NodeMapBuilder`] and then serves typed feature access through capability
//! views ([`IntegerView`], [`EnumerationView`], ...). Values are cached per
//! node and invalidated along the graph's dependency edges when a node is
//! written, polled, or fed by an [`EventAdapter`] delivery.

/// Error taxonomy for node access and graph construction.
pub mod error;
pub use error::{BuildError, ErrorKind, NodeMapError};

/// Engine configuration and interface version.
pub mod config;
pub use config::{InterfaceVersion, NodeMapConfig, DEFAULT_MAX_EVALUATION_DEPTH};

/// Named loggers with numeric priorities.
pub mod log;

/// Feature values and the per-node value cache.
pub mod value;
pub use value::{Value, ValueCache};

/// Byte-addressable ports backing register nodes.
pub mod port;
pub(crate) use port::PortSlot;
pub use port::{checked_end, validate_range, ChunkPort, MemoryPort, Port, PortError};

/// Declarative node descriptions consumed by the builder.
pub mod schema;
pub use schema::{AccessMode, CachingMode, Endianness, IncrementPolicy, Sign, Visibility};

/// Capability tags and typed views.
pub mod interfaces;
pub use interfaces::{
    BooleanView, Capability, CapabilitySet, CategoryView, CommandView, EnumEntryInfo,
    EnumerationView, FloatView, IntegerView, PortView, RegisterView, SelectorView, StringView,
};

mod graph;
pub use graph::{NodeId, NodeMapBuilder};

mod node_map;
pub use node_map::{CallbackHandle, NodeMap, NodeRef};

/// Event and chunk payload delivery.
pub mod event;
pub use event::{AdapterDiagnostics, DispatchOutcome, EventAdapter, EventError};
