//! Resolved node graph: immutable structure plus the mutable per-node state.

use core::time::Duration;
use std::collections::HashMap;

use swissknife::{Formula, FormulaError};

use crate::{
    AccessMode, CachingMode, Capability, CapabilitySet, Endianness, IncrementPolicy, PortSlot,
    Sign, Value, ValueCache, Visibility,
};

mod build;
pub use build::NodeMapBuilder;

pub(crate) mod codec;
pub(crate) mod engine;
pub(crate) mod range;

/// Stable handle of a node inside one node map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Position of the node in declaration order.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Literal or node-provided value after name resolution.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Ref<T> {
    Value(T),
    Node(NodeId),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct IntBounds {
    pub(crate) min: Option<Ref<i64>>,
    pub(crate) max: Option<Ref<i64>>,
    pub(crate) increment: Option<Ref<i64>>,
    pub(crate) policy: IncrementPolicy,
    pub(crate) unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FloatBounds {
    pub(crate) min: Option<Ref<f64>>,
    pub(crate) max: Option<Ref<f64>>,
    pub(crate) increment: Option<Ref<f64>>,
    pub(crate) policy: IncrementPolicy,
    pub(crate) unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EnumEntry {
    pub(crate) name: String,
    pub(crate) display_name: Option<String>,
    pub(crate) value: i64,
    pub(crate) is_available: Option<NodeId>,
    pub(crate) is_implemented: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Mapping {
    pub(crate) port: NodeId,
    pub(crate) slot: usize,
    pub(crate) address: u64,
    pub(crate) address_nodes: Vec<NodeId>,
    pub(crate) index: Option<(NodeId, u64)>,
    pub(crate) length: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct FormulaProducer {
    pub(crate) formula: Result<Formula, FormulaError>,
    pub(crate) operands: Vec<NodeId>,
    pub(crate) integer: bool,
}

/// Variable 0 of both formulas is the converted value (`FROM` / `TO`);
/// variable `i > 0` is `operands[i - 1]`.
#[derive(Debug, Clone)]
pub(crate) struct ConverterProducer {
    pub(crate) from: Result<Formula, FormulaError>,
    pub(crate) to: Option<Result<Formula, FormulaError>>,
    pub(crate) value: NodeId,
    pub(crate) operands: Vec<NodeId>,
    pub(crate) integer: bool,
}

#[derive(Debug, Clone)]
pub(crate) enum Producer {
    Integer {
        value: Ref<i64>,
        bounds: IntBounds,
    },
    Float {
        value: Ref<f64>,
        bounds: FloatBounds,
    },
    Boolean {
        value: Ref<bool>,
        on_value: i64,
        off_value: i64,
    },
    Enumeration {
        value: Ref<i64>,
        entries: Vec<EnumEntry>,
    },
    String {
        value: Ref<String>,
        max_length: Option<usize>,
    },
    Register(Mapping),
    IntReg {
        mapping: Mapping,
        sign: Sign,
        endianness: Endianness,
        field: codec::BitField,
    },
    FloatReg {
        mapping: Mapping,
        endianness: Endianness,
    },
    StringReg(Mapping),
    Formula(FormulaProducer),
    Converter(ConverterProducer),
    Command {
        value: NodeId,
        command_value: Ref<i64>,
    },
    Category(Vec<NodeId>),
    Port {
        slot: usize,
    },
}

/// Value type a producer yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ValueType {
    Integer,
    Float,
    Boolean,
    String,
    Bytes,
}

impl ValueType {
    pub(crate) const fn name(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::String => "string",
            Self::Bytes => "bytes",
        }
    }
}

impl Producer {
    pub(crate) const fn value_type(&self) -> Option<ValueType> {
        match self {
            Self::Integer { .. } | Self::Enumeration { .. } | Self::IntReg { .. } => {
                Some(ValueType::Integer)
            }
            Self::Float { .. } | Self::FloatReg { .. } => Some(ValueType::Float),
            Self::Formula(FormulaProducer { integer, .. })
            | Self::Converter(ConverterProducer { integer, .. }) => Some(if *integer {
                ValueType::Integer
            } else {
                ValueType::Float
            }),
            Self::Boolean { .. } => Some(ValueType::Boolean),
            Self::String { .. } | Self::StringReg(_) => Some(ValueType::String),
            Self::Register(_) => Some(ValueType::Bytes),
            Self::Command { .. } | Self::Category(_) | Self::Port { .. } => None,
        }
    }

    pub(crate) const fn mapping(&self) -> Option<&Mapping> {
        match self {
            Self::Register(mapping)
            | Self::StringReg(mapping)
            | Self::IntReg { mapping, .. }
            | Self::FloatReg { mapping, .. } => Some(mapping),
            _ => None,
        }
    }

    pub(crate) const fn is_formula(&self) -> bool {
        matches!(self, Self::Formula(_) | Self::Converter(_))
    }

    /// Whether the producer accepts writes at all. Computed nodes need an
    /// inverse formula.
    pub(crate) const fn has_inverse(&self) -> bool {
        match self {
            Self::Formula(_) => false,
            Self::Converter(converter) => converter.to.is_some(),
            _ => true,
        }
    }

    /// First compile failure of the node's formulas, if any.
    pub(crate) fn compile_error(&self) -> Option<&FormulaError> {
        match self {
            Self::Formula(producer) => producer.formula.as_ref().err(),
            Self::Converter(converter) => converter
                .from
                .as_ref()
                .err()
                .or_else(|| converter.to.as_ref().and_then(|to| to.as_ref().err())),
            _ => None,
        }
    }

    pub(crate) fn capabilities(&self) -> CapabilitySet {
        let set = match self.value_type() {
            Some(_) => CapabilitySet::empty().with(Capability::Value),
            None => CapabilitySet::empty(),
        };
        match self {
            Self::Integer { .. } => set.with(Capability::Integer),
            Self::Float { .. } => set.with(Capability::Float),
            Self::Boolean { .. } => set.with(Capability::Boolean),
            Self::Enumeration { .. } => set.with(Capability::Enumeration),
            Self::String { .. } => set.with(Capability::String),
            Self::Register(_) => set.with(Capability::Register),
            Self::IntReg { .. } => set.with(Capability::Integer).with(Capability::Register),
            Self::FloatReg { .. } => set.with(Capability::Float).with(Capability::Register),
            Self::StringReg(_) => set.with(Capability::String).with(Capability::Register),
            Self::Formula(FormulaProducer { integer, .. })
            | Self::Converter(ConverterProducer { integer, .. }) => {
                set.with(if *integer {
                    Capability::Integer
                } else {
                    Capability::Float
                })
            }
            Self::Command { .. } => set.with(Capability::Command),
            Self::Category(_) => set.with(Capability::Category),
            Self::Port { .. } => set.with(Capability::Port),
        }
    }
}

/// Immutable part of a node.
#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) name: String,
    pub(crate) display_name: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) tooltip: Option<String>,
    pub(crate) visibility: Visibility,
    pub(crate) access: AccessMode,
    pub(crate) caching: CachingMode,
    /// Declared `NoCache`, or reads such a node through its dependencies.
    pub(crate) volatile: bool,
    pub(crate) polling_time: Option<Duration>,
    pub(crate) is_available: Option<NodeId>,
    pub(crate) is_locked: Option<NodeId>,
    pub(crate) selected: Vec<NodeId>,
    pub(crate) selecting: Vec<NodeId>,
    pub(crate) depends_on: Vec<NodeId>,
    pub(crate) invalidates: Vec<NodeId>,
    pub(crate) capabilities: CapabilitySet,
    pub(crate) producer: Producer,
}

/// Mutable part of a node, guarded by the node map lock.
#[derive(Debug, Clone, Default)]
pub(crate) struct NodeState {
    pub(crate) cache: ValueCache,
    pub(crate) stored: Option<Value>,
    pub(crate) command_pending: bool,
    pub(crate) since_refresh: Duration,
}

#[derive(Debug)]
pub(crate) struct GraphState {
    pub(crate) nodes: Vec<NodeState>,
    pub(crate) ports: Vec<PortSlot>,
}

#[derive(Debug)]
pub(crate) struct Graph {
    pub(crate) nodes: Vec<Node>,
    pub(crate) index: HashMap<String, NodeId>,
    pub(crate) event_routes: HashMap<String, Vec<NodeId>>,
}

impl Graph {
    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<NodeId> {
        self.index.get(name).copied()
    }

    pub(crate) fn ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }
}
