use crate::graph::{NodeId, Producer};
use crate::{IncrementPolicy, NodeMap, NodeMapError, NodeRef, Value};

/// `IInteger` access to an integer-valued node.
#[derive(Debug, Clone, Copy)]
pub struct IntegerView<'a> {
    map: &'a NodeMap,
    id: NodeId,
}

impl<'a> IntegerView<'a> {
    pub(crate) const fn new(map: &'a NodeMap, id: NodeId) -> Self {
        Self { map, id }
    }

    /// Underlying node.
    #[must_use]
    pub const fn node(&self) -> NodeRef<'a> {
        self.map.node_ref(self.id)
    }

    /// Current value.
    ///
    /// # Errors
    ///
    /// Propagates read failures.
    pub fn value(&self) -> Result<i64, NodeMapError> {
        let id = self.id;
        self.map.with_engine(|engine| engine.read_integer(id))
    }

    /// Writes `value` after the bounds and increment checks.
    ///
    /// # Errors
    ///
    /// Returns [`NodeMapError::Range`] for out-of-bounds or rejected
    /// misaligned values and propagates write failures.
    pub fn set_value(&self, value: i64) -> Result<(), NodeMapError> {
        let id = self.id;
        self.map
            .with_engine(|engine| engine.write(id, Value::Integer(value)))
    }

    /// Lower bound, evaluated now.
    ///
    /// # Errors
    ///
    /// Propagates failures of a node-backed bound.
    pub fn min(&self) -> Result<i64, NodeMapError> {
        self.bounds().map(|(min, _, _)| min)
    }

    /// Upper bound, evaluated now.
    ///
    /// # Errors
    ///
    /// Propagates failures of a node-backed bound.
    pub fn max(&self) -> Result<i64, NodeMapError> {
        self.bounds().map(|(_, max, _)| max)
    }

    /// Step between valid values.
    ///
    /// # Errors
    ///
    /// Propagates failures of a node-backed increment.
    pub fn increment(&self) -> Result<i64, NodeMapError> {
        self.bounds().map(|(_, _, increment)| increment)
    }

    fn bounds(&self) -> Result<(i64, i64, i64), NodeMapError> {
        let id = self.id;
        self.map.with_engine(|engine| engine.integer_bounds(id))
    }

    /// Handling of misaligned writes.
    #[must_use]
    pub fn increment_policy(&self) -> IncrementPolicy {
        match &self.map.graph().node(self.id).producer {
            Producer::Integer { bounds, .. } => bounds.policy,
            _ => IncrementPolicy::Reject,
        }
    }

    /// Physical unit.
    #[must_use]
    pub fn unit(&self) -> Option<&'a str> {
        match &self.map.graph().node(self.id).producer {
            Producer::Integer { bounds, .. } => bounds.unit.as_deref(),
            _ => None,
        }
    }
}
