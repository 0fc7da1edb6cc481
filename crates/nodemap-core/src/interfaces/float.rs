use crate::graph::{NodeId, Producer};
use crate::{IncrementPolicy, NodeMap, NodeMapError, NodeRef, Value};

/// `IFloat` access to a float-valued node.
#[derive(Debug, Clone, Copy)]
pub struct FloatView<'a> {
    map: &'a NodeMap,
    id: NodeId,
}

impl<'a> FloatView<'a> {
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
    pub fn value(&self) -> Result<f64, NodeMapError> {
        let id = self.id;
        self.map.with_engine(|engine| engine.read(id)).and_then(|value| {
            value.as_float().ok_or_else(|| NodeMapError::TypeMismatch {
                node: self.node().name().to_string(),
                expected: "float",
                actual: value.type_name(),
            })
        })
    }

    /// Writes `value` after the bounds and increment checks.
    ///
    /// # Errors
    ///
    /// Returns [`NodeMapError::Range`] for out-of-bounds or rejected
    /// misaligned values and propagates write failures.
    pub fn set_value(&self, value: f64) -> Result<(), NodeMapError> {
        let id = self.id;
        self.map.with_engine(|engine| engine.write(id, Value::Float(value)))
    }

    fn bounds(&self) -> Result<(f64, f64, Option<f64>), NodeMapError> {
        let id = self.id;
        self.map.with_engine(|engine| engine.float_bounds(id))
    }

    /// Lower bound, evaluated now.
    ///
    /// # Errors
    ///
    /// Propagates failures of a node-backed bound.
    pub fn min(&self) -> Result<f64, NodeMapError> {
        self.bounds().map(|(min, _, _)| min)
    }

    /// Upper bound, evaluated now.
    ///
    /// # Errors
    ///
    /// Propagates failures of a node-backed bound.
    pub fn max(&self) -> Result<f64, NodeMapError> {
        self.bounds().map(|(_, max, _)| max)
    }

    /// Step between valid values, `None` when continuous.
    ///
    /// # Errors
    ///
    /// Propagates failures of a node-backed increment.
    pub fn increment(&self) -> Result<Option<f64>, NodeMapError> {
        self.bounds().map(|(_, _, increment)| increment)
    }

    /// Handling of misaligned writes.
    #[must_use]
    pub fn increment_policy(&self) -> IncrementPolicy {
        match &self.map.graph().node(self.id).producer {
            Producer::Float { bounds, .. } => bounds.policy,
            _ => IncrementPolicy::Reject,
        }
    }

    /// Physical unit.
    #[must_use]
    pub fn unit(&self) -> Option<&'a str> {
        match &self.map.graph().node(self.id).producer {
            Producer::Float { bounds, .. } => bounds.unit.as_deref(),
            _ => None,
        }
    }
}
