use crate::graph::NodeId;
use crate::{NodeMap, NodeMapError, NodeRef, Value};

/// Snapshot of one enumeration entry.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct EnumEntryInfo {
    /// Symbolic name.
    pub name: String,
    /// Display name.
    pub display_name: String,
    /// Integer value.
    pub value: i64,
    /// Availability at the time of the snapshot.
    pub available: bool,
}

/// `IEnumeration` access.
///
/// Entry availability is evaluated when entries are listed, never cached in
/// the view.
#[derive(Debug, Clone, Copy)]
pub struct EnumerationView<'a> {
    map: &'a NodeMap,
    id: NodeId,
}

impl<'a> EnumerationView<'a> {
    pub(crate) const fn new(map: &'a NodeMap, id: NodeId) -> Self {
        Self { map, id }
    }

    /// Underlying node.
    #[must_use]
    pub const fn node(&self) -> NodeRef<'a> {
        self.map.node_ref(self.id)
    }

    /// All entries with their current availability.
    ///
    /// # Errors
    ///
    /// Propagates failures evaluating availability nodes.
    pub fn entries(&self) -> Result<Vec<EnumEntryInfo>, NodeMapError> {
        let id = self.id;
        self.map.with_engine(|engine| {
            let entries = engine.entries(id)?;
            let mut infos = Vec::with_capacity(entries.len());
            for entry in entries {
                infos.push(EnumEntryInfo {
                    name: entry.name.clone(),
                    display_name: entry
                        .display_name
                        .clone()
                        .unwrap_or_else(|| entry.name.clone()),
                    value: entry.value,
                    available: engine.entry_available(entry)?,
                });
            }
            Ok(infos)
        })
    }

    /// Names of the entries available right now.
    ///
    /// # Errors
    ///
    /// Propagates failures evaluating availability nodes.
    pub fn available_symbolics(&self) -> Result<Vec<String>, NodeMapError> {
        Ok(self
            .entries()?
            .into_iter()
            .filter(|entry| entry.available)
            .map(|entry| entry.name)
            .collect())
    }

    /// Current integer value.
    ///
    /// # Errors
    ///
    /// Propagates read failures.
    pub fn int_value(&self) -> Result<i64, NodeMapError> {
        let id = self.id;
        self.map.with_engine(|engine| engine.read_integer(id))
    }

    /// Entry matching the current value.
    ///
    /// # Errors
    ///
    /// Returns [`NodeMapError::Range`] when no entry carries the current
    /// value.
    pub fn current_entry(&self) -> Result<EnumEntryInfo, NodeMapError> {
        let value = self.int_value()?;
        self.entries()?
            .into_iter()
            .find(|entry| entry.value == value)
            .ok_or_else(|| {
                NodeMapError::range(self.node().name(), format!("no entry for value {value}"))
            })
    }

    /// Symbolic name of the current value.
    ///
    /// # Errors
    ///
    /// See [`current_entry`](Self::current_entry).
    pub fn symbolic(&self) -> Result<String, NodeMapError> {
        self.current_entry().map(|entry| entry.name)
    }

    /// Selects the entry called `symbolic`.
    ///
    /// # Errors
    ///
    /// Returns [`NodeMapError::Range`] for unknown or unavailable entries.
    pub fn set_symbolic(&self, symbolic: &str) -> Result<(), NodeMapError> {
        let id = self.id;
        let value = Value::String(symbolic.to_string());
        self.map.with_engine(|engine| engine.write(id, value))
    }

    /// Selects the entry with integer value `value`.
    ///
    /// # Errors
    ///
    /// Returns [`NodeMapError::Range`] when no available entry carries
    /// `value`.
    pub fn set_int_value(&self, value: i64) -> Result<(), NodeMapError> {
        let id = self.id;
        self.map.with_engine(|engine| engine.write(id, Value::Integer(value)))
    }
}
