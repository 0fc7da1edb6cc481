//! The node map: a built graph behind one lock, plus change callbacks.

use core::fmt;
use core::time::Duration;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::graph::engine::Engine;
use crate::graph::{Graph, GraphState, NodeId};
use crate::{
    AccessMode, BooleanView, CachingMode, Capability, CapabilitySet, CategoryView, CommandView,
    EnumerationView, FloatView, IntegerView, InterfaceVersion, NodeMapBuilder, NodeMapConfig,
    NodeMapError, PortView, RegisterView, SelectorView, StringView, Value, Visibility,
};

type Callback = Arc<dyn Fn(NodeRef<'_>) + Send + Sync>;

/// Registration returned by [`NodeMap::register_callback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackHandle {
    node: NodeId,
    serial: u64,
}

#[derive(Default)]
struct CallbackRegistry {
    next_serial: u64,
    by_node: HashMap<NodeId, Vec<(u64, Callback)>>,
}

/// A device's feature graph.
///
/// All node state sits behind a single lock; every public operation holds it
/// for its whole duration, so concurrent callers observe each operation
/// atomically. Change callbacks run after the lock is released and may call
/// back into the node map.
pub struct NodeMap {
    graph: Graph,
    state: Mutex<GraphState>,
    callbacks: RwLock<CallbackRegistry>,
    config: NodeMapConfig,
    device_name: String,
}

impl fmt::Debug for NodeMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeMap")
            .field("device_name", &self.device_name)
            .field("nodes", &self.graph.nodes.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl NodeMap {
    pub(crate) fn new(
        graph: Graph,
        state: GraphState,
        config: NodeMapConfig,
        device_name: String,
    ) -> Self {
        Self {
            graph,
            state: Mutex::new(state),
            callbacks: RwLock::new(CallbackRegistry::default()),
            config,
            device_name,
        }
    }

    /// Starts building a node map.
    #[must_use]
    pub fn builder(config: NodeMapConfig) -> NodeMapBuilder {
        NodeMapBuilder::new(config)
    }

    /// Construction options.
    #[must_use]
    pub const fn config(&self) -> &NodeMapConfig {
        &self.config
    }

    /// Interface version this node map reports to module consumers.
    #[must_use]
    pub const fn interface_version(&self) -> InterfaceVersion {
        self.config.interface_version
    }

    /// Device the node map describes.
    #[must_use]
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.nodes.len()
    }

    /// All nodes in declaration order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeRef<'_>> {
        self.graph.ids().map(move |id| NodeRef { map: self, id })
    }

    /// Resolves `name` to its node.
    ///
    /// # Errors
    ///
    /// Returns [`NodeMapError::NotFound`] for unknown names.
    pub fn node(&self, name: &str) -> Result<NodeRef<'_>, NodeMapError> {
        self.graph
            .lookup(name)
            .map(|id| NodeRef { map: self, id })
            .ok_or_else(|| NodeMapError::NotFound(name.to_string()))
    }

    /// Runs `operation` under the lock, then notifies callbacks of every node
    /// the operation changed or invalidated.
    pub(crate) fn with_engine<R>(
        &self,
        operation: impl FnOnce(&mut Engine<'_>) -> Result<R, NodeMapError>,
    ) -> Result<R, NodeMapError> {
        let (result, changed) = {
            let mut state = self.state.lock();
            let mut engine = Engine::new(&self.graph, &mut state, &self.config);
            let result = operation(&mut engine);
            (result, engine.into_changed())
        };
        if !changed.is_empty() {
            tracing::trace!(changed = changed.len(), "notifying change callbacks");
            self.notify(&changed);
        }
        result
    }

    fn notify(&self, changed: &[NodeId]) {
        let pending: Vec<(NodeId, Callback)> = {
            let registry = self.callbacks.read();
            changed
                .iter()
                .filter_map(|id| registry.by_node.get(id).map(|entries| (*id, entries)))
                .flat_map(|(id, entries)| {
                    entries
                        .iter()
                        .map(move |(_, callback)| (id, Arc::clone(callback)))
                })
                .collect()
        };
        for (id, callback) in pending {
            callback(NodeRef { map: self, id });
        }
    }

    fn typed<'m, T>(
        &'m self,
        name: &str,
        capability: Capability,
        view: impl FnOnce(&'m Self, NodeId) -> T,
    ) -> Result<T, NodeMapError> {
        let node = self.node(name)?;
        if node.capabilities().contains(capability) {
            Ok(view(self, node.id))
        } else {
            Err(NodeMapError::WrongInterface {
                node: name.to_string(),
                interface: capability,
            })
        }
    }

    /// Reads a node's value, evaluating it when the cache is invalid.
    ///
    /// # Errors
    ///
    /// Returns [`NodeMapError::NotFound`], [`NodeMapError::AccessDenied`] when
    /// the node is not readable, and any evaluation or port failure.
    pub fn get_value(&self, name: &str) -> Result<Value, NodeMapError> {
        self.node(name)?.value()
    }

    /// Writes a node's value and invalidates its transitive dependents.
    ///
    /// # Errors
    ///
    /// Returns [`NodeMapError::AccessDenied`] when the node is not writable,
    /// [`NodeMapError::NotWritable`] for formulas without an inverse,
    /// [`NodeMapError::Range`] for out-of-bounds or misaligned values, and
    /// any port failure.
    pub fn set_value(&self, name: &str, value: impl Into<Value>) -> Result<(), NodeMapError> {
        self.node(name)?.set_value(value)
    }

    /// Invalidates a node's cache and those of its transitive dependents.
    ///
    /// # Errors
    ///
    /// Returns [`NodeMapError::NotFound`] for unknown names.
    pub fn invalidate(&self, name: &str) -> Result<(), NodeMapError> {
        let id = self.node(name)?.id;
        self.with_engine(|engine| {
            engine.invalidate(id);
            Ok(())
        })
    }

    /// Invalidates every cache without notifying callbacks.
    pub fn invalidate_all(&self) {
        let _ = self.with_engine(|engine| {
            engine.invalidate_all();
            Ok(())
        });
    }

    /// Advances polling timers by `elapsed`; nodes whose polling time passed
    /// since their last refresh are invalidated.
    pub fn poll(&self, elapsed: Duration) {
        let _ = self.with_engine(|engine| {
            engine.poll(elapsed);
            Ok(())
        });
    }

    /// Calls `callback` whenever the node called `name` changes or is
    /// invalidated.
    ///
    /// # Errors
    ///
    /// Returns [`NodeMapError::NotFound`] for unknown names.
    pub fn register_callback<F>(
        &self,
        name: &str,
        callback: F,
    ) -> Result<CallbackHandle, NodeMapError>
    where
        F: Fn(NodeRef<'_>) + Send + Sync + 'static,
    {
        let node = self.node(name)?.id;
        let mut registry = self.callbacks.write();
        let serial = registry.next_serial;
        registry.next_serial += 1;
        registry
            .by_node
            .entry(node)
            .or_default()
            .push((serial, Arc::new(callback)));
        Ok(CallbackHandle { node, serial })
    }

    /// Removes a callback. Returns `false` when it was already removed.
    pub fn deregister_callback(&self, handle: CallbackHandle) -> bool {
        let mut registry = self.callbacks.write();
        let Some(entries) = registry.by_node.get_mut(&handle.node) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|(serial, _)| *serial != handle.serial);
        before != entries.len()
    }

    /// `IInteger` view of `name`.
    ///
    /// # Errors
    ///
    /// Returns [`NodeMapError::NotFound`] or [`NodeMapError::WrongInterface`].
    pub fn integer(&self, name: &str) -> Result<IntegerView<'_>, NodeMapError> {
        self.typed(name, Capability::Integer, IntegerView::new)
    }

    /// `IFloat` view of `name`.
    ///
    /// # Errors
    ///
    /// Returns [`NodeMapError::NotFound`] or [`NodeMapError::WrongInterface`].
    pub fn float(&self, name: &str) -> Result<FloatView<'_>, NodeMapError> {
        self.typed(name, Capability::Float, FloatView::new)
    }

    /// `IBoolean` view of `name`.
    ///
    /// # Errors
    ///
    /// Returns [`NodeMapError::NotFound`] or [`NodeMapError::WrongInterface`].
    pub fn boolean(&self, name: &str) -> Result<BooleanView<'_>, NodeMapError> {
        self.typed(name, Capability::Boolean, BooleanView::new)
    }

    /// `IEnumeration` view of `name`.
    ///
    /// # Errors
    ///
    /// Returns [`NodeMapError::NotFound`] or [`NodeMapError::WrongInterface`].
    pub fn enumeration(&self, name: &str) -> Result<EnumerationView<'_>, NodeMapError> {
        self.typed(name, Capability::Enumeration, EnumerationView::new)
    }

    /// `IString` view of `name`.
    ///
    /// # Errors
    ///
    /// Returns [`NodeMapError::NotFound`] or [`NodeMapError::WrongInterface`].
    pub fn string(&self, name: &str) -> Result<StringView<'_>, NodeMapError> {
        self.typed(name, Capability::String, StringView::new)
    }

    /// `IRegister` view of `name`.
    ///
    /// # Errors
    ///
    /// Returns [`NodeMapError::NotFound`] or [`NodeMapError::WrongInterface`].
    pub fn register(&self, name: &str) -> Result<RegisterView<'_>, NodeMapError> {
        self.typed(name, Capability::Register, RegisterView::new)
    }

    /// `ICommand` view of `name`.
    ///
    /// # Errors
    ///
    /// Returns [`NodeMapError::NotFound`] or [`NodeMapError::WrongInterface`].
    pub fn command(&self, name: &str) -> Result<CommandView<'_>, NodeMapError> {
        self.typed(name, Capability::Command, CommandView::new)
    }

    /// `ISelector` view of `name`.
    ///
    /// # Errors
    ///
    /// Returns [`NodeMapError::NotFound`] or [`NodeMapError::WrongInterface`].
    pub fn selector(&self, name: &str) -> Result<SelectorView<'_>, NodeMapError> {
        self.typed(name, Capability::Selector, SelectorView::new)
    }

    /// `ICategory` view of `name`.
    ///
    /// # Errors
    ///
    /// Returns [`NodeMapError::NotFound`] or [`NodeMapError::WrongInterface`].
    pub fn category(&self, name: &str) -> Result<CategoryView<'_>, NodeMapError> {
        self.typed(name, Capability::Category, CategoryView::new)
    }

    /// `IPort` view of `name`.
    ///
    /// # Errors
    ///
    /// Returns [`NodeMapError::NotFound`] or [`NodeMapError::WrongInterface`].
    pub fn port(&self, name: &str) -> Result<PortView<'_>, NodeMapError> {
        self.typed(name, Capability::Port, PortView::new)
    }

    pub(crate) fn event_ports(&self, event_id: &str) -> &[NodeId] {
        self.graph
            .event_routes
            .get(event_id)
            .map_or(&[], Vec::as_slice)
    }

    pub(crate) const fn node_ref(&self, id: NodeId) -> NodeRef<'_> {
        NodeRef { map: self, id }
    }

    pub(crate) fn resolve_ids(&self, ids: &[NodeId]) -> Vec<NodeRef<'_>> {
        ids.iter().map(|id| NodeRef { map: self, id: *id }).collect()
    }

    pub(crate) fn graph(&self) -> &Graph {
        &self.graph
    }
}

/// A node of a [`NodeMap`].
#[derive(Clone, Copy)]
pub struct NodeRef<'m> {
    map: &'m NodeMap,
    id: NodeId,
}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("name", &self.name())
            .field("id", &self.id)
            .finish()
    }
}

impl<'m> NodeRef<'m> {
    /// Owning node map.
    #[must_use]
    pub const fn map(&self) -> &'m NodeMap {
        self.map
    }

    /// Handle of the node.
    #[must_use]
    pub const fn id(&self) -> NodeId {
        self.id
    }

    fn node(&self) -> &'m crate::graph::Node {
        self.map.graph.node(self.id)
    }

    /// Unique name.
    #[must_use]
    pub fn name(&self) -> &'m str {
        &self.node().name
    }

    /// Display name, falling back to the name.
    #[must_use]
    pub fn display_name(&self) -> &'m str {
        let node = self.node();
        node.display_name.as_deref().unwrap_or(&node.name)
    }

    /// Long description.
    #[must_use]
    pub fn description(&self) -> Option<&'m str> {
        self.node().description.as_deref()
    }

    /// Tooltip.
    #[must_use]
    pub fn tooltip(&self) -> Option<&'m str> {
        self.node().tooltip.as_deref()
    }

    /// Intended audience.
    #[must_use]
    pub fn visibility(&self) -> Visibility {
        self.node().visibility
    }

    /// Caching behaviour.
    #[must_use]
    pub fn caching_mode(&self) -> CachingMode {
        self.node().caching
    }

    /// Polling time, if the node is polled.
    #[must_use]
    pub fn polling_time(&self) -> Option<Duration> {
        self.node().polling_time
    }

    /// Capability tags.
    #[must_use]
    pub fn capabilities(&self) -> CapabilitySet {
        self.node().capabilities
    }

    /// Whether the node carries `capability`.
    #[must_use]
    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities().contains(capability)
    }

    /// Nodes this node reads.
    #[must_use]
    pub fn depends_on(&self) -> Vec<NodeRef<'m>> {
        self.map.resolve_ids(&self.node().depends_on)
    }

    /// Nodes invalidated when this node changes.
    #[must_use]
    pub fn invalidates(&self) -> Vec<NodeRef<'m>> {
        self.map.resolve_ids(&self.node().invalidates)
    }

    /// Selectors whose value changes this node's meaning.
    #[must_use]
    pub fn selecting_features(&self) -> Vec<NodeRef<'m>> {
        self.map.resolve_ids(&self.node().selecting)
    }

    /// Whether the next read may be served from the cache.
    #[must_use]
    pub fn is_cache_valid(&self) -> bool {
        let id = self.id;
        self.map
            .with_engine(|engine| Ok(engine.is_cache_valid(id)))
            .unwrap_or(false)
    }

    /// Effective access mode after availability, lock, and inverse checks.
    ///
    /// # Errors
    ///
    /// Propagates failures evaluating the availability or lock nodes.
    pub fn access_mode(&self) -> Result<AccessMode, NodeMapError> {
        let id = self.id;
        self.map.with_engine(|engine| engine.access_mode(id))
    }

    /// Reads the value.
    ///
    /// # Errors
    ///
    /// See [`NodeMap::get_value`].
    pub fn value(&self) -> Result<Value, NodeMapError> {
        let id = self.id;
        self.map.with_engine(|engine| engine.read(id))
    }

    /// Writes the value.
    ///
    /// # Errors
    ///
    /// See [`NodeMap::set_value`].
    pub fn set_value(&self, value: impl Into<Value>) -> Result<(), NodeMapError> {
        let id = self.id;
        let value = value.into();
        self.map.with_engine(|engine| engine.write(id, value))
    }
}
