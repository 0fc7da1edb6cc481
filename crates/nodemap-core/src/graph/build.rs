use std::collections::HashMap;

use swissknife::{EvalMode, Formula, FormulaError};

use super::{
    codec::BitField, ConverterProducer, EnumEntry, FloatBounds, FormulaProducer, Graph,
    GraphState, IntBounds, Mapping, Node, NodeId, NodeState, Producer, Ref,
};
use crate::log::{LogPriority, Logger};
use crate::schema::{
    ConverterDescription, FormulaDescription, NodeDescription, NodeKind, RegisterDescription,
    Source,
};
use crate::{BuildError, CachingMode, ChunkPort, NodeMap, NodeMapConfig, Port, PortSlot, Value};

const BUILD_LOG: Logger = Logger::get("NodeMap.Build");

/// Collects node descriptions and port transports, then resolves them into a
/// [`NodeMap`].
pub struct NodeMapBuilder {
    config: NodeMapConfig,
    device_name: String,
    descriptions: Vec<NodeDescription>,
    transports: HashMap<String, Box<dyn Port>>,
}

impl NodeMapBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new(config: NodeMapConfig) -> Self {
        Self {
            config,
            device_name: String::new(),
            descriptions: Vec::new(),
            transports: HashMap::new(),
        }
    }

    /// Names the device the node map describes.
    #[must_use]
    pub fn device_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = name.into();
        self
    }

    /// Adds one node description.
    #[must_use]
    pub fn node(mut self, description: NodeDescription) -> Self {
        self.descriptions.push(description);
        self
    }

    /// Adds node descriptions in order.
    #[must_use]
    pub fn nodes(mut self, descriptions: impl IntoIterator<Item = NodeDescription>) -> Self {
        self.descriptions.extend(descriptions);
        self
    }

    /// Binds the transport of the device port node called `name`.
    #[must_use]
    pub fn bind_port(mut self, name: impl Into<String>, port: impl Port + 'static) -> Self {
        self.transports.insert(name.into(), Box::new(port));
        self
    }

    /// Resolves names, compiles formulas, derives dependency edges, and
    /// checks structural nodes for cycles.
    ///
    /// A formula that fails to compile does not fail the build; the node
    /// reports the compile error on every access instead.
    ///
    /// # Errors
    ///
    /// Returns a [`BuildError`] for duplicate names, unknown references,
    /// unbound or misbound ports, unusable register layouts, and dependency
    /// cycles among non-formula nodes.
    pub fn build(self) -> Result<NodeMap, BuildError> {
        let Self {
            config,
            device_name,
            descriptions,
            mut transports,
        } = self;

        let mut index = HashMap::with_capacity(descriptions.len());
        for (position, description) in descriptions.iter().enumerate() {
            if index
                .insert(description.name.clone(), NodeId(position))
                .is_some()
            {
                return Err(BuildError::DuplicateNode(description.name.clone()));
            }
        }

        let mut ports = Vec::new();
        let mut slots = HashMap::new();
        let mut event_routes: HashMap<String, Vec<NodeId>> = HashMap::new();
        for (position, description) in descriptions.iter().enumerate() {
            let NodeKind::Port(port) = &description.kind else {
                continue;
            };
            slots.insert(NodeId(position), ports.len());
            if let Some(event_id) = &port.event_id {
                if transports.contains_key(&description.name) {
                    return Err(BuildError::UnexpectedPortBinding(description.name.clone()));
                }
                ports.push(PortSlot::Chunk(ChunkPort::new()));
                event_routes
                    .entry(event_id.to_ascii_uppercase())
                    .or_default()
                    .push(NodeId(position));
            } else {
                let transport = transports
                    .remove(&description.name)
                    .ok_or_else(|| BuildError::UnboundPort(description.name.clone()))?;
                ports.push(PortSlot::Device(transport));
            }
        }
        if let Some(name) = transports.keys().next() {
            return Err(BuildError::UnexpectedPortBinding(name.clone()));
        }

        let mut nodes = Vec::with_capacity(descriptions.len());
        let mut states = Vec::with_capacity(descriptions.len());
        for description in &descriptions {
            let (node, state) = Resolver::new(description, &index, &slots).resolve()?;
            nodes.push(node);
            states.push(state);
        }

        for selector in 0..nodes.len() {
            for feature in nodes[selector].selected.clone() {
                link_unique(&mut nodes[feature.0].depends_on, NodeId(selector));
                nodes[feature.0].selecting.push(NodeId(selector));
            }
        }
        for dependent in 0..nodes.len() {
            for dependency in nodes[dependent].depends_on.clone() {
                nodes[dependency.0].invalidates.push(NodeId(dependent));
            }
        }
        detect_cycles(&nodes)?;
        spread_volatility(&mut nodes);

        tracing::info!(
            device = %device_name,
            nodes = nodes.len(),
            ports = ports.len(),
            events = event_routes.len(),
            "node map built"
        );
        let graph = Graph {
            nodes,
            index,
            event_routes,
        };
        Ok(NodeMap::new(
            graph,
            GraphState {
                nodes: states,
                ports,
            },
            config,
            device_name,
        ))
    }
}

impl core::fmt::Debug for NodeMapBuilder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NodeMapBuilder")
            .field("config", &self.config)
            .field("device_name", &self.device_name)
            .field("nodes", &self.descriptions.len())
            .field("transports", &self.transports.len())
            .finish()
    }
}

fn link_unique(edges: &mut Vec<NodeId>, id: NodeId) {
    if !edges.contains(&id) {
        edges.push(id);
    }
}

/// Resolves one description, recording every referenced node as a
/// dependency.
struct Resolver<'b> {
    description: &'b NodeDescription,
    index: &'b HashMap<String, NodeId>,
    slots: &'b HashMap<NodeId, usize>,
    depends_on: Vec<NodeId>,
}

impl<'b> Resolver<'b> {
    const fn new(
        description: &'b NodeDescription,
        index: &'b HashMap<String, NodeId>,
        slots: &'b HashMap<NodeId, usize>,
    ) -> Self {
        Self {
            description,
            index,
            slots,
            depends_on: Vec::new(),
        }
    }

    fn lookup(&self, name: &str) -> Result<NodeId, BuildError> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| BuildError::UnknownNode {
                node: self.description.name.clone(),
                reference: name.to_string(),
            })
    }

    fn link(&mut self, name: &str) -> Result<NodeId, BuildError> {
        let id = self.lookup(name)?;
        link_unique(&mut self.depends_on, id);
        Ok(id)
    }

    fn source<T: Clone>(&mut self, source: &Source<T>) -> Result<Ref<T>, BuildError> {
        match source {
            Source::Value(value) => Ok(Ref::Value(value.clone())),
            Source::Node(name) => self.link(name).map(Ref::Node),
        }
    }

    fn optional<T: Clone>(
        &mut self,
        source: Option<&Source<T>>,
    ) -> Result<Option<Ref<T>>, BuildError> {
        source.map(|source| self.source(source)).transpose()
    }

    fn invalid(&self, reason: impl Into<String>) -> BuildError {
        BuildError::InvalidNode {
            node: self.description.name.clone(),
            reason: reason.into(),
        }
    }

    fn mapping(&mut self, register: &RegisterDescription) -> Result<Mapping, BuildError> {
        if register.length == 0 {
            return Err(self.invalid("register length must be positive"));
        }
        let port = self.link(&register.port)?;
        let slot = *self.slots.get(&port).ok_or_else(|| BuildError::NotAPort {
            node: self.description.name.clone(),
            reference: register.port.clone(),
        })?;
        let address_nodes = register
            .address_nodes
            .iter()
            .map(|name| self.link(name))
            .collect::<Result<Vec<_>, _>>()?;
        let index = match &register.index {
            Some(index) => Some((self.link(&index.node)?, index.stride)),
            None => None,
        };
        Ok(Mapping {
            port,
            slot,
            address: register.address,
            address_nodes,
            index,
            length: register.length,
        })
    }

    fn compile(
        &self,
        text: &str,
        variables: &[&str],
        integer: bool,
    ) -> Result<Formula, FormulaError> {
        let mode = if integer {
            EvalMode::Integer
        } else {
            EvalMode::Float
        };
        Formula::compile(text, variables, mode).inspect_err(|error| {
            BUILD_LOG.log(
                LogPriority::Warn,
                format_args!(
                    "{}: formula `{text}` does not compile: {}",
                    self.description.name,
                    error.format_with_column()
                ),
            );
        })
    }

    fn formula(
        &mut self,
        formula: &FormulaDescription,
        integer: bool,
    ) -> Result<Producer, BuildError> {
        let operands = formula
            .operands
            .iter()
            .map(|operand| self.link(&operand.node))
            .collect::<Result<Vec<_>, _>>()?;
        let variables: Vec<&str> = formula
            .operands
            .iter()
            .map(|operand| operand.variable.as_str())
            .collect();
        Ok(Producer::Formula(FormulaProducer {
            formula: self.compile(&formula.formula, &variables, integer),
            operands,
            integer,
        }))
    }

    fn converter(
        &mut self,
        converter: &ConverterDescription,
        integer: bool,
    ) -> Result<Producer, BuildError> {
        let value = self.link(&converter.value)?;
        let operands = converter
            .operands
            .iter()
            .map(|operand| self.link(&operand.node))
            .collect::<Result<Vec<_>, _>>()?;
        let with_head = |head: &'static str| {
            core::iter::once(head)
                .chain(converter.operands.iter().map(|operand| operand.variable.as_str()))
                .collect::<Vec<_>>()
        };
        let from = self.compile(&converter.formula_from, &with_head("FROM"), integer);
        let to = converter
            .formula_to
            .as_ref()
            .map(|text| self.compile(text, &with_head("TO"), false));
        Ok(Producer::Converter(ConverterProducer {
            from,
            to,
            value,
            operands,
            integer,
        }))
    }

    #[allow(clippy::too_many_lines)]
    fn producer(&mut self) -> Result<(Producer, Option<Value>), BuildError> {
        let description = self.description;
        let producer = match &description.kind {
            NodeKind::Integer(integer) => {
                let initial = match &integer.value {
                    Source::Value(value) => Some(Value::Integer(*value)),
                    Source::Node(_) => None,
                };
                let bounds = IntBounds {
                    min: self.optional(integer.min.as_ref())?,
                    max: self.optional(integer.max.as_ref())?,
                    increment: self.optional(integer.increment.as_ref())?,
                    policy: integer.policy,
                    unit: integer.unit.clone(),
                };
                let value = self.source(&integer.value)?;
                return Ok((Producer::Integer { value, bounds }, initial));
            }
            NodeKind::Float(float) => {
                let initial = match &float.value {
                    Source::Value(value) => Some(Value::Float(*value)),
                    Source::Node(_) => None,
                };
                let bounds = FloatBounds {
                    min: self.optional(float.min.as_ref())?,
                    max: self.optional(float.max.as_ref())?,
                    increment: self.optional(float.increment.as_ref())?,
                    policy: float.policy,
                    unit: float.unit.clone(),
                };
                let value = self.source(&float.value)?;
                return Ok((Producer::Float { value, bounds }, initial));
            }
            NodeKind::Boolean(boolean) => {
                let initial = match &boolean.value {
                    Source::Value(value) => Some(Value::Boolean(*value)),
                    Source::Node(_) => None,
                };
                let value = self.source(&boolean.value)?;
                return Ok((
                    Producer::Boolean {
                        value,
                        on_value: boolean.on_value,
                        off_value: boolean.off_value,
                    },
                    initial,
                ));
            }
            NodeKind::Enumeration(enumeration) => {
                let mut entries: Vec<EnumEntry> = Vec::with_capacity(enumeration.entries.len());
                for entry in &enumeration.entries {
                    if entries
                        .iter()
                        .any(|seen| seen.name == entry.name || seen.value == entry.value)
                    {
                        return Err(self.invalid(format!("duplicate entry `{}`", entry.name)));
                    }
                    entries.push(EnumEntry {
                        name: entry.name.clone(),
                        display_name: entry.display_name.clone(),
                        value: entry.value,
                        is_available: entry
                            .is_available
                            .as_deref()
                            .map(|name| self.link(name))
                            .transpose()?,
                        is_implemented: entry
                            .is_implemented
                            .as_deref()
                            .map(|name| self.link(name))
                            .transpose()?,
                    });
                }
                let initial = match &enumeration.value {
                    Source::Value(value) => Some(Value::Integer(*value)),
                    Source::Node(_) => None,
                };
                let value = self.source(&enumeration.value)?;
                return Ok((Producer::Enumeration { value, entries }, initial));
            }
            NodeKind::String(string) => {
                let initial = match &string.value {
                    Source::Value(value) => Some(Value::String(value.clone())),
                    Source::Node(_) => None,
                };
                let value = self.source(&string.value)?;
                return Ok((
                    Producer::String {
                        value,
                        max_length: string.max_length,
                    },
                    initial,
                ));
            }
            NodeKind::Register(register) => Producer::Register(self.mapping(register)?),
            NodeKind::IntReg(int_reg) => {
                let length = int_reg.register.length;
                if length > 8 {
                    return Err(self.invalid("integer registers are at most 8 bytes"));
                }
                let field = match int_reg.bits {
                    Some((lsb, msb)) => BitField::from_bits(lsb, msb, length)
                        .ok_or_else(|| self.invalid(format!("bits {lsb}..={msb} do not fit")))?,
                    None => BitField::whole(length),
                };
                Producer::IntReg {
                    mapping: self.mapping(&int_reg.register)?,
                    sign: int_reg.sign,
                    endianness: int_reg.endianness,
                    field,
                }
            }
            NodeKind::FloatReg(float_reg) => {
                if !matches!(float_reg.register.length, 4 | 8) {
                    return Err(self.invalid("float registers are 4 or 8 bytes"));
                }
                Producer::FloatReg {
                    mapping: self.mapping(&float_reg.register)?,
                    endianness: float_reg.endianness,
                }
            }
            NodeKind::StringReg(register) => Producer::StringReg(self.mapping(register)?),
            NodeKind::IntSwissKnife(formula) => self.formula(formula, true)?,
            NodeKind::SwissKnife(formula) => self.formula(formula, false)?,
            NodeKind::IntConverter(converter) => self.converter(converter, true)?,
            NodeKind::Converter(converter) => self.converter(converter, false)?,
            NodeKind::Command(command) => Producer::Command {
                value: self.link(&command.value)?,
                command_value: self.source(&command.command_value)?,
            },
            NodeKind::Category(features) => Producer::Category(
                features
                    .iter()
                    .map(|name| self.lookup(name))
                    .collect::<Result<_, _>>()?,
            ),
            NodeKind::Port(_) => Producer::Port {
                slot: self
                    .slots
                    .get(&self.lookup(&description.name)?)
                    .copied()
                    .unwrap_or_default(),
            },
        };
        Ok((producer, None))
    }

    fn resolve(mut self) -> Result<(Node, NodeState), BuildError> {
        let description = self.description;
        let (producer, stored) = self.producer()?;
        let is_available = description
            .is_available
            .as_deref()
            .map(|name| self.link(name))
            .transpose()?;
        let is_locked = description
            .is_locked
            .as_deref()
            .map(|name| self.link(name))
            .transpose()?;
        for name in &description.invalidators {
            self.link(name)?;
        }
        let selected = description
            .selected
            .iter()
            .map(|name| self.lookup(name))
            .collect::<Result<Vec<_>, _>>()?;
        let mut capabilities = producer.capabilities();
        if !selected.is_empty() {
            capabilities = capabilities.with(crate::Capability::Selector);
        }
        let node = Node {
            name: description.name.clone(),
            display_name: description.display_name.clone(),
            description: description.description.clone(),
            tooltip: description.tooltip.clone(),
            visibility: description.visibility,
            access: description.access,
            caching: description.caching,
            volatile: description.caching == CachingMode::NoCache,
            polling_time: description.polling_time,
            is_available,
            is_locked,
            selected,
            selecting: Vec::new(),
            depends_on: self.depends_on,
            invalidates: Vec::new(),
            capabilities,
            producer,
        };
        let state = NodeState {
            stored,
            ..NodeState::default()
        };
        Ok((node, state))
    }
}

/// Rejects dependency loops among nodes that are not formulas; formula loops
/// are reported at evaluation time.
/// Marks every node that transitively depends on a `NoCache` node as
/// volatile, so no cache can hold a value derived from one.
fn spread_volatility(nodes: &mut [Node]) {
    let mut pending: Vec<NodeId> = (0..nodes.len())
        .map(NodeId)
        .filter(|id| nodes[id.0].volatile)
        .collect();
    while let Some(id) = pending.pop() {
        for dependent in nodes[id.0].invalidates.clone() {
            let node = &mut nodes[dependent.0];
            if !node.volatile {
                node.volatile = true;
                pending.push(dependent);
            }
        }
    }
}

fn detect_cycles(nodes: &[Node]) -> Result<(), BuildError> {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Mark {
        New,
        Active,
        Done,
    }
    let structural = |index: usize| !nodes[index].producer.is_formula();
    let mut marks = vec![Mark::New; nodes.len()];
    for root in 0..nodes.len() {
        if marks[root] != Mark::New || !structural(root) {
            continue;
        }
        marks[root] = Mark::Active;
        let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
        while let Some(frame) = stack.last_mut() {
            let (current, edge) = *frame;
            let Some(next) = nodes[current].depends_on.get(edge) else {
                marks[current] = Mark::Done;
                stack.pop();
                continue;
            };
            frame.1 += 1;
            let target = next.0;
            if !structural(target) {
                continue;
            }
            match marks[target] {
                Mark::New => {
                    marks[target] = Mark::Active;
                    stack.push((target, 0));
                }
                Mark::Active => {
                    let start = stack
                        .iter()
                        .position(|(node, _)| *node == target)
                        .unwrap_or_default();
                    let mut path: Vec<String> = stack[start..]
                        .iter()
                        .map(|(node, _)| nodes[*node].name.clone())
                        .collect();
                    path.push(nodes[target].name.clone());
                    return Err(BuildError::DependencyCycle { path });
                }
                Mark::Done => {}
            }
        }
    }
    Ok(())
}
