//! Evaluation, writes, and invalidation for one operation under the node map
//! lock.
//!
//! An [`Engine`] lives for exactly one public operation. It tracks the nodes
//! currently being evaluated to detect cycles and the set of nodes already
//! invalidated so every dependent is visited at most once per operation.

use core::time::Duration;
use std::collections::{HashSet, VecDeque};

use swissknife::{FormulaError, FormulaErrorKind, Number};

use super::{
    codec, range, ConverterProducer, EnumEntry, FormulaProducer, Graph, GraphState, IntBounds,
    Mapping, Node, NodeId, Producer, Ref, ValueType,
};
use crate::{
    validate_range, AccessMode, CachingMode, Capability, NodeMapConfig, NodeMapError, PortError,
    Value,
};

type Result<T> = core::result::Result<T, NodeMapError>;

/// Failure raised while a formula resolves its operands.
enum EvalError {
    Formula(FormulaError),
    Operand(NodeMapError),
}

impl From<FormulaError> for EvalError {
    fn from(error: FormulaError) -> Self {
        Self::Formula(error)
    }
}

fn port_error(port: &str, error: PortError) -> NodeMapError {
    match error {
        PortError::OutOfRange {
            address,
            length,
            extent,
        } => NodeMapError::OutOfRange {
            port: port.to_string(),
            address,
            length,
            extent,
        },
        PortError::Transport(message) => NodeMapError::Transport {
            port: port.to_string(),
            message,
        },
    }
}

pub(crate) struct Engine<'a> {
    graph: &'a Graph,
    state: &'a mut GraphState,
    config: &'a NodeMapConfig,
    stack: Vec<NodeId>,
    visited: HashSet<NodeId>,
    changed: Vec<NodeId>,
}

impl<'a> Engine<'a> {
    pub(crate) fn new(
        graph: &'a Graph,
        state: &'a mut GraphState,
        config: &'a NodeMapConfig,
    ) -> Self {
        Self {
            graph,
            state,
            config,
            stack: Vec::new(),
            visited: HashSet::new(),
            changed: Vec::new(),
        }
    }

    /// Nodes whose value changed or was invalidated, in visiting order.
    pub(crate) fn into_changed(self) -> Vec<NodeId> {
        self.changed
    }

    fn node(&self, id: NodeId) -> &'a Node {
        self.graph.node(id)
    }

    fn name(&self, id: NodeId) -> &'a str {
        &self.node(id).name
    }

    fn denied(&self, id: NodeId, mode: AccessMode) -> NodeMapError {
        NodeMapError::AccessDenied {
            node: self.name(id).to_string(),
            mode,
        }
    }

    fn wrong_interface(&self, id: NodeId, interface: Capability) -> NodeMapError {
        NodeMapError::WrongInterface {
            node: self.name(id).to_string(),
            interface,
        }
    }

    fn mismatch(&self, id: NodeId, expected: ValueType, actual: &Value) -> NodeMapError {
        NodeMapError::TypeMismatch {
            node: self.name(id).to_string(),
            expected: expected.name(),
            actual: actual.type_name(),
        }
    }

    fn guarded<R>(&mut self, id: NodeId, f: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        if self.stack.contains(&id) || self.stack.len() >= self.config.max_evaluation_depth {
            return Err(NodeMapError::DependencyCycle {
                node: self.name(id).to_string(),
            });
        }
        self.stack.push(id);
        let result = f(self);
        self.stack.pop();
        result
    }

    fn check_compiled(&self, id: NodeId) -> Result<()> {
        self.node(id)
            .producer
            .compile_error()
            .map_or(Ok(()), |error| {
                Err(NodeMapError::formula(self.name(id), error.clone()))
            })
    }

    fn caches(&self, id: NodeId) -> bool {
        self.config.cache_enabled && !self.node(id).volatile
    }

    pub(crate) fn is_cache_valid(&self, id: NodeId) -> bool {
        self.state.nodes[id.index()].cache.is_valid()
    }

    /// Declared access downgraded by availability, lock state, formula
    /// compile failures, and missing inverse formulas.
    pub(crate) fn access_mode(&mut self, id: NodeId) -> Result<AccessMode> {
        let node = self.node(id);
        if node.access == AccessMode::NotImplemented {
            return Ok(AccessMode::NotImplemented);
        }
        if let Some(gate) = node.is_available {
            if !self.read_truthy(gate)? {
                return Ok(AccessMode::NotAvailable);
            }
        }
        let mut mode = node.access;
        if let Some(lock) = node.is_locked {
            if self.read_truthy(lock)? {
                mode = mode.without_write();
            }
        }
        if node.producer.compile_error().is_some() {
            return Ok(AccessMode::NotAvailable);
        }
        if !node.producer.has_inverse() {
            mode = mode.without_write();
        }
        Ok(mode)
    }

    pub(crate) fn read(&mut self, id: NodeId) -> Result<Value> {
        self.check_compiled(id)?;
        self.guarded(id, |engine| {
            let mode = engine.access_mode(id)?;
            if !mode.is_readable() {
                return Err(engine.denied(id, mode));
            }
            if let Some(value) = engine.state.nodes[id.index()].cache.get() {
                return Ok(value.clone());
            }
            let value = engine.produce(id)?;
            if engine.caches(id) {
                let state = &mut engine.state.nodes[id.index()];
                state.cache.store(value.clone());
                state.since_refresh = Duration::ZERO;
            }
            Ok(value)
        })
    }

    fn read_number(&mut self, id: NodeId) -> Result<Number> {
        let value = self.read(id)?;
        value.as_number().ok_or_else(|| NodeMapError::TypeMismatch {
            node: self.name(id).to_string(),
            expected: "number",
            actual: value.type_name(),
        })
    }

    pub(crate) fn read_integer(&mut self, id: NodeId) -> Result<i64> {
        self.read_number(id)?
            .to_i64()
            .map_err(|error| NodeMapError::formula(self.name(id), error))
    }

    fn read_float(&mut self, id: NodeId) -> Result<f64> {
        Ok(self.read_number(id)?.as_f64())
    }

    fn read_truthy(&mut self, id: NodeId) -> Result<bool> {
        Ok(self.read_number(id)?.is_truthy())
    }

    fn bound_integer(&mut self, bound: &Ref<i64>) -> Result<i64> {
        match bound {
            Ref::Value(value) => Ok(*value),
            Ref::Node(node) => self.read_integer(*node),
        }
    }

    fn bound_float(&mut self, bound: &Ref<f64>) -> Result<f64> {
        match bound {
            Ref::Value(value) => Ok(*value),
            Ref::Node(node) => self.read_float(*node),
        }
    }

    fn stored(&self, id: NodeId) -> Result<Value> {
        self.state.nodes[id.index()]
            .stored
            .clone()
            .ok_or_else(|| self.wrong_interface(id, Capability::Value))
    }

    fn produce(&mut self, id: NodeId) -> Result<Value> {
        let node = self.node(id);
        match &node.producer {
            Producer::Integer {
                value: Ref::Node(target),
                ..
            }
            | Producer::Enumeration {
                value: Ref::Node(target),
                ..
            } => Ok(Value::Integer(self.read_integer(*target)?)),
            Producer::Float {
                value: Ref::Node(target),
                ..
            } => Ok(Value::Float(self.read_float(*target)?)),
            Producer::Boolean {
                value: Ref::Node(target),
                on_value,
                ..
            } => Ok(Value::Boolean(self.read_integer(*target)? == *on_value)),
            Producer::String {
                value: Ref::Node(target),
                ..
            } => match self.read(*target)? {
                Value::String(text) => Ok(Value::String(text)),
                other => Err(self.mismatch(*target, ValueType::String, &other)),
            },
            Producer::Integer { .. }
            | Producer::Float { .. }
            | Producer::Boolean { .. }
            | Producer::Enumeration { .. }
            | Producer::String { .. } => self.stored(id),
            Producer::Register(mapping) => Ok(Value::Bytes(self.read_mapping(mapping)?)),
            Producer::IntReg {
                mapping,
                sign,
                endianness,
                field,
            } => {
                let bytes = self.read_mapping(mapping)?;
                codec::decode_integer(&bytes, *endianness, *sign, *field)
                    .map(Value::Integer)
                    .ok_or_else(|| NodeMapError::Overflow {
                        node: self.name(id).to_string(),
                    })
            }
            Producer::FloatReg {
                mapping,
                endianness,
            } => {
                let bytes = self.read_mapping(mapping)?;
                Ok(Value::Float(codec::decode_float(&bytes, *endianness)))
            }
            Producer::StringReg(mapping) => {
                let bytes = self.read_mapping(mapping)?;
                Ok(Value::String(codec::decode_string(&bytes)))
            }
            Producer::Formula(formula) => self.evaluate_formula(id, formula),
            Producer::Converter(converter) => self.evaluate_converter(id, converter),
            Producer::Command { .. } | Producer::Category(_) | Producer::Port { .. } => {
                Err(self.wrong_interface(id, Capability::Value))
            }
        }
    }

    fn operand(
        &mut self,
        node: Option<NodeId>,
        variable: &str,
    ) -> core::result::Result<Number, EvalError> {
        match node {
            Some(node) => self.read_number(node).map_err(EvalError::Operand),
            None => Err(EvalError::Formula(FormulaError::runtime(
                FormulaErrorKind::UnknownReference(variable.to_string()),
            ))),
        }
    }

    fn finish(
        &self,
        id: NodeId,
        result: core::result::Result<Number, EvalError>,
        integer: bool,
    ) -> Result<Value> {
        let number = result.map_err(|error| match error {
            EvalError::Formula(error) => NodeMapError::formula(self.name(id), error),
            EvalError::Operand(error) => error,
        })?;
        if integer {
            number
                .to_i64()
                .map(Value::Integer)
                .map_err(|error| NodeMapError::formula(self.name(id), error))
        } else {
            Ok(Value::Float(number.as_f64()))
        }
    }

    fn evaluate_formula(&mut self, id: NodeId, producer: &'a FormulaProducer) -> Result<Value> {
        let formula = producer
            .formula
            .as_ref()
            .map_err(|error| NodeMapError::formula(self.name(id), error.clone()))?;
        let variables = formula.variables();
        let result = formula.evaluate(|index| {
            let variable = variables.get(index).map_or("", String::as_str);
            self.operand(producer.operands.get(index).copied(), variable)
        });
        self.finish(id, result, producer.integer)
    }

    fn evaluate_converter(
        &mut self,
        id: NodeId,
        converter: &'a ConverterProducer,
    ) -> Result<Value> {
        let formula = converter
            .from
            .as_ref()
            .map_err(|error| NodeMapError::formula(self.name(id), error.clone()))?;
        let variables = formula.variables();
        let result = formula.evaluate(|index| {
            let node = if index == 0 {
                Some(converter.value)
            } else {
                converter.operands.get(index - 1).copied()
            };
            let variable = variables.get(index).map_or("", String::as_str);
            self.operand(node, variable)
        });
        self.finish(id, result, converter.integer)
    }

    /// Numeric bounds of an integer-capable node: `(min, max, increment)`.
    pub(crate) fn integer_bounds(&mut self, id: NodeId) -> Result<(i64, i64, i64)> {
        match &self.node(id).producer {
            Producer::Integer { bounds, .. } => {
                let min = bounds.min.as_ref().map_or(Ok(i64::MIN), |b| self.bound_integer(b))?;
                let max = bounds.max.as_ref().map_or(Ok(i64::MAX), |b| self.bound_integer(b))?;
                let increment = bounds
                    .increment
                    .as_ref()
                    .map_or(Ok(1), |b| self.bound_integer(b))?;
                Ok((min, max, increment))
            }
            Producer::IntReg { sign, field, .. } => {
                let (min, max) = field.bounds(*sign);
                Ok((min, max, 1))
            }
            Producer::Formula(FormulaProducer { integer: true, .. })
            | Producer::Converter(ConverterProducer { integer: true, .. }) => {
                Ok((i64::MIN, i64::MAX, 1))
            }
            _ => Err(self.wrong_interface(id, Capability::Integer)),
        }
    }

    /// Numeric bounds of a float-capable node: `(min, max, increment)`.
    pub(crate) fn float_bounds(&mut self, id: NodeId) -> Result<(f64, f64, Option<f64>)> {
        match &self.node(id).producer {
            Producer::Float { bounds, .. } => {
                let min = bounds.min.as_ref().map_or(Ok(f64::MIN), |b| self.bound_float(b))?;
                let max = bounds.max.as_ref().map_or(Ok(f64::MAX), |b| self.bound_float(b))?;
                let increment = match &bounds.increment {
                    Some(b) => Some(self.bound_float(b)?),
                    None => None,
                };
                Ok((min, max, increment))
            }
            Producer::FloatReg { mapping, .. } if mapping.length == 4 => {
                Ok((f64::from(f32::MIN), f64::from(f32::MAX), None))
            }
            Producer::FloatReg { .. }
            | Producer::Formula(FormulaProducer { integer: false, .. })
            | Producer::Converter(ConverterProducer { integer: false, .. }) => {
                Ok((f64::MIN, f64::MAX, None))
            }
            _ => Err(self.wrong_interface(id, Capability::Float)),
        }
    }

    pub(crate) fn write(&mut self, id: NodeId, value: Value) -> Result<()> {
        self.check_compiled(id)?;
        let node = self.node(id);
        if !node.producer.has_inverse() {
            return Err(NodeMapError::NotWritable {
                node: node.name.clone(),
            });
        }
        self.guarded(id, |engine| {
            let mode = engine.access_mode(id)?;
            if !mode.is_writable() {
                return Err(engine.denied(id, mode));
            }
            let written = engine.apply(id, value)?;
            tracing::debug!(node = %node.name, value = %written, "value written");
            engine.mark_changed(id);
            let keep = node.caching == CachingMode::WriteThrough && engine.caches(id);
            let state = &mut engine.state.nodes[id.index()];
            if keep {
                state.cache.store(written);
                state.since_refresh = Duration::ZERO;
            } else {
                state.cache.invalidate();
            }
            engine.invalidate_dependents(id);
            Ok(())
        })
    }

    /// Converts a numeric value to the type a delegate target stores.
    #[allow(clippy::cast_precision_loss)]
    fn coerce_for(&self, target: NodeId, value: Value) -> Result<Value> {
        match (self.node(target).producer.value_type(), value) {
            (Some(ValueType::Integer), Value::Float(number)) => Number::Float(number)
                .to_i64()
                .map(Value::Integer)
                .map_err(|error| NodeMapError::formula(self.name(target), error)),
            (Some(ValueType::Integer), Value::Boolean(flag)) => Ok(Value::Integer(i64::from(flag))),
            (Some(ValueType::Float), Value::Integer(number)) => Ok(Value::Float(number as f64)),
            (Some(ValueType::Boolean), Value::Integer(number)) => Ok(Value::Boolean(number != 0)),
            (_, value) => Ok(value),
        }
    }

    fn assign<T>(&mut self, id: NodeId, target: &Ref<T>, value: Value) -> Result<()> {
        match target {
            Ref::Value(_) => {
                self.state.nodes[id.index()].stored = Some(value);
                Ok(())
            }
            Ref::Node(target) => {
                let value = self.coerce_for(*target, value)?;
                self.write(*target, value)
            }
        }
    }

    fn expect_integer(&self, id: NodeId, value: &Value) -> Result<i64> {
        value
            .as_integer()
            .ok_or_else(|| self.mismatch(id, ValueType::Integer, value))
    }

    fn expect_float(&self, id: NodeId, value: &Value) -> Result<f64> {
        value
            .as_float()
            .ok_or_else(|| self.mismatch(id, ValueType::Float, value))
    }

    fn expect_string(&self, id: NodeId, value: Value) -> Result<String> {
        match value {
            Value::String(text) => Ok(text),
            other => Err(self.mismatch(id, ValueType::String, &other)),
        }
    }

    fn check_integer(&mut self, id: NodeId, bounds: &IntBounds, value: i64) -> Result<i64> {
        let min = bounds.min.as_ref().map_or(Ok(i64::MIN), |b| self.bound_integer(b))?;
        let max = bounds.max.as_ref().map_or(Ok(i64::MAX), |b| self.bound_integer(b))?;
        let increment = bounds
            .increment
            .as_ref()
            .map_or(Ok(1), |b| self.bound_integer(b))?;
        range::align_integer(value, min, max, increment, bounds.policy)
            .map_err(|detail| NodeMapError::range(self.name(id), detail))
    }

    /// Performs the kind-specific part of a write and returns the value to
    /// cache.
    #[allow(clippy::too_many_lines)]
    fn apply(&mut self, id: NodeId, value: Value) -> Result<Value> {
        let node = self.node(id);
        match &node.producer {
            Producer::Integer { value: target, bounds } => {
                let requested = self.expect_integer(id, &value)?;
                let aligned = self.check_integer(id, bounds, requested)?;
                self.assign(id, target, Value::Integer(aligned))?;
                Ok(Value::Integer(aligned))
            }
            Producer::Float {
                value: target,
                bounds,
            } => {
                let requested = self.expect_float(id, &value)?;
                let (min, max, increment) = self.float_bounds(id)?;
                let aligned = range::align_float(requested, min, max, increment, bounds.policy)
                    .map_err(|detail| NodeMapError::range(&node.name, detail))?;
                self.assign(id, target, Value::Float(aligned))?;
                Ok(Value::Float(aligned))
            }
            Producer::Boolean {
                value: target,
                on_value,
                off_value,
            } => {
                let flag = match value {
                    Value::Boolean(flag) => flag,
                    Value::Integer(number) => number != 0,
                    other => return Err(self.mismatch(id, ValueType::Boolean, &other)),
                };
                match target {
                    Ref::Value(_) => {
                        self.state.nodes[id.index()].stored = Some(Value::Boolean(flag));
                    }
                    Ref::Node(target) => {
                        let raw = Value::Integer(if flag { *on_value } else { *off_value });
                        let raw = self.coerce_for(*target, raw)?;
                        self.write(*target, raw)?;
                    }
                }
                Ok(Value::Boolean(flag))
            }
            Producer::Enumeration {
                value: target,
                entries,
            } => {
                let entry = match &value {
                    Value::Integer(number) => entries.iter().find(|entry| entry.value == *number),
                    Value::String(symbol) => entries.iter().find(|entry| entry.name == *symbol),
                    other => return Err(self.mismatch(id, ValueType::Integer, other)),
                }
                .ok_or_else(|| NodeMapError::range(&node.name, format!("no entry for {value}")))?;
                if !self.entry_available(entry)? {
                    return Err(NodeMapError::range(
                        &node.name,
                        format!("entry `{}` is not available", entry.name),
                    ));
                }
                self.assign(id, target, Value::Integer(entry.value))?;
                Ok(Value::Integer(entry.value))
            }
            Producer::String {
                value: target,
                max_length,
            } => {
                let text = self.expect_string(id, value)?;
                if let Some(limit) = max_length.filter(|limit| text.len() > *limit) {
                    return Err(NodeMapError::range(
                        &node.name,
                        format!("{} bytes exceed maximum length {limit}", text.len()),
                    ));
                }
                self.assign(id, target, Value::String(text.clone()))?;
                Ok(Value::String(text))
            }
            Producer::Register(mapping) => {
                let bytes = match value {
                    Value::Bytes(bytes) => bytes,
                    other => return Err(self.mismatch(id, ValueType::Bytes, &other)),
                };
                self.check_length(id, mapping, bytes.len())?;
                self.write_mapping(mapping, &bytes)?;
                Ok(Value::Bytes(bytes))
            }
            Producer::IntReg {
                mapping,
                sign,
                endianness,
                field,
            } => {
                let requested = self.expect_integer(id, &value)?;
                let (min, max) = field.bounds(*sign);
                if requested < min || requested > max {
                    return Err(NodeMapError::range(
                        &node.name,
                        format!("{requested} outside [{min}, {max}]"),
                    ));
                }
                let mut register = if field.covers(mapping.length) {
                    vec![0; mapping.length]
                } else {
                    self.read_mapping(mapping)?
                };
                codec::encode_integer(requested, &mut register, *endianness, *field);
                self.write_mapping(mapping, &register)?;
                Ok(Value::Integer(requested))
            }
            Producer::FloatReg {
                mapping,
                endianness,
            } => {
                let requested = self.expect_float(id, &value)?;
                let (min, max, _) = self.float_bounds(id)?;
                if !requested.is_finite() || requested < min || requested > max {
                    return Err(NodeMapError::range(
                        &node.name,
                        format!("{requested} does not fit a {}-byte register", mapping.length),
                    ));
                }
                let mut register = vec![0; mapping.length];
                codec::encode_float(requested, &mut register, *endianness);
                self.write_mapping(mapping, &register)?;
                Ok(Value::Float(requested))
            }
            Producer::StringReg(mapping) => {
                let text = self.expect_string(id, value)?;
                if text.len() > mapping.length {
                    return Err(NodeMapError::range(
                        &node.name,
                        format!("{} bytes exceed register length {}", text.len(), mapping.length),
                    ));
                }
                let mut register = vec![0; mapping.length];
                register[..text.len()].copy_from_slice(text.as_bytes());
                self.write_mapping(mapping, &register)?;
                Ok(Value::String(text))
            }
            Producer::Converter(converter) => self.apply_converter(id, converter, &value),
            Producer::Formula(_) => Err(NodeMapError::NotWritable {
                node: node.name.clone(),
            }),
            Producer::Command { .. } | Producer::Category(_) | Producer::Port { .. } => {
                Err(self.wrong_interface(id, Capability::Value))
            }
        }
    }

    fn apply_converter(
        &mut self,
        id: NodeId,
        converter: &'a ConverterProducer,
        value: &Value,
    ) -> Result<Value> {
        let input = value.as_number().ok_or_else(|| {
            self.mismatch(
                id,
                if converter.integer {
                    ValueType::Integer
                } else {
                    ValueType::Float
                },
                value,
            )
        })?;
        let formula = match &converter.to {
            None => {
                return Err(NodeMapError::NotWritable {
                    node: self.name(id).to_string(),
                })
            }
            Some(to) => to
                .as_ref()
                .map_err(|error| NodeMapError::formula(self.name(id), error.clone()))?,
        };
        let variables = formula.variables();
        let result = formula.evaluate(|index| {
            if index == 0 {
                return Ok(input);
            }
            let variable = variables.get(index).map_or("", String::as_str);
            self.operand(converter.operands.get(index - 1).copied(), variable)
        });
        let raw = self.finish(id, result, false)?;
        let raw = self.coerce_for(converter.value, raw)?;
        self.write(converter.value, raw)?;
        if converter.integer {
            input
                .to_i64()
                .map(Value::Integer)
                .map_err(|error| NodeMapError::formula(self.name(id), error))
        } else {
            Ok(Value::Float(input.as_f64()))
        }
    }

    /// Whether an enumeration entry is implemented and available right now.
    pub(crate) fn entry_available(&mut self, entry: &EnumEntry) -> Result<bool> {
        for gate in [entry.is_implemented, entry.is_available].into_iter().flatten() {
            if !self.read_truthy(gate)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub(crate) fn entries(&self, id: NodeId) -> Result<&'a [EnumEntry]> {
        match &self.node(id).producer {
            Producer::Enumeration { entries, .. } => Ok(entries),
            _ => Err(self.wrong_interface(id, Capability::Enumeration)),
        }
    }

    fn check_length(&self, id: NodeId, mapping: &Mapping, actual: usize) -> Result<()> {
        if actual == mapping.length {
            Ok(())
        } else {
            Err(NodeMapError::SizeMismatch {
                node: self.name(id).to_string(),
                expected: mapping.length,
                actual,
            })
        }
    }

    fn resolve_address(&mut self, mapping: &Mapping) -> Result<u64> {
        let mut address = i128::from(mapping.address);
        for node in &mapping.address_nodes {
            address += i128::from(self.read_integer(*node)?);
        }
        if let Some((node, stride)) = mapping.index {
            address += i128::from(self.read_integer(node)?) * i128::from(stride);
        }
        u64::try_from(address).map_err(|_| NodeMapError::OutOfRange {
            port: self.name(mapping.port).to_string(),
            address: mapping.address,
            length: mapping.length,
            extent: self.state.ports[mapping.slot].extent(),
        })
    }

    fn read_mapping(&mut self, mapping: &Mapping) -> Result<Vec<u8>> {
        let address = self.resolve_address(mapping)?;
        let mut buffer = vec![0; mapping.length];
        self.port_read(mapping.port, mapping.slot, address, &mut buffer)?;
        Ok(buffer)
    }

    fn write_mapping(&mut self, mapping: &Mapping, data: &[u8]) -> Result<()> {
        let address = self.resolve_address(mapping)?;
        self.port_write(mapping.port, mapping.slot, address, data)
    }

    fn port_read(
        &mut self,
        port: NodeId,
        slot: usize,
        address: u64,
        buffer: &mut [u8],
    ) -> Result<()> {
        let name = self.name(port);
        let transport = &mut self.state.ports[slot];
        validate_range(address, buffer.len(), transport.extent())
            .map_err(|error| port_error(name, error))?;
        tracing::trace!(port = name, address, length = buffer.len(), "port read");
        transport
            .as_port()
            .read(address, buffer)
            .map_err(|error| port_error(name, error))
    }

    fn port_write(&mut self, port: NodeId, slot: usize, address: u64, data: &[u8]) -> Result<()> {
        let name = self.name(port);
        let transport = &mut self.state.ports[slot];
        validate_range(address, data.len(), transport.extent())
            .map_err(|error| port_error(name, error))?;
        tracing::trace!(port = name, address, length = data.len(), "port write");
        transport
            .as_port()
            .write(address, data)
            .map_err(|error| port_error(name, error))
    }

    fn mapping(&self, id: NodeId) -> Result<&'a Mapping> {
        self.node(id)
            .producer
            .mapping()
            .ok_or_else(|| self.wrong_interface(id, Capability::Register))
    }

    pub(crate) fn register_length(&self, id: NodeId) -> Result<usize> {
        Ok(self.mapping(id)?.length)
    }

    pub(crate) fn register_address(&mut self, id: NodeId) -> Result<u64> {
        let mapping = self.mapping(id)?;
        self.resolve_address(mapping)
    }

    /// Reads raw register bytes from the port, bypassing the value cache.
    pub(crate) fn read_register(&mut self, id: NodeId, buffer: &mut [u8]) -> Result<()> {
        let mapping = self.mapping(id)?;
        self.check_length(id, mapping, buffer.len())?;
        self.guarded(id, |engine| {
            let mode = engine.access_mode(id)?;
            if !mode.is_readable() {
                return Err(engine.denied(id, mode));
            }
            let bytes = engine.read_mapping(mapping)?;
            buffer.copy_from_slice(&bytes);
            Ok(())
        })
    }

    pub(crate) fn write_register(&mut self, id: NodeId, data: &[u8]) -> Result<()> {
        let mapping = self.mapping(id)?;
        self.check_length(id, mapping, data.len())?;
        self.guarded(id, |engine| {
            let mode = engine.access_mode(id)?;
            if !mode.is_writable() {
                return Err(engine.denied(id, mode));
            }
            engine.write_mapping(mapping, data)?;
            engine.invalidate(id);
            Ok(())
        })
    }

    fn port_slot(&self, id: NodeId) -> Result<usize> {
        match &self.node(id).producer {
            Producer::Port { slot, .. } => Ok(*slot),
            _ => Err(self.wrong_interface(id, Capability::Port)),
        }
    }

    pub(crate) fn port_extent(&self, id: NodeId) -> Result<u64> {
        Ok(self.state.ports[self.port_slot(id)?].extent())
    }

    pub(crate) fn read_port(&mut self, id: NodeId, address: u64, buffer: &mut [u8]) -> Result<()> {
        let slot = self.port_slot(id)?;
        self.port_read(id, slot, address, buffer)
    }

    /// Writes raw bytes and invalidates everything mapped onto the port.
    pub(crate) fn write_port(&mut self, id: NodeId, address: u64, data: &[u8]) -> Result<()> {
        let slot = self.port_slot(id)?;
        self.port_write(id, slot, address, data)?;
        self.invalidate_dependents(id);
        Ok(())
    }

    /// Replaces the payload of a chunk port and invalidates its dependents.
    /// Returns the number of invalidated nodes.
    pub(crate) fn inject(&mut self, id: NodeId, payload: &[u8]) -> usize {
        if let Producer::Port { slot, .. } = &self.node(id).producer {
            if let Some(chunk) = self.state.ports[*slot].as_chunk_mut() {
                chunk.inject(payload);
            }
        }
        let before = self.changed.len();
        self.invalidate_dependents(id);
        self.changed.len() - before
    }

    pub(crate) fn execute(&mut self, id: NodeId) -> Result<()> {
        let node = self.node(id);
        let Producer::Command {
            value,
            command_value,
        } = &node.producer
        else {
            return Err(self.wrong_interface(id, Capability::Command));
        };
        self.guarded(id, |engine| {
            let mode = engine.access_mode(id)?;
            if !mode.is_writable() {
                return Err(engine.denied(id, mode));
            }
            let command = engine.bound_integer(command_value)?;
            let raw = engine.coerce_for(*value, Value::Integer(command))?;
            engine.write(*value, raw)?;
            engine.state.nodes[id.index()].command_pending = true;
            tracing::debug!(node = %node.name, command, "command executed");
            Ok(())
        })
    }

    /// Re-reads the command register, bypassing its cache. The command is
    /// done once the register no longer holds the command value.
    pub(crate) fn is_done(&mut self, id: NodeId) -> Result<bool> {
        let Producer::Command {
            value,
            command_value,
        } = &self.node(id).producer
        else {
            return Err(self.wrong_interface(id, Capability::Command));
        };
        if !self.state.nodes[id.index()].command_pending {
            return Ok(true);
        }
        self.state.nodes[value.index()].cache.invalidate();
        let current = self.read_integer(*value)?;
        if current == self.bound_integer(command_value)? {
            return Ok(false);
        }
        self.state.nodes[id.index()].command_pending = false;
        self.invalidate_dependents(*value);
        Ok(true)
    }

    fn mark_changed(&mut self, id: NodeId) {
        if self.visited.insert(id) {
            self.changed.push(id);
        }
    }

    /// Invalidates the transitive dependents of `id`, each at most once per
    /// operation.
    pub(crate) fn invalidate_dependents(&mut self, id: NodeId) {
        let mut queue: VecDeque<NodeId> = self.node(id).invalidates.iter().copied().collect();
        while let Some(next) = queue.pop_front() {
            if !self.visited.insert(next) {
                continue;
            }
            self.state.nodes[next.index()].cache.invalidate();
            self.changed.push(next);
            queue.extend(self.node(next).invalidates.iter().copied());
        }
    }

    /// Invalidates `id` and its transitive dependents.
    pub(crate) fn invalidate(&mut self, id: NodeId) {
        self.state.nodes[id.index()].cache.invalidate();
        self.mark_changed(id);
        self.invalidate_dependents(id);
    }

    pub(crate) fn invalidate_all(&mut self) {
        for state in &mut self.state.nodes {
            state.cache.invalidate();
        }
    }

    /// Advances polling timers and invalidates nodes whose period elapsed.
    pub(crate) fn poll(&mut self, elapsed: Duration) {
        for id in self.graph.ids() {
            let Some(period) = self.node(id).polling_time else {
                continue;
            };
            let state = &mut self.state.nodes[id.index()];
            state.since_refresh = state.since_refresh.saturating_add(elapsed);
            if state.since_refresh >= period {
                state.since_refresh = Duration::ZERO;
                self.invalidate(id);
            }
        }
    }
}
