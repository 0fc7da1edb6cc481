//! Declarative node descriptions consumed by [`NodeMapBuilder`].
//!
//! Descriptions reference other nodes by name; the builder resolves names,
//! compiles formulas, and derives the dependency graph.
//!
//! [`NodeMapBuilder`]: crate::NodeMapBuilder

use core::fmt;
use core::time::Duration;

/// Declared access mode of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum AccessMode {
    /// Readable and writable.
    #[default]
    ReadWrite,
    /// Readable only.
    ReadOnly,
    /// Writable only.
    WriteOnly,
    /// Temporarily not available.
    NotAvailable,
    /// Not implemented by the device.
    NotImplemented,
}

impl AccessMode {
    /// Whether reads are allowed.
    #[must_use]
    pub const fn is_readable(self) -> bool {
        matches!(self, Self::ReadWrite | Self::ReadOnly)
    }

    /// Whether writes are allowed.
    #[must_use]
    pub const fn is_writable(self) -> bool {
        matches!(self, Self::ReadWrite | Self::WriteOnly)
    }

    /// Removes write permission.
    #[must_use]
    pub const fn without_write(self) -> Self {
        match self {
            Self::ReadWrite => Self::ReadOnly,
            Self::WriteOnly => Self::NotAvailable,
            other => other,
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ReadWrite => "RW",
            Self::ReadOnly => "RO",
            Self::WriteOnly => "WO",
            Self::NotAvailable => "NA",
            Self::NotImplemented => "NI",
        })
    }
}

/// Audience a feature is intended for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Visibility {
    /// Shown to everyone.
    #[default]
    Beginner,
    /// Shown to experienced users.
    Expert,
    /// Shown to specialists.
    Guru,
    /// Hidden.
    Invisible,
}

/// How a node caches its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum CachingMode {
    /// Reads and writes fill the cache.
    #[default]
    WriteThrough,
    /// Reads fill the cache; writes invalidate it.
    WriteAround,
    /// Every read evaluates.
    NoCache,
}

/// Handling of written values that are not aligned to the increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum IncrementPolicy {
    /// Fail with a range error.
    #[default]
    Reject,
    /// Round down to the previous valid step.
    Truncate,
    /// Round to the closest valid step not above the maximum.
    Nearest,
}

/// Byte order of a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Endianness {
    /// Least significant byte first.
    #[default]
    Little,
    /// Most significant byte first.
    Big,
}

/// Signedness of an integer register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Sign {
    /// Two's complement.
    Signed,
    /// Unsigned.
    #[default]
    Unsigned,
}

/// A literal value or a reference to the node providing it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Source<T> {
    /// Literal value.
    Value(T),
    /// Name of the node providing the value.
    Node(String),
}

impl<T> Source<T> {
    /// Reference to the node called `name`.
    pub fn node(name: impl Into<String>) -> Self {
        Self::Node(name.into())
    }
}

impl<T> From<T> for Source<T> {
    fn from(value: T) -> Self {
        Self::Value(value)
    }
}

/// Integer feature with optional bounds.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct IntegerDescription {
    /// Stored initial value or delegate node.
    pub value: Source<i64>,
    /// Lower bound; `i64::MIN` when absent.
    pub min: Option<Source<i64>>,
    /// Upper bound; `i64::MAX` when absent.
    pub max: Option<Source<i64>>,
    /// Step between valid values; `1` when absent.
    pub increment: Option<Source<i64>>,
    /// Handling of misaligned writes.
    pub policy: IncrementPolicy,
    /// Physical unit.
    pub unit: Option<String>,
}

impl IntegerDescription {
    /// Unbounded integer with `value`.
    pub fn new(value: impl Into<Source<i64>>) -> Self {
        Self {
            value: value.into(),
            min: None,
            max: None,
            increment: None,
            policy: IncrementPolicy::Reject,
            unit: None,
        }
    }

    /// Sets the bounds.
    #[must_use]
    pub fn with_range(mut self, min: impl Into<Source<i64>>, max: impl Into<Source<i64>>) -> Self {
        self.min = Some(min.into());
        self.max = Some(max.into());
        self
    }

    /// Sets the increment and its policy.
    #[must_use]
    pub fn with_increment(
        mut self,
        increment: impl Into<Source<i64>>,
        policy: IncrementPolicy,
    ) -> Self {
        self.increment = Some(increment.into());
        self.policy = policy;
        self
    }
}

/// Float feature with optional bounds.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct FloatDescription {
    /// Stored initial value or delegate node.
    pub value: Source<f64>,
    /// Lower bound; `f64::MIN` when absent.
    pub min: Option<Source<f64>>,
    /// Upper bound; `f64::MAX` when absent.
    pub max: Option<Source<f64>>,
    /// Step between valid values; continuous when absent.
    pub increment: Option<Source<f64>>,
    /// Handling of misaligned writes.
    pub policy: IncrementPolicy,
    /// Physical unit.
    pub unit: Option<String>,
}

impl FloatDescription {
    /// Unbounded float with `value`.
    pub fn new(value: impl Into<Source<f64>>) -> Self {
        Self {
            value: value.into(),
            min: None,
            max: None,
            increment: None,
            policy: IncrementPolicy::Reject,
            unit: None,
        }
    }

    /// Sets the bounds.
    #[must_use]
    pub fn with_range(mut self, min: impl Into<Source<f64>>, max: impl Into<Source<f64>>) -> Self {
        self.min = Some(min.into());
        self.max = Some(max.into());
        self
    }

    /// Sets the increment and its policy.
    #[must_use]
    pub fn with_increment(
        mut self,
        increment: impl Into<Source<f64>>,
        policy: IncrementPolicy,
    ) -> Self {
        self.increment = Some(increment.into());
        self.policy = policy;
        self
    }
}

/// Boolean feature. A delegate node is compared against `on_value`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct BooleanDescription {
    /// Stored initial value or delegate integer node.
    pub value: Source<bool>,
    /// Delegate value meaning `true`.
    pub on_value: i64,
    /// Delegate value written for `false`.
    pub off_value: i64,
}

impl BooleanDescription {
    /// Boolean with `value`, using `1`/`0` as delegate values.
    pub fn new(value: impl Into<Source<bool>>) -> Self {
        Self {
            value: value.into(),
            on_value: 1,
            off_value: 0,
        }
    }
}

/// One symbolic value of an enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct EnumEntryDescription {
    /// Symbolic name.
    pub name: String,
    /// Integer value.
    pub value: i64,
    /// Display name; the symbolic name when absent.
    pub display_name: Option<String>,
    /// Node whose non-zero value makes the entry available.
    pub is_available: Option<String>,
    /// Node whose non-zero value makes the entry implemented.
    pub is_implemented: Option<String>,
}

impl EnumEntryDescription {
    /// Always-available entry.
    pub fn new(name: impl Into<String>, value: i64) -> Self {
        Self {
            name: name.into(),
            value,
            display_name: None,
            is_available: None,
            is_implemented: None,
        }
    }

    /// Gates availability on `node`.
    #[must_use]
    pub fn available_if(mut self, node: impl Into<String>) -> Self {
        self.is_available = Some(node.into());
        self
    }
}

/// Enumeration feature.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct EnumerationDescription {
    /// Stored initial integer value or delegate node.
    pub value: Source<i64>,
    /// Entries in declaration order.
    pub entries: Vec<EnumEntryDescription>,
}

/// String feature.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct StringDescription {
    /// Stored initial value or delegate node.
    pub value: Source<String>,
    /// Longest accepted value in bytes.
    pub max_length: Option<usize>,
}

/// Index term of a register address: `node value * stride`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct IndexDescription {
    /// Node providing the index.
    pub node: String,
    /// Bytes per index step.
    pub stride: u64,
}

/// Where a register lives.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RegisterDescription {
    /// Port node carrying the register.
    pub port: String,
    /// Base address.
    pub address: u64,
    /// Nodes whose values are added to the base address.
    pub address_nodes: Vec<String>,
    /// Optional indexed offset.
    pub index: Option<IndexDescription>,
    /// Register length in bytes.
    pub length: usize,
}

impl RegisterDescription {
    /// Register of `length` bytes at `address` on `port`.
    pub fn new(port: impl Into<String>, address: u64, length: usize) -> Self {
        Self {
            port: port.into(),
            address,
            address_nodes: Vec::new(),
            index: None,
            length,
        }
    }

    /// Adds an indexed offset.
    #[must_use]
    pub fn with_index(mut self, node: impl Into<String>, stride: u64) -> Self {
        self.index = Some(IndexDescription {
            node: node.into(),
            stride,
        });
        self
    }
}

/// Integer register.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct IntRegDescription {
    /// Register location.
    pub register: RegisterDescription,
    /// Signedness.
    pub sign: Sign,
    /// Byte order.
    pub endianness: Endianness,
    /// Inclusive `(lsb, msb)` bit field; whole register when absent.
    /// Bit 0 is the least significant bit of the decoded register value.
    pub bits: Option<(u8, u8)>,
}

impl IntRegDescription {
    /// Unsigned little-endian register covering all bits.
    #[must_use]
    pub const fn new(register: RegisterDescription) -> Self {
        Self {
            register,
            sign: Sign::Unsigned,
            endianness: Endianness::Little,
            bits: None,
        }
    }
}

/// IEEE-754 register of 4 or 8 bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct FloatRegDescription {
    /// Register location.
    pub register: RegisterDescription,
    /// Byte order.
    pub endianness: Endianness,
}

/// Binds a formula variable to the node providing its value.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct OperandDescription {
    /// Variable name used in the formula text.
    pub variable: String,
    /// Node providing the value.
    pub node: String,
}

impl OperandDescription {
    /// Binds `variable` to `node`.
    pub fn new(variable: impl Into<String>, node: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            node: node.into(),
        }
    }
}

/// Read-only computed node.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct FormulaDescription {
    /// Formula text.
    pub formula: String,
    /// Variable bindings.
    pub operands: Vec<OperandDescription>,
}

/// Computed node with a forward and an optional inverse formula.
///
/// `formula_from` sees the writable operand as `FROM`; `formula_to` sees the
/// written value as `TO` and its result is written to `value`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ConverterDescription {
    /// Writable operand node.
    pub value: String,
    /// Forward formula.
    pub formula_from: String,
    /// Inverse formula; the node is not writable without it.
    pub formula_to: Option<String>,
    /// Additional variable bindings shared by both formulas.
    pub operands: Vec<OperandDescription>,
}

/// Command feature.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CommandDescription {
    /// Integer node receiving the command value.
    pub value: String,
    /// Value written on execute.
    pub command_value: Source<i64>,
}

/// Port node. Ports with an event id are served by a [`ChunkPort`] and fed
/// through the event adapter; all others need a bound transport.
///
/// [`ChunkPort`]: crate::ChunkPort
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct PortDescription {
    /// Event or chunk id in uppercase hexadecimal.
    pub event_id: Option<String>,
}

/// Kind-specific part of a node description.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum NodeKind {
    /// `Integer`
    Integer(IntegerDescription),
    /// `Float`
    Float(FloatDescription),
    /// `Boolean`
    Boolean(BooleanDescription),
    /// `Enumeration`
    Enumeration(EnumerationDescription),
    /// `String`
    String(StringDescription),
    /// Raw register.
    Register(RegisterDescription),
    /// Integer register.
    IntReg(IntRegDescription),
    /// Float register.
    FloatReg(FloatRegDescription),
    /// Zero-padded string register.
    StringReg(RegisterDescription),
    /// Integer formula.
    IntSwissKnife(FormulaDescription),
    /// Float formula.
    SwissKnife(FormulaDescription),
    /// Integer converter.
    IntConverter(ConverterDescription),
    /// Float converter.
    Converter(ConverterDescription),
    /// Command.
    Command(CommandDescription),
    /// Category listing other features.
    Category(Vec<String>),
    /// Port.
    Port(PortDescription),
}

/// Complete description of one node.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct NodeDescription {
    /// Unique node name.
    pub name: String,
    /// Display name.
    pub display_name: Option<String>,
    /// Long description.
    pub description: Option<String>,
    /// Short tooltip.
    pub tooltip: Option<String>,
    /// Intended audience.
    pub visibility: Visibility,
    /// Declared access mode.
    pub access: AccessMode,
    /// Caching behaviour.
    pub caching: CachingMode,
    /// Cache lifetime for polled nodes.
    pub polling_time: Option<Duration>,
    /// Nodes whose changes invalidate this node.
    pub invalidators: Vec<String>,
    /// Node whose zero value makes this node unavailable.
    pub is_available: Option<String>,
    /// Node whose non-zero value makes this node read-only.
    pub is_locked: Option<String>,
    /// Features whose meaning depends on this selector.
    pub selected: Vec<String>,
    /// Kind and kind-specific data.
    pub kind: NodeKind,
}

impl NodeDescription {
    /// Read-write, write-through node called `name`.
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            description: None,
            tooltip: None,
            visibility: Visibility::Beginner,
            access: AccessMode::ReadWrite,
            caching: CachingMode::WriteThrough,
            polling_time: None,
            invalidators: Vec::new(),
            is_available: None,
            is_locked: None,
            selected: Vec::new(),
            kind,
        }
    }

    /// Stored integer.
    pub fn integer(name: impl Into<String>, value: i64) -> Self {
        Self::new(name, NodeKind::Integer(IntegerDescription::new(value)))
    }

    /// Stored float.
    pub fn float(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, NodeKind::Float(FloatDescription::new(value)))
    }

    /// Read-only integer formula over `operands`, given as `(variable, node)`.
    pub fn int_swiss_knife(
        name: impl Into<String>,
        formula: &str,
        operands: &[(&str, &str)],
    ) -> Self {
        Self::new(
            name,
            NodeKind::IntSwissKnife(FormulaDescription {
                formula: formula.to_string(),
                operands: operands
                    .iter()
                    .map(|(variable, node)| OperandDescription::new(*variable, *node))
                    .collect(),
            }),
        )
        .with_access(AccessMode::ReadOnly)
    }

    /// Sets the declared access mode.
    #[must_use]
    pub const fn with_access(mut self, access: AccessMode) -> Self {
        self.access = access;
        self
    }

    /// Sets the caching mode.
    #[must_use]
    pub const fn with_caching(mut self, caching: CachingMode) -> Self {
        self.caching = caching;
        self
    }

    /// Sets the polling time.
    #[must_use]
    pub const fn with_polling_time(mut self, polling_time: Duration) -> Self {
        self.polling_time = Some(polling_time);
        self
    }

    /// Sets the visibility.
    #[must_use]
    pub const fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Sets the description text.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Adds invalidator nodes.
    #[must_use]
    pub fn with_invalidators<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.invalidators.extend(names.into_iter().map(Into::into));
        self
    }

    /// Adds selected features.
    #[must_use]
    pub fn with_selected<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected.extend(names.into_iter().map(Into::into));
        self
    }

    /// Gates availability on `node`.
    #[must_use]
    pub fn with_is_available(mut self, node: impl Into<String>) -> Self {
        self.is_available = Some(node.into());
        self
    }

    /// Gates writability on `node`.
    #[must_use]
    pub fn with_is_locked(mut self, node: impl Into<String>) -> Self {
        self.is_locked = Some(node.into());
        self
    }
}
