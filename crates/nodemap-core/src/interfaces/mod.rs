//! Capability tags and the typed views that expose them.

use core::fmt;

mod boolean;
pub use boolean::BooleanView;

mod category;
pub use category::CategoryView;

mod command;
pub use command::CommandView;

mod enumeration;
pub use enumeration::{EnumEntryInfo, EnumerationView};

mod float;
pub use float::FloatView;

mod integer;
pub use integer::IntegerView;

mod port;
pub use port::PortView;

mod register;
pub use register::RegisterView;

mod selector;
pub use selector::SelectorView;

mod string;
pub use string::StringView;

/// Interface a node can be used through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Capability {
    /// Generic value access.
    Value,
    /// `IInteger`
    Integer,
    /// `IFloat`
    Float,
    /// `IBoolean`
    Boolean,
    /// `IEnumeration`
    Enumeration,
    /// `IString`
    String,
    /// `IRegister`
    Register,
    /// `ICommand`
    Command,
    /// `ISelector`
    Selector,
    /// `ICategory`
    Category,
    /// `IPort`
    Port,
}

impl Capability {
    /// Every capability in declaration order.
    pub const ALL: [Self; 11] = [
        Self::Value,
        Self::Integer,
        Self::Float,
        Self::Boolean,
        Self::Enumeration,
        Self::String,
        Self::Register,
        Self::Command,
        Self::Selector,
        Self::Category,
        Self::Port,
    ];

    const fn bit(self) -> u16 {
        1 << self as u16
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Value => "IValue",
            Self::Integer => "IInteger",
            Self::Float => "IFloat",
            Self::Boolean => "IBoolean",
            Self::Enumeration => "IEnumeration",
            Self::String => "IString",
            Self::Register => "IRegister",
            Self::Command => "ICommand",
            Self::Selector => "ISelector",
            Self::Category => "ICategory",
            Self::Port => "IPort",
        })
    }
}

/// Set of capability tags carried by a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CapabilitySet(u16);

impl CapabilitySet {
    /// Empty set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Returns the set with `capability` added.
    #[must_use]
    pub const fn with(self, capability: Capability) -> Self {
        Self(self.0 | capability.bit())
    }

    /// Whether `capability` is present.
    #[must_use]
    pub const fn contains(self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    /// Present capabilities in declaration order.
    pub fn iter(self) -> impl Iterator<Item = Capability> {
        Capability::ALL
            .into_iter()
            .filter(move |capability| self.contains(*capability))
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), Self::with)
    }
}
