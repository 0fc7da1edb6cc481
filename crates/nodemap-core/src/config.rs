use core::fmt;

/// Default bound on nested node evaluations within one operation.
pub const DEFAULT_MAX_EVALUATION_DEPTH: usize = 64;

/// Interface version exchanged between a module and its consumer.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct InterfaceVersion {
    /// Incremented on breaking changes.
    pub major: u32,
    /// Incremented on backwards compatible additions.
    pub minor: u32,
}

impl InterfaceVersion {
    /// Version implemented by this crate.
    pub const CURRENT: Self = Self::new(1, 0);

    /// Creates a version.
    #[must_use]
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// A provider satisfies `required` when the major versions match and
    /// the provider's minor version is at least the required one.
    #[must_use]
    pub const fn satisfies(self, required: Self) -> bool {
        self.major == required.major && self.minor >= required.minor
    }
}

impl Default for InterfaceVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

impl fmt::Display for InterfaceVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Node map construction options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct NodeMapConfig {
    /// Version reported to module consumers.
    pub interface_version: InterfaceVersion,
    /// Global switch for value caching; `false` makes every read evaluate.
    pub cache_enabled: bool,
    /// Nested evaluations allowed before reporting a dependency cycle.
    pub max_evaluation_depth: usize,
}

impl Default for NodeMapConfig {
    fn default() -> Self {
        Self {
            interface_version: InterfaceVersion::CURRENT,
            cache_enabled: true,
            max_evaluation_depth: DEFAULT_MAX_EVALUATION_DEPTH,
        }
    }
}
