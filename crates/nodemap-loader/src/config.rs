use nodemap_core::InterfaceVersion;

/// Loader options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LoaderConfig {
    /// Version modules must satisfy; see [`InterfaceVersion::satisfies`].
    pub interface_version: InterfaceVersion,
}

impl LoaderConfig {
    /// Requires `interface_version` from every module.
    #[must_use]
    pub const fn requiring(interface_version: InterfaceVersion) -> Self {
        Self { interface_version }
    }
}
