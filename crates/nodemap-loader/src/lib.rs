//! Dynamic loading of vendor node map modules.
//!
//! A module is a dynamic library exporting two well-known symbols (see
//! [`abi`]): one reporting the interface version it was built against and one
//! creating a [`NodeMap`] for a named device. [`ModuleLoader`] checks the
//! version before creating anything and always destroys a module's node map
//! before releasing the library that contains its code.

/// Exported symbol names, entry point types, and the export macro.
pub mod abi;
pub use abi::{CreateNodeMapFn, InterfaceVersionFn, ModuleEntryPoints};

/// Loader failures.
pub mod error;
pub use error::LoaderError;

/// Loader configuration.
pub mod config;
pub use config::LoaderConfig;

/// Where module libraries come from.
pub mod source;
pub use source::{DynamicLibrary, DynamicLibrarySource, ModuleLibrary, ModuleSource};

/// Module bookkeeping and teardown ordering.
pub mod loader;
pub use loader::{LoadedModule, ModuleLoader};

pub use nodemap_core::{BuildError, InterfaceVersion, NodeMap};

#[cfg(test)]
use tempfile as _;
