use std::path::PathBuf;

use nodemap_core::InterfaceVersion;
use thiserror::Error;

/// Why a module could not be loaded.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// The library could not be opened.
    #[error("cannot open module `{}`: {message}", .path.display())]
    Open {
        /// Library path.
        path: PathBuf,
        /// Platform loader message.
        message: String,
    },
    /// A required entry point is not exported.
    #[error("module `{}` does not export `{symbol}`: {message}", .path.display())]
    MissingSymbol {
        /// Library path.
        path: PathBuf,
        /// Missing symbol name.
        symbol: &'static str,
        /// Platform loader message.
        message: String,
    },
    /// The module was built against an incompatible interface.
    #[error(
        "module `{}` implements interface {module}, loader requires {required}",
        .path.display()
    )]
    IncompatibleVersion {
        /// Library path.
        path: PathBuf,
        /// Version reported by the module.
        module: InterfaceVersion,
        /// Version required by the loader.
        required: InterfaceVersion,
    },
    /// The device name contains an interior NUL byte.
    #[error("device name `{0}` contains a NUL byte")]
    InvalidDevice(String),
    /// The module's factory returned no node map.
    #[error("module `{}` failed to create a node map for `{device}`", .path.display())]
    CreationFailed {
        /// Library path.
        path: PathBuf,
        /// Requested device.
        device: String,
    },
}
