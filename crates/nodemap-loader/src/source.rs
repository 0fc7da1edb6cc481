use std::path::{Path, PathBuf};

use libloading::{Library, Symbol};

use crate::abi::{
    CreateNodeMapFn, InterfaceVersionFn, ModuleEntryPoints, CREATE_NODE_MAP_SYMBOL,
    INTERFACE_VERSION_SYMBOL,
};
use crate::LoaderError;

/// An opened module. Dropping it unloads the code behind its entry points.
pub trait ModuleLibrary: Send {
    /// Resolves the module's entry points.
    ///
    /// # Errors
    ///
    /// [`LoaderError::MissingSymbol`] when either symbol is absent.
    fn entry_points(&self) -> Result<ModuleEntryPoints, LoaderError>;
}

/// Opens module libraries by path.
pub trait ModuleSource {
    /// Library handle produced by this source.
    type Library: ModuleLibrary;

    /// Opens the module at `path`.
    ///
    /// # Errors
    ///
    /// [`LoaderError::Open`] when the library cannot be loaded.
    fn open(&self, path: &Path) -> Result<Self::Library, LoaderError>;
}

/// Opens modules as platform dynamic libraries.
#[derive(Debug, Clone, Copy, Default)]
pub struct DynamicLibrarySource;

impl ModuleSource for DynamicLibrarySource {
    type Library = DynamicLibrary;

    #[allow(unsafe_code)]
    fn open(&self, path: &Path) -> Result<DynamicLibrary, LoaderError> {
        // SAFETY: loading runs the library's initialisers; modules are trusted
        // code supplied by the device vendor.
        let library = unsafe { Library::new(path) }.map_err(|error| LoaderError::Open {
            path: path.to_path_buf(),
            message: error.to_string(),
        })?;
        tracing::debug!(path = %path.display(), "opened module library");
        Ok(DynamicLibrary {
            library,
            path: path.to_path_buf(),
        })
    }
}

/// A module opened through [`DynamicLibrarySource`].
#[derive(Debug)]
pub struct DynamicLibrary {
    library: Library,
    path: PathBuf,
}

impl DynamicLibrary {
    /// Path the library was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[allow(unsafe_code)]
    fn symbol<T: Copy>(&self, name: &'static str) -> Result<T, LoaderError> {
        // SAFETY: `T` is the entry point type documented for `name`. The
        // copied pointer is only called while the library stays loaded, which
        // `ModuleLoader` guarantees by dropping node maps first.
        let symbol: Result<Symbol<'_, T>, _> = unsafe { self.library.get(name.as_bytes()) };
        symbol
            .map(|symbol| *symbol)
            .map_err(|error| LoaderError::MissingSymbol {
                path: self.path.clone(),
                symbol: name,
                message: error.to_string(),
            })
    }
}

impl ModuleLibrary for DynamicLibrary {
    fn entry_points(&self) -> Result<ModuleEntryPoints, LoaderError> {
        Ok(ModuleEntryPoints {
            create: self.symbol::<CreateNodeMapFn>(CREATE_NODE_MAP_SYMBOL)?,
            interface_version: self.symbol::<InterfaceVersionFn>(INTERFACE_VERSION_SYMBOL)?,
        })
    }
}

impl Drop for DynamicLibrary {
    fn drop(&mut self) {
        tracing::debug!(path = %self.path.display(), "unloading module library");
    }
}
