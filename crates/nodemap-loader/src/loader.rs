use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::ffi::CString;
use std::path::{Path, PathBuf};

use nodemap_core::{InterfaceVersion, NodeMap};

use crate::source::{DynamicLibrarySource, ModuleLibrary, ModuleSource};
use crate::{LoaderConfig, LoaderError};

type ModuleKey = (PathBuf, String);

/// One node map together with the library that implements it.
///
/// Fields drop in declaration order, so the node map is always destroyed
/// while the code behind it is still mapped.
#[derive(Debug)]
pub struct LoadedModule<L> {
    node_map: Box<NodeMap>,
    library: L,
    path: PathBuf,
    device: String,
    version: InterfaceVersion,
}

impl<L> LoadedModule<L> {
    /// The module's node map.
    #[must_use]
    pub fn node_map(&self) -> &NodeMap {
        &self.node_map
    }

    /// Library handle backing the node map.
    #[must_use]
    pub const fn library(&self) -> &L {
        &self.library
    }

    /// Path the module was loaded from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Device the node map was created for.
    #[must_use]
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Interface version reported by the module.
    #[must_use]
    pub const fn interface_version(&self) -> InterfaceVersion {
        self.version
    }
}

impl<L> Drop for LoadedModule<L> {
    fn drop(&mut self) {
        tracing::info!(
            path = %self.path.display(),
            device = %self.device,
            "unloading module"
        );
    }
}

/// Loads vendor modules and owns every node map they create.
///
/// One node map exists per (module path, device) pair. Dropping the loader
/// unloads everything it still holds.
pub struct ModuleLoader<S: ModuleSource = DynamicLibrarySource> {
    source: S,
    config: LoaderConfig,
    modules: HashMap<ModuleKey, LoadedModule<S::Library>>,
}

impl ModuleLoader {
    /// Loader for platform dynamic libraries.
    #[must_use]
    pub fn new(config: LoaderConfig) -> Self {
        Self::with_source(DynamicLibrarySource, config)
    }
}

impl<S: ModuleSource> ModuleLoader<S> {
    /// Loader opening modules through `source`.
    #[must_use]
    pub fn with_source(source: S, config: LoaderConfig) -> Self {
        Self {
            source,
            config,
            modules: HashMap::new(),
        }
    }

    /// Loader configuration.
    #[must_use]
    pub const fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Loads the module at `path` and creates its node map for `device`.
    ///
    /// Loading a pair that is already loaded returns the existing node map.
    ///
    /// # Errors
    ///
    /// Propagates [`LoaderError`] from opening the library or resolving its
    /// entry points, and reports [`LoaderError::IncompatibleVersion`] or
    /// [`LoaderError::CreationFailed`]. Nothing stays loaded on failure.
    pub fn load(&mut self, path: impl AsRef<Path>, device: &str) -> Result<&NodeMap, LoaderError> {
        let path = path.as_ref().to_path_buf();
        let slot = match self.modules.entry((path.clone(), device.to_owned())) {
            Entry::Occupied(entry) => return Ok(entry.into_mut().node_map()),
            Entry::Vacant(slot) => slot,
        };
        let module = open_module(&self.source, self.config.interface_version, path, device)?;
        Ok(slot.insert(module).node_map())
    }

    /// Node map created for `device` by the module at `path`, if loaded.
    #[must_use]
    pub fn get(&self, path: impl AsRef<Path>, device: &str) -> Option<&NodeMap> {
        self.module(path, device).map(LoadedModule::node_map)
    }

    /// Loaded module for the pair, if any.
    #[must_use]
    pub fn module(
        &self,
        path: impl AsRef<Path>,
        device: &str,
    ) -> Option<&LoadedModule<S::Library>> {
        self.modules.get(&(path.as_ref().to_path_buf(), device.to_owned()))
    }

    /// Destroys the node map for the pair, then releases its library.
    /// Returns whether anything was loaded.
    pub fn unload(&mut self, path: impl AsRef<Path>, device: &str) -> bool {
        self.modules
            .remove(&(path.as_ref().to_path_buf(), device.to_owned()))
            .is_some()
    }

    /// Unloads every module. Safe to call repeatedly, and when nothing was
    /// ever loaded.
    pub fn unload_all(&mut self) {
        if self.modules.is_empty() {
            return;
        }
        tracing::info!(count = self.modules.len(), "unloading all modules");
        self.modules.clear();
    }

    /// Currently loaded (path, device) pairs.
    pub fn loaded(&self) -> impl Iterator<Item = (&Path, &str)> + '_ {
        self.modules
            .keys()
            .map(|(path, device)| (path.as_path(), device.as_str()))
    }

    /// Number of loaded node maps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether nothing is loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl<S: ModuleSource> Drop for ModuleLoader<S> {
    fn drop(&mut self) {
        self.unload_all();
    }
}

#[allow(unsafe_code)]
fn open_module<S: ModuleSource>(
    source: &S,
    required: InterfaceVersion,
    path: PathBuf,
    device: &str,
) -> Result<LoadedModule<S::Library>, LoaderError> {
    let device_name =
        CString::new(device).map_err(|_| LoaderError::InvalidDevice(device.to_owned()))?;
    let library = source.open(&path)?;
    let entry = library.entry_points()?;

    let mut version = InterfaceVersion::new(0, 0);
    // SAFETY: the pointer targets a live, writable `InterfaceVersion` and
    // `library` keeps the function's code mapped.
    unsafe { (entry.interface_version)(&mut version) };
    if !version.satisfies(required) {
        tracing::warn!(
            path = %path.display(),
            module = %version,
            required = %required,
            "rejecting module with incompatible interface"
        );
        return Err(LoaderError::IncompatibleVersion {
            path,
            module: version,
            required,
        });
    }

    // SAFETY: `device_name` is NUL-terminated and outlives the call.
    let raw = unsafe { (entry.create)(device_name.as_ptr()) };
    if raw.is_null() {
        return Err(LoaderError::CreationFailed {
            path,
            device: device.to_owned(),
        });
    }
    // SAFETY: a compatible module returns ownership of a `Box<NodeMap>`
    // leaked with `Box::into_raw`; the version check above pins the layout.
    let node_map = unsafe { Box::from_raw(raw.cast::<NodeMap>()) };

    tracing::info!(path = %path.display(), device, version = %version, "loaded module");
    Ok(LoadedModule {
        node_map,
        library,
        path,
        device: device.to_owned(),
        version,
    })
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use core::ffi::{c_char, c_void};
    use std::path::Path;

    use nodemap_core::{InterfaceVersion, NodeMap};
    use rstest::rstest;

    use super::ModuleLoader;
    use crate::abi::{create_with, ModuleEntryPoints};
    use crate::source::{ModuleLibrary, ModuleSource};
    use crate::{LoaderConfig, LoaderError};

    fn build(device: &str) -> Result<NodeMap, nodemap_core::BuildError> {
        NodeMap::builder(nodemap_core::NodeMapConfig::default())
            .device_name(device)
            .build()
    }

    unsafe extern "C" fn create(device: *const c_char) -> *mut c_void {
        unsafe { create_with(device, build) }
    }

    unsafe extern "C" fn refuse(_: *const c_char) -> *mut c_void {
        core::ptr::null_mut()
    }

    unsafe extern "C" fn version_1_2(out: *mut InterfaceVersion) {
        unsafe { out.write(InterfaceVersion::new(1, 2)) };
    }

    struct Fixed(ModuleEntryPoints);

    impl ModuleLibrary for Fixed {
        fn entry_points(&self) -> Result<ModuleEntryPoints, LoaderError> {
            Ok(self.0)
        }
    }

    struct FixedSource(ModuleEntryPoints);

    impl ModuleSource for FixedSource {
        type Library = Fixed;

        fn open(&self, _: &Path) -> Result<Fixed, LoaderError> {
            Ok(Fixed(self.0))
        }
    }

    fn loader(required: InterfaceVersion) -> ModuleLoader<FixedSource> {
        ModuleLoader::with_source(
            FixedSource(ModuleEntryPoints {
                create,
                interface_version: version_1_2,
            }),
            LoaderConfig::requiring(required),
        )
    }

    #[rstest]
    #[case(InterfaceVersion::new(1, 0), true)]
    #[case(InterfaceVersion::new(1, 2), true)]
    #[case(InterfaceVersion::new(1, 3), false)]
    #[case(InterfaceVersion::new(2, 0), false)]
    #[case(InterfaceVersion::new(0, 2), false)]
    fn version_gate(#[case] required: InterfaceVersion, #[case] accepted: bool) {
        let mut loader = loader(required);
        let result = loader.load("vendorA", "Cam0");
        assert_eq!(result.is_ok(), accepted);
        if !accepted {
            assert!(matches!(
                result,
                Err(LoaderError::IncompatibleVersion { module, .. })
                    if module == InterfaceVersion::new(1, 2)
            ));
            assert!(loader.is_empty());
        }
    }

    #[test]
    fn one_node_map_per_path_and_device() {
        let mut loader = loader(InterfaceVersion::CURRENT);
        let first: *const NodeMap = loader.load("vendorA", "Cam0").expect("loads");
        let again: *const NodeMap = loader.load("vendorA", "Cam0").expect("loads");
        assert_eq!(first, again);
        loader.load("vendorA", "Cam1").expect("loads");
        assert_eq!(loader.len(), 2);
        assert_eq!(
            loader.get("vendorA", "Cam1").map(NodeMap::device_name),
            Some("Cam1")
        );
        let version = loader
            .module("vendorA", "Cam0")
            .map(super::LoadedModule::interface_version);
        assert_eq!(version, Some(InterfaceVersion::new(1, 2)));

        assert!(loader.unload("vendorA", "Cam0"));
        assert!(!loader.unload("vendorA", "Cam0"));
        let loaded: Vec<_> = loader.loaded().collect();
        assert_eq!(loaded, vec![(Path::new("vendorA"), "Cam1")]);
    }

    #[test]
    fn null_factory_result_is_a_creation_failure() {
        let mut loader = ModuleLoader::with_source(
            FixedSource(ModuleEntryPoints {
                create: refuse,
                interface_version: version_1_2,
            }),
            LoaderConfig::default(),
        );
        assert!(matches!(
            loader.load("vendorA", "Cam0"),
            Err(LoaderError::CreationFailed { device, .. }) if device == "Cam0"
        ));
        assert!(loader.is_empty());
    }

    #[test]
    fn device_names_with_nul_are_rejected() {
        let mut loader = loader(InterfaceVersion::CURRENT);
        assert!(matches!(
            loader.load("vendorA", "Cam\00"),
            Err(LoaderError::InvalidDevice(_))
        ));
    }

    #[test]
    fn unload_all_is_idempotent() {
        let mut loader = loader(InterfaceVersion::CURRENT);
        loader.unload_all();
        loader.load("vendorA", "Cam0").expect("loads");
        loader.unload_all();
        loader.unload_all();
        assert!(loader.is_empty());
    }
}
