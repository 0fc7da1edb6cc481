use core::ffi::{c_char, c_void, CStr};
use std::panic;
use std::ptr;

use nodemap_core::{BuildError, InterfaceVersion, NodeMap};

/// Symbol creating a node map: [`CreateNodeMapFn`].
pub const CREATE_NODE_MAP_SYMBOL: &str = "nodemap_create_node_map";

/// Symbol reporting the module's interface version: [`InterfaceVersionFn`].
pub const INTERFACE_VERSION_SYMBOL: &str = "nodemap_interface_version";

/// Creates a boxed [`NodeMap`] for the NUL-terminated device name and returns
/// it as an opaque pointer, or null on failure. Ownership passes to the
/// caller, which reclaims it with `Box::from_raw`.
pub type CreateNodeMapFn = unsafe extern "C" fn(device: *const c_char) -> *mut c_void;

/// Writes the module's [`InterfaceVersion`] to `out`.
pub type InterfaceVersionFn = unsafe extern "C" fn(out: *mut InterfaceVersion);

/// Resolved entry points of one module. The pointers are only valid while the
/// library they came from stays loaded.
#[derive(Debug, Clone, Copy)]
pub struct ModuleEntryPoints {
    /// Node map factory.
    pub create: CreateNodeMapFn,
    /// Version query.
    pub interface_version: InterfaceVersionFn,
}

/// Signature of the factory a module hands to [`export_node_map_module!`].
pub type NodeMapFactory = fn(device: &str) -> Result<NodeMap, BuildError>;

/// Runs `factory` for the device named by `device` and boxes the result.
///
/// Returns null when `device` is null or not UTF-8, when the factory fails,
/// or when it panics; panics never cross the C boundary.
///
/// # Safety
///
/// `device` must be null or point to a NUL-terminated string that stays
/// valid for the duration of the call.
#[allow(unsafe_code)]
pub unsafe fn create_with(device: *const c_char, factory: NodeMapFactory) -> *mut c_void {
    if device.is_null() {
        return ptr::null_mut();
    }
    // SAFETY: non-null and NUL-terminated per the caller contract.
    let device = unsafe { CStr::from_ptr(device) };
    let Ok(device) = device.to_str() else {
        tracing::error!("device name is not UTF-8");
        return ptr::null_mut();
    };
    match panic::catch_unwind(|| factory(device)) {
        Ok(Ok(node_map)) => Box::into_raw(Box::new(node_map)).cast(),
        Ok(Err(error)) => {
            tracing::error!(device, %error, "module failed to build its node map");
            ptr::null_mut()
        }
        Err(_) => {
            tracing::error!(device, "module panicked while building its node map");
            ptr::null_mut()
        }
    }
}

/// Writes [`InterfaceVersion::CURRENT`] to `out` unless it is null.
///
/// # Safety
///
/// `out` must be null or valid for a write of one [`InterfaceVersion`].
#[allow(unsafe_code)]
pub unsafe fn write_interface_version(out: *mut InterfaceVersion) {
    if !out.is_null() {
        // SAFETY: non-null and writable per the caller contract.
        unsafe { out.write(InterfaceVersion::CURRENT) };
    }
}

/// Emits the module entry points around a [`NodeMapFactory`].
///
/// ```ignore
/// fn build(device: &str) -> Result<NodeMap, BuildError> { /* ... */ }
/// nodemap_loader::export_node_map_module!(build);
/// ```
#[macro_export]
macro_rules! export_node_map_module {
    ($factory:path) => {
        /// Creates this module's node map for `device`.
        ///
        /// # Safety
        ///
        /// `device` must be null or a NUL-terminated string.
        #[allow(unsafe_code)]
        #[no_mangle]
        pub unsafe extern "C" fn nodemap_create_node_map(
            device: *const ::core::ffi::c_char,
        ) -> *mut ::core::ffi::c_void {
            // SAFETY: forwarded caller contract.
            unsafe { $crate::abi::create_with(device, $factory) }
        }

        /// Reports the interface version this module was built against.
        ///
        /// # Safety
        ///
        /// `out` must be null or writable.
        #[allow(unsafe_code)]
        #[no_mangle]
        pub unsafe extern "C" fn nodemap_interface_version(out: *mut $crate::InterfaceVersion) {
            // SAFETY: forwarded caller contract.
            unsafe { $crate::abi::write_interface_version(out) }
        }
    };
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use core::ffi::c_char;
    use std::ffi::CString;
    use std::ptr;

    use nodemap_core::{BuildError, InterfaceVersion, NodeMap, NodeMapConfig};

    use super::{create_with, write_interface_version};

    fn empty(device: &str) -> Result<NodeMap, BuildError> {
        NodeMap::builder(NodeMapConfig::default())
            .device_name(device)
            .build()
    }

    fn failing(_: &str) -> Result<NodeMap, BuildError> {
        Err(BuildError::DuplicateNode("Twice".into()))
    }

    fn panicking(_: &str) -> Result<NodeMap, BuildError> {
        panic!("factory bug")
    }

    #[test]
    fn created_map_carries_the_device_name() {
        let device = CString::new("Cam0").expect("no NUL");
        let raw = unsafe { create_with(device.as_ptr(), empty) };
        assert!(!raw.is_null());
        let node_map = unsafe { Box::from_raw(raw.cast::<NodeMap>()) };
        assert_eq!(node_map.device_name(), "Cam0");
    }

    #[test]
    fn failures_become_null() {
        let device = CString::new("Cam0").expect("no NUL");
        assert!(unsafe { create_with(device.as_ptr(), failing) }.is_null());
        assert!(unsafe { create_with(device.as_ptr(), panicking) }.is_null());
        assert!(unsafe { create_with(ptr::null::<c_char>(), empty) }.is_null());
    }

    #[test]
    fn version_is_written_when_requested() {
        let mut version = InterfaceVersion::new(0, 0);
        unsafe { write_interface_version(&mut version) };
        assert_eq!(version, InterfaceVersion::CURRENT);
        unsafe { write_interface_version(ptr::null_mut()) };
    }
}
