// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! symbols: opening the wrapped GBM library and binding its entry points.

use std::env;
use std::ffi::OsString;
use std::os::raw::c_void;
use std::path::Path;
use std::path::PathBuf;

use libloading::os::unix::Library as UnixLibrary;
use libloading::os::unix::RTLD_GLOBAL;
use libloading::os::unix::RTLD_NOW;
use libloading::Library;
use log::error;

use crate::gbm_wrap::bindings::*;
use crate::winsys_utils::WinsysError;
use crate::winsys_utils::WinsysResult;

/// Environment variable naming the library to wrap.
pub const GBM_WRAP_LIBRARY_ENV: &str = "GBM_WRAP_LIBRARY";

/// Library wrapped when `GBM_WRAP_LIBRARY` is unset.  Chosen at build time through the
/// `DEFAULT_WRAPPED_GBM_LIBRARY` environment variable.
pub const DEFAULT_WRAPPED_GBM_LIBRARY: &str = match option_env!("DEFAULT_WRAPPED_GBM_LIBRARY") {
    Some(path) => path,
    None => "libgbm.so.1",
};

/// Source of entry points for the wrapped implementation.  Dropping it unloads the code the
/// entry points refer to.
pub trait SymbolLoader {
    /// Returns the address of the exported symbol `name`.
    fn symbol(&self, name: &str) -> WinsysResult<*const c_void>;

    /// Name of the library, for log messages.
    fn library_name(&self) -> &str;
}

/// A shared library opened with `dlopen`.
pub struct WrappedLibrary {
    library: Library,
    name: String,
}

impl WrappedLibrary {
    /// Opens `path` with every symbol resolved immediately and made globally available, as GBM
    /// backends expect.
    pub fn open(path: &Path) -> WinsysResult<WrappedLibrary> {
        // Safe because loading runs the library initializers, which is what the caller asked
        // for by naming it.
        let library = unsafe { UnixLibrary::open(Some(path), RTLD_NOW | RTLD_GLOBAL) }.map_err(
            |source| {
                error!("failed to open wrapped library ({}): {}", path.display(), source);
                WinsysError::LibraryLoad {
                    path: path.display().to_string(),
                    source,
                }
            },
        )?;

        Ok(WrappedLibrary {
            library: library.into(),
            name: path.display().to_string(),
        })
    }
}

impl SymbolLoader for WrappedLibrary {
    fn symbol(&self, name: &str) -> WinsysResult<*const c_void> {
        // Safe because the symbol is read as an untyped address and only called after being
        // given its gbm.h signature.
        let symbol = unsafe { self.library.get::<*const c_void>(name.as_bytes()) }.map_err(|e| {
            WinsysError::SymbolResolution {
                symbol: name.to_string(),
                reason: e.to_string(),
            }
        })?;

        Ok(*symbol)
    }

    fn library_name(&self) -> &str {
        &self.name
    }
}

fn resolve(loader: &dyn SymbolLoader, name: &'static str) -> WinsysResult<*const c_void> {
    let address = loader.symbol(name).inspect_err(|e| {
        error!("unable to wrap {}: {}", name, e);
    })?;

    if address.is_null() {
        error!("unable to wrap {}: null address", name);
        return Err(WinsysError::SymbolResolution {
            symbol: name.to_string(),
            reason: "null address".to_string(),
        });
    }

    Ok(address)
}

macro_rules! wrapped_gbm_functions {
    ($($function:ident: $ty:ty,)*) => {
        /// Entry points of the wrapped library.  A table is only ever produced complete.
        #[derive(Copy, Clone)]
        pub struct WrappedGbmFunctions {
            $(pub $function: $ty,)*
        }

        impl WrappedGbmFunctions {
            /// Resolves every entry point from `loader`, failing on the first missing one.
            pub fn load(loader: &dyn SymbolLoader) -> WinsysResult<WrappedGbmFunctions> {
                Ok(WrappedGbmFunctions {
                    $($function: {
                        let address = resolve(loader, stringify!($function))?;
                        // Safe because `address` is the non-null export of the gbm.h function
                        // with this name, whose signature is `$ty`.
                        unsafe { std::mem::transmute::<*const c_void, $ty>(address) }
                    },)*
                })
            }

            /// Names of the entry points a wrapped library must export.
            pub const SYMBOLS: &'static [&'static str] = &[$(stringify!($function),)*];
        }
    };
}

wrapped_gbm_functions! {
    gbm_bo_create: gbm_bo_create_t,
    gbm_bo_destroy: gbm_bo_destroy_t,
    gbm_bo_get_device: gbm_bo_get_device_t,
    gbm_bo_get_fd: gbm_bo_get_fd_t,
    gbm_bo_get_format: gbm_bo_get_format_t,
    gbm_bo_get_handle: gbm_bo_get_handle_t,
    gbm_bo_get_height: gbm_bo_get_height_t,
    gbm_bo_get_stride: gbm_bo_get_stride_t,
    gbm_bo_get_width: gbm_bo_get_width_t,
    gbm_bo_import: gbm_bo_import_t,
    gbm_bo_map: gbm_bo_map_t,
    gbm_bo_unmap: gbm_bo_unmap_t,
    gbm_bo_write: gbm_bo_write_t,
    gbm_create_device: gbm_create_device_t,
    gbm_device_destroy: gbm_device_destroy_t,
    gbm_device_get_backend_name: gbm_device_get_backend_name_t,
    gbm_device_get_fd: gbm_device_get_fd_t,
    gbm_device_is_format_supported: gbm_device_is_format_supported_t,
    gbm_surface_create: gbm_surface_create_t,
    gbm_surface_destroy: gbm_surface_destroy_t,
    gbm_surface_has_free_buffers: gbm_surface_has_free_buffers_t,
    gbm_surface_lock_front_buffer: gbm_surface_lock_front_buffer_t,
    gbm_surface_release_buffer: gbm_surface_release_buffer_t,
}

fn select_library_path(override_path: Option<OsString>) -> PathBuf {
    match override_path {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => PathBuf::from(DEFAULT_WRAPPED_GBM_LIBRARY),
    }
}

/// Returns the library to wrap: `GBM_WRAP_LIBRARY` if set, the built-in default otherwise.
pub fn wrapped_library_path() -> PathBuf {
    select_library_path(env::var_os(GBM_WRAP_LIBRARY_ENV))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gbm_wrap::fake;
    use crate::gbm_wrap::fake::FakeLibrary;

    #[test]
    fn complete_table() {
        fake::reset();
        let library = FakeLibrary::new();
        let funcs = WrappedGbmFunctions::load(&library).unwrap();

        // Safe because the fake implementation accepts any descriptor.
        let gbm = unsafe { (funcs.gbm_create_device)(7) };
        assert!(!gbm.is_null());
        assert_eq!(unsafe { (funcs.gbm_device_get_fd)(gbm) }, 7);
        unsafe { (funcs.gbm_device_destroy)(gbm) };
        assert_eq!(fake::calls("gbm_device_destroy"), 1);
    }

    #[test]
    fn every_symbol_is_required() {
        assert_eq!(WrappedGbmFunctions::SYMBOLS.len(), 23);

        for missing in WrappedGbmFunctions::SYMBOLS {
            let library = FakeLibrary::new().without(missing);
            match WrappedGbmFunctions::load(&library) {
                Err(WinsysError::SymbolResolution { symbol, .. }) => assert_eq!(symbol, *missing),
                Err(e) => panic!("unexpected error {}", e),
                Ok(_) => panic!("table built without {}", missing),
            }
        }
    }

    #[test]
    fn null_symbols_are_rejected() {
        let library = FakeLibrary::new().with_null("gbm_bo_map");
        assert!(matches!(
            WrappedGbmFunctions::load(&library),
            Err(WinsysError::SymbolResolution { .. })
        ));
    }

    #[test]
    fn library_path_selection() {
        assert_eq!(
            select_library_path(Some(OsString::from("/opt/gbm/libgbm.so"))),
            PathBuf::from("/opt/gbm/libgbm.so")
        );
        assert_eq!(
            select_library_path(None),
            PathBuf::from(DEFAULT_WRAPPED_GBM_LIBRARY)
        );
        assert_eq!(
            select_library_path(Some(OsString::new())),
            PathBuf::from(DEFAULT_WRAPPED_GBM_LIBRARY)
        );
    }

    #[test]
    fn missing_library() {
        let path = Path::new("/nonexistent/libgbm_wrap_test.so");
        match WrappedLibrary::open(path) {
            Err(WinsysError::LibraryLoad { path, .. }) => {
                assert_eq!(path, "/nonexistent/libgbm_wrap_test.so")
            }
            Err(e) => panic!("unexpected error {}", e),
            Ok(_) => panic!("opened a missing library"),
        }
    }
}
