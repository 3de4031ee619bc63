// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! device: a GBM backend device whose buffers and surfaces live in a wrapped GBM library.

use std::collections::BTreeMap;
use std::ffi::CStr;
use std::os::raw::c_void;
use std::path::PathBuf;
use std::ptr;
use std::ptr::NonNull;

use log::error;
use log::info;
use log::warn;

use crate::gbm_wrap::backend::*;
use crate::gbm_wrap::bindings::*;
use crate::gbm_wrap::proxy::*;
use crate::gbm_wrap::symbols::wrapped_library_path;
use crate::gbm_wrap::symbols::SymbolLoader;
use crate::gbm_wrap::symbols::WrappedGbmFunctions;
use crate::gbm_wrap::symbols::WrappedLibrary;
use crate::winsys_os::FromRawDescriptor;
use crate::winsys_os::RawDescriptor;
use crate::winsys_os::SafeDescriptor;
use crate::winsys_utils::*;

/// Name the wrapper device reports to the frontend.
pub const GBM_WRAPPER_DEVICE_NAME: &str = "wrapped";

/// Proxies a device holds at most unless configured otherwise.
pub const GBM_WRAPPER_DEFAULT_MAX_PROXIES: usize = 4096;

/// Builder for `GbmWrapperDevice`.
#[derive(Clone, Debug)]
pub struct GbmWrapperBuilder {
    library_path: Option<PathBuf>,
    max_proxies: usize,
}

impl Default for GbmWrapperBuilder {
    fn default() -> Self {
        GbmWrapperBuilder::new()
    }
}

impl GbmWrapperBuilder {
    /// Create new a GbmWrapperBuilder.
    pub fn new() -> GbmWrapperBuilder {
        GbmWrapperBuilder {
            library_path: None,
            max_proxies: GBM_WRAPPER_DEFAULT_MAX_PROXIES,
        }
    }

    /// Wrap the library at `path` instead of the one named by `GBM_WRAP_LIBRARY`.
    pub fn set_library_path<P: Into<PathBuf>>(mut self, path: P) -> GbmWrapperBuilder {
        self.library_path = Some(path.into());
        self
    }

    /// Set the number of buffer and surface proxies the device may hold at once.
    pub fn set_max_proxies(mut self, max_proxies: usize) -> GbmWrapperBuilder {
        self.max_proxies = max_proxies;
        self
    }

    /// Opens the wrapped library and creates a device on `fd` with it.
    pub fn build(self, fd: RawDescriptor) -> WinsysResult<GbmWrapperDevice> {
        let path = self.library_path.clone().unwrap_or_else(wrapped_library_path);
        let library = WrappedLibrary::open(&path)?;
        self.build_with_loader(Box::new(library), fd)
    }

    /// Creates a device on `fd` with entry points from `library`.  On failure `library` is
    /// dropped, unloading it.
    pub fn build_with_loader(
        self,
        library: Box<dyn SymbolLoader>,
        fd: RawDescriptor,
    ) -> WinsysResult<GbmWrapperDevice> {
        let funcs = WrappedGbmFunctions::load(library.as_ref())?;
        info!("using wrapped gbm library {}", library.library_name());

        // Safe because the entry point came from a complete table and only receives an integer.
        let gbm = unsafe { (funcs.gbm_create_device)(fd) };
        let gbm = match OpaqueToken::from_raw(gbm) {
            Some(gbm) => gbm,
            None => {
                error!("wrapped gbm_create_device failed for fd {}", fd);
                return Err(WinsysError::ForeignCallFailure("gbm_create_device"));
            }
        };

        Ok(GbmWrapperDevice {
            fd,
            gbm,
            funcs,
            bos: BTreeMap::new(),
            surfaces: BTreeMap::new(),
            next_id: 0,
            max_proxies: self.max_proxies,
            _library: library,
        })
    }
}

/// A GBM device forwarding to a device of the wrapped library.
///
/// Every buffer and surface of the wrapped device that the frontend holds has exactly one
/// proxy here, and a proxy is removed as soon as its foreign object is destroyed or handed
/// back.
pub struct GbmWrapperDevice {
    fd: RawDescriptor,
    gbm: OpaqueToken<gbm_device>,
    funcs: WrappedGbmFunctions,
    bos: BTreeMap<BoId, GbmWrapperBo>,
    surfaces: BTreeMap<SurfaceId, GbmWrapperSurface>,
    next_id: u64,
    max_proxies: usize,
    // Declared last: the wrapped code must stay loaded until the device is destroyed.
    _library: Box<dyn SymbolLoader>,
}

impl GbmWrapperDevice {
    /// Backend name reported by the wrapped library.
    pub fn wrapped_backend_name(&self) -> WinsysResult<String> {
        // Safe because the device is live and the table is complete.
        let name = unsafe { (self.funcs.gbm_device_get_backend_name)(self.gbm.as_raw()) };
        if name.is_null() {
            return Err(WinsysError::ForeignCallFailure("gbm_device_get_backend_name"));
        }

        // Safe because GBM backend names are static, nul terminated strings.
        let name = unsafe { CStr::from_ptr(name) };
        Ok(name.to_str()?.to_string())
    }

    /// Descriptor the wrapped device reports.
    pub fn wrapped_fd(&self) -> RawDescriptor {
        // Safe because the device is live and the table is complete.
        unsafe { (self.funcs.gbm_device_get_fd)(self.gbm.as_raw()) }
    }

    /// Number of live buffer and surface proxies.
    pub fn proxy_count(&self) -> usize {
        self.bos.len() + self.surfaces.len()
    }

    fn reserve_proxy(&self) -> WinsysResult<()> {
        if self.proxy_count() >= self.max_proxies {
            warn!("gbm wrapper proxy table is full ({} entries)", self.max_proxies);
            return Err(WinsysError::ProxyTableFull(self.max_proxies));
        }

        Ok(())
    }

    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Records a proxy for `bo`.  On failure the caller still owns `bo`.
    fn wrap_bo(&mut self, bo: OpaqueToken<gbm_bo>, owner: BoOwner) -> WinsysResult<BoId> {
        if self.bos.values().any(|proxy| proxy.wrapped == bo) {
            return Err(WinsysError::ForeignHandleAlreadyWrapped);
        }
        self.reserve_proxy()?;

        let raw = bo.as_raw();
        // Safe because `bo` is a live buffer of the wrapped library and the table is complete.
        let (device, base) = unsafe {
            (
                (self.funcs.gbm_bo_get_device)(raw),
                GbmBoBase {
                    width: (self.funcs.gbm_bo_get_width)(raw),
                    height: (self.funcs.gbm_bo_get_height)(raw),
                    format: (self.funcs.gbm_bo_get_format)(raw),
                    stride: (self.funcs.gbm_bo_get_stride)(raw),
                    handle: GbmBoHandle((self.funcs.gbm_bo_get_handle)(raw)),
                },
            )
        };
        if device != self.gbm.as_raw() {
            warn!("wrapped buffer belongs to another device");
        }

        let id = BoId(self.allocate_id());
        self.bos.insert(
            id,
            GbmWrapperBo {
                base,
                wrapped: bo,
                owner,
            },
        );
        Ok(id)
    }

    /// Wraps a buffer the device owns, destroying it if no proxy can be made.
    fn wrap_device_bo(&mut self, bo: *mut gbm_bo, call: &'static str) -> WinsysResult<BoId> {
        let bo = OpaqueToken::from_raw(bo).ok_or(WinsysError::ForeignCallFailure(call))?;
        match self.wrap_bo(bo, BoOwner::Device) {
            Ok(id) => Ok(id),
            // The live proxy owns it.
            Err(e @ WinsysError::ForeignHandleAlreadyWrapped) => Err(e),
            Err(e) => {
                // Safe because the buffer was just created and nothing else refers to it.
                unsafe { (self.funcs.gbm_bo_destroy)(bo.as_raw()) };
                Err(e)
            }
        }
    }

    fn wrapped_bo(&self, bo: BoId) -> WinsysResult<&GbmWrapperBo> {
        self.bos.get(&bo).ok_or(WinsysError::InvalidProxy)
    }

    fn wrapped_surface(&self, surface: SurfaceId) -> WinsysResult<&GbmWrapperSurface> {
        self.surfaces
            .get(&surface)
            .ok_or(WinsysError::InvalidProxy)
    }
}

impl GbmBackendDevice for GbmWrapperDevice {
    fn backend_name(&self) -> &'static str {
        GBM_WRAPPER_DEVICE_NAME
    }

    fn fd(&self) -> RawDescriptor {
        self.fd
    }

    fn is_format_supported(&self, format: u32, usage: u32) -> bool {
        // Safe because the device is live and the table is complete.
        let ret = unsafe {
            (self.funcs.gbm_device_is_format_supported)(self.gbm.as_raw(), format, usage)
        };
        ret != 0
    }

    fn bo_create(
        &mut self,
        width: u32,
        height: u32,
        format: u32,
        usage: u32,
    ) -> WinsysResult<BoId> {
        // Safe because the device is live and the table is complete.
        let bo = unsafe {
            (self.funcs.gbm_bo_create)(self.gbm.as_raw(), width, height, format, usage)
        };
        self.wrap_device_bo(bo, "gbm_bo_create")
    }

    fn bo_import(&mut self, import: GbmImport, usage: u32) -> WinsysResult<BoId> {
        let bo = match import {
            GbmImport::Fd(fd) => {
                let mut data = gbm_import_fd_data {
                    fd: fd.fd,
                    width: fd.width,
                    height: fd.height,
                    stride: fd.stride,
                    format: fd.format,
                };
                // Safe because `data` outlives the call and the wrapped library only reads it.
                unsafe {
                    (self.funcs.gbm_bo_import)(
                        self.gbm.as_raw(),
                        GBM_BO_IMPORT_FD,
                        &mut data as *mut gbm_import_fd_data as *mut c_void,
                        usage,
                    )
                }
            }
            GbmImport::Opaque {
                import_type,
                buffer,
            } => {
                // Safe because the host vouches that `buffer` matches `import_type`.
                unsafe {
                    (self.funcs.gbm_bo_import)(
                        self.gbm.as_raw(),
                        import_type,
                        buffer.as_raw() as *mut c_void,
                        usage,
                    )
                }
            }
        };

        self.wrap_device_bo(bo, "gbm_bo_import")
    }

    fn bo(&self, bo: BoId) -> WinsysResult<&GbmBoBase> {
        Ok(&self.wrapped_bo(bo)?.base)
    }

    fn bo_map(&self, bo: BoId, region: GbmMapRegion, flags: u32) -> WinsysResult<GbmBoMapping> {
        let proxy = self.wrapped_bo(bo)?;
        let mut stride: u32 = 0;
        let mut map_data: *mut c_void = ptr::null_mut();

        // Safe because the buffer is live and the out pointers are valid for the call.
        let addr = unsafe {
            (self.funcs.gbm_bo_map)(
                proxy.wrapped.as_raw(),
                region.x,
                region.y,
                region.width,
                region.height,
                flags,
                &mut stride,
                &mut map_data,
            )
        };

        let addr = NonNull::new(addr).ok_or(WinsysError::ForeignCallFailure("gbm_bo_map"))?;
        Ok(GbmBoMapping {
            bo,
            addr,
            stride,
            map_data,
        })
    }

    fn bo_unmap(&self, mapping: GbmBoMapping) -> WinsysResult<()> {
        let proxy = self.wrapped_bo(mapping.bo)?;
        // Safe because `map_data` came from mapping this buffer.
        unsafe { (self.funcs.gbm_bo_unmap)(proxy.wrapped.as_raw(), mapping.map_data) };
        Ok(())
    }

    fn bo_write(&self, bo: BoId, data: &[u8]) -> WinsysResult<()> {
        let proxy = self.wrapped_bo(bo)?;
        // Safe because `data` is valid for reads of `data.len()` bytes during the call.
        let ret = unsafe {
            (self.funcs.gbm_bo_write)(
                proxy.wrapped.as_raw(),
                data.as_ptr() as *const c_void,
                data.len(),
            )
        };

        if ret != 0 {
            return Err(WinsysError::ComponentError(ret));
        }

        Ok(())
    }

    fn bo_get_fd(&self, bo: BoId) -> WinsysResult<SafeDescriptor> {
        let proxy = self.wrapped_bo(bo)?;
        // Safe because the buffer is live and the table is complete.
        let fd = unsafe { (self.funcs.gbm_bo_get_fd)(proxy.wrapped.as_raw()) };
        if fd < 0 {
            return Err(WinsysError::ComponentError(fd));
        }

        // Safe because the wrapped library hands ownership of the new descriptor to us.
        Ok(unsafe { SafeDescriptor::from_raw_descriptor(fd) })
    }

    fn bo_destroy(&mut self, bo: BoId) -> WinsysResult<()> {
        let proxy = self.wrapped_bo(bo)?;
        if proxy.owner != BoOwner::Device {
            return Err(WinsysError::ContractViolation(
                "locked front buffers are released, not destroyed",
            ));
        }

        // Safe because the buffer is live and owned by this proxy.
        unsafe { (self.funcs.gbm_bo_destroy)(proxy.wrapped.as_raw()) };
        self.bos.remove(&bo);
        Ok(())
    }

    fn surface_create(
        &mut self,
        width: u32,
        height: u32,
        format: u32,
        flags: u32,
    ) -> WinsysResult<SurfaceId> {
        // Safe because the device is live and the table is complete.
        let surface = unsafe {
            (self.funcs.gbm_surface_create)(self.gbm.as_raw(), width, height, format, flags)
        };
        let surface = OpaqueToken::from_raw(surface)
            .ok_or(WinsysError::ForeignCallFailure("gbm_surface_create"))?;

        if let Err(e) = self.reserve_proxy() {
            // Safe because the surface was just created and nothing else refers to it.
            unsafe { (self.funcs.gbm_surface_destroy)(surface.as_raw()) };
            return Err(e);
        }

        let id = SurfaceId(self.allocate_id());
        self.surfaces.insert(
            id,
            GbmWrapperSurface {
                base: GbmSurfaceBase {
                    width,
                    height,
                    format,
                    flags,
                },
                wrapped: surface,
            },
        );
        Ok(id)
    }

    fn surface(&self, surface: SurfaceId) -> WinsysResult<&GbmSurfaceBase> {
        Ok(&self.wrapped_surface(surface)?.base)
    }

    fn surface_lock_front_buffer(&mut self, surface: SurfaceId) -> WinsysResult<BoId> {
        let wrapped_surface = self.wrapped_surface(surface)?.wrapped;

        // Safe because the surface is live and the table is complete.
        let bo = unsafe { (self.funcs.gbm_surface_lock_front_buffer)(wrapped_surface.as_raw()) };
        let bo = OpaqueToken::from_raw(bo)
            .ok_or(WinsysError::ForeignCallFailure("gbm_surface_lock_front_buffer"))?;

        match self.wrap_bo(bo, BoOwner::Surface(surface)) {
            Ok(id) => Ok(id),
            Err(e @ WinsysError::ForeignHandleAlreadyWrapped) => Err(e),
            Err(e) => {
                // Safe because the buffer was just locked from this surface.
                unsafe {
                    (self.funcs.gbm_surface_release_buffer)(wrapped_surface.as_raw(), bo.as_raw())
                };
                Err(e)
            }
        }
    }

    fn surface_release_buffer(&mut self, surface: SurfaceId, bo: BoId) -> WinsysResult<()> {
        let wrapped_surface = self.wrapped_surface(surface)?.wrapped;
        let proxy = self.wrapped_bo(bo)?;
        if proxy.owner != BoOwner::Surface(surface) {
            return Err(WinsysError::InvalidProxy);
        }

        // Safe because the buffer is live and was locked from this surface.
        unsafe {
            (self.funcs.gbm_surface_release_buffer)(
                wrapped_surface.as_raw(),
                proxy.wrapped.as_raw(),
            )
        };
        self.bos.remove(&bo);
        Ok(())
    }

    fn surface_has_free_buffers(&self, surface: SurfaceId) -> WinsysResult<bool> {
        let proxy = self.wrapped_surface(surface)?;
        // Safe because the surface is live and the table is complete.
        let ret = unsafe { (self.funcs.gbm_surface_has_free_buffers)(proxy.wrapped.as_raw()) };
        Ok(ret != 0)
    }

    fn surface_destroy(&mut self, surface: SurfaceId) -> WinsysResult<()> {
        let proxy = self.wrapped_surface(surface)?;
        // Safe because the surface is live and owned by this proxy.
        unsafe { (self.funcs.gbm_surface_destroy)(proxy.wrapped.as_raw()) };

        self.surfaces.remove(&surface);
        self.bos
            .retain(|_, bo| bo.owner != BoOwner::Surface(surface));
        Ok(())
    }
}

impl Drop for GbmWrapperDevice {
    fn drop(&mut self) {
        let leftover = self.proxy_count();
        if leftover > 0 {
            warn!("destroying gbm wrapper device with {} live proxies", leftover);
        }
        self.bos.clear();
        self.surfaces.clear();

        // Safe because the device is live, and the library providing the entry point is only
        // dropped after this returns.
        unsafe { (self.funcs.gbm_device_destroy)(self.gbm.as_raw()) };
    }
}
