// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! backend: the interface a GBM frontend drives a backend device through.

use std::os::raw::c_void;
use std::ptr::NonNull;

use crate::gbm_wrap::device::GbmWrapperBuilder;
use crate::gbm_wrap::proxy::*;
use crate::winsys_os::RawDescriptor;
use crate::winsys_os::SafeDescriptor;
use crate::winsys_utils::HostToken;
use crate::winsys_utils::WinsysResult;

/// A dma-buf to import, see `gbm_import_fd_data`.  The descriptor is only borrowed.
#[derive(Copy, Clone, Debug)]
pub struct GbmImportFd {
    pub fd: RawDescriptor,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub format: u32,
}

/// Source of a buffer for `bo_import`.
#[derive(Copy, Clone, Debug)]
pub enum GbmImport {
    /// `GBM_BO_IMPORT_FD`.
    Fd(GbmImportFd),
    /// Any other import type; `buffer` is handed to the wrapped library untouched.
    Opaque { import_type: u32, buffer: HostToken },
}

/// The rectangle of a buffer to map, in pixels.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct GbmMapRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// A CPU mapping of part of a buffer, returned to `bo_unmap` when done.
#[derive(Debug)]
pub struct GbmBoMapping {
    pub(crate) bo: BoId,
    pub(crate) addr: NonNull<c_void>,
    pub(crate) stride: u32,
    pub(crate) map_data: *mut c_void,
}

impl GbmBoMapping {
    /// The buffer this mapping belongs to.
    pub fn bo(&self) -> BoId {
        self.bo
    }

    /// Address of the top left pixel of the mapped region.
    pub fn as_ptr(&self) -> *mut u8 {
        self.addr.as_ptr() as *mut u8
    }

    /// Bytes between rows of the mapping.
    pub fn stride(&self) -> u32 {
        self.stride
    }
}

/// Operations of a GBM backend device.  Buffers and surfaces are named by ids; an id stops
/// being valid once the destroy or release call naming it returns, and any later use fails
/// with `InvalidProxy`.
pub trait GbmBackendDevice {
    /// Name the device reports to the frontend.
    fn backend_name(&self) -> &'static str;

    /// The DRM descriptor the device was created for.
    fn fd(&self) -> RawDescriptor;

    fn is_format_supported(&self, format: u32, usage: u32) -> bool;

    fn bo_create(&mut self, width: u32, height: u32, format: u32, usage: u32)
        -> WinsysResult<BoId>;

    fn bo_import(&mut self, import: GbmImport, usage: u32) -> WinsysResult<BoId>;

    /// Cached attributes of `bo`.
    fn bo(&self, bo: BoId) -> WinsysResult<&GbmBoBase>;

    fn bo_map(&self, bo: BoId, region: GbmMapRegion, flags: u32) -> WinsysResult<GbmBoMapping>;

    fn bo_unmap(&self, mapping: GbmBoMapping) -> WinsysResult<()>;

    /// Copies `data` into `bo`.
    fn bo_write(&self, bo: BoId, data: &[u8]) -> WinsysResult<()>;

    /// Exports `bo` as a dma-buf owned by the caller.
    fn bo_get_fd(&self, bo: BoId) -> WinsysResult<SafeDescriptor>;

    /// Destroys a created or imported buffer.  A buffer locked from a surface is refused with
    /// `ContractViolation` and stays valid; hand it back with `surface_release_buffer`.
    fn bo_destroy(&mut self, bo: BoId) -> WinsysResult<()>;

    fn surface_create(
        &mut self,
        width: u32,
        height: u32,
        format: u32,
        flags: u32,
    ) -> WinsysResult<SurfaceId>;

    /// Attributes `surface` was created with.
    fn surface(&self, surface: SurfaceId) -> WinsysResult<&GbmSurfaceBase>;

    /// Takes the buffer last rendered to `surface`.  It stays locked until it is handed back
    /// with `surface_release_buffer`.
    fn surface_lock_front_buffer(&mut self, surface: SurfaceId) -> WinsysResult<BoId>;

    /// Hands a locked buffer back to `surface`.  `bo` is invalid afterwards; lock again for the
    /// next frame.
    fn surface_release_buffer(&mut self, surface: SurfaceId, bo: BoId) -> WinsysResult<()>;

    fn surface_has_free_buffers(&self, surface: SurfaceId) -> WinsysResult<bool>;

    /// Destroys `surface`, invalidating any buffers still locked from it.
    fn surface_destroy(&mut self, surface: SurfaceId) -> WinsysResult<()>;
}

/// A loadable GBM backend: a name and a device constructor.
pub struct GbmBackend {
    pub backend_name: &'static str,
    pub create_device: fn(RawDescriptor) -> WinsysResult<Box<dyn GbmBackendDevice>>,
}

fn wrap_device_create(fd: RawDescriptor) -> WinsysResult<Box<dyn GbmBackendDevice>> {
    let device = GbmWrapperBuilder::new().build(fd)?;
    Ok(Box::new(device))
}

/// The backend forwarding to the library named by `GBM_WRAP_LIBRARY`.
pub static GBM_WRAPPER_BACKEND: GbmBackend = GbmBackend {
    backend_name: "wrapper",
    create_device: wrap_device_create,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gbm_wrap::symbols::GBM_WRAP_LIBRARY_ENV;
    use crate::winsys_utils::WinsysError;

    #[test]
    fn wrapper_backend_reports_missing_library() {
        assert_eq!(GBM_WRAPPER_BACKEND.backend_name, "wrapper");

        // Only meaningful when nothing points the backend at a real library.
        if std::env::var_os(GBM_WRAP_LIBRARY_ENV).is_some() {
            return;
        }

        match (GBM_WRAPPER_BACKEND.create_device)(-1) {
            // A system libgbm rejects the invalid descriptor.
            Err(WinsysError::LibraryLoad { .. })
            | Err(WinsysError::SymbolResolution { .. })
            | Err(WinsysError::ForeignCallFailure(_)) => (),
            Err(e) => panic!("unexpected error {}", e),
            Ok(_) => panic!("created a device for an invalid descriptor"),
        }
    }

    #[test]
    fn usage_and_transfer_flags_are_public() {
        let usage = crate::GBM_BO_USE_SCANOUT | crate::GBM_BO_USE_RENDERING;
        assert_eq!(usage, 5);
        assert_eq!(crate::GBM_BO_USE_LINEAR, 16);
        assert_eq!(
            crate::GBM_BO_TRANSFER_READ_WRITE,
            crate::GBM_BO_TRANSFER_READ | crate::GBM_BO_TRANSFER_WRITE
        );
    }
}
