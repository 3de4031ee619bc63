// Copyright 2018 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! vgem: kernel buffer sharing through the virtual GEM driver.
//!
//! A VGEM render node lets display targets live in kernel-managed memory that can be exported
//! as a dma-buf and scanned out by a display server without copies.

use std::fs::File;
use std::fs::OpenOptions;
use std::os::raw::c_uint;
use std::os::unix::io::AsRawFd;
use std::path::Path;

use log::debug;
use log::info;
use nix::ioctl_readwrite;
use nix::ioctl_write_ptr;

use crate::winsys_os::AsRawDescriptor;
use crate::winsys_os::FromRawDescriptor;
use crate::winsys_os::MappedRegion;
use crate::winsys_os::MemoryMapping;
use crate::winsys_os::RawDescriptor;
use crate::winsys_os::SafeDescriptor;
use crate::winsys_utils::TransferFlags;
use crate::winsys_utils::WinsysError;
use crate::winsys_utils::WinsysResult;

/// Flag for `prime_handle_to_fd` requesting a close-on-exec descriptor.
pub const DRM_CLOEXEC: u32 = libc::O_CLOEXEC as u32;

const DRM_IOCTL_BASE: c_uint = 0x64;
const DRM_IOCTL_GEM_CLOSE: c_uint = 0x09;
const DRM_IOCTL_PRIME_HANDLE_TO_FD: c_uint = 0x2d;
const DRM_IOCTL_PRIME_FD_TO_HANDLE: c_uint = 0x2e;
const DRM_COMMAND_BASE: c_uint = 0x40;
const DRM_VGEM_MODE_MAP_DUMB: c_uint = 0x01;

#[repr(C)]
#[derive(Copy, Clone, Default)]
struct drm_gem_close {
    handle: u32,
    pad: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Default)]
struct drm_prime_handle {
    handle: u32,
    flags: u32,
    fd: i32,
}

#[repr(C)]
#[derive(Copy, Clone, Default)]
struct drm_mode_map_dumb {
    handle: u32,
    pad: u32,
    offset: u64,
}

ioctl_write_ptr!(
    drm_ioctl_gem_close,
    DRM_IOCTL_BASE,
    DRM_IOCTL_GEM_CLOSE,
    drm_gem_close
);
ioctl_readwrite!(
    drm_ioctl_prime_handle_to_fd,
    DRM_IOCTL_BASE,
    DRM_IOCTL_PRIME_HANDLE_TO_FD,
    drm_prime_handle
);
ioctl_readwrite!(
    drm_ioctl_prime_fd_to_handle,
    DRM_IOCTL_BASE,
    DRM_IOCTL_PRIME_FD_TO_HANDLE,
    drm_prime_handle
);
ioctl_readwrite!(
    drm_ioctl_vgem_mode_map_dumb,
    DRM_IOCTL_BASE,
    DRM_COMMAND_BASE + DRM_VGEM_MODE_MAP_DUMB,
    drm_mode_map_dumb
);

/// Kernel GEM operations needed to back display targets with shared buffers.
pub trait GemDevice {
    /// Imports the dma-buf `fd` and returns the GEM handle naming it on this device.  The
    /// descriptor is only borrowed.
    fn prime_fd_to_handle(&self, fd: RawDescriptor) -> WinsysResult<u32>;

    /// Exports the GEM `handle` as a new dma-buf descriptor.  `flags` accepts `DRM_CLOEXEC`.
    fn prime_handle_to_fd(&self, handle: u32, flags: u32) -> WinsysResult<SafeDescriptor>;

    /// Maps the first `size` bytes of the buffer named by `handle` into the process.
    fn map_dumb(&self, handle: u32, size: usize) -> WinsysResult<Box<dyn MappedRegion>>;

    /// Releases the GEM `handle`.
    fn gem_close(&self, handle: u32) -> WinsysResult<()>;
}

/// Returns a `fd` for the first render node that belongs to the VGEM driver.
pub fn open_vgem() -> WinsysResult<File> {
    const VGEM_SYS_DIR_NAME: &str = "/sys/bus/platform/devices/vgem/drm";
    const DRM_DIR_NAME: &str = "/dev/dri";
    const DRM_MAX_MINOR: u32 = 63;
    const RENDER_NODE_START: u32 = 128;

    for n in RENDER_NODE_START..=RENDER_NODE_START + DRM_MAX_MINOR {
        let node = format!("renderD{}", n);
        if !Path::new(VGEM_SYS_DIR_NAME).join(&node).exists() {
            continue;
        }

        let path = Path::new(DRM_DIR_NAME).join(&node);
        match OpenOptions::new().read(true).write(true).open(&path) {
            Ok(fd) => {
                info!("using vgem render node {}", path.display());
                return Ok(fd);
            }
            Err(e) => debug!("failed to open {}: {}", path.display(), e),
        }
    }

    Err(WinsysError::KernelSharingUnavailable)
}

/// An open VGEM render node.
pub struct VgemDevice {
    fd: File,
}

impl VgemDevice {
    /// Opens the VGEM render node, if the driver is loaded.
    pub fn open() -> WinsysResult<VgemDevice> {
        Ok(VgemDevice { fd: open_vgem()? })
    }

    /// Wraps an already opened VGEM render node.
    pub fn from_file(fd: File) -> VgemDevice {
        VgemDevice { fd }
    }
}

impl AsRawDescriptor for VgemDevice {
    fn as_raw_descriptor(&self) -> RawDescriptor {
        self.fd.as_raw_descriptor()
    }
}

impl GemDevice for VgemDevice {
    fn prime_fd_to_handle(&self, fd: RawDescriptor) -> WinsysResult<u32> {
        let mut args = drm_prime_handle {
            fd,
            ..Default::default()
        };

        // Safe because the kernel only writes within `args`, and we check the return value.
        unsafe {
            drm_ioctl_prime_fd_to_handle(self.fd.as_raw_fd(), &mut args)?;
        }

        Ok(args.handle)
    }

    fn prime_handle_to_fd(&self, handle: u32, flags: u32) -> WinsysResult<SafeDescriptor> {
        let mut args = drm_prime_handle {
            handle,
            flags,
            fd: -1,
        };

        // Safe because the kernel only writes within `args`, and we check the return value.
        unsafe {
            drm_ioctl_prime_handle_to_fd(self.fd.as_raw_fd(), &mut args)?;
        }

        if args.fd < 0 {
            return Err(WinsysError::ComponentError(args.fd));
        }

        // Safe because the kernel handed us a new descriptor that nothing else owns.
        Ok(unsafe { SafeDescriptor::from_raw_descriptor(args.fd) })
    }

    fn map_dumb(&self, handle: u32, size: usize) -> WinsysResult<Box<dyn MappedRegion>> {
        let mut args = drm_mode_map_dumb {
            handle,
            ..Default::default()
        };

        // Safe because the kernel only writes within `args`, and we check the return value.
        unsafe {
            drm_ioctl_vgem_mode_map_dumb(self.fd.as_raw_fd(), &mut args)?;
        }

        let mapping =
            MemoryMapping::from_descriptor(&self.fd, size, args.offset, TransferFlags::READ_WRITE)?;
        Ok(Box::new(mapping))
    }

    fn gem_close(&self, handle: u32) -> WinsysResult<()> {
        let args = drm_gem_close {
            handle,
            ..Default::default()
        };

        // Safe because the kernel only reads `args`, and we check the return value.
        unsafe {
            drm_ioctl_gem_close(self.fd.as_raw_fd(), &args)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::mem::size_of;

    use super::*;

    #[test]
    fn ioctl_argument_layout() {
        assert_eq!(size_of::<drm_gem_close>(), 8);
        assert_eq!(size_of::<drm_prime_handle>(), 12);
        assert_eq!(size_of::<drm_mode_map_dumb>(), 16);
    }

    #[test]
    fn open_vgem_when_present() {
        // Most build hosts do not load the vgem module.
        let device = match VgemDevice::open() {
            Ok(device) => device,
            Err(e) => {
                assert!(matches!(e, WinsysError::KernelSharingUnavailable));
                return;
            }
        };

        assert!(device.as_raw_descriptor() >= 0);
        assert!(device.gem_close(u32::MAX).is_err());
    }
}
