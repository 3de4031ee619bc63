// Copyright 2023 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::num::NonZeroUsize;
use std::os::unix::io::AsFd;
use std::ptr::NonNull;

use libc::c_void;
use libc::off_t;
use log::error;
use nix::sys::mman::mmap;
use nix::sys::mman::munmap;
use nix::sys::mman::MapFlags;
use nix::sys::mman::ProtFlags;

use crate::winsys_os::MappedRegion;
use crate::winsys_utils::TransferFlags;
use crate::winsys_utils::WinsysError;
use crate::winsys_utils::WinsysResult;

/// Wraps a shared memory mapping in the current process. Provides RAII semantics including
/// munmap when no longer needed.
#[derive(Debug)]
pub struct MemoryMapping {
    pub addr: NonNull<c_void>,
    pub size: usize,
}

impl Drop for MemoryMapping {
    fn drop(&mut self) {
        // This is safe because we mmap the area at addr ourselves, and nobody
        // else is holding a reference to it.
        if let Err(e) = unsafe { munmap(self.addr, self.size) } {
            error!("failed to unmap {} bytes at {:p}: {}", self.size, self.addr, e);
        }
    }
}

impl MemoryMapping {
    /// Maps `size` bytes of `descriptor` starting at `offset`, shared with every other mapping
    /// of the same object.
    pub fn from_descriptor<F: AsFd>(
        descriptor: F,
        size: usize,
        offset: u64,
        access: TransferFlags,
    ) -> WinsysResult<MemoryMapping> {
        let mut prot = ProtFlags::empty();
        if access.contains(TransferFlags::READ) {
            prot |= ProtFlags::PROT_READ;
        }
        if access.contains(TransferFlags::WRITE) {
            prot |= ProtFlags::PROT_WRITE;
        }
        if prot.is_empty() {
            return Err(WinsysError::ContractViolation("incorrect access flags"));
        }

        let non_zero_size =
            NonZeroUsize::new(size).ok_or(WinsysError::ContractViolation("zero size mapping"))?;
        let offset: off_t = offset.try_into()?;

        // Safe because we map a fresh region chosen by the kernel and only hand it out through
        // the returned object, which unmaps it on drop.
        let addr = unsafe {
            mmap(
                None,
                non_zero_size,
                prot,
                MapFlags::MAP_SHARED,
                descriptor,
                offset,
            )?
        };
        Ok(MemoryMapping { addr, size })
    }
}

// Safe because the region stays mapped until `drop`.
unsafe impl MappedRegion for MemoryMapping {
    fn as_ptr(&self) -> *mut u8 {
        self.addr.as_ptr() as *mut u8
    }

    fn size(&self) -> usize {
        self.size
    }
}
