// Copyright 2023 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

mod descriptor;
mod shm;
pub mod sys;

pub use descriptor::AsRawDescriptor;
pub use descriptor::FromRawDescriptor;
pub use descriptor::IntoRawDescriptor;
pub use descriptor::SafeDescriptor;
pub use shm::SharedMemory;

pub use sys::platform::descriptor::RawDescriptor;
pub use sys::platform::memory_mapping::MemoryMapping;

/// A region of memory mapped into the current process.
///
/// # Safety
/// Implementations must keep `as_ptr()..as_ptr() + size()` valid for reads and writes until
/// they are dropped.
pub unsafe trait MappedRegion {
    /// Returns a pointer to the beginning of the memory region.
    fn as_ptr(&self) -> *mut u8;

    /// Returns the size of the memory region in bytes.
    fn size(&self) -> usize;
}

impl dyn MappedRegion {
    /// Returns the mapped bytes.
    pub fn as_slice(&self) -> &[u8] {
        // Safe because implementors guarantee the range stays valid while `self` lives.
        unsafe { std::slice::from_raw_parts(self.as_ptr(), self.size()) }
    }

    /// Returns the mapped bytes for writing.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // Safe because implementors guarantee the range stays valid while `self` lives, and
        // the exclusive borrow prevents aliasing through this region.
        unsafe { std::slice::from_raw_parts_mut(self.as_ptr(), self.size()) }
    }
}
