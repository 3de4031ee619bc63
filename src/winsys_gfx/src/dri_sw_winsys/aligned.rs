// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Owned CPU memory with caller-chosen alignment, backing user memory display targets.

use std::alloc;
use std::alloc::GlobalAlloc;
use std::slice;

use crate::winsys_utils::WinsysError;
use crate::winsys_utils::WinsysResult;

/// Zero-initialized heap memory aligned to a power of two.
pub struct AlignedBuffer {
    /// Raw pointer to the start of the buffer.
    pointer: *mut u8,

    /// Allocation layout.  The size is never 0.
    layout: alloc::Layout,
}

impl AlignedBuffer {
    /// Allocates `size` zeroed bytes aligned to `alignment`.
    pub fn new(size: usize, alignment: usize) -> WinsysResult<AlignedBuffer> {
        let failure = WinsysError::AllocationFailure { size, alignment };
        if size == 0 {
            return Err(failure);
        }

        let layout = alloc::Layout::from_size_align(size, alignment).map_err(|_| failure)?;

        // Safe because the layout has a non-zero size.
        let pointer = unsafe { alloc::System.alloc_zeroed(layout) };
        if pointer.is_null() {
            return Err(WinsysError::AllocationFailure { size, alignment });
        }

        Ok(AlignedBuffer { pointer, layout })
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.layout.size()
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.pointer
    }

    pub fn as_slice(&self) -> &[u8] {
        // Safe because the allocation is initialized and lives as long as `self`.
        unsafe { slice::from_raw_parts(self.pointer, self.len()) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // Safe because the allocation is initialized, lives as long as `self`, and the
        // exclusive borrow prevents aliasing.
        unsafe { slice::from_raw_parts_mut(self.pointer, self.len()) }
    }
}

impl Drop for AlignedBuffer {
    /// Free this buffer.
    fn drop(&mut self) {
        // Safe because we have allocated this buffer using `alloc::System` with this layout.
        unsafe {
            alloc::System.dealloc(self.pointer, self.layout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_is_honored() {
        for alignment in [1, 16, 64, 4096] {
            let buffer = AlignedBuffer::new(4000, alignment).unwrap();
            assert_eq!(buffer.as_ptr() as usize % alignment, 0);
            assert_eq!(buffer.len(), 4000);
            assert!(buffer.as_slice().iter().all(|b| *b == 0));
        }
    }

    #[test]
    fn rejects_bad_requests() {
        assert!(matches!(
            AlignedBuffer::new(0, 64),
            Err(WinsysError::AllocationFailure { size: 0, .. })
        ));
        assert!(AlignedBuffer::new(64, 3).is_err());
    }
}
