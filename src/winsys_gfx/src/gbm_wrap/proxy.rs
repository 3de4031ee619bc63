// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::fmt;

use crate::gbm_wrap::bindings::gbm_bo;
use crate::gbm_wrap::bindings::gbm_bo_handle;
use crate::gbm_wrap::bindings::gbm_surface;
use crate::winsys_utils::OpaqueToken;

/// Names a buffer proxy owned by a `GbmWrapperDevice`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BoId(pub(crate) u64);

/// Names a surface proxy owned by a `GbmWrapperDevice`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SurfaceId(pub(crate) u64);

/// The driver handle of a buffer, as reported by the wrapped library.
#[derive(Copy, Clone)]
pub struct GbmBoHandle(pub gbm_bo_handle);

impl GbmBoHandle {
    pub fn as_u32(&self) -> u32 {
        // Safe because every bit pattern is a valid u32.
        unsafe { self.0.u32 }
    }

    pub fn as_u64(&self) -> u64 {
        // Safe because the union is 64 bits wide and every bit pattern is a valid u64.
        unsafe { self.0.u64 }
    }
}

impl fmt::Debug for GbmBoHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "GbmBoHandle({:#x})", self.as_u64())
    }
}

/// Buffer attributes the host reads without calling into the wrapped library.
#[derive(Copy, Clone, Debug)]
pub struct GbmBoBase {
    pub width: u32,
    pub height: u32,
    pub format: u32,
    pub stride: u32,
    pub handle: GbmBoHandle,
}

/// Surface attributes, recorded from the creation request since the wrapped library has no
/// getters for them.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct GbmSurfaceBase {
    pub width: u32,
    pub height: u32,
    pub format: u32,
    pub flags: u32,
}

/// Who gives a buffer back to the wrapped library.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum BoOwner {
    /// Created or imported; freed with `bo_destroy`.
    Device,
    /// Locked from a surface; returned with `surface_release_buffer`.
    Surface(SurfaceId),
}

pub(crate) struct GbmWrapperBo {
    pub(crate) base: GbmBoBase,
    pub(crate) wrapped: OpaqueToken<gbm_bo>,
    pub(crate) owner: BoOwner,
}

pub(crate) struct GbmWrapperSurface {
    pub(crate) base: GbmSurfaceBase,
    pub(crate) wrapped: OpaqueToken<gbm_surface>,
}
