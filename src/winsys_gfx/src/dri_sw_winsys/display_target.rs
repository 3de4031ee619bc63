// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::rc::Rc;

use log::warn;

use crate::dri_sw_winsys::aligned::AlignedBuffer;
use crate::dri_sw_winsys::vgem::GemDevice;
use crate::formats::PipeFormat;
use crate::winsys_os::MappedRegion;
use crate::winsys_utils::*;

/// Description of an imported resource; only the fields a display target keeps are listed.
#[derive(Copy, Clone, Debug)]
pub struct ResourceTemplate {
    pub format: PipeFormat,
    pub width0: u32,
    pub height0: u32,
}

/// A rectangle of a display target, in pixels.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct DisplayRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// A GEM buffer on the VGEM device, plus its CPU mapping while the target is mapped.
pub(crate) struct PrimeBuffer {
    pub(crate) gem: Rc<dyn GemDevice>,
    pub(crate) handle: u32,
    pub(crate) mapping: Option<Box<dyn MappedRegion>>,
}

impl Drop for PrimeBuffer {
    fn drop(&mut self) {
        // The mapping has to go before the handle it maps.
        self.mapping = None;
        if let Err(e) = self.gem.gem_close(self.handle) {
            warn!("failed to close gem handle {}: {}", self.handle, e);
        }
    }
}

pub(crate) enum TargetStorage {
    User(AlignedBuffer),
    Prime(PrimeBuffer),
}

/// A CPU-addressable pixel buffer the software rasterizer renders into.
///
/// Targets are either backed by process memory owned by the target, or by a kernel buffer
/// on the VGEM device that can be shared with other processes.
pub struct DisplayTarget {
    pub(crate) format: PipeFormat,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) stride: u32,
    pub(crate) map_flags: TransferFlags,
    pub(crate) mapped: bool,
    pub(crate) storage: TargetStorage,
    pub(crate) front_private: Option<HostToken>,
}

impl DisplayTarget {
    pub fn format(&self) -> PipeFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes between the starts of two rows.
    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// Whether the target is backed by a kernel buffer.
    pub fn is_prime(&self) -> bool {
        matches!(self.storage, TargetStorage::Prime(_))
    }

    pub fn is_mapped(&self) -> bool {
        self.mapped
    }

    /// Access recorded by the last map, empty while unmapped.
    pub fn map_flags(&self) -> TransferFlags {
        self.map_flags
    }

    /// The host front buffer this target reads from and writes back to, if any.
    pub fn front_private(&self) -> Option<HostToken> {
        self.front_private
    }

    /// The mapped pixels, or `None` while the target is unmapped.
    pub fn mapped_slice(&self) -> Option<&[u8]> {
        if !self.mapped {
            return None;
        }

        self.resident_slice()
    }

    /// The mapped pixels for writing, or `None` while the target is unmapped.
    pub fn mapped_slice_mut(&mut self) -> Option<&mut [u8]> {
        if !self.mapped {
            return None;
        }

        self.resident_slice_mut()
    }

    /// Pixels reachable without creating a mapping.
    pub(crate) fn resident_slice(&self) -> Option<&[u8]> {
        match &self.storage {
            TargetStorage::User(buffer) => Some(buffer.as_slice()),
            TargetStorage::Prime(prime) => prime.mapping.as_ref().map(|m| m.as_slice()),
        }
    }

    pub(crate) fn resident_slice_mut(&mut self) -> Option<&mut [u8]> {
        match &mut self.storage {
            TargetStorage::User(buffer) => Some(buffer.as_mut_slice()),
            TargetStorage::Prime(prime) => prime.mapping.as_mut().map(|m| m.as_mut_slice()),
        }
    }

    pub(crate) fn resident_ptr(&self) -> Option<*mut u8> {
        match &self.storage {
            TargetStorage::User(buffer) => Some(buffer.as_ptr()),
            TargetStorage::Prime(prime) => prime.mapping.as_ref().map(|m| m.as_ptr()),
        }
    }
}
