// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! winsys: display target management for software rasterizers running under a DRI loader.

use std::rc::Rc;

use log::debug;

use crate::checked_arithmetic;
use crate::checked_range;
use crate::dri_sw_winsys::aligned::AlignedBuffer;
use crate::dri_sw_winsys::display_target::*;
use crate::dri_sw_winsys::loader::DriswLoader;
use crate::dri_sw_winsys::vgem::GemDevice;
use crate::dri_sw_winsys::vgem::VgemDevice;
use crate::dri_sw_winsys::vgem::DRM_CLOEXEC;
use crate::formats::display_target_layout;
use crate::formats::PipeFormat;
use crate::winsys_os::AsRawDescriptor;
use crate::winsys_os::MappedRegion;
use crate::winsys_utils::*;

/// The interface a software rasterizer uses to allocate and present display targets.
pub trait SwWinsys {
    /// Returns whether targets of `format` can be created for `tex_usage`.
    fn is_displaytarget_format_supported(&self, tex_usage: u32, format: PipeFormat) -> bool;

    /// Creates a display target in process memory.  Returns the target and its stride.
    #[allow(clippy::too_many_arguments)]
    fn displaytarget_create(
        &self,
        tex_usage: u32,
        format: PipeFormat,
        width: u32,
        height: u32,
        alignment: u32,
        front_private: Option<HostToken>,
    ) -> WinsysResult<(DisplayTarget, u32)>;

    /// Wraps the kernel buffer behind `handle`.  Returns the target and the stride recorded in
    /// `handle`.
    fn displaytarget_from_handle(
        &self,
        templ: &ResourceTemplate,
        handle: &WinsysHandle,
    ) -> WinsysResult<(DisplayTarget, u32)>;

    /// Exports `dt` as an external handle of `handle_type`.
    fn displaytarget_get_handle(
        &self,
        dt: &DisplayTarget,
        handle_type: u32,
    ) -> WinsysResult<WinsysHandle>;

    /// Makes the pixels of `dt` addressable by the CPU and returns their address.
    fn displaytarget_map(
        &self,
        dt: &mut DisplayTarget,
        flags: TransferFlags,
    ) -> WinsysResult<*mut u8>;

    /// Ends the access started by `displaytarget_map`.
    fn displaytarget_unmap(&self, dt: &mut DisplayTarget);

    /// Releases `dt`, unmapping it first if needed.
    fn displaytarget_destroy(&self, dt: DisplayTarget);

    /// Presents `dt`, or the `region` of it, to `drawable`.  A region must lie within the
    /// padded rows of the target.
    fn displaytarget_display(
        &self,
        dt: &DisplayTarget,
        drawable: HostToken,
        region: Option<&DisplayRegion>,
    ) -> WinsysResult<()>;
}

/// Display targets for a DRI software driver, optionally shared through VGEM.
pub struct DriSwWinsys {
    loader: Box<dyn DriswLoader>,
    gem: Option<Rc<dyn GemDevice>>,
}

/// Builder for `DriSwWinsys`.
pub struct DriSwWinsysBuilder {
    loader: Box<dyn DriswLoader>,
    use_vgem: bool,
    gem: Option<Rc<dyn GemDevice>>,
}

impl DriSwWinsysBuilder {
    /// Create new a DriSwWinsysBuilder presenting through `loader`.
    pub fn new(loader: Box<dyn DriswLoader>) -> DriSwWinsysBuilder {
        DriSwWinsysBuilder {
            loader,
            use_vgem: cfg!(feature = "vgem"),
            gem: None,
        }
    }

    /// Set whether to probe for a VGEM render node at build time.
    pub fn set_use_vgem(mut self, use_vgem: bool) -> DriSwWinsysBuilder {
        self.use_vgem = use_vgem;
        self
    }

    /// Use `gem` for kernel buffer sharing instead of probing for VGEM.
    pub fn set_gem_device(mut self, gem: Rc<dyn GemDevice>) -> DriSwWinsysBuilder {
        self.gem = Some(gem);
        self
    }

    /// Builds the winsys.  A missing VGEM device only disables kernel buffer sharing.
    pub fn build(self) -> DriSwWinsys {
        let gem = match self.gem {
            Some(gem) => Some(gem),
            None if self.use_vgem => match VgemDevice::open() {
                Ok(vgem) => Some(Rc::new(vgem) as Rc<dyn GemDevice>),
                Err(e) => {
                    debug!("kernel buffer sharing disabled: {}", e);
                    None
                }
            },
            None => None,
        };

        DriSwWinsys {
            loader: self.loader,
            gem,
        }
    }
}

impl DriSwWinsys {
    /// Whether display targets can be imported from and exported to dma-bufs.
    pub fn has_kernel_sharing(&self) -> bool {
        self.gem.is_some()
    }

    fn gem(&self) -> WinsysResult<&Rc<dyn GemDevice>> {
        self.gem
            .as_ref()
            .ok_or(WinsysError::KernelSharingUnavailable)
    }
}

fn kernel_map_size(height: u32, stride: u32) -> WinsysResult<usize> {
    let size = checked_arithmetic!(height * stride)?;
    Ok(size.try_into()?)
}

impl SwWinsys for DriSwWinsys {
    fn is_displaytarget_format_supported(&self, _tex_usage: u32, _format: PipeFormat) -> bool {
        // No format negotiation: the rasterizer only asks for formats it can render.
        true
    }

    fn displaytarget_create(
        &self,
        _tex_usage: u32,
        format: PipeFormat,
        width: u32,
        height: u32,
        alignment: u32,
        front_private: Option<HostToken>,
    ) -> WinsysResult<(DisplayTarget, u32)> {
        if width == 0 || height == 0 {
            return Err(WinsysError::InvalidDimensions);
        }

        let (stride, size) = display_target_layout(format, width, height, alignment)?;
        let buffer = AlignedBuffer::new(size, alignment.try_into()?)?;

        let dt = DisplayTarget {
            format,
            width,
            height,
            stride,
            map_flags: TransferFlags::empty(),
            mapped: false,
            storage: TargetStorage::User(buffer),
            front_private,
        };

        Ok((dt, stride))
    }

    fn displaytarget_from_handle(
        &self,
        templ: &ResourceTemplate,
        handle: &WinsysHandle,
    ) -> WinsysResult<(DisplayTarget, u32)> {
        if handle.handle_type != WINSYS_HANDLE_TYPE_FD {
            return Err(WinsysError::InvalidHandleType(handle.handle_type));
        }

        let gem = self.gem()?;
        let gem_handle = gem.prime_fd_to_handle(handle.os_handle.as_raw_descriptor())?;

        let dt = DisplayTarget {
            format: templ.format,
            width: templ.width0,
            height: templ.height0,
            stride: handle.stride,
            map_flags: TransferFlags::empty(),
            mapped: false,
            storage: TargetStorage::Prime(PrimeBuffer {
                gem: gem.clone(),
                handle: gem_handle,
                mapping: None,
            }),
            front_private: None,
        };

        Ok((dt, handle.stride))
    }

    fn displaytarget_get_handle(
        &self,
        dt: &DisplayTarget,
        handle_type: u32,
    ) -> WinsysResult<WinsysHandle> {
        self.gem()?;
        if handle_type != WINSYS_HANDLE_TYPE_FD {
            return Err(WinsysError::InvalidHandleType(handle_type));
        }

        let prime = match &dt.storage {
            TargetStorage::Prime(prime) => prime,
            TargetStorage::User(_) => return Err(WinsysError::Unsupported),
        };

        let os_handle = prime.gem.prime_handle_to_fd(prime.handle, DRM_CLOEXEC)?;
        Ok(WinsysHandle {
            handle_type: WINSYS_HANDLE_TYPE_FD,
            os_handle,
            stride: dt.stride,
        })
    }

    fn displaytarget_map(
        &self,
        dt: &mut DisplayTarget,
        flags: TransferFlags,
    ) -> WinsysResult<*mut u8> {
        if let TargetStorage::Prime(prime) = &mut dt.storage {
            if prime.mapping.is_none() {
                let size = kernel_map_size(dt.height, dt.stride)?;
                prime.mapping = Some(prime.gem.map_dumb(prime.handle, size)?);
            }
        }

        let ptr = dt
            .resident_ptr()
            .ok_or(WinsysError::ContractViolation("display target has no storage"))?;
        dt.mapped = true;

        if flags.contains(TransferFlags::READ) {
            if let Some(front) = dt.front_private {
                let (width, height, stride) = (dt.width, dt.height, dt.stride);
                if let Some(data) = dt.resident_slice_mut() {
                    self.loader
                        .get_image(front, 0, 0, width, height, stride, data);
                }
            }
        }
        dt.map_flags = flags;

        Ok(ptr)
    }

    fn displaytarget_unmap(&self, dt: &mut DisplayTarget) {
        if dt.map_flags.contains(TransferFlags::WRITE) {
            if let (Some(front), Some(data)) = (dt.front_private, dt.resident_slice()) {
                self.loader
                    .put_image2(front, data, 0, 0, dt.width, dt.height, dt.stride);
            }
        }
        dt.map_flags = TransferFlags::empty();

        if let TargetStorage::Prime(prime) = &mut dt.storage {
            prime.mapping = None;
        }
        dt.mapped = false;
    }

    fn displaytarget_destroy(&self, mut dt: DisplayTarget) {
        if dt.mapped {
            self.displaytarget_unmap(&mut dt);
        }
    }

    fn displaytarget_display(
        &self,
        dt: &DisplayTarget,
        drawable: HostToken,
        region: Option<&DisplayRegion>,
    ) -> WinsysResult<()> {
        let transient: Box<dyn MappedRegion>;
        let data = match (dt.resident_slice(), &dt.storage) {
            (Some(data), _) => data,
            (None, TargetStorage::Prime(prime)) => {
                let size = kernel_map_size(dt.height, dt.stride)?;
                transient = prime.gem.map_dumb(prime.handle, size)?;
                transient.as_slice()
            }
            (None, TargetStorage::User(_)) => {
                return Err(WinsysError::ContractViolation("display target has no storage"))
            }
        };

        let block_size = dt.format.block_size();
        match region {
            Some(region) => {
                let (x, y, stride) = (region.x, region.y, dt.stride);
                let (width, height) = (region.width, region.height);
                let right = checked_arithmetic!(x + width)?;
                let bottom = checked_arithmetic!(y + height)?;
                let row_width = stride / block_size;
                let target_height = dt.height;
                checked_range!(right <= row_width)?;
                checked_range!(bottom <= target_height)?;

                let row = checked_arithmetic!(y * stride)?;
                let column = checked_arithmetic!(x * block_size)?;
                let offset = checked_arithmetic!(row + column)? as usize;
                let len = data.len();
                checked_range!(offset; <= len)?;

                self.loader.put_image2(
                    drawable,
                    &data[offset..],
                    region.x,
                    region.y,
                    region.width,
                    region.height,
                    dt.stride,
                );
            }
            None => {
                // Present whole rows, padding included; the host clips to the drawable.
                let width = dt.stride / block_size;
                self.loader.put_image(drawable, data, width, dt.height);
            }
        }

        Ok(())
    }
}
