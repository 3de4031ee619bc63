// Copyright 2021 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! formats: Utility file for dealing with gallium pipe formats, and stride / size
//! calculations for display targets.

use vmm_sys_util::align_upwards;

use crate::checked_arithmetic;
use crate::checked_range;
use crate::winsys_utils::*;

/// Pixel formats a display target may be created with.  Names follow the gallium
/// `PIPE_FORMAT_*` enumeration; only formats a software rasterizer renders to or samples from
/// directly are listed.
#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PipeFormat {
    B8G8R8A8_UNORM,
    B8G8R8X8_UNORM,
    A8R8G8B8_UNORM,
    X8R8G8B8_UNORM,
    R8G8B8A8_UNORM,
    R8G8B8X8_UNORM,
    A8B8G8R8_UNORM,
    X8B8G8R8_UNORM,
    B5G6R5_UNORM,
    R8_UNORM,
    R8G8_UNORM,
    R16G16B16A16_FLOAT,
    DXT1_RGBA,
    DXT5_RGBA,
    ETC1_RGB8,
}

/// The unit a format is stored in: `width` x `height` pixels packed into `bytes` bytes.
/// Plain formats use 1x1 blocks.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FormatBlock {
    pub width: u32,
    pub height: u32,
    pub bytes: u32,
}

static PACKED_1BPP: FormatBlock = FormatBlock {
    width: 1,
    height: 1,
    bytes: 1,
};

static PACKED_2BPP: FormatBlock = FormatBlock {
    width: 1,
    height: 1,
    bytes: 2,
};

static PACKED_4BPP: FormatBlock = FormatBlock {
    width: 1,
    height: 1,
    bytes: 4,
};

static PACKED_8BPP: FormatBlock = FormatBlock {
    width: 1,
    height: 1,
    bytes: 8,
};

static COMPRESSED_4X4_8B: FormatBlock = FormatBlock {
    width: 4,
    height: 4,
    bytes: 8,
};

static COMPRESSED_4X4_16B: FormatBlock = FormatBlock {
    width: 4,
    height: 4,
    bytes: 16,
};

impl PipeFormat {
    /// Returns the block layout of the format.
    pub fn block(&self) -> FormatBlock {
        match self {
            PipeFormat::R8_UNORM => PACKED_1BPP,
            PipeFormat::B5G6R5_UNORM | PipeFormat::R8G8_UNORM => PACKED_2BPP,
            PipeFormat::B8G8R8A8_UNORM
            | PipeFormat::B8G8R8X8_UNORM
            | PipeFormat::A8R8G8B8_UNORM
            | PipeFormat::X8R8G8B8_UNORM
            | PipeFormat::R8G8B8A8_UNORM
            | PipeFormat::R8G8B8X8_UNORM
            | PipeFormat::A8B8G8R8_UNORM
            | PipeFormat::X8B8G8R8_UNORM => PACKED_4BPP,
            PipeFormat::R16G16B16A16_FLOAT => PACKED_8BPP,
            PipeFormat::DXT1_RGBA | PipeFormat::ETC1_RGB8 => COMPRESSED_4X4_8B,
            PipeFormat::DXT5_RGBA => COMPRESSED_4X4_16B,
        }
    }

    /// Size in bytes of one block.  For plain formats this is the number of bytes per pixel.
    pub fn block_size(&self) -> u32 {
        self.block().bytes
    }

    /// Number of blocks needed to cover `width` pixels.
    pub fn nblocksx(&self, width: u32) -> u32 {
        width.div_ceil(self.block().width)
    }

    /// Number of block rows needed to cover `height` pixels.
    pub fn nblocksy(&self, height: u32) -> u32 {
        height.div_ceil(self.block().height)
    }

    /// Minimum number of bytes in one row of blocks covering `width` pixels.
    pub fn stride(&self, width: u32) -> WinsysResult<u32> {
        let blocks = self.nblocksx(width);
        let block_size = self.block_size();
        checked_arithmetic!(blocks * block_size)
    }
}

/// Rounds `value` up to the next multiple of `alignment`, which must be a power of two.
pub fn align(value: u32, alignment: u32) -> WinsysResult<u32> {
    if !alignment.is_power_of_two() {
        return Err(WinsysError::InvalidAlignment(alignment));
    }

    let mask = alignment - 1;
    checked_range!(value; <= u32::MAX - mask)?;
    Ok(align_upwards!(value, alignment))
}

/// Returns the aligned stride and total byte size of a `width` x `height` image.
pub fn display_target_layout(
    format: PipeFormat,
    width: u32,
    height: u32,
    alignment: u32,
) -> WinsysResult<(u32, usize)> {
    let stride = align(format.stride(width)?, alignment)?;
    let nblocksy = format.nblocksy(height);
    let size = checked_arithmetic!(stride * nblocksy)?;
    Ok((stride, size.try_into()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_strides() {
        assert_eq!(PipeFormat::R8_UNORM.stride(10).unwrap(), 10);
        assert_eq!(PipeFormat::B5G6R5_UNORM.stride(10).unwrap(), 20);
        assert_eq!(PipeFormat::B8G8R8X8_UNORM.stride(10).unwrap(), 40);
        assert_eq!(PipeFormat::R16G16B16A16_FLOAT.stride(10).unwrap(), 80);
        assert_eq!(PipeFormat::R8G8B8A8_UNORM.nblocksy(10), 10);
    }

    #[test]
    fn compressed_strides_use_blocks() {
        // 10 pixels need three 4-wide blocks.
        assert_eq!(PipeFormat::DXT1_RGBA.nblocksx(10), 3);
        assert_eq!(PipeFormat::DXT1_RGBA.stride(10).unwrap(), 24);
        assert_eq!(PipeFormat::DXT5_RGBA.stride(10).unwrap(), 48);
        assert_eq!(PipeFormat::ETC1_RGB8.nblocksy(10), 3);

        let (stride, size) = display_target_layout(PipeFormat::DXT5_RGBA, 10, 10, 16).unwrap();
        assert_eq!(stride, 48);
        assert_eq!(size, 48 * 3);
    }

    #[test]
    fn alignment() {
        assert_eq!(align(400, 64).unwrap(), 448);
        assert_eq!(align(448, 64).unwrap(), 448);
        assert_eq!(align(1, 1).unwrap(), 1);
        assert_eq!(align(0, 16).unwrap(), 0);

        assert!(matches!(
            align(400, 48),
            Err(WinsysError::InvalidAlignment(48))
        ));
        assert!(matches!(align(400, 0), Err(WinsysError::InvalidAlignment(0))));
        assert!(matches!(
            align(u32::MAX, 64),
            Err(WinsysError::CheckedRange { .. })
        ));
    }

    #[test]
    fn aligned_stride_covers_row() {
        let formats = [
            PipeFormat::R8_UNORM,
            PipeFormat::B5G6R5_UNORM,
            PipeFormat::R8G8B8A8_UNORM,
            PipeFormat::R16G16B16A16_FLOAT,
            PipeFormat::DXT1_RGBA,
        ];

        for format in formats {
            for width in [1, 3, 17, 100, 1920] {
                for alignment in [1, 4, 16, 64, 256] {
                    let (stride, size) = display_target_layout(format, width, 7, alignment).unwrap();
                    assert_eq!(stride % alignment, 0);
                    assert!(stride >= format.stride(width).unwrap());
                    assert_eq!(size, stride as usize * format.nblocksy(7) as usize);
                }
            }
        }
    }

    #[test]
    fn layout_overflow() {
        assert!(display_target_layout(PipeFormat::R16G16B16A16_FLOAT, u32::MAX, 1, 1).is_err());
        assert!(display_target_layout(PipeFormat::R8G8B8A8_UNORM, 65536, 65536, 64).is_err());
    }
}
