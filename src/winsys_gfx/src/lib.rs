// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Buffer management shims for a software graphics stack: display targets for a DRI
//! software rasterizer, and a GBM backend that forwards to a GBM library loaded at runtime.

mod dri_sw_winsys;
mod formats;
mod gbm_wrap;
#[macro_use]
mod macros;
mod winsys_os;
mod winsys_utils;

pub use crate::dri_sw_winsys::*;
pub use crate::formats::align;
pub use crate::formats::display_target_layout;
pub use crate::formats::FormatBlock;
pub use crate::formats::PipeFormat;
pub use crate::gbm_wrap::*;
pub use crate::winsys_os::AsRawDescriptor;
pub use crate::winsys_os::FromRawDescriptor as WinsysFromRawDescriptor;
pub use crate::winsys_os::IntoRawDescriptor as WinsysIntoRawDescriptor;
pub use crate::winsys_os::MappedRegion as WinsysMappedRegion;
pub use crate::winsys_os::MemoryMapping as WinsysMemoryMapping;
pub use crate::winsys_os::RawDescriptor;
pub use crate::winsys_os::SafeDescriptor as WinsysDescriptor;
pub use crate::winsys_os::SharedMemory as WinsysSharedMemory;
pub use crate::winsys_utils::*;
