// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! dri_sw_winsys: CPU display targets for software rasterizers, with optional zero-copy
//! sharing through VGEM.

mod aligned;
mod display_target;
mod loader;
mod vgem;
mod winsys;

pub use display_target::DisplayRegion;
pub use display_target::DisplayTarget;
pub use display_target::ResourceTemplate;
pub use loader::DriswLoader;
pub use vgem::open_vgem;
pub use vgem::GemDevice;
pub use vgem::VgemDevice;
pub use vgem::DRM_CLOEXEC;
pub use winsys::DriSwWinsys;
pub use winsys::DriSwWinsysBuilder;
pub use winsys::SwWinsys;
