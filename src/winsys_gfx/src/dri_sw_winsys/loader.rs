// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::winsys_utils::HostToken;

/// Drawing callbacks provided by the host display server integration.
///
/// The winsys calls `get_image` to read the host front buffer into a display target when it
/// is mapped for reading, and the `put_image` variants to push display target contents back
/// to the host on write-back or presentation.
pub trait DriswLoader {
    /// Copies the `width` x `height` rectangle at (`x`, `y`) of `drawable` into `data`, whose
    /// rows are `stride` bytes apart.
    #[allow(clippy::too_many_arguments)]
    fn get_image(
        &self,
        drawable: HostToken,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        stride: u32,
        data: &mut [u8],
    );

    /// Presents `data` to `drawable` at the origin; rows are `width` pixels wide.
    fn put_image(&self, drawable: HostToken, data: &[u8], width: u32, height: u32);

    /// Presents the `width` x `height` rectangle starting at `data` to (`x`, `y`) of
    /// `drawable`; rows are `stride` bytes apart.
    #[allow(clippy::too_many_arguments)]
    fn put_image2(
        &self,
        drawable: HostToken,
        data: &[u8],
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        stride: u32,
    );
}
