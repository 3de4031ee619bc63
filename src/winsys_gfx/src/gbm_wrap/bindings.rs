// Copyright 2018 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

// Types from gbm.h, with the entry points expressed as function pointer types since they are
// resolved from the wrapped library at runtime.

#![allow(dead_code, non_camel_case_types)]

use std::os::raw::c_char;
use std::os::raw::c_int;
use std::os::raw::c_void;

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct gbm_device {
    _unused: [u8; 0],
}
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct gbm_bo {
    _unused: [u8; 0],
}
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct gbm_surface {
    _unused: [u8; 0],
}
#[repr(C)]
#[derive(Copy, Clone)]
pub union gbm_bo_handle {
    pub ptr: *mut c_void,
    pub s32: i32,
    pub u32: u32,
    pub s64: i64,
    pub u64: u64,
}

pub const GBM_BO_IMPORT_WL_BUFFER: u32 = 0x5501;
pub const GBM_BO_IMPORT_EGL_IMAGE: u32 = 0x5502;
pub const GBM_BO_IMPORT_FD: u32 = 0x5503;
pub const GBM_BO_IMPORT_FD_MODIFIER: u32 = 0x5504;

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct gbm_import_fd_data {
    pub fd: c_int,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub format: u32,
}

pub const GBM_BO_USE_SCANOUT: u32 = 1;
pub const GBM_BO_USE_CURSOR: u32 = 2;
pub const GBM_BO_USE_RENDERING: u32 = 4;
pub const GBM_BO_USE_WRITE: u32 = 8;
pub const GBM_BO_USE_LINEAR: u32 = 16;

pub const GBM_BO_TRANSFER_READ: u32 = 1;
pub const GBM_BO_TRANSFER_WRITE: u32 = 2;
pub const GBM_BO_TRANSFER_READ_WRITE: u32 = 3;

pub type gbm_bo_create_t = unsafe extern "C" fn(
    gbm: *mut gbm_device,
    width: u32,
    height: u32,
    format: u32,
    flags: u32,
) -> *mut gbm_bo;
pub type gbm_bo_destroy_t = unsafe extern "C" fn(bo: *mut gbm_bo);
pub type gbm_bo_get_device_t = unsafe extern "C" fn(bo: *mut gbm_bo) -> *mut gbm_device;
pub type gbm_bo_get_fd_t = unsafe extern "C" fn(bo: *mut gbm_bo) -> c_int;
pub type gbm_bo_get_format_t = unsafe extern "C" fn(bo: *mut gbm_bo) -> u32;
pub type gbm_bo_get_handle_t = unsafe extern "C" fn(bo: *mut gbm_bo) -> gbm_bo_handle;
pub type gbm_bo_get_height_t = unsafe extern "C" fn(bo: *mut gbm_bo) -> u32;
pub type gbm_bo_get_stride_t = unsafe extern "C" fn(bo: *mut gbm_bo) -> u32;
pub type gbm_bo_get_width_t = unsafe extern "C" fn(bo: *mut gbm_bo) -> u32;
pub type gbm_bo_import_t = unsafe extern "C" fn(
    gbm: *mut gbm_device,
    type_: u32,
    buffer: *mut c_void,
    usage: u32,
) -> *mut gbm_bo;
pub type gbm_bo_map_t = unsafe extern "C" fn(
    bo: *mut gbm_bo,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    flags: u32,
    stride: *mut u32,
    map_data: *mut *mut c_void,
) -> *mut c_void;
pub type gbm_bo_unmap_t = unsafe extern "C" fn(bo: *mut gbm_bo, map_data: *mut c_void);
pub type gbm_bo_write_t =
    unsafe extern "C" fn(bo: *mut gbm_bo, buf: *const c_void, count: usize) -> c_int;
pub type gbm_create_device_t = unsafe extern "C" fn(fd: c_int) -> *mut gbm_device;
pub type gbm_device_destroy_t = unsafe extern "C" fn(gbm: *mut gbm_device);
pub type gbm_device_get_backend_name_t = unsafe extern "C" fn(gbm: *mut gbm_device) -> *const c_char;
pub type gbm_device_get_fd_t = unsafe extern "C" fn(gbm: *mut gbm_device) -> c_int;
pub type gbm_device_is_format_supported_t =
    unsafe extern "C" fn(gbm: *mut gbm_device, format: u32, usage: u32) -> c_int;
pub type gbm_surface_create_t = unsafe extern "C" fn(
    gbm: *mut gbm_device,
    width: u32,
    height: u32,
    format: u32,
    flags: u32,
) -> *mut gbm_surface;
pub type gbm_surface_destroy_t = unsafe extern "C" fn(surface: *mut gbm_surface);
pub type gbm_surface_has_free_buffers_t = unsafe extern "C" fn(surface: *mut gbm_surface) -> c_int;
pub type gbm_surface_lock_front_buffer_t =
    unsafe extern "C" fn(surface: *mut gbm_surface) -> *mut gbm_bo;
pub type gbm_surface_release_buffer_t =
    unsafe extern "C" fn(surface: *mut gbm_surface, bo: *mut gbm_bo);
