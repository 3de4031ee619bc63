// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! An in-process GBM implementation for exercising the wrapper without a GPU.  Objects are
//! fake addresses that are tracked, never dereferenced.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::os::raw::c_char;
use std::os::raw::c_int;
use std::os::raw::c_void;

use crate::gbm_wrap::bindings::*;
use crate::gbm_wrap::symbols::SymbolLoader;
use crate::winsys_utils::WinsysError;
use crate::winsys_utils::WinsysResult;

/// DRM_FORMAT_XRGB8888, the only format the fake claims to support.
pub const FAKE_SUPPORTED_FORMAT: u32 = 0x34325258;

#[derive(Copy, Clone, Debug)]
pub struct FakeBo {
    pub width: u32,
    pub height: u32,
    pub format: u32,
    pub device: usize,
    pub surface: Option<usize>,
}

#[derive(Default)]
pub struct FakeGbm {
    pub fail_create_device: bool,
    pub fail_bo_create: bool,
    pub fail_surface_create: bool,
    pub repeat_front_buffer: bool,
    pub library_unloaded: bool,
    pub device_destroyed_after_unload: bool,
    pub devices: BTreeMap<usize, c_int>,
    pub bos: BTreeMap<usize, FakeBo>,
    pub surfaces: BTreeMap<usize, usize>,
    pub last_front_buffer: Option<usize>,
    calls: BTreeMap<&'static str, u32>,
    next_address: usize,
}

impl FakeGbm {
    fn record(&mut self, name: &'static str) {
        *self.calls.entry(name).or_default() += 1;
    }

    fn alloc_address(&mut self) -> usize {
        self.next_address += 0x40;
        0x10000 + self.next_address
    }

    fn new_bo(&mut self, bo: FakeBo) -> *mut gbm_bo {
        let address = self.alloc_address();
        self.bos.insert(address, bo);
        address as *mut gbm_bo
    }
}

thread_local! {
    static STATE: RefCell<FakeGbm> = RefCell::new(FakeGbm::default());
}

pub fn with<R>(f: impl FnOnce(&mut FakeGbm) -> R) -> R {
    STATE.with(|state| f(&mut state.borrow_mut()))
}

pub fn reset() {
    with(|state| *state = FakeGbm::default());
}

/// Number of times the fake entry point `name` ran since the last reset.
pub fn calls(name: &str) -> u32 {
    with(|state| state.calls.get(name).copied().unwrap_or(0))
}

fn bo_info(bo: *mut gbm_bo) -> FakeBo {
    with(|state| state.bos[&(bo as usize)])
}

unsafe extern "C" fn fake_gbm_bo_create(
    gbm: *mut gbm_device,
    width: u32,
    height: u32,
    format: u32,
    _flags: u32,
) -> *mut gbm_bo {
    with(|state| {
        state.record("gbm_bo_create");
        if state.fail_bo_create {
            return std::ptr::null_mut();
        }
        state.new_bo(FakeBo {
            width,
            height,
            format,
            device: gbm as usize,
            surface: None,
        })
    })
}

unsafe extern "C" fn fake_gbm_bo_destroy(bo: *mut gbm_bo) {
    with(|state| {
        state.record("gbm_bo_destroy");
        state.bos.remove(&(bo as usize));
    })
}

unsafe extern "C" fn fake_gbm_bo_get_device(bo: *mut gbm_bo) -> *mut gbm_device {
    bo_info(bo).device as *mut gbm_device
}

unsafe extern "C" fn fake_gbm_bo_get_fd(bo: *mut gbm_bo) -> c_int {
    with(|state| state.record("gbm_bo_get_fd"));
    if bo_info(bo).format != FAKE_SUPPORTED_FORMAT {
        return -libc::EINVAL;
    }
    libc::memfd_create(b"fake_gbm_bo\0".as_ptr() as *const c_char, libc::MFD_CLOEXEC)
}

unsafe extern "C" fn fake_gbm_bo_get_format(bo: *mut gbm_bo) -> u32 {
    bo_info(bo).format
}

unsafe extern "C" fn fake_gbm_bo_get_handle(bo: *mut gbm_bo) -> gbm_bo_handle {
    gbm_bo_handle { u64: bo as u64 }
}

unsafe extern "C" fn fake_gbm_bo_get_height(bo: *mut gbm_bo) -> u32 {
    bo_info(bo).height
}

unsafe extern "C" fn fake_gbm_bo_get_stride(bo: *mut gbm_bo) -> u32 {
    bo_info(bo).width * 4
}

unsafe extern "C" fn fake_gbm_bo_get_width(bo: *mut gbm_bo) -> u32 {
    bo_info(bo).width
}

unsafe extern "C" fn fake_gbm_bo_import(
    gbm: *mut gbm_device,
    type_: u32,
    buffer: *mut c_void,
    _usage: u32,
) -> *mut gbm_bo {
    let (width, height, format) = if type_ == GBM_BO_IMPORT_FD {
        let data = &*(buffer as *const gbm_import_fd_data);
        (data.width, data.height, data.format)
    } else {
        (1, 1, FAKE_SUPPORTED_FORMAT)
    };

    with(|state| {
        state.record("gbm_bo_import");
        state.new_bo(FakeBo {
            width,
            height,
            format,
            device: gbm as usize,
            surface: None,
        })
    })
}

unsafe extern "C" fn fake_gbm_bo_map(
    bo: *mut gbm_bo,
    _x: u32,
    _y: u32,
    _width: u32,
    _height: u32,
    _flags: u32,
    stride: *mut u32,
    map_data: *mut *mut c_void,
) -> *mut c_void {
    with(|state| state.record("gbm_bo_map"));
    *stride = bo_info(bo).width * 4;
    *map_data = bo as *mut c_void;
    bo as *mut c_void
}

unsafe extern "C" fn fake_gbm_bo_unmap(bo: *mut gbm_bo, map_data: *mut c_void) {
    assert_eq!(map_data, bo as *mut c_void);
    with(|state| state.record("gbm_bo_unmap"));
}

unsafe extern "C" fn fake_gbm_bo_write(bo: *mut gbm_bo, _buf: *const c_void, count: usize) -> c_int {
    with(|state| state.record("gbm_bo_write"));
    let info = bo_info(bo);
    if count > (info.width * info.height * 4) as usize {
        return -libc::EINVAL;
    }
    0
}

unsafe extern "C" fn fake_gbm_create_device(fd: c_int) -> *mut gbm_device {
    with(|state| {
        state.record("gbm_create_device");
        if state.fail_create_device {
            return std::ptr::null_mut();
        }
        let address = state.alloc_address();
        state.devices.insert(address, fd);
        address as *mut gbm_device
    })
}

unsafe extern "C" fn fake_gbm_device_destroy(gbm: *mut gbm_device) {
    with(|state| {
        state.record("gbm_device_destroy");
        state.device_destroyed_after_unload |= state.library_unloaded;
        state.devices.remove(&(gbm as usize));
    })
}

unsafe extern "C" fn fake_gbm_device_get_backend_name(_gbm: *mut gbm_device) -> *const c_char {
    b"fake\0".as_ptr() as *const c_char
}

unsafe extern "C" fn fake_gbm_device_get_fd(gbm: *mut gbm_device) -> c_int {
    with(|state| state.devices[&(gbm as usize)])
}

unsafe extern "C" fn fake_gbm_device_is_format_supported(
    _gbm: *mut gbm_device,
    format: u32,
    _usage: u32,
) -> c_int {
    (format == FAKE_SUPPORTED_FORMAT) as c_int
}

unsafe extern "C" fn fake_gbm_surface_create(
    gbm: *mut gbm_device,
    _width: u32,
    _height: u32,
    _format: u32,
    _flags: u32,
) -> *mut gbm_surface {
    with(|state| {
        state.record("gbm_surface_create");
        if state.fail_surface_create {
            return std::ptr::null_mut();
        }
        let address = state.alloc_address();
        state.surfaces.insert(address, gbm as usize);
        address as *mut gbm_surface
    })
}

unsafe extern "C" fn fake_gbm_surface_destroy(surface: *mut gbm_surface) {
    with(|state| {
        state.record("gbm_surface_destroy");
        state.surfaces.remove(&(surface as usize));
        state
            .bos
            .retain(|_, bo| bo.surface != Some(surface as usize));
    })
}

unsafe extern "C" fn fake_gbm_surface_has_free_buffers(surface: *mut gbm_surface) -> c_int {
    with(|state| {
        let locked = state
            .bos
            .values()
            .filter(|bo| bo.surface == Some(surface as usize))
            .count();
        (locked < 2) as c_int
    })
}

unsafe extern "C" fn fake_gbm_surface_lock_front_buffer(surface: *mut gbm_surface) -> *mut gbm_bo {
    with(|state| {
        state.record("gbm_surface_lock_front_buffer");
        if state.repeat_front_buffer {
            if let Some(last) = state.last_front_buffer {
                return last as *mut gbm_bo;
            }
        }

        let device = state.surfaces[&(surface as usize)];
        let bo = state.new_bo(FakeBo {
            width: 64,
            height: 64,
            format: FAKE_SUPPORTED_FORMAT,
            device,
            surface: Some(surface as usize),
        });
        state.last_front_buffer = Some(bo as usize);
        bo
    })
}

unsafe extern "C" fn fake_gbm_surface_release_buffer(_surface: *mut gbm_surface, bo: *mut gbm_bo) {
    with(|state| {
        state.record("gbm_surface_release_buffer");
        state.bos.remove(&(bo as usize));
    })
}

macro_rules! fake_symbols {
    ($($name:ident => $function:ident: $ty:ty,)*) => {
        fn fake_symbol_table() -> HashMap<&'static str, *const c_void> {
            let mut symbols = HashMap::new();
            $(symbols.insert(stringify!($name), $function as $ty as *const c_void);)*
            symbols
        }
    };
}

fake_symbols! {
    gbm_bo_create => fake_gbm_bo_create: gbm_bo_create_t,
    gbm_bo_destroy => fake_gbm_bo_destroy: gbm_bo_destroy_t,
    gbm_bo_get_device => fake_gbm_bo_get_device: gbm_bo_get_device_t,
    gbm_bo_get_fd => fake_gbm_bo_get_fd: gbm_bo_get_fd_t,
    gbm_bo_get_format => fake_gbm_bo_get_format: gbm_bo_get_format_t,
    gbm_bo_get_handle => fake_gbm_bo_get_handle: gbm_bo_get_handle_t,
    gbm_bo_get_height => fake_gbm_bo_get_height: gbm_bo_get_height_t,
    gbm_bo_get_stride => fake_gbm_bo_get_stride: gbm_bo_get_stride_t,
    gbm_bo_get_width => fake_gbm_bo_get_width: gbm_bo_get_width_t,
    gbm_bo_import => fake_gbm_bo_import: gbm_bo_import_t,
    gbm_bo_map => fake_gbm_bo_map: gbm_bo_map_t,
    gbm_bo_unmap => fake_gbm_bo_unmap: gbm_bo_unmap_t,
    gbm_bo_write => fake_gbm_bo_write: gbm_bo_write_t,
    gbm_create_device => fake_gbm_create_device: gbm_create_device_t,
    gbm_device_destroy => fake_gbm_device_destroy: gbm_device_destroy_t,
    gbm_device_get_backend_name => fake_gbm_device_get_backend_name: gbm_device_get_backend_name_t,
    gbm_device_get_fd => fake_gbm_device_get_fd: gbm_device_get_fd_t,
    gbm_device_is_format_supported => fake_gbm_device_is_format_supported: gbm_device_is_format_supported_t,
    gbm_surface_create => fake_gbm_surface_create: gbm_surface_create_t,
    gbm_surface_destroy => fake_gbm_surface_destroy: gbm_surface_destroy_t,
    gbm_surface_has_free_buffers => fake_gbm_surface_has_free_buffers: gbm_surface_has_free_buffers_t,
    gbm_surface_lock_front_buffer => fake_gbm_surface_lock_front_buffer: gbm_surface_lock_front_buffer_t,
    gbm_surface_release_buffer => fake_gbm_surface_release_buffer: gbm_surface_release_buffer_t,
}

/// Symbol source backed by the fake entry points above.  Dropping it marks the fake library
/// as unloaded.
pub struct FakeLibrary {
    symbols: HashMap<&'static str, *const c_void>,
}

impl FakeLibrary {
    pub fn new() -> FakeLibrary {
        FakeLibrary {
            symbols: fake_symbol_table(),
        }
    }

    /// Drops `name` from the exports.
    pub fn without(mut self, name: &str) -> FakeLibrary {
        self.symbols.remove(name);
        self
    }

    /// Exports `name` with a null address.
    pub fn with_null(mut self, name: &'static str) -> FakeLibrary {
        self.symbols.insert(name, std::ptr::null());
        self
    }
}

impl SymbolLoader for FakeLibrary {
    fn symbol(&self, name: &str) -> WinsysResult<*const c_void> {
        self.symbols
            .get(name)
            .copied()
            .ok_or_else(|| WinsysError::SymbolResolution {
                symbol: name.to_string(),
                reason: "undefined symbol".to_string(),
            })
    }

    fn library_name(&self) -> &str {
        "libfake_gbm.so"
    }
}

impl Drop for FakeLibrary {
    fn drop(&mut self) {
        with(|state| state.library_unloaded = true);
    }
}
