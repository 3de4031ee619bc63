// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! gbm_wrap: a GBM backend that forwards to another GBM implementation loaded at runtime.

mod backend;
mod bindings;
mod device;
#[cfg(test)]
mod fake;
mod proxy;
mod symbols;

pub use backend::GbmBackend;
pub use backend::GbmBackendDevice;
pub use backend::GbmBoMapping;
pub use backend::GbmImport;
pub use backend::GbmImportFd;
pub use backend::GbmMapRegion;
pub use backend::GBM_WRAPPER_BACKEND;
pub use bindings::gbm_bo;
pub use bindings::gbm_device;
pub use bindings::gbm_surface;
pub use bindings::GBM_BO_IMPORT_EGL_IMAGE;
pub use bindings::GBM_BO_IMPORT_FD;
pub use bindings::GBM_BO_IMPORT_FD_MODIFIER;
pub use bindings::GBM_BO_IMPORT_WL_BUFFER;
pub use bindings::GBM_BO_TRANSFER_READ;
pub use bindings::GBM_BO_TRANSFER_READ_WRITE;
pub use bindings::GBM_BO_TRANSFER_WRITE;
pub use bindings::GBM_BO_USE_CURSOR;
pub use bindings::GBM_BO_USE_LINEAR;
pub use bindings::GBM_BO_USE_RENDERING;
pub use bindings::GBM_BO_USE_SCANOUT;
pub use bindings::GBM_BO_USE_WRITE;
pub use device::GbmWrapperBuilder;
pub use device::GbmWrapperDevice;
pub use device::GBM_WRAPPER_DEFAULT_MAX_PROXIES;
pub use device::GBM_WRAPPER_DEVICE_NAME;
pub use proxy::BoId;
pub use proxy::GbmBoBase;
pub use proxy::GbmBoHandle;
pub use proxy::GbmSurfaceBase;
pub use proxy::SurfaceId;
pub use symbols::wrapped_library_path;
pub use symbols::SymbolLoader;
pub use symbols::WrappedGbmFunctions;
pub use symbols::WrappedLibrary;
pub use symbols::DEFAULT_WRAPPED_GBM_LIBRARY;
pub use symbols::GBM_WRAP_LIBRARY_ENV;
