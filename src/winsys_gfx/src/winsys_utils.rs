// Copyright 2020 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! winsys_utils: Utility enums, structs, and implementations needed by the rest of the crate.

use std::ffi::NulError;
use std::fmt;
use std::io::Error as IoError;
use std::marker::PhantomData;
use std::num::TryFromIntError;
use std::ptr::NonNull;
use std::str::Utf8Error;

use bitflags::bitflags;
#[cfg(unix)]
use nix::Error as NixError;
use remain::sorted;
use thiserror::Error;

use crate::winsys_os::SafeDescriptor;

/// Handle types understood by `displaytarget_from_handle` / `displaytarget_get_handle`.
/// Values match the gallium `WINSYS_HANDLE_TYPE_*` definitions.
pub const WINSYS_HANDLE_TYPE_SHARED: u32 = 0;
pub const WINSYS_HANDLE_TYPE_KMS: u32 = 1;
pub const WINSYS_HANDLE_TYPE_FD: u32 = 2;

bitflags! {
    /// Access requested when mapping a display target.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct TransferFlags: u32 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const READ_WRITE = Self::READ.bits() | Self::WRITE.bits();
    }
}

/// An external, DMA-capable handle to a display target.
///
/// When produced by `displaytarget_get_handle`, `os_handle` is owned by the caller.  When
/// passed to `displaytarget_from_handle`, the descriptor is only borrowed for the duration of
/// the import.
pub struct WinsysHandle {
    pub handle_type: u32,
    pub os_handle: SafeDescriptor,
    pub stride: u32,
}

impl fmt::Debug for WinsysHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("WinsysHandle")
            .field("handle_type", &self.handle_type)
            .field("stride", &self.stride)
            .finish()
    }
}

/// A reference to an object owned by another party.  It is never dereferenced by this crate,
/// only handed back to its owner.
#[repr(transparent)]
pub struct OpaqueToken<T> {
    ptr: NonNull<T>,
    _owner: PhantomData<*mut T>,
}

impl<T> OpaqueToken<T> {
    /// Wraps `ptr`, returning `None` for null.
    pub fn from_raw(ptr: *mut T) -> Option<OpaqueToken<T>> {
        NonNull::new(ptr).map(|ptr| OpaqueToken {
            ptr,
            _owner: PhantomData,
        })
    }

    /// Returns the raw pointer, for handing the object back to its owner.
    pub fn as_raw(&self) -> *mut T {
        self.ptr.as_ptr()
    }
}

impl<T> Clone for OpaqueToken<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for OpaqueToken<T> {}

impl<T> PartialEq for OpaqueToken<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }
}

impl<T> Eq for OpaqueToken<T> {}

impl<T> fmt::Debug for OpaqueToken<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "OpaqueToken({:p})", self.ptr)
    }
}

/// Objects owned by the host: front buffers, drawables and import payloads.
pub enum HostObject {}

/// Token for an object owned by the host.
pub type HostToken = OpaqueToken<HostObject>;

/// An error generated while using this crate.
#[sorted]
#[derive(Error, Debug)]
pub enum WinsysError {
    /// Memory for a display target could not be allocated.
    #[error("failed to allocate {size} bytes aligned to {alignment}")]
    AllocationFailure { size: usize, alignment: usize },
    /// Checked Arithmetic error
    #[error("arithmetic failed: {}({}) {op} {}({})", .field1.0, .field1.1, .field2.0, .field2.1)]
    CheckedArithmetic {
        field1: (&'static str, usize),
        field2: (&'static str, usize),
        op: &'static str,
    },
    /// Checked Range error
    #[error("range check failed: {}({}) vs {}({})", .field1.0, .field1.1, .field2.0, .field2.1)]
    CheckedRange {
        field1: (&'static str, usize),
        field2: (&'static str, usize),
    },
    /// The wrapped implementation returned a negative status.
    #[error("wrapped component failed with error {0}")]
    ComponentError(i32),
    /// The caller broke the calling contract of an operation.
    #[error("contract violation: {0}")]
    ContractViolation(&'static str),
    /// The wrapped implementation returned null.
    #[error("wrapped call {0} failed")]
    ForeignCallFailure(&'static str),
    /// The wrapped implementation returned a handle that already has a proxy.
    #[error("foreign handle is already wrapped")]
    ForeignHandleAlreadyWrapped,
    /// Alignment is not a power of two.
    #[error("invalid alignment {0}")]
    InvalidAlignment(u32),
    /// A width or height of zero was requested.
    #[error("invalid display target dimensions")]
    InvalidDimensions,
    /// The handle type is not supported by the operation.
    #[error("invalid handle type {0}")]
    InvalidHandleType(u32),
    /// A buffer or surface id that has no live proxy.
    #[error("invalid proxy id")]
    InvalidProxy,
    /// An input/output error occured.
    #[error("an input/output error occur: {0}")]
    IoError(IoError),
    /// No VGEM device backs this winsys.
    #[error("kernel buffer sharing is unavailable")]
    KernelSharingUnavailable,
    /// The wrapped library could not be opened.
    #[error("failed to open wrapped library {path}: {source}")]
    LibraryLoad {
        path: String,
        source: libloading::Error,
    },
    /// Nix crate error.
    #[cfg(unix)]
    #[error("The errno is {0}")]
    NixError(NixError),
    #[error("Nul Error occured {0}")]
    NulError(NulError),
    /// The proxy table reached its capacity.
    #[error("proxy table is full ({0} entries)")]
    ProxyTableFull(usize),
    /// A required entry point is missing from the wrapped library.
    #[error("unable to wrap {symbol}: {reason}")]
    SymbolResolution { symbol: String, reason: String },
    /// An attempted integer conversion failed.
    #[error("int conversion failed: {0}")]
    TryFromIntError(TryFromIntError),
    /// The command is unsupported.
    #[error("the requested function is not implemented")]
    Unsupported,
    /// Utf8 error.
    #[error("an utf8 error occured: {0}")]
    Utf8Error(Utf8Error),
}

#[cfg(unix)]
impl From<NixError> for WinsysError {
    fn from(e: NixError) -> WinsysError {
        WinsysError::NixError(e)
    }
}

impl From<NulError> for WinsysError {
    fn from(e: NulError) -> WinsysError {
        WinsysError::NulError(e)
    }
}

impl From<IoError> for WinsysError {
    fn from(e: IoError) -> WinsysError {
        WinsysError::IoError(e)
    }
}

impl From<TryFromIntError> for WinsysError {
    fn from(e: TryFromIntError) -> WinsysError {
        WinsysError::TryFromIntError(e)
    }
}

impl From<Utf8Error> for WinsysError {
    fn from(e: Utf8Error) -> WinsysError {
        WinsysError::Utf8Error(e)
    }
}

/// The result of an operation in this crate.
pub type WinsysResult<T> = std::result::Result<T, WinsysError>;
