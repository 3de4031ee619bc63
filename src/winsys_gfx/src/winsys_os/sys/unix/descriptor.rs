// Copyright 2020 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::fs::File;
use std::os::unix::io::AsFd;
use std::os::unix::io::AsRawFd;
use std::os::unix::io::BorrowedFd;
use std::os::unix::io::IntoRawFd;
use std::os::unix::io::OwnedFd;
use std::os::unix::io::RawFd;

use crate::winsys_os::descriptor::AsRawDescriptor;
use crate::winsys_os::descriptor::IntoRawDescriptor;
use crate::winsys_os::descriptor::SafeDescriptor;

type Error = std::io::Error;
type Result<T> = std::result::Result<T, Error>;

pub type RawDescriptor = RawFd;

/// Clones `fd`, returning a new file descriptor that refers to the same open file description as
/// `fd`. The cloned fd will have the `FD_CLOEXEC` flag set but will not share any other file
/// descriptor flags with `fd`.
fn clone_fd(fd: &dyn AsRawFd) -> Result<RawFd> {
    // Safe because this doesn't modify any memory and we check the return value.
    let ret = unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_DUPFD_CLOEXEC, 0) };
    if ret < 0 {
        Err(Error::last_os_error())
    } else {
        Ok(ret)
    }
}

impl Drop for SafeDescriptor {
    fn drop(&mut self) {
        let _ = unsafe { libc::close(self.descriptor) };
    }
}

impl AsRawFd for SafeDescriptor {
    fn as_raw_fd(&self) -> RawFd {
        self.as_raw_descriptor()
    }
}

impl AsFd for SafeDescriptor {
    fn as_fd(&self) -> BorrowedFd<'_> {
        // Safe because the descriptor stays open for as long as `self` is borrowed.
        unsafe { BorrowedFd::borrow_raw(self.descriptor) }
    }
}

impl SafeDescriptor {
    /// Clones this descriptor, internally creating a new descriptor. The new SafeDescriptor will
    /// share the same underlying count within the kernel.
    pub fn try_clone(&self) -> Result<SafeDescriptor> {
        Ok(SafeDescriptor {
            descriptor: clone_fd(self)?,
        })
    }
}

macro_rules! AsRawDescriptor {
    ($name:ident) => {
        impl AsRawDescriptor for $name {
            fn as_raw_descriptor(&self) -> RawDescriptor {
                self.as_raw_fd()
            }
        }
    };
}

macro_rules! IntoRawDescriptor {
    ($name:ident) => {
        impl IntoRawDescriptor for $name {
            fn into_raw_descriptor(self) -> RawDescriptor {
                self.into_raw_fd()
            }
        }
    };
}

// `VgemDevice` keeps its render node as a `File`; shared memory owns an `OwnedFd`.
AsRawDescriptor!(File);
IntoRawDescriptor!(OwnedFd);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::winsys_os::FromRawDescriptor;
    use crate::winsys_os::SharedMemory;

    #[test]
    fn clone_keeps_the_original_open() {
        let shm = SharedMemory::new("descriptor_test", 4096).unwrap();
        let original: SafeDescriptor = shm.into();
        let clone = original.try_clone().unwrap();

        assert_ne!(original.as_raw_descriptor(), clone.as_raw_descriptor());
        drop(clone);

        // Safe because this doesn't modify any memory and we check the return value.
        let ret = unsafe { libc::fcntl(original.as_raw_descriptor(), libc::F_GETFD) };
        assert!(ret >= 0);
    }

    #[test]
    fn file_and_owned_fd_descriptors() {
        let file = File::open("/dev/null").unwrap();
        assert_eq!(file.as_raw_descriptor(), file.as_raw_fd());

        let owned = OwnedFd::from(file);
        let raw = owned.into_raw_descriptor();
        // Safe because `raw` was released by `owned` and is closed exactly once here.
        let descriptor = unsafe { SafeDescriptor::from_raw_descriptor(raw) };
        assert_eq!(descriptor.as_raw_descriptor(), raw);
    }
}
