// Copyright 2024 Matthias Krüger. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// everything that talks to the platform directly lives here

use std::fs::File;
use std::io;
use std::path::Path;

/// What the filesystem reported for an entry during enumeration.
#[derive(Clone, Copy, Debug)]
pub(crate) enum EntryKind {
    Directory,
    Other,
    /// The filesystem does not fill in entry types; the caller has to probe.
    Unknown,
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        use std::ffi::{CStr, OsStr, OsString};
        use std::fs::OpenOptions;
        use std::os::unix::ffi::OsStrExt;
        use std::os::unix::fs::OpenOptionsExt;
        use std::os::unix::prelude::{AsRawFd, FromRawFd, IntoRawFd};
        use std::ptr::NonNull;

        use cvt::cvt;
        use libc::{fcntl, F_DUPFD_CLOEXEC};

        /// Enumeration over an open directory handle, exposing the entry
        /// type the filesystem reports alongside each name.
        pub(crate) struct DirStream {
            dir: NonNull<libc::DIR>,
        }

        impl DirStream {
            /// Takes ownership of the handle; it closes with the stream.
            pub(crate) fn from_file(file: File) -> io::Result<Self> {
                let fd = file.into_raw_fd();
                let dir = unsafe { libc::fdopendir(fd) };
                match NonNull::new(dir) {
                    Some(dir) => Ok(DirStream { dir }),
                    None => {
                        let e = io::Error::last_os_error();
                        unsafe { libc::close(fd) };
                        Err(e)
                    }
                }
            }

            /// Next entry and its reported type, `None` at the end of the
            /// stream. Entries for the current and parent directory are
            /// skipped.
            pub(crate) fn next_entry(&mut self) -> Option<(OsString, EntryKind)> {
                loop {
                    let entry = unsafe { libc::readdir(self.dir.as_ptr()) };
                    if entry.is_null() {
                        return None;
                    }
                    let name = unsafe { CStr::from_ptr((*entry).d_name.as_ptr()) };
                    let bytes = name.to_bytes();
                    if bytes == b"." || bytes == b".." {
                        continue;
                    }
                    let kind = match unsafe { (*entry).d_type } {
                        libc::DT_DIR => EntryKind::Directory,
                        libc::DT_UNKNOWN => EntryKind::Unknown,
                        _ => EntryKind::Other,
                    };
                    return Some((OsStr::from_bytes(bytes).to_os_string(), kind));
                }
            }
        }

        impl Drop for DirStream {
            fn drop(&mut self) {
                unsafe { libc::closedir(self.dir.as_ptr()) };
            }
        }

        /// Open a directory read-only, refusing to follow a trailing symlink.
        pub(crate) fn open_dir(p: &Path) -> io::Result<File> {
            let mut options = OpenOptions::new();
            options.read(true);
            options.custom_flags(libc::O_DIRECTORY | libc::O_NOFOLLOW);
            options.open(p)
        }

        pub(crate) fn duplicate_fd(f: &File) -> io::Result<File> {
            let source_fd = f.as_raw_fd();
            // F_DUPFD_CLOEXEC seems to be quite portable, but we should be prepared
            // to add in more codepaths here.
            let fd = cvt(unsafe { fcntl(source_fd, F_DUPFD_CLOEXEC, 0) })?;
            Ok(unsafe { File::from_raw_fd(fd) })
        }

        /// Soft limit on open file descriptors, `None` when unlimited or unknown.
        pub(crate) fn soft_fd_limit() -> Option<u64> {
            use std::mem::MaybeUninit;
            let mut rlim = MaybeUninit::<libc::rlimit>::uninit();
            if unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, rlim.as_mut_ptr()) } != 0 {
                return None;
            }
            let cur = unsafe { rlim.assume_init() }.rlim_cur as u64;
            if cur == libc::RLIM_INFINITY as u64 {
                return None;
            }
            Some(cur)
        }

        pub(crate) fn is_directory(e: &io::Error) -> bool {
            e.raw_os_error() == Some(libc::EISDIR)
        }

        pub(crate) fn is_not_empty(e: &io::Error) -> bool {
            // POSIX allows either for rmdir on a populated directory
            matches!(e.raw_os_error(), Some(libc::ENOTEMPTY) | Some(libc::EEXIST))
        }

        pub(crate) fn is_fd_exhaustion(e: &io::Error) -> bool {
            matches!(e.raw_os_error(), Some(libc::EMFILE) | Some(libc::ENFILE))
        }
    } else {
        pub(crate) struct DirStream;

        impl DirStream {
            pub(crate) fn from_file(_file: File) -> io::Result<Self> {
                Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "directory enumeration is not supported on this platform",
                ))
            }

            pub(crate) fn next_entry(&mut self) -> Option<(std::ffi::OsString, EntryKind)> {
                None
            }
        }

        pub(crate) fn open_dir(p: &Path) -> io::Result<File> {
            let mut options = std::fs::OpenOptions::new();
            options.read(true);
            options.open(p)
        }

        pub(crate) fn duplicate_fd(f: &File) -> io::Result<File> {
            f.try_clone()
        }

        pub(crate) fn soft_fd_limit() -> Option<u64> {
            None
        }

        pub(crate) fn is_directory(_e: &io::Error) -> bool {
            false
        }

        pub(crate) fn is_not_empty(_e: &io::Error) -> bool {
            false
        }

        pub(crate) fn is_fd_exhaustion(_e: &io::Error) -> bool {
            false
        }
    }
}
