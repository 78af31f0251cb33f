// Copyright 2024 Matthias Krüger. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

// latched by the first surfaced failure, read by whichever worker ends the process
static FAILURE: AtomicBool = AtomicBool::new(false);

#[derive(Debug)]
pub(crate) enum Error {
    /// A direct unlink/rmdir of this path failed.
    Remove(PathBuf, io::Error),
    /// Expanding a directory failed before its children could be queued.
    Queue(PathBuf, io::Error),
    /// A bottom-up rmdir during upward propagation failed.
    RemoveParent(PathBuf, io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &'_ mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Remove(path, reason) => {
                write!(f, "failed to remove '{}': {}", path.display(), reason)
            }
            Error::Queue(path, reason) => {
                write!(f, "failed to queue '{}': {}", path.display(), reason)
            }
            Error::RemoveParent(path, reason) => {
                write!(
                    f,
                    "failed to remove parent directory '{}': {}",
                    path.display(),
                    reason
                )
            }
        }
    }
}

/// Report a failure on stderr and make the eventual exit code nonzero.
pub(crate) fn surface(err: &Error) {
    eprintln!("{}", err);
    FAILURE.store(true, Ordering::Relaxed);
}

pub(crate) fn exit_code() -> i32 {
    if FAILURE.load(Ordering::Relaxed) {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[cfg(unix)]
    #[test]
    fn display_remove() {
        let err = Error::Remove(
            PathBuf::from("/tmp/x"),
            io::Error::from_raw_os_error(libc::ENOENT),
        );
        assert_eq!(
            err.to_string(),
            format!(
                "failed to remove '/tmp/x': {}",
                io::Error::from_raw_os_error(libc::ENOENT)
            )
        );
    }

    #[cfg(unix)]
    #[test]
    fn display_queue() {
        let err = Error::Queue(
            PathBuf::from("dir/sub"),
            io::Error::from_raw_os_error(libc::EACCES),
        );
        assert!(err.to_string().starts_with("failed to queue 'dir/sub': "));
    }

    #[cfg(unix)]
    #[test]
    fn display_remove_parent_is_distinguishable() {
        let err = Error::RemoveParent(
            PathBuf::from("a/b"),
            io::Error::from_raw_os_error(libc::ENOTEMPTY),
        );
        assert!(err
            .to_string()
            .starts_with("failed to remove parent directory 'a/b': "));
    }

    #[test]
    fn surfaced_failure_latches_exit_code() {
        surface(&Error::Remove(
            PathBuf::from("gone"),
            io::Error::new(io::ErrorKind::NotFound, "gone"),
        ));
        assert_eq!(exit_code(), 1);
    }
}
