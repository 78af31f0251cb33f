// Copyright 2024 Matthias Krüger. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::fs;
use std::io;
use std::path::Path;
use std::process;
use std::sync::Arc;

use crate::cli::Config;
use crate::fd_budget;
use crate::library::{self, Error};
use crate::pool;
use crate::queue::WorkQueue;
use crate::sys;
use crate::task::Pending;

/// remove(3): unlink first, fall back to rmdir for directories.
pub(crate) fn remove(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if sys::is_directory(&e) => fs::remove_dir(path),
        other => other,
    }
}

/// Plain mode: remove each operand directly.
pub(crate) fn remove_files(config: &Config) -> ! {
    for path in &config.files {
        if let Err(e) = remove(path) {
            library::surface(&Error::Remove(path.clone(), e));
            if config.stop_at_error {
                process::exit(1);
            }
        }
    }
    process::exit(library::exit_code())
}

/// Recursive mode: whatever a direct remove cannot take down seeds the
/// parallel walk.
pub(crate) fn remove_recursive(config: &Config) -> ! {
    let workers = pool::worker_count();
    fd_budget::init(workers);
    let queue = Arc::new(WorkQueue::new(workers));

    for path in &config.files {
        match remove(path) {
            Ok(()) => {}
            Err(e) if sys::is_not_empty(&e) => {
                queue.enqueue(Pending::root(path.clone()));
            }
            Err(e) => {
                library::surface(&Error::Remove(path.clone(), e));
                if config.stop_at_error {
                    process::exit(1);
                }
            }
        }
    }

    if queue.is_empty() {
        // every operand fell to the direct fast path
        process::exit(library::exit_code());
    }
    pool::run(queue)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs::File;

    #[test]
    fn removes_a_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("plain");
        File::create(&path).unwrap();

        remove(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn removes_an_empty_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("empty");
        fs::create_dir(&path).unwrap();

        remove(&path).unwrap();
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn populated_directory_reports_not_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("full");
        fs::create_dir(&path).unwrap();
        File::create(path.join("inner")).unwrap();

        let err = remove(&path).unwrap_err();
        assert!(sys::is_not_empty(&err));
        assert!(path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn removes_a_symlink_not_its_target() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("target");
        fs::create_dir(&target).unwrap();
        let link = tmp.path().join("link");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        remove(&link).unwrap();
        assert!(!link.exists());
        assert!(target.exists());
    }
}
