// Copyright 2024 Matthias Krüger. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::fs;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::fd_budget;
use crate::library::{self, Error};
use crate::sys;

/// High bit of `removed_count`: the expanding worker has not published
/// `child_count` yet, so the count must not be compared against.
pub(crate) const ACQUIRED: u32 = 1 << 31;

/// One filesystem entry waiting for a worker. `path` is relative to the
/// nearest ancestor holding a cached directory handle, or to the working
/// directory when no ancestor holds one.
pub(crate) struct Pending {
    pub(crate) path: PathBuf,
    pub(crate) parent: Option<Arc<DirTask>>,
}

impl Pending {
    pub(crate) fn root(path: PathBuf) -> Self {
        Pending { path, parent: None }
    }
}

/// Per-directory record shared between the worker that expanded the
/// directory and the workers finishing its children. The last finisher
/// drops the record, which closes the cached handle.
pub(crate) struct DirTask {
    pub(crate) path: PathBuf,
    pub(crate) parent: Option<Arc<DirTask>>,
    /// Cached handle for this directory; children address themselves
    /// relative to it by base name.
    pub(crate) dfd: Option<File>,
    child_count: AtomicU32,
    removed_count: AtomicU32,
}

impl DirTask {
    /// Turn a dequeued entry into the record its queued children hang off.
    /// Caches a duplicate of `dirfd` when the descriptor budget admits one.
    pub(crate) fn materialize(pending: Pending, dirfd: &File) -> Arc<Self> {
        let dfd = if fd_budget::acquire_cache_slot() {
            match sys::duplicate_fd(dirfd) {
                Ok(f) => Some(f),
                Err(_) => {
                    fd_budget::release_cache_slot();
                    None
                }
            }
        } else {
            None
        };
        Arc::new(DirTask {
            path: pending.path,
            parent: pending.parent,
            dfd,
            child_count: AtomicU32::new(0),
            removed_count: AtomicU32::new(ACQUIRED),
        })
    }

    /// Publish how many children were queued. Returns true when every one
    /// of them already finished, in which case the caller owns this
    /// directory's rmdir.
    pub(crate) fn publish(&self, enqueued: u32) -> bool {
        // the n-th completion must read a published count of n - 1
        self.child_count.store(enqueued - 1, Ordering::Relaxed);
        let rc = self.removed_count.fetch_and(!ACQUIRED, Ordering::Release);
        rc == (enqueued | ACQUIRED)
    }

    /// Remove this now-empty directory.
    pub(crate) fn remove_self(&self) -> io::Result<()> {
        remove_dir_at(self.parent.as_ref(), &self.path)
    }
}

impl Drop for DirTask {
    fn drop(&mut self) {
        if self.dfd.is_some() {
            // the handle itself closes with the field
            fd_budget::release_cache_slot();
            fd_budget::stream_closed();
        }
    }
}

/// Nearest ancestor holding a cached directory handle. Paths below it are
/// relative to that handle.
pub(crate) fn anchor_fd(mut parent: Option<&Arc<DirTask>>) -> Option<&File> {
    while let Some(task) = parent {
        if let Some(fd) = task.dfd.as_ref() {
            return Some(fd);
        }
        parent = task.parent.as_ref();
    }
    None
}

/// Remove the directory `path`, addressed relative to the chain's anchor.
pub(crate) fn remove_dir_at(parent: Option<&Arc<DirTask>>, path: &Path) -> io::Result<()> {
    match anchor_fd(parent) {
        Some(fd) => fs_at::OpenOptions::default().rmdir_at(fd, path),
        None => fs::remove_dir(path),
    }
}

/// Rebuild the user-facing path of an entry for diagnostics.
pub(crate) fn display_path(mut parent: Option<&Arc<DirTask>>, tail: &Path) -> PathBuf {
    while let Some(task) = parent {
        if task.dfd.is_some() {
            return display_path(task.parent.as_ref(), &task.path).join(tail);
        }
        parent = task.parent.as_ref();
    }
    tail.to_path_buf()
}

/// Walk up from a removed entry and finish every parent whose last child
/// this was. The counter hand-off guarantees a single worker observes each
/// parent's final count, so each rmdir fires exactly once.
pub(crate) fn ascend(mut parent: Option<Arc<DirTask>>) {
    while let Some(task) = parent {
        let rc = task.removed_count.fetch_add(1, Ordering::Acquire);
        if rc & ACQUIRED != 0 {
            // still being enumerated; the expanding worker or a later
            // sibling finishes this one
            return;
        }
        if rc != task.child_count.load(Ordering::Relaxed) {
            return;
        }
        match task.remove_self() {
            Ok(()) => parent = task.parent.clone(),
            Err(e) => {
                library::surface(&Error::RemoveParent(
                    display_path(task.parent.as_ref(), &task.path),
                    e,
                ));
                return;
            }
        }
    }
}
