// Copyright 2024 Matthias Krüger. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::ffi::OsStr;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use crate::fd_budget;
use crate::library::{self, Error};
use crate::queue::WorkQueue;
use crate::sys;
use crate::task::{self, DirTask, Pending};

/// Loop of every worker, including the driving thread. Returns only by
/// ending the process once the walk has drained.
pub(crate) fn run(queue: &WorkQueue) -> ! {
    loop {
        match queue.dequeue() {
            Some(pending) => process_task(pending, queue),
            None => process::exit(library::exit_code()),
        }
    }
}

/// Expand one dequeued directory: enumerate it, delete what a bare unlink
/// can take, queue the rest, and either rmdir it inline or leave that to
/// the last child's upward walk.
pub(crate) fn process_task(pending: Pending, queue: &WorkQueue) {
    let shown = task::display_path(pending.parent.as_ref(), &pending.path);

    let dir = match open_pending(&pending) {
        Ok(d) => d,
        Err(e) => {
            library::surface(&Error::Remove(shown, e));
            return;
        }
    };
    // the enumeration stream takes over the handle; unlinks run against a
    // duplicate
    let dirfd = match dup_waiting(&dir) {
        Ok(f) => f,
        Err(e) => {
            library::surface(&Error::Remove(shown, e));
            return;
        }
    };
    let mut stream = match sys::DirStream::from_file(dir) {
        Ok(stream) => stream,
        Err(e) => {
            drop(dirfd);
            fd_budget::stream_closed();
            library::surface(&Error::Queue(shown, e));
            return;
        }
    };

    let mut pending = Some(pending);
    let mut dir_task: Option<Arc<DirTask>> = None;
    let mut enqueued: u32 = 0;

    while let Some((name, kind)) = stream.next_entry() {
        if unlink_entry(&dirfd, &name, kind).is_ok() {
            continue;
        }
        // slow path: hang the child off this directory's record
        let parent = match dir_task.as_ref() {
            Some(t) => Arc::clone(t),
            None => {
                let t = DirTask::materialize(
                    pending.take().expect("directory expanded twice"),
                    &dirfd,
                );
                dir_task = Some(Arc::clone(&t));
                t
            }
        };
        let path = if parent.dfd.is_some() {
            PathBuf::from(name)
        } else {
            parent.path.join(&name)
        };
        enqueued += 1;
        queue.enqueue(Pending {
            path,
            parent: Some(parent),
        });
    }

    drop(stream);
    drop(dirfd);
    fd_budget::stream_closed();

    match dir_task {
        None => {
            // nothing was queued: the directory is empty now
            let p = match pending {
                Some(p) => p,
                None => return,
            };
            match task::remove_dir_at(p.parent.as_ref(), &p.path) {
                Ok(()) => task::ascend(p.parent),
                Err(e) => library::surface(&Error::Remove(shown, e)),
            }
        }
        Some(t) => {
            if t.publish(enqueued) {
                // every queued child finished before publication
                match t.remove_self() {
                    Ok(()) => task::ascend(t.parent.clone()),
                    Err(e) => library::surface(&Error::Remove(shown, e)),
                }
            }
        }
    }
}

/// Open the dequeued entry as a directory, relative to the chain's anchor.
/// Under a tight descriptor limit, exhaustion waits for another worker to
/// close a stream instead of failing.
fn open_pending(pending: &Pending) -> io::Result<File> {
    loop {
        let opened = match task::anchor_fd(pending.parent.as_ref()) {
            Some(fd) => {
                let mut opts = fs_at::OpenOptions::default();
                opts.read(true).follow(false);
                opts.open_dir_at(fd, &pending.path)
            }
            None => sys::open_dir(&pending.path),
        };
        match opened {
            Err(e) if fd_budget::limited() && sys::is_fd_exhaustion(&e) => {
                fd_budget::wait_for_slot();
            }
            other => return other,
        }
    }
}

fn dup_waiting(dir: &File) -> io::Result<File> {
    loop {
        match sys::duplicate_fd(dir) {
            Err(e) if fd_budget::limited() && sys::is_fd_exhaustion(&e) => {
                fd_budget::wait_for_slot();
            }
            other => return other,
        }
    }
}

/// Fast path: delete one entry with no allocation and no queueing. Known
/// directories go straight to rmdir; only entries of unknown type pay the
/// unlink probe first. Whatever still fails is the caller's slow path.
fn unlink_entry(dirfd: &File, name: &OsStr, kind: sys::EntryKind) -> io::Result<()> {
    let opts = fs_at::OpenOptions::default();
    match kind {
        sys::EntryKind::Directory => opts.rmdir_at(dirfd, name),
        sys::EntryKind::Other | sys::EntryKind::Unknown => {
            match opts.unlink_at(dirfd, name) {
                Err(e) if sys::is_directory(&e) => opts.rmdir_at(dirfd, name),
                other => other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;
    use std::io::Write;
    use std::path::Path;

    fn drain(queue: &WorkQueue) {
        while let Some(task) = queue.dequeue() {
            process_task(task, queue);
        }
    }

    fn file_with_content(path: &Path) {
        let mut f = fs::File::create(path).unwrap();
        f.write_all(b"data").unwrap();
    }

    #[test]
    fn flat_directory_is_removed_inline() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("flat");
        fs::create_dir(&root).unwrap();
        for name in ["a", "b", "c"] {
            file_with_content(&root.join(name));
        }

        let queue = WorkQueue::new(1);
        process_task(Pending::root(root.clone()), &queue);

        assert!(!root.exists());
        assert!(queue.dequeue().is_none(), "fast path must not queue");
    }

    #[test]
    fn nested_directory_queues_then_collapses() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("root");
        let sub = root.join("sub");
        fs::create_dir_all(&sub).unwrap();
        file_with_content(&sub.join("inner"));

        let queue = WorkQueue::new(1);
        process_task(Pending::root(root.clone()), &queue);
        assert!(root.exists(), "root waits for its child");

        drain(&queue);
        assert!(!root.exists());
    }

    #[test]
    fn deep_chain_collapses_bottom_up() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("root");
        let leaf_dir = root.join("1/2/3/4/5");
        fs::create_dir_all(&leaf_dir).unwrap();
        file_with_content(&leaf_dir.join("file"));

        let queue = WorkQueue::new(1);
        queue.enqueue(Pending::root(root.clone()));
        drain(&queue);

        assert!(!root.exists());
    }

    #[test]
    fn wide_fanout_takes_the_fast_path() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("wide");
        fs::create_dir(&root).unwrap();
        for n in 0..128 {
            fs::create_dir(root.join(format!("d{}", n))).unwrap();
        }

        let queue = WorkQueue::new(1);
        process_task(Pending::root(root.clone()), &queue);

        // every empty child went through unlink/rmdir directly
        assert!(!root.exists());
        assert!(queue.dequeue().is_none());
    }

    #[test]
    fn symlinks_are_leaves() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("root");
        let target = tmp.path().join("target");
        fs::create_dir_all(&root).unwrap();
        fs::create_dir_all(&target).unwrap();
        file_with_content(&target.join("survivor"));
        #[cfg(unix)]
        std::os::unix::fs::symlink(&target, root.join("link")).unwrap();

        let queue = WorkQueue::new(1);
        queue.enqueue(Pending::root(root.clone()));
        drain(&queue);

        assert!(!root.exists());
        assert!(target.join("survivor").exists(), "symlink target untouched");
    }
}
