// Copyright 2024 Matthias Krüger. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::sync::{Condvar, Mutex};

use crate::task::Pending;

/// Shared LIFO of pending entries. Newest-first keeps the walk depth-first,
/// which bounds how many directories are open at once and how long parent
/// records stay alive.
pub(crate) struct WorkQueue {
    state: Mutex<State>,
    work_ready: Condvar,
    workers: usize,
}

struct State {
    pending: Vec<Pending>,
    idle: usize,
}

impl WorkQueue {
    pub(crate) fn new(workers: usize) -> Self {
        WorkQueue {
            state: Mutex::new(State {
                pending: Vec::with_capacity(32),
                idle: 0,
            }),
            work_ready: Condvar::new(),
            workers,
        }
    }

    pub(crate) fn workers(&self) -> usize {
        self.workers
    }

    pub(crate) fn enqueue(&self, task: Pending) {
        let mut state = self.state.lock().unwrap();
        state.pending.push(task);
        self.work_ready.notify_one();
    }

    /// Next entry, newest first. `None` goes to exactly one caller: the
    /// worker that finds every other worker already waiting on an empty
    /// queue. That worker is responsible for ending the process; the rest
    /// stay parked and die with it.
    pub(crate) fn dequeue(&self) -> Option<Pending> {
        let mut state = self.state.lock().unwrap();
        loop {
            if let Some(task) = state.pending.pop() {
                return Some(task);
            }
            if state.idle == self.workers - 1 {
                return None;
            }
            state.idle += 1;
            state = self.work_ready.wait(state).unwrap();
            state.idle -= 1;
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.state.lock().unwrap().pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::PathBuf;
    use std::sync::Arc;
    use std::thread;

    use pretty_assertions::assert_eq;

    #[test]
    fn pops_newest_first() {
        let queue = WorkQueue::new(1);
        for name in ["a", "b", "c"] {
            queue.enqueue(Pending::root(PathBuf::from(name)));
        }

        let order: Vec<PathBuf> = std::iter::from_fn(|| queue.dequeue())
            .map(|t| t.path)
            .collect();
        assert_eq!(
            order,
            vec![PathBuf::from("c"), PathBuf::from("b"), PathBuf::from("a")]
        );
    }

    #[test]
    fn lone_worker_drains_immediately() {
        let queue = WorkQueue::new(1);
        assert!(queue.dequeue().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn enqueue_wakes_a_waiting_worker() {
        let queue = Arc::new(WorkQueue::new(2));

        let waiter = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.dequeue().map(|t| t.path))
        };

        // the waiter parks on the empty queue, then the push releases it
        queue.enqueue(Pending::root(PathBuf::from("wake")));
        assert_eq!(waiter.join().unwrap(), Some(PathBuf::from("wake")));
    }
}
