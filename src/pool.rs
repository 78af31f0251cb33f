// Copyright 2024 Matthias Krüger. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::process;
use std::sync::Arc;
use std::thread;

use crate::queue::WorkQueue;
use crate::worker;

pub(crate) const MAX_WORKERS: usize = 64;

pub(crate) fn worker_count() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .clamp(1, MAX_WORKERS)
}

// workers hold a handful of locals and never recurse
const WORKER_STACK_BYTES: usize = 128 * 1024;

/// Spawn the sibling workers and become one. Ends the process on drain.
pub(crate) fn run(queue: Arc<WorkQueue>) -> ! {
    for n in 1..queue.workers() {
        let sibling = Arc::clone(&queue);
        let spawned = thread::Builder::new()
            .name(format!("erm-worker-{}", n))
            .stack_size(WORKER_STACK_BYTES)
            .spawn(move || worker::run(&sibling));
        match spawned {
            // detached: the drain-observing worker exits the whole process
            Ok(_handle) => {}
            Err(e) => {
                eprintln!("failed to spawn worker thread: {}", e);
                process::exit(1);
            }
        }
    }
    worker::run(&queue)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_count_is_clamped() {
        let count = worker_count();
        assert!(count >= 1);
        assert!(count <= MAX_WORKERS);
    }
}
