// Copyright 2024 Matthias Krüger. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::sys;

// process-wide; the driver initializes this once before any worker runs
static DFD_FREE: AtomicI64 = AtomicI64::new(0);
static LIMITED: AtomicBool = AtomicBool::new(false);
static WAIT_LOCK: Mutex<()> = Mutex::new(());
static FD_FREED: Condvar = Condvar::new();

/// Descriptors an in-flight worker holds: the directory stream plus the
/// working duplicate its unlinks run against.
const PER_WORKER: u64 = 2;
const STDIO: u64 = 2;

pub(crate) fn init(workers: usize) {
    let (capacity, limited) = capacity_for(sys::soft_fd_limit(), workers);
    DFD_FREE.store(capacity, Ordering::Relaxed);
    LIMITED.store(limited, Ordering::Relaxed);
}

/// Descriptors left over for cached directory handles once the standard
/// streams and every worker's own pair are reserved. A limit too small to
/// cover the reservation disables caching entirely and switches open
/// failures into wait-and-retry mode.
fn capacity_for(soft_limit: Option<u64>, workers: usize) -> (i64, bool) {
    match soft_limit {
        None => (i64::MAX / 2, false),
        Some(soft) => {
            let reserved = STDIO + PER_WORKER * workers as u64;
            if soft < reserved {
                (0, true)
            } else {
                ((soft - reserved) as i64, false)
            }
        }
    }
}

pub(crate) fn limited() -> bool {
    LIMITED.load(Ordering::Relaxed)
}

/// Try to reserve one cached-handle slot.
pub(crate) fn acquire_cache_slot() -> bool {
    if DFD_FREE.fetch_sub(1, Ordering::Relaxed) - 1 >= 0 {
        true
    } else {
        DFD_FREE.fetch_add(1, Ordering::Relaxed);
        false
    }
}

pub(crate) fn release_cache_slot() {
    DFD_FREE.fetch_add(1, Ordering::Relaxed);
}

/// Park until another worker closes a directory stream. A close can signal
/// before the waiter parks; the timeout bounds that window.
pub(crate) fn wait_for_slot() {
    let guard = WAIT_LOCK.lock().unwrap();
    let _unused = FD_FREED.wait_timeout(guard, Duration::from_millis(50)).unwrap();
}

pub(crate) fn stream_closed() {
    if limited() {
        FD_FREED.notify_all();
    }
}
