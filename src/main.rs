// Copyright 2024 Matthias Krüger. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

mod cli;
mod fd_budget;
mod library;
mod pool;
mod queue;
mod remove;
mod sys;
mod task;
mod worker;

fn main() {
    let config = cli::parse_args();

    if config.recursive {
        remove::remove_recursive(&config)
    } else {
        remove::remove_files(&config)
    }
}
