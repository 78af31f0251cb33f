// Copyright 2024 Matthias Krüger. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::path::PathBuf;

#[allow(dead_code)]
pub(crate) fn bin_path() -> String {
    let path_release = if cfg!(windows) {
        "target\\release\\erm.exe"
    } else {
        "target/release/erm"
    };

    let path_debug = if cfg!(windows) {
        "target\\debug\\erm.exe"
    } else {
        "target/debug/erm"
    };

    if PathBuf::from(path_release).is_file() {
        String::from(path_release)
    } else if PathBuf::from(path_debug).is_file() {
        String::from(path_debug)
    } else {
        panic!("No erm executable found!");
    }
}
