// Copyright 2024 Matthias Krüger. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::path::PathBuf;
use std::process;

use clap::{App, Arg, ArgMatches};

pub(crate) const USAGE: &str = "erm [-reh] [files]...";

pub(crate) struct Config {
    pub(crate) recursive: bool,
    pub(crate) stop_at_error: bool,
    pub(crate) files: Vec<PathBuf>,
}

pub(crate) fn gen_clap<'a>() -> App<'a> {
    let recursive = Arg::new("recursive")
        .short('r')
        .help("Remove directories and their contents recursively");

    let keep_going = Arg::new("keep-going")
        .short('e')
        .help("Keep removing after a failure instead of stopping at the first one");

    let files = Arg::new("files")
        .takes_value(true)
        .multiple_values(true)
        .allow_invalid_utf8(true)
        .value_name("files");

    App::new("erm")
        .about("Remove files and directory trees in parallel")
        .override_usage(USAGE)
        .arg(recursive)
        .arg(keep_going)
        .arg(files)
}

/// Parse the command line. Help exits 0; anything malformed or an empty
/// operand list prints the usage and exits 1.
pub(crate) fn parse_args() -> Config {
    config_from(gen_clap().try_get_matches())
}

fn config_from(parsed: Result<ArgMatches, clap::Error>) -> Config {
    let matches = match parsed {
        Ok(matches) => matches,
        Err(e) if e.kind() == clap::ErrorKind::DisplayHelp => {
            let _ = e.print();
            process::exit(0);
        }
        Err(_) => {
            eprintln!("{}", USAGE);
            process::exit(1);
        }
    };

    let files: Vec<PathBuf> = matches
        .values_of_os("files")
        .map(|values| values.map(PathBuf::from).collect())
        .unwrap_or_default();
    if files.is_empty() {
        eprintln!("{}", USAGE);
        process::exit(1);
    }

    Config {
        recursive: matches.is_present("recursive"),
        stop_at_error: !matches.is_present("keep-going"),
        files,
    }
}
