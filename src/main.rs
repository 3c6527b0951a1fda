// This file is part of Moonfire NVR, a security camera network video recorder.
// Copyright (C) 2021 The Moonfire NVR Authors; see AUTHORS and LICENSE.txt.
// SPDX-License-Identifier: GPL-v3.0-or-later WITH GPL-3.0-linking-exception.

use base::Error;
use bpaf::{Bpaf, Parser};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

mod capabilities;
mod cloud_sync;
mod cmds;
mod config;
mod ffmpeg;
mod grouping;
mod image_compress;
mod slug;
mod state;
mod tasks;
mod workers;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Unattended ingestion and post-production pipeline for a fixed security
/// camera recording youth soccer matches.
#[derive(Bpaf, Debug)]
#[bpaf(options, version(VERSION))]
enum Args {
    // See docstrings of `cmds::*::Args` structs for a description of the respective subcommands.
    Run(#[bpaf(external(cmds::run::args))] cmds::run::Args),
    ProcessWithNtfy(#[bpaf(external(cmds::process_with_ntfy::args))] cmds::process_with_ntfy::Args),
}

impl Args {
    fn run(self) -> Result<i32, Error> {
        match self {
            Args::Run(a) => cmds::run::run(a),
            Args::ProcessWithNtfy(a) => cmds::process_with_ntfy::run(a),
        }
    }
}

fn main() {
    base::tracing_setup::install();

    // Get the program name from the OS (e.g. if invoked as `target/debug/camera-pipeline`:
    // `camera-pipeline`), falling back to the crate name if conversion to a path/UTF-8 string
    // fails. `bpaf`'s default logic is similar but doesn't have the fallback.
    let progname = std::env::args_os().next().map(PathBuf::from);
    let progname = progname
        .as_deref()
        .and_then(Path::file_name)
        .and_then(OsStr::to_str)
        .unwrap_or(env!("CARGO_PKG_NAME"));

    let args = match args()
        .fallback_to_usage()
        .run_inner(bpaf::Args::current_args().set_name(progname))
    {
        Ok(a) => a,
        Err(e) => std::process::exit(e.exit_code()),
    };
    tracing::trace!("Parsed command-line arguments: {args:#?}");

    match args.run() {
        Err(e) => {
            error!(err = %e.chain(), "exiting due to error");
            ::std::process::exit(1);
        }
        Ok(rv) => {
            debug!("exiting with status {}", rv);
            std::process::exit(rv)
        }
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn bpaf_invariants() {
        super::args().check_invariants(false);
    }
}
