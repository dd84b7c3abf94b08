//! The `plc` command line binary.

#![allow(missing_docs)]
#![allow(clippy::missing_docs_in_private_items)]

use std::process::ExitCode;

use clap::Parser;
use plc::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();
    plc::init_tracing(&cli.verbose);
    ExitCode::from(plc::run(&cli))
}
