//! xsp - Command-line tool for compiling sprite sheets into PCG/FRM/REF bundles

use std::process::ExitCode;

use xspkit::cli;

fn main() -> ExitCode {
    cli::run()
}
