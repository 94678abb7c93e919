//! appconf - Command-line tool for inspecting and watching app build configuration

use std::process::ExitCode;

use appconf::cli;

fn main() -> ExitCode {
    cli::run()
}
