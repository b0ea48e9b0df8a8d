//! abake - Command-line tool for building project assets and shaders

use std::process::ExitCode;

use assetbake::cli;

fn main() -> ExitCode {
    cli::run()
}
