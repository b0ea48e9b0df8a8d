//! Command-line interface implementation
//!
//! Parses the `abake` arguments, sets up logging and dispatches to the build
//! command.

mod build;

use crate::config::{BuildOptions, Graphics};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// abake - Incremental asset and shader build pipeline
#[derive(Parser, Debug)]
#[command(name = "abake")]
#[command(about = "Converts project assets and shaders into a target directory with a resource manifest")]
#[command(version)]
pub struct Cli {
    /// Target system directory name
    #[arg(default_value = "krom")]
    pub target: String,

    /// Location of your project
    #[arg(long, default_value = ".")]
    pub from: PathBuf,

    /// Build location
    #[arg(long, default_value = "build")]
    pub to: PathBuf,

    /// Graphics api to use
    #[arg(short, long, value_enum, default_value_t = Graphics::Default)]
    pub graphics: Graphics,

    /// Location of ffmpeg executable
    #[arg(long)]
    pub ffmpeg: Option<String>,

    /// Set target shader version manually
    #[arg(long = "shaderversion")]
    pub shader_version: Option<u32>,

    /// Toolkit root used to locate the bundled tools
    #[arg(long)]
    pub kha: Option<PathBuf>,

    /// Location of the shader compiler
    #[arg(long)]
    pub krafix: Option<PathBuf>,

    /// Location of the haxe directory
    #[arg(long)]
    pub haxe: Option<PathBuf>,

    /// Recompile all shaders
    #[arg(long)]
    pub force: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Build options for this invocation.
    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            from: self.from.clone(),
            to: self.to.clone(),
            target: self.target.to_lowercase(),
            graphics: self.graphics,
            shader_version: self.shader_version,
            ffmpeg: self.ffmpeg.clone().filter(|f| !f.is_empty()),
            kha: self.kha.clone(),
            krafix: self.krafix.clone(),
            haxe: self.haxe.clone(),
            force: self.force,
            verbose: self.verbose,
        }
    }
}

fn initialise_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init();
}

/// Run the CLI application
pub fn run() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(EXIT_SUCCESS);
        }
    };

    initialise_tracing(cli.verbose);
    build::run_build(cli.build_options())
}
