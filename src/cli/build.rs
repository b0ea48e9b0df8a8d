//! Build command implementation

use std::process::ExitCode;

use super::{EXIT_ERROR, EXIT_SUCCESS};
use crate::build::{BuildContext, BuildPipeline};
use crate::config::{load_project, BuildOptions};

/// Run the build command
pub fn run_build(options: BuildOptions) -> ExitCode {
    tracing::info!("Creating project.");
    let project = match load_project(&options.from) {
        Ok(project) => project,
        Err(e) => {
            tracing::error!("Loading the project file failed: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };
    tracing::debug!(
        "Project {}: {} asset matchers, {} shader matchers",
        project.name,
        project.asset_matchers.len(),
        project.shader_matchers.len()
    );

    let context = match BuildContext::new(project, options) {
        Ok(context) => context,
        Err(e) => {
            tracing::error!("Resolving the build directories failed: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };
    if context.tools().shader_compiler.is_none() && !context.project().shader_matchers.is_empty() {
        tracing::warn!("No shader compiler found, pass --krafix or --kha");
    }

    match BuildPipeline::new(context).build() {
        Ok(result) => {
            println!("{}", result.summary());
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            tracing::error!("Build error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}
