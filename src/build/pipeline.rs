//! Build pipeline orchestration.
//!
//! A run exports assets, reads the previous manifest, compiles shaders,
//! writes the new manifest and embed list, and finally compiles the code.
//! Stages run strictly one after another and the first fatal error aborts
//! the run before the manifest is written.

use super::assets::{AssetError, AssetPipeline};
use super::compiler::{Compiler, CompilerError, HaxeCompiler};
use super::context::BuildContext;
use super::exporter::{Exporter, PlatformExporter};
use super::manifest::{Manifest, ManifestBuilder, ManifestError};
use super::result::BuildResult;
use super::shaders::{ShaderError, ShaderPipeline};
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

/// Error during build execution.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BuildError {
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error(transparent)]
    Shader(#[from] ShaderError),
    #[error("Failed to write manifest: {0}")]
    Manifest(#[from] ManifestError),
    #[error(transparent)]
    Compiler(#[from] CompilerError),
    #[error("Failed to create {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Build pipeline for one project and target.
pub struct BuildPipeline {
    context: BuildContext,
    compile_code: bool,
}

impl BuildPipeline {
    pub fn new(context: BuildContext) -> Self {
        Self { context, compile_code: true }
    }

    /// Enable or disable the downstream compiler step.
    pub fn with_compile_code(mut self, compile_code: bool) -> Self {
        self.compile_code = compile_code;
        self
    }

    pub fn context(&self) -> &BuildContext {
        &self.context
    }

    /// Run with the platform exporter and, if configured, the haxe compiler.
    pub fn build(&self) -> Result<BuildResult, BuildError> {
        let exporter = PlatformExporter::from_context(&self.context);
        let compiler = if self.compile_code { HaxeCompiler::from_context(&self.context) } else { None };
        self.build_with(&exporter, compiler.as_ref().map(|c| c as &dyn Compiler))
    }

    /// Run with explicit collaborators.
    pub fn build_with<E: Exporter>(
        &self,
        exporter: &E,
        compiler: Option<&dyn Compiler>,
    ) -> Result<BuildResult, BuildError> {
        let start = Instant::now();
        let ctx = &self.context;

        for dir in [ctx.temp_dir(), ctx.system_dir()] {
            fs::create_dir_all(&dir).map_err(|source| BuildError::Io { path: dir.clone(), source })?;
        }

        let assets = AssetPipeline::new(ctx, exporter).run()?;

        let builder = ManifestBuilder::new(Manifest::load_previous(&ctx.manifest_path()));
        let incomplete = builder.recompile_all_shaders();
        if incomplete {
            tracing::info!("Previous build was incomplete, recompiling all shaders.");
        }
        let shaders = ShaderPipeline::new(ctx).run(incomplete || ctx.options().force)?;

        let (manifest, embed) = builder.build(&assets, &shaders);
        manifest.save(&ctx.manifest_path())?;
        embed.save(&ctx.embed_path())?;

        let mut result = BuildResult::from_records(&assets, &shaders);
        result.manifest_entries = manifest.len();
        result.embedded = embed.files.len();
        result.recompiled_all = incomplete;
        result.manifest_path = Some(ctx.manifest_path());

        match compiler {
            Some(compiler) => {
                compiler.compile(ctx)?;
                result.compiled_code = true;
            }
            None => tracing::debug!("No haxe directory configured, skipping code compilation"),
        }

        tracing::info!("Done.");
        Ok(result.with_duration(start.elapsed()))
    }
}
