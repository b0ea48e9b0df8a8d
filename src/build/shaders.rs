//! Shader compilation.
//!
//! Each shader source is compiled to `<shader dir>/<name>.<dialect>` by the
//! external shader compiler. Sources whose output is newer than both the
//! source and the compiler binary are not recompiled; their records are
//! marked [`ShaderOutcome::Fresh`] and take their file list from the previous
//! manifest.

use super::context::BuildContext;
use super::discovery::{self, DiscoveryError};
use super::naming::{self, ParsedPath};
use super::staleness::{self, Freshness, StalenessError};
use super::tool::{ToolError, ToolInvocation};
use crate::config::{Graphics, HostPlatform, NamingOptions, ShaderMatcher};
use std::fs;
use std::io;
use std::path::{self, Component, Path, PathBuf};

/// Shader language handed to the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderDialect {
    D3d11,
    Metal,
    Glsl,
    Essl,
    Spirv,
}

impl ShaderDialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShaderDialect::D3d11 => "d3d11",
            ShaderDialect::Metal => "metal",
            ShaderDialect::Glsl => "glsl",
            ShaderDialect::Essl => "essl",
            ShaderDialect::Spirv => "spirv",
        }
    }
}

impl std::fmt::Display for ShaderDialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pick the shader dialect for a graphics backend on a host.
///
/// Shader version 300 selects ESSL instead of GLSL.
pub fn select_dialect(graphics: Graphics, host: HostPlatform, version: Option<u32>) -> ShaderDialect {
    let opengl = if version == Some(300) { ShaderDialect::Essl } else { ShaderDialect::Glsl };
    match graphics {
        Graphics::Default => match host {
            HostPlatform::Windows => ShaderDialect::D3d11,
            HostPlatform::MacOs => ShaderDialect::Metal,
            HostPlatform::Linux => opengl,
        },
        Graphics::OpenGl => opengl,
        Graphics::Vulkan => ShaderDialect::Spirv,
        Graphics::Metal => ShaderDialect::Metal,
        Graphics::Direct3d11 | Graphics::Direct3d12 => ShaderDialect::D3d11,
    }
}

/// What happened to a shader in this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShaderOutcome {
    /// Output is up to date; reuse the previous manifest entry
    Fresh,
    /// Output was (re)generated; files are relative to the system directory
    Compiled(Vec<String>),
}

/// One processed shader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderRecord {
    /// Logical name, before manifest normalisation
    pub name: String,
    pub source: PathBuf,
    pub outcome: ShaderOutcome,
    pub embed: bool,
}

/// Error in the shader stage.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ShaderError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error("No shader compiler found.")]
    NoCompiler,
    #[error(transparent)]
    Staleness(#[from] StalenessError),
    /// The compiler failed for a shader
    #[error("Shader compiler error in {}: {source}", shader.display())]
    Compile {
        shader: PathBuf,
        #[source]
        source: ToolError,
    },
    /// The compiler declared an output outside the shader directory
    #[error("Shader compiler declared invalid output '{file}' for {}", shader.display())]
    InvalidOutput { shader: PathBuf, file: String },
    #[error("Failed to write shader output {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Compiles every shader matched by the project's shader matchers.
pub struct ShaderPipeline<'a> {
    ctx: &'a BuildContext,
    dialect: ShaderDialect,
}

impl<'a> ShaderPipeline<'a> {
    pub fn new(ctx: &'a BuildContext) -> Self {
        let options = ctx.options();
        let dialect = select_dialect(options.graphics, ctx.host(), options.shader_version);
        Self { ctx, dialect }
    }

    pub fn dialect(&self) -> ShaderDialect {
        self.dialect
    }

    /// Run all matchers in declaration order, stopping at the first failure.
    pub fn run(&self, recompile_all: bool) -> Result<Vec<ShaderRecord>, ShaderError> {
        let mut records = Vec::new();
        for matcher in &self.ctx.project().shader_matchers {
            records.extend(self.compile_matcher(matcher, recompile_all)?);
        }
        Ok(records)
    }

    fn compile_matcher(
        &self,
        matcher: &ShaderMatcher,
        recompile_all: bool,
    ) -> Result<Vec<ShaderRecord>, ShaderError> {
        let shaders = discovery::discover(&matcher.pattern)?;
        let mut records = Vec::with_capacity(shaders.len());

        for (index, shader) in shaders.iter().enumerate() {
            let parsed = ParsedPath::parse(shader);
            tracing::info!("Compiling shader {} of {} ({}).", index + 1, shaders.len(), parsed.base());

            let outcome = match self.compile_shader(shader, &parsed, &matcher.options, recompile_all) {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(
                        "Compiling shader {} of {} ({}) failed:",
                        index + 1,
                        shaders.len(),
                        parsed.base()
                    );
                    tracing::error!("{}", e);
                    return Err(e);
                }
            };
            let outcome = match outcome {
                ShaderOutcome::Compiled(files) if files.is_empty() => ShaderOutcome::Compiled(vec![
                    format!("data/{}.{}", parsed.name, self.dialect),
                ]),
                other => other,
            };

            let name =
                naming::resolve(&parsed, false, &matcher.options, self.ctx.project_root()).name;
            records.push(ShaderRecord {
                name,
                source: shader.clone(),
                outcome,
                embed: matcher.options.embed,
            });
        }
        Ok(records)
    }

    /// Compile one shader unless its output is fresh.
    ///
    /// An empty file list in the result means the compiler declared no
    /// outputs and the default `<name>.<dialect>` was written.
    pub fn compile_shader(
        &self,
        shader: &Path,
        parsed: &ParsedPath,
        options: &NamingOptions,
        recompile_all: bool,
    ) -> Result<ShaderOutcome, ShaderError> {
        let shader_dir = self.ctx.shader_dir();
        let to = shader_dir.join(format!("{}.{}", parsed.name, self.dialect));
        let temp = PathBuf::from(format!("{}.temp", to.display()));
        fs::create_dir_all(&shader_dir)
            .map_err(|source| ShaderError::Io { path: shader_dir.clone(), source })?;

        if options.noprocessing {
            if staleness::check_files(shader, &to, None, false)?.is_stale() {
                fs::copy(shader, &to).map_err(|source| ShaderError::Io { path: to.clone(), source })?;
            }
            return Ok(ShaderOutcome::Compiled(vec![]));
        }

        let compiler = self.ctx.tools().shader_compiler.as_deref().ok_or(ShaderError::NoCompiler)?;
        match staleness::check_files(shader, &to, Some(compiler), recompile_all)? {
            Freshness::Fresh => return Ok(ShaderOutcome::Fresh),
            Freshness::Stale(reason) => tracing::debug!("{}: {}", parsed.base(), reason),
        }

        let scratch = self.ctx.temp_dir();
        fs::create_dir_all(&scratch)
            .map_err(|source| ShaderError::Io { path: scratch.clone(), source })?;

        let source = path::absolute(shader)
            .map_err(|source| ShaderError::Io { path: shader.to_path_buf(), source })?;
        let mut invocation = ToolInvocation::new(compiler)
            .arg(self.dialect.as_str())
            .arg(source)
            .arg(&temp)
            .arg(&scratch)
            .arg(self.ctx.target());
        if let Some(version) = self.ctx.options().shader_version {
            invocation = invocation.arg("--version").arg(version.to_string());
        }
        invocation = invocation.args(options.defines.iter().map(|d| format!("-D{}", d)));

        let output = match invocation.run() {
            Ok(output) => output,
            Err(source) => {
                let _ = fs::remove_file(&temp);
                return Err(ShaderError::Compile { shader: shader.to_path_buf(), source });
            }
        };

        let declared: Vec<&str> =
            output.data.iter().filter_map(|line| line.strip_prefix("file:")).map(str::trim).collect();
        if declared.is_empty() {
            rename(&temp, &to)?;
            return Ok(ShaderOutcome::Compiled(vec![]));
        }

        if let Some(file) = declared.iter().find(|file| !is_plain_relative(file)) {
            return Err(ShaderError::InvalidOutput {
                shader: shader.to_path_buf(),
                file: file.to_string(),
            });
        }

        let mut files = Vec::with_capacity(declared.len());
        for file in declared {
            rename(&shader_dir.join(format!("{}.temp", file)), &shader_dir.join(file))?;
            files.push(format!("data/{}", file));
        }
        Ok(ShaderOutcome::Compiled(files))
    }
}

fn rename(from: &Path, to: &Path) -> Result<(), ShaderError> {
    fs::rename(from, to).map_err(|source| ShaderError::Io { path: to.to_path_buf(), source })
}

/// A declared output must stay inside the shader directory.
fn is_plain_relative(file: &str) -> bool {
    let path = Path::new(file);
    path.components().next().is_some() && path.components().all(|c| matches!(c, Component::Normal(_)))
}
