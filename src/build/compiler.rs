//! Downstream code compiler invoked once per run.
//!
//! [`HaxeCompiler`] writes `<to>/project-<target>.hxml` and runs haxe on it
//! from the build root. The JavaScript output goes to a temporary file that
//! replaces `<target>/krom.js` only after haxe succeeded.

use super::context::BuildContext;
use super::naming::relative_path;
use super::tool::{ToolError, ToolInvocation};
use crate::config::{Graphics, HostPlatform};
use std::fs;
use std::io;
use std::path::{self, PathBuf};

/// Error from the downstream compiler step.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CompilerError {
    #[error("Failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Haxe compiler error: {0}")]
    Tool(#[from] ToolError),
}

/// A compiler for the project's code.
pub trait Compiler {
    fn compile(&self, ctx: &BuildContext) -> Result<(), CompilerError>;
}

/// Compiles the project's Haxe sources to `krom.js`.
#[derive(Debug, Clone)]
pub struct HaxeCompiler {
    haxe_dir: PathBuf,
}

impl HaxeCompiler {
    pub fn new(haxe_dir: PathBuf) -> Self {
        Self { haxe_dir }
    }

    /// Compiler from the context's tools, if a haxe directory is configured.
    pub fn from_context(ctx: &BuildContext) -> Option<Self> {
        ctx.tools().haxe_dir.clone().map(Self::new)
    }

    pub fn executable(&self, host: HostPlatform) -> PathBuf {
        self.haxe_dir.join(format!("haxe{}", host.exec_suffix()))
    }

    /// Name of the generated project file.
    pub fn hxml_name(target: &str) -> String {
        format!("project-{}.hxml", target)
    }

    /// Output path relative to the build root.
    fn output(target: &str) -> String {
        format!("{}/krom.js", target)
    }

    /// Write the hxml project file and return its path.
    pub fn write_project(&self, ctx: &BuildContext) -> Result<PathBuf, CompilerError> {
        let root = ctx.build_root();
        let path = root.join(Self::hxml_name(ctx.target()));
        fs::create_dir_all(root).map_err(|source| CompilerError::Io { path: root.to_path_buf(), source })?;
        let contents =
            hxml_contents(ctx).map_err(|source| CompilerError::Io { path: path.clone(), source })?;
        fs::write(&path, contents)
            .map_err(|source| CompilerError::Io { path: path.clone(), source })?;
        Ok(path)
    }
}

impl Compiler for HaxeCompiler {
    fn compile(&self, ctx: &BuildContext) -> Result<(), CompilerError> {
        let hxml = self.write_project(ctx)?;
        let root = ctx.build_root();
        let io_err = |source| CompilerError::Io { path: self.haxe_dir.clone(), source };
        let std_dir = path::absolute(self.haxe_dir.join("std")).map_err(io_err)?;
        let executable = path::absolute(self.executable(ctx.host())).map_err(io_err)?;

        tracing::info!("Compiling code.");
        ToolInvocation::new(executable)
            .arg(Self::hxml_name(ctx.target()))
            .current_dir(root)
            .env("HAXE_STD_PATH", std_dir)
            .run()?;

        let output = root.join(Self::output(ctx.target()));
        let temp = PathBuf::from(format!("{}.temp", output.display()));
        if temp.exists() {
            fs::rename(&temp, &output).map_err(|source| CompilerError::Io { path: output, source })?;
        }
        tracing::debug!("Compiled {}", hxml.display());
        Ok(())
    }
}

/// Defines passed to haxe in addition to the project's own.
pub fn platform_defines(target: &str, graphics: Graphics, host: HostPlatform) -> Vec<String> {
    let graphics = match graphics {
        Graphics::Default => match host {
            HostPlatform::Windows => Graphics::Direct3d11,
            HostPlatform::MacOs => Graphics::Metal,
            HostPlatform::Linux => Graphics::OpenGl,
        },
        other => other,
    };
    let mut defines = vec!["armorcore".to_string(), format!("sys_{}", target)];
    defines.extend(["sys_g1", "sys_g2", "sys_g3", "sys_g4", "sys_a1", "sys_a2", "kha_js"].map(String::from));
    defines.push(format!("kha_{}", target));
    defines.push(format!("kha_{}_js", target));
    defines.push(format!("kha_{}", graphics));
    defines.extend(["kha_g1", "kha_g2", "kha_g3", "kha_g4", "kha_a1", "kha_a2", "kha"].map(String::from));
    defines
}

/// Contents of the hxml project file. Duplicate lines are dropped.
///
/// Relative class paths are rewritten against the build root, which is
/// where haxe runs.
pub fn hxml_contents(ctx: &BuildContext) -> io::Result<String> {
    let project = ctx.project();
    let options = ctx.options();
    let root = ctx.build_root();

    let mut lines: Vec<String> = Vec::new();
    let mut push = |line: String| {
        if !lines.contains(&line) {
            lines.push(line);
        }
    };

    let kha_sources = options.kha.iter().map(|kha| kha.join("Sources"));
    let libraries = project.libraries.iter().map(|lib| lib.libpath.clone());
    for dir in kha_sources.chain(project.sources.iter().cloned()).chain(libraries) {
        let cp = if dir.is_absolute() {
            dir
        } else {
            let dir = path::absolute(&dir)?;
            relative_path(root, &dir).unwrap_or(dir)
        };
        push(format!("-cp {}", cp.display()));
    }

    let platform = platform_defines(ctx.target(), options.graphics, ctx.host());
    for define in project.defines.iter().chain(&platform) {
        push(format!("-D {}", define));
    }
    push(format!("-js {}.temp", HaxeCompiler::output(ctx.target())));
    for parameter in &project.parameters {
        push(parameter.clone());
    }
    if !project.parameters.iter().any(|p| p.contains("-main ")) {
        push("-main Main".to_string());
    }

    Ok(lines.into_iter().map(|line| line + "\n").collect())
}
