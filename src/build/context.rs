//! Build context containing configuration and paths for a pipeline run.

use crate::config::{BuildOptions, HostPlatform, ProjectDescriptor, ToolPaths};
use std::io;
use std::path::{self, Path, PathBuf};

/// Build context passed explicitly into every pipeline stage.
///
/// Holds the project description, the run options, the discovered tools and
/// the host platform, and derives all output locations from them.
#[derive(Debug, Clone)]
pub struct BuildContext {
    project: ProjectDescriptor,
    options: BuildOptions,
    tools: ToolPaths,
    host: HostPlatform,
    project_root: PathBuf,
}

impl BuildContext {
    /// Create a context, discovering tools for the current host.
    ///
    /// `from` and `to` are resolved against the current directory so every
    /// derived path is absolute, like the discovered source files.
    pub fn new(project: ProjectDescriptor, mut options: BuildOptions) -> io::Result<Self> {
        options.from = path::absolute(&options.from)?;
        options.to = path::absolute(&options.to)?;
        let host = HostPlatform::current();
        let tools = ToolPaths::discover(&options, host);
        let project_root = options.from.clone();
        Ok(Self { project, options, tools, host, project_root })
    }

    /// Replace the discovered tools.
    pub fn with_tools(mut self, tools: ToolPaths) -> Self {
        self.tools = tools;
        self
    }

    /// Pretend to run on another host (affects dialect selection and defines).
    pub fn with_host(mut self, host: HostPlatform) -> Self {
        self.host = host;
        self
    }

    /// Set the directory `{dir}` placeholders are made relative to.
    pub fn with_project_root(mut self, root: PathBuf) -> Self {
        self.project_root = root;
        self
    }

    pub fn project(&self) -> &ProjectDescriptor {
        &self.project
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    pub fn tools(&self) -> &ToolPaths {
        &self.tools
    }

    pub fn host(&self) -> HostPlatform {
        self.host
    }

    /// Project directory used for naming.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Target system directory name.
    pub fn target(&self) -> &str {
        &self.options.target
    }

    /// Build output root.
    pub fn build_root(&self) -> &Path {
        &self.options.to
    }

    /// `<to>/<target>`: converted assets and compiled code.
    pub fn system_dir(&self) -> PathBuf {
        self.options.to.join(&self.options.target)
    }

    /// `<to>/<target>-resources`: the manifest directory.
    pub fn resources_dir(&self) -> PathBuf {
        self.options.to.join(format!("{}-resources", self.options.target))
    }

    /// `<to>/<target>-build`: scratch space for the downstream compiler.
    pub fn build_dir(&self) -> PathBuf {
        self.options.to.join(format!("{}-build", self.options.target))
    }

    /// `<to>/<target>/data`: compiled shaders.
    pub fn shader_dir(&self) -> PathBuf {
        self.system_dir().join("data")
    }

    /// `<to>/temp`: scratch directory shared by the shader compiler.
    pub fn temp_dir(&self) -> PathBuf {
        self.options.to.join("temp")
    }

    /// Path of the persisted manifest.
    pub fn manifest_path(&self) -> PathBuf {
        self.resources_dir().join("files.json")
    }

    /// Path of the embed list.
    pub fn embed_path(&self) -> PathBuf {
        self.shader_dir().join("embed.txt")
    }

    /// Resolve an exported file name against the system directory.
    pub fn output_path(&self, relative: &str) -> PathBuf {
        self.system_dir().join(relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_context() -> BuildContext {
        let options = BuildOptions {
            from: PathBuf::from("/project"),
            to: PathBuf::from("/project/build"),
            ..Default::default()
        };
        BuildContext::new(ProjectDescriptor::default(), options).unwrap()
    }

    #[test]
    fn test_build_context_paths() {
        let ctx = create_test_context();
        assert_eq!(ctx.system_dir(), PathBuf::from("/project/build/krom"));
        assert_eq!(ctx.resources_dir(), PathBuf::from("/project/build/krom-resources"));
        assert_eq!(ctx.build_dir(), PathBuf::from("/project/build/krom-build"));
        assert_eq!(ctx.shader_dir(), PathBuf::from("/project/build/krom/data"));
        assert_eq!(ctx.temp_dir(), PathBuf::from("/project/build/temp"));
        assert_eq!(ctx.manifest_path(), PathBuf::from("/project/build/krom-resources/files.json"));
        assert_eq!(ctx.embed_path(), PathBuf::from("/project/build/krom/data/embed.txt"));
        assert_eq!(ctx.output_path("icons/a.k"), PathBuf::from("/project/build/krom/icons/a.k"));
    }

    #[test]
    fn test_build_context_overrides() {
        let tools = ToolPaths { ogg: Some("enc {in} {out}".to_string()), ..Default::default() };
        let ctx = create_test_context()
            .with_tools(tools.clone())
            .with_host(HostPlatform::Windows)
            .with_project_root(PathBuf::from("/elsewhere"));

        assert_eq!(ctx.tools(), &tools);
        assert_eq!(ctx.host(), HostPlatform::Windows);
        assert_eq!(ctx.project_root(), Path::new("/elsewhere"));
        assert_eq!(ctx.target(), "krom");
    }

    #[test]
    fn test_build_context_resolves_relative_dirs() {
        let options = BuildOptions {
            from: PathBuf::from("."),
            to: PathBuf::from("build"),
            ..Default::default()
        };
        let ctx = BuildContext::new(ProjectDescriptor::default(), options).unwrap();
        let cwd = std::env::current_dir().unwrap();

        assert!(ctx.project_root().is_absolute());
        assert_eq!(ctx.project_root(), cwd.as_path());
        assert_eq!(ctx.system_dir(), cwd.join("build/krom"));
    }
}
