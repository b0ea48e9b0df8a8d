//! Project loading for `project.toml`
//!
//! Replaces a scripted project description with a static file plus a typed
//! builder. The builder resolves matcher patterns against the project
//! directory, locates libraries and merges included sub-projects.

use super::schema::{
    AssetMatcher, Library, NamingOptions, ProjectDescriptor, ProjectFile, ShaderMatcher,
};
use std::collections::HashSet;
use std::fs;
use std::path::{self, Path, PathBuf};
use thiserror::Error;

/// Name of the project description file.
pub const PROJECT_FILENAME: &str = "project.toml";

/// Characters with glob meaning that must be escaped in literal path prefixes.
const GLOB_CHARS: [char; 11] = ['@', '!', '+', '*', '?', '(', '[', '{', ')', ']', '}'];

/// Project loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read {}: {source}", path.display())]
    Io { path: PathBuf, source: std::io::Error },
    /// TOML parsing error
    #[error("Failed to parse project.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
    /// No project file in the directory
    #[error("No project file found in {}", .0.display())]
    NotFound(PathBuf),
    /// Library could not be located
    #[error("Library {0} not found. Add it to the 'Libraries' subdirectory of your project.")]
    LibraryNotFound(String),
    /// A project includes itself, directly or transitively
    #[error("Project include cycle at {}", .0.display())]
    IncludeCycle(PathBuf),
}

/// Typed builder for a [`ProjectDescriptor`].
///
/// Relative patterns and source directories resolve against the directory
/// the builder was created for.
#[derive(Debug, Clone)]
pub struct ProjectBuilder {
    script_dir: PathBuf,
    descriptor: ProjectDescriptor,
}

impl ProjectBuilder {
    /// Create a builder for a project rooted at `script_dir`.
    ///
    /// A relative `script_dir` is resolved against the current directory.
    pub fn new(name: impl Into<String>, script_dir: &Path) -> Result<Self, ConfigError> {
        let script_dir = path::absolute(script_dir)
            .map_err(|source| ConfigError::Io { path: script_dir.to_path_buf(), source })?;
        Ok(Self {
            script_dir,
            descriptor: ProjectDescriptor { name: name.into(), ..Default::default() },
        })
    }

    /// Directory relative patterns are resolved against.
    pub fn script_dir(&self) -> &Path {
        &self.script_dir
    }

    /// Add all assets matching `pattern`; the asset type is inferred from the suffix.
    pub fn add_assets(mut self, pattern: &str, options: NamingOptions) -> Self {
        let pattern = resolve_pattern(&self.script_dir, pattern);
        self.descriptor.asset_matchers.push(AssetMatcher { pattern, options });
        self
    }

    /// Add all shader sources matching `pattern`.
    pub fn add_shaders(mut self, pattern: &str, options: NamingOptions) -> Self {
        let pattern = resolve_pattern(&self.script_dir, pattern);
        self.descriptor.shader_matchers.push(ShaderMatcher { pattern, options });
        self
    }

    /// Add a source directory for the downstream compiler.
    pub fn add_sources(mut self, dir: &Path) -> Self {
        self.descriptor.sources.push(self.script_dir.join(dir));
        self
    }

    pub fn add_define(mut self, define: impl Into<String>) -> Self {
        self.descriptor.defines.push(define.into());
        self
    }

    pub fn add_parameter(mut self, parameter: impl Into<String>) -> Self {
        self.descriptor.parameters.push(parameter.into());
        self
    }

    /// Add a library by name or path.
    ///
    /// The library name also becomes a define and its `Sources` directory
    /// is added to the source list.
    pub fn add_library(mut self, name: &str) -> Result<Self, ConfigError> {
        let library = find_library(&self.script_dir, name)?;
        self.descriptor.defines.push(name.to_string());
        self.descriptor.sources.push(library.libpath.join("Sources"));
        self.descriptor.libraries.push(library);
        Ok(self)
    }

    /// Merge the project found in `dir` into this one.
    pub fn add_project(self, dir: &Path) -> Result<Self, ConfigError> {
        let mut includes = Includes::default();
        includes.stack.push(include_key(&self.script_dir));
        self.include(dir, &mut includes)
    }

    fn include(mut self, dir: &Path, includes: &mut Includes) -> Result<Self, ConfigError> {
        let dir = include_key(&self.script_dir.join(dir));
        if includes.merged.contains(&dir) {
            tracing::debug!("Project {} already included", dir.display());
            return Ok(self);
        }
        let sub = load_project_inner(&dir, includes)?;
        let own = &mut self.descriptor;
        own.asset_matchers.extend(sub.asset_matchers);
        own.shader_matchers.extend(sub.shader_matchers);
        own.sources.extend(sub.sources);
        own.defines.extend(sub.defines);
        own.parameters.extend(sub.parameters);
        own.libraries.extend(sub.libraries);
        Ok(self)
    }

    /// Finish building.
    pub fn build(self) -> ProjectDescriptor {
        self.descriptor
    }
}

/// Projects being loaded (the include chain) and projects already merged.
///
/// A project may be reached through several includes but is merged once;
/// only a project that includes itself through the chain is an error.
#[derive(Debug, Default)]
struct Includes {
    stack: Vec<PathBuf>,
    merged: HashSet<PathBuf>,
}

fn include_key(dir: &Path) -> PathBuf {
    fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf())
}

/// Load the project description from `dir/project.toml`.
pub fn load_project(dir: &Path) -> Result<ProjectDescriptor, ConfigError> {
    let dir = path::absolute(dir)
        .map_err(|source| ConfigError::Io { path: dir.to_path_buf(), source })?;
    load_project_inner(&dir, &mut Includes::default())
}

fn load_project_inner(
    dir: &Path,
    includes: &mut Includes,
) -> Result<ProjectDescriptor, ConfigError> {
    let key = include_key(dir);
    if includes.stack.contains(&key) {
        return Err(ConfigError::IncludeCycle(dir.to_path_buf()));
    }
    includes.stack.push(key);
    let project = read_project(dir, includes);
    if let Some(key) = includes.stack.pop() {
        includes.merged.insert(key);
    }
    project
}

fn read_project(dir: &Path, includes: &mut Includes) -> Result<ProjectDescriptor, ConfigError> {
    let path = dir.join(PROJECT_FILENAME);
    if !path.exists() {
        return Err(ConfigError::NotFound(dir.to_path_buf()));
    }
    let contents =
        fs::read_to_string(&path).map_err(|source| ConfigError::Io { path: path.clone(), source })?;
    let file: ProjectFile = toml::from_str(&contents)?;

    let errors = file.validate();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()));
    }

    let mut builder = ProjectBuilder::new(file.project.name, dir)?;
    for source in &file.project.sources {
        builder = builder.add_sources(source);
    }
    for define in file.project.defines {
        builder = builder.add_define(define);
    }
    for parameter in file.project.parameters {
        builder = builder.add_parameter(parameter);
    }
    for library in &file.project.libraries {
        builder = builder.add_library(library)?;
    }
    for matcher in file.assets {
        builder = builder.add_assets(&matcher.pattern, matcher.options);
    }
    for matcher in file.shaders {
        builder = builder.add_shaders(&matcher.pattern, matcher.options);
    }
    for include in &file.project.include {
        builder = builder.include(include, includes)?;
    }

    Ok(builder.build())
}

/// Make `pattern` absolute relative to `base`, escaping glob characters in `base`.
pub fn resolve_pattern(base: &Path, pattern: &str) -> String {
    let pattern = pattern.replace('\\', "/");
    if Path::new(&pattern).is_absolute() {
        return pattern;
    }
    let mut prefix = unglob(&base.to_string_lossy());
    if !prefix.ends_with('/') {
        prefix.push('/');
    }
    prefix + &pattern
}

/// Escape glob characters so a literal path can prefix a pattern.
pub fn unglob(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.replace('\\', "/").chars() {
        if GLOB_CHARS.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn find_library(script_dir: &Path, name: &str) -> Result<Library, ConfigError> {
    let path = Path::new(name);
    if path.is_absolute() || path.exists() {
        let libpath = path::absolute(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        return Ok(Library { libpath, libroot: name.to_string() });
    }

    let libpath = script_dir.join("Libraries").join(name);
    if libpath.is_dir() {
        return Ok(Library { libpath, libroot: format!("Libraries/{}", name) });
    }

    Err(ConfigError::LibraryNotFound(name.to_string()))
}
