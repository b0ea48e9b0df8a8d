//! Configuration schema types for `project.toml`
//!
//! Defines the project description (asset and shader matchers, sources,
//! libraries, defines) and the per-run build options.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Per-matcher naming and processing options.
///
/// Templates accept the `{name}`, `{ext}` and `{dir}` placeholders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamingOptions {
    /// Output path template, relative to the target system directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    /// Logical registry name template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Replacement for the OS path separator inside `{dir}`
    #[serde(default, alias = "namePathSeparator", skip_serializing_if = "Option::is_none")]
    pub name_path_separator: Option<String>,
    /// Directory `{dir}` is made relative to (relative to the project root)
    #[serde(default, alias = "nameBaseDir", skip_serializing_if = "Option::is_none")]
    pub name_base_dir: Option<PathBuf>,
    /// Copy the source verbatim instead of converting it
    #[serde(default)]
    pub noprocessing: bool,
    /// Bundle into the binary instead of loading at runtime
    #[serde(default)]
    pub embed: bool,
    /// Encoding quality in `0.0..=1.0`; below 1.0 audio is compressed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<f32>,
    /// Keep image pixel data readable on the CPU side
    #[serde(default)]
    pub readable: bool,
    /// Shader preprocessor defines
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub defines: Vec<String>,
}

impl NamingOptions {
    /// Effective quality (defaults to lossless).
    pub fn quality(&self) -> f32 {
        self.quality.unwrap_or(1.0)
    }
}

/// A rule to scan for raw assets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetMatcher {
    /// Glob-like pattern; absolute once the project is loaded
    pub pattern: String,
    #[serde(flatten)]
    pub options: NamingOptions,
}

/// A rule to scan for shader sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaderMatcher {
    /// Glob-like pattern; absolute once the project is loaded
    pub pattern: String,
    #[serde(flatten)]
    pub options: NamingOptions,
}

/// A resolved library dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Library {
    /// Absolute or cwd-relative path of the library
    pub libpath: PathBuf,
    /// Root used when generating project files
    pub libroot: String,
}

/// Fully resolved project description consumed by the pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectDescriptor {
    pub name: String,
    pub asset_matchers: Vec<AssetMatcher>,
    pub shader_matchers: Vec<ShaderMatcher>,
    pub sources: Vec<PathBuf>,
    pub libraries: Vec<Library>,
    pub defines: Vec<String>,
    pub parameters: Vec<String>,
}

/// `[project]` section of `project.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSection {
    /// Project name (required)
    pub name: String,
    /// Source directories for the downstream compiler
    #[serde(default)]
    pub sources: Vec<PathBuf>,
    /// Library names or paths
    #[serde(default)]
    pub libraries: Vec<String>,
    #[serde(default)]
    pub defines: Vec<String>,
    /// Extra compiler parameters, one per line in the generated project file
    #[serde(default)]
    pub parameters: Vec<String>,
    /// Sub-project directories whose descriptions are merged into this one
    #[serde(default)]
    pub include: Vec<PathBuf>,
}

/// Complete `project.toml` file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectFile {
    pub project: ProjectSection,
    #[serde(default)]
    pub assets: Vec<AssetMatcher>,
    #[serde(default)]
    pub shaders: Vec<ShaderMatcher>,
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "assets[0].pattern")
    pub field: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "project.toml: '{}' {}", self.field, self.message)
    }
}

impl ProjectFile {
    /// Validate the project file and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        if self.project.name.trim().is_empty() {
            errors.push(ConfigValidationError {
                field: "project.name".to_string(),
                message: "must be a non-empty string".to_string(),
            });
        }

        let matchers = self
            .assets
            .iter()
            .map(|m| ("assets", &m.pattern, &m.options))
            .chain(self.shaders.iter().map(|m| ("shaders", &m.pattern, &m.options)));
        for (index, (section, pattern, options)) in matchers.enumerate() {
            if pattern.trim().is_empty() {
                errors.push(ConfigValidationError {
                    field: format!("{}[{}].pattern", section, index),
                    message: "must contain a glob pattern".to_string(),
                });
            }
            if let Some(quality) = options.quality {
                if !(0.0..=1.0).contains(&quality) {
                    errors.push(ConfigValidationError {
                        field: format!("{}[{}].quality", section, index),
                        message: "must be between 0.0 and 1.0".to_string(),
                    });
                }
            }
        }

        errors
    }
}

/// Graphics backend requested for the target.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Graphics {
    /// Pick per host platform
    #[default]
    Default,
    #[value(name = "opengl")]
    OpenGl,
    Vulkan,
    Metal,
    #[value(name = "direct3d11")]
    Direct3d11,
    #[value(name = "direct3d12")]
    Direct3d12,
}

impl std::fmt::Display for Graphics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Graphics::Default => write!(f, "default"),
            Graphics::OpenGl => write!(f, "opengl"),
            Graphics::Vulkan => write!(f, "vulkan"),
            Graphics::Metal => write!(f, "metal"),
            Graphics::Direct3d11 => write!(f, "direct3d11"),
            Graphics::Direct3d12 => write!(f, "direct3d12"),
        }
    }
}

/// Options for a single pipeline run.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Project directory containing `project.toml`
    pub from: PathBuf,
    /// Build output root
    pub to: PathBuf,
    /// Target system directory name under `to`
    pub target: String,
    pub graphics: Graphics,
    /// Explicit shader language version (e.g. 300 selects ESSL on OpenGL)
    pub shader_version: Option<u32>,
    /// Path to ffmpeg, used for every encoder when set
    pub ffmpeg: Option<String>,
    /// Toolkit root used to discover bundled tools
    pub kha: Option<PathBuf>,
    /// Explicit shader compiler path
    pub krafix: Option<PathBuf>,
    /// Explicit haxe directory
    pub haxe: Option<PathBuf>,
    /// Recompile every shader regardless of timestamps
    pub force: bool,
    pub verbose: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            from: PathBuf::from("."),
            to: PathBuf::from("build"),
            target: "krom".to_string(),
            graphics: Graphics::Default,
            shader_version: None,
            ffmpeg: None,
            kha: None,
            krafix: None,
            haxe: None,
            force: false,
            verbose: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_project_parse() {
        let toml = r#"
[project]
name = "game"
"#;
        let file: ProjectFile = toml::from_str(toml).unwrap();
        assert_eq!(file.project.name, "game");
        assert!(file.assets.is_empty());
        assert!(file.shaders.is_empty());
        assert!(file.validate().is_empty());
    }

    #[test]
    fn test_matcher_options_parse() {
        let toml = r#"
[project]
name = "game"

[[assets]]
pattern = "Assets/**"
destination = "{dir}/{name}"
namePathSeparator = "_"
name_base_dir = "Assets"
embed = true
quality = 0.5

[[shaders]]
pattern = "Shaders/*.glsl"
defines = ["FAST"]
"#;
        let file: ProjectFile = toml::from_str(toml).unwrap();
        let asset = &file.assets[0];
        assert_eq!(asset.pattern, "Assets/**");
        assert_eq!(asset.options.destination.as_deref(), Some("{dir}/{name}"));
        assert_eq!(asset.options.name_path_separator.as_deref(), Some("_"));
        assert_eq!(asset.options.name_base_dir, Some(PathBuf::from("Assets")));
        assert!(asset.options.embed);
        assert_eq!(asset.options.quality(), 0.5);
        assert_eq!(file.shaders[0].options.defines, vec!["FAST".to_string()]);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let toml = r#"
[project]
name = ""

[[assets]]
pattern = ""
quality = 2.0
"#;
        let file: ProjectFile = toml::from_str(toml).unwrap();
        let errors = file.validate();
        assert_eq!(errors.len(), 3);
        assert!(errors[0].to_string().contains("project.name"));
        assert!(errors.iter().any(|e| e.field == "assets[0].quality"));
    }

    #[test]
    fn test_graphics_parse() {
        #[derive(Deserialize)]
        struct Wrapper {
            graphics: Graphics,
        }
        let w: Wrapper = toml::from_str("graphics = \"direct3d11\"").unwrap();
        assert_eq!(w.graphics, Graphics::Direct3d11);
        assert!(toml::from_str::<Wrapper>("graphics = \"direct3d9\"").is_err());
        assert_eq!(Graphics::OpenGl.to_string(), "opengl");
    }

    #[test]
    fn test_build_options_default() {
        let options = BuildOptions::default();
        assert_eq!(options.to, PathBuf::from("build"));
        assert_eq!(options.target, "krom");
        assert_eq!(options.graphics, Graphics::Default);
        assert!(!options.force);
    }
}
