//! Discovery of the external converter and compiler binaries.
//!
//! Tools are looked up inside a toolkit root (`--kha`) using the per-host
//! executable suffix, and can be overridden individually from the command line.

use super::schema::BuildOptions;
use std::path::{Path, PathBuf};

/// Host operating system family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPlatform {
    Windows,
    MacOs,
    Linux,
}

impl HostPlatform {
    /// Platform the process is running on.
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            HostPlatform::Windows
        } else if cfg!(target_os = "macos") {
            HostPlatform::MacOs
        } else {
            HostPlatform::Linux
        }
    }

    /// Suffix appended to bundled tool executables.
    pub fn exec_suffix(&self) -> &'static str {
        match self {
            HostPlatform::Linux => "-linux64",
            HostPlatform::Windows => ".exe",
            HostPlatform::MacOs => "-osx",
        }
    }
}

/// Resolved locations and command templates of the external tools.
///
/// Encoder entries are shell-style templates understood by
/// [`crate::build::CommandTemplate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolPaths {
    /// Shader compiler executable
    pub shader_compiler: Option<PathBuf>,
    /// Image converter template (`{in}`/`{out}` placeholders)
    pub image: Option<String>,
    /// Ogg audio encoder template
    pub ogg: Option<String>,
    /// WebM video encoder template
    pub webm: Option<String>,
    /// Directory containing the haxe executable and its `std`
    pub haxe_dir: Option<PathBuf>,
}

impl ToolPaths {
    /// Resolve tools from the build options for the given host.
    pub fn discover(options: &BuildOptions, host: HostPlatform) -> Self {
        let suffix = host.exec_suffix();
        let kha = options.kha.as_deref();

        let shader_compiler = options.krafix.clone().or_else(|| {
            kha.map(|k| bundled(k, &["Kinc", "Tools", "krafix"], "krafix", suffix))
                .filter(|p| p.exists())
        });

        let image = kha
            .map(|k| bundled(k, &["Kinc", "Tools", "kraffiti"], "kraffiti", suffix))
            .filter(|p| p.exists())
            .map(|p| format!("{} from={{in}} to={{out}} format=lz4 filter=nearest", p.display()));

        let haxe_dir = options.haxe.clone().or_else(|| {
            kha.map(|k| k.join("Tools").join("haxe")).filter(|p| p.is_dir())
        });

        let (ogg, webm) = match options.ffmpeg.as_deref().filter(|f| !f.is_empty()) {
            Some(ffmpeg) => {
                let template = ffmpeg_template(ffmpeg);
                (Some(template.clone()), Some(template))
            }
            None => {
                let ogg = kha
                    .map(|k| bundled(k, &["Tools", "oggenc"], "oggenc", suffix))
                    .filter(|p| p.exists())
                    .map(|p| format!("{} {{in}} -o {{out}} --quiet", p.display()));
                (ogg, None)
            }
        };

        Self { shader_compiler, image, ogg, webm, haxe_dir }
    }
}

/// Encoder template that routes a conversion through ffmpeg.
pub fn ffmpeg_template(ffmpeg: &str) -> String {
    format!("{} -nostdin -i {{in}} {{out}}", ffmpeg)
}

fn bundled(root: &Path, dirs: &[&str], exe: &str, suffix: &str) -> PathBuf {
    let mut path = root.to_path_buf();
    for dir in dirs {
        path.push(dir);
    }
    path.join(format!("{}{}", exe, suffix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_exec_suffix() {
        assert_eq!(HostPlatform::Linux.exec_suffix(), "-linux64");
        assert_eq!(HostPlatform::Windows.exec_suffix(), ".exe");
        assert_eq!(HostPlatform::MacOs.exec_suffix(), "-osx");
    }

    #[test]
    fn test_discover_without_toolkit() {
        let tools = ToolPaths::discover(&BuildOptions::default(), HostPlatform::Linux);
        assert_eq!(tools, ToolPaths::default());
    }

    #[test]
    fn test_discover_ffmpeg_templates() {
        let options = BuildOptions { ffmpeg: Some("/usr/bin/ffmpeg".to_string()), ..Default::default() };
        let tools = ToolPaths::discover(&options, HostPlatform::Linux);
        assert_eq!(tools.ogg.as_deref(), Some("/usr/bin/ffmpeg -nostdin -i {in} {out}"));
        assert_eq!(tools.webm, tools.ogg);
    }

    #[test]
    fn test_discover_bundled_tools() {
        let temp = TempDir::new().unwrap();
        let kha = temp.path();
        let krafix = kha.join("Kinc/Tools/krafix/krafix-linux64");
        let oggenc = kha.join("Tools/oggenc/oggenc-linux64");
        for path in [&krafix, &oggenc] {
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, b"").unwrap();
        }
        fs::create_dir_all(kha.join("Tools/haxe")).unwrap();

        let options = BuildOptions { kha: Some(kha.to_path_buf()), ..Default::default() };
        let tools = ToolPaths::discover(&options, HostPlatform::Linux);

        assert_eq!(tools.shader_compiler, Some(krafix));
        assert_eq!(tools.haxe_dir, Some(kha.join("Tools/haxe")));
        assert!(tools.ogg.unwrap().ends_with("oggenc-linux64 {in} -o {out} --quiet"));
        assert!(tools.image.is_none());
        assert!(tools.webm.is_none());
    }

    #[test]
    fn test_explicit_compiler_wins() {
        let options = BuildOptions {
            krafix: Some(PathBuf::from("/opt/krafix")),
            ..Default::default()
        };
        let tools = ToolPaths::discover(&options, HostPlatform::Windows);
        assert_eq!(tools.shader_compiler, Some(PathBuf::from("/opt/krafix")));
    }
}
