//! Build System Test Suite
//!
//! Integration tests for the asset and shader pipeline:
//!
//! - Project loading from `project.toml` and the typed builder
//! - Full runs with stand-in converter and compiler scripts
//! - Idempotence of repeated runs
//! - Shader reuse from the previous manifest
//! - Forced recompilation after an interrupted build

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

use assetbake::build::{relative_path, BuildContext, BuildPipeline, Manifest};
use assetbake::config::{load_project, BuildOptions, NamingOptions, ProjectBuilder, ToolPaths};

// ============================================================================
// Test Utilities
// ============================================================================

fn at(secs: u64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000 + secs)
}

fn set_mtime(path: &Path, time: SystemTime) {
    File::open(path).unwrap().set_modified(time).unwrap();
}

/// Create a test file with content and a fixed modification time.
fn create_test_file(dir: &Path, name: &str, content: &str, mtime: SystemTime) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    set_mtime(&path, mtime);
    path
}

fn create_test_context(root: &Path, tools: ToolPaths) -> BuildContext {
    let project = load_project(root).unwrap();
    let options = BuildOptions {
        from: root.to_path_buf(),
        to: root.join("build"),
        ..Default::default()
    };
    BuildContext::new(project, options).unwrap().with_tools(tools)
}

fn read_manifest(root: &Path) -> Manifest {
    Manifest::load(&root.join("build/krom-resources/files.json")).unwrap().unwrap()
}

// ============================================================================
// Builder / Blob Tests
// ============================================================================

#[test]
fn test_builder_project_blob_run() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    create_test_file(root, "Assets/levels/one.json", "{}", at(10));
    create_test_file(root, "Assets/readme", "text", at(10));

    let project = ProjectBuilder::new("game", root)
        .unwrap()
        .add_assets(
            "Assets/**",
            NamingOptions {
                destination: Some("{dir}/{name}".to_string()),
                name_base_dir: Some(PathBuf::from("Assets")),
                embed: true,
                ..Default::default()
            },
        )
        .build();
    let options = BuildOptions { from: root.to_path_buf(), to: root.join("build"), ..Default::default() };
    let ctx = BuildContext::new(project, options).unwrap().with_tools(ToolPaths::default());

    let result = BuildPipeline::new(ctx).build().unwrap();
    assert_eq!(result.assets, 2);
    assert!(!result.compiled_code);

    let manifest = read_manifest(root);
    let names: Vec<&str> = manifest.files.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["one_json", "readme"]);
    assert_eq!(manifest.get("one_json").unwrap().files, vec!["levels/one.json".to_string()]);
    assert!(root.join("build/krom/levels/one.json").exists());
    assert!(root.join("build/krom/readme").exists());

    let embed = fs::read_to_string(root.join("build/krom/data/embed.txt")).unwrap();
    assert_eq!(embed, "readme\nlevels/one.json\n");
}

#[test]
fn test_relative_project_dir_keeps_sources_intact() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::write(
        root.join("project.toml"),
        "[project]\nname = \"game\"\n\n[[assets]]\npattern = \"Assets/**\"\ndestination = \"{dir}/{name}\"\n",
    )
    .unwrap();
    let source = create_test_file(root, "Assets/levels/one.json", "{}", at(10));

    let cwd = std::env::current_dir().unwrap();
    let relative = relative_path(&cwd, &fs::canonicalize(root).unwrap()).unwrap();
    assert!(relative.is_relative());

    let project = load_project(&relative).unwrap();
    let options = BuildOptions { from: relative.clone(), to: relative.join("build"), ..Default::default() };
    let ctx = BuildContext::new(project, options).unwrap().with_tools(ToolPaths::default());
    BuildPipeline::new(ctx).build().unwrap();

    assert_eq!(fs::read_to_string(&source).unwrap(), "{}");
    assert_eq!(fs::read_to_string(root.join("build/krom/Assets/levels/one.json")).unwrap(), "{}");
    let manifest = read_manifest(root);
    assert_eq!(manifest.get("one_json").unwrap().files, vec!["Assets/levels/one.json".to_string()]);
}

#[test]
fn test_missing_project_file() {
    let temp = TempDir::new().unwrap();
    assert!(load_project(temp.path()).is_err());
}

// ============================================================================
// Full Pipeline Tests (stand-in tools are shell scripts)
// ============================================================================

#[cfg(unix)]
mod scripted {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    const PROJECT: &str = r#"
[project]
name = "game"

[[assets]]
pattern = "assets/*.png"

[[assets]]
pattern = "assets/*.wav"
quality = 0.5

[[shaders]]
pattern = "shaders/*.glsl"
"#;

    /// Project with one image, one sound and one shader plus stand-in tools.
    ///
    /// Every tool appends its name to `calls.log`.
    fn create_test_project() -> (TempDir, ToolPaths) {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        let log = root.join("calls.log");

        fs::write(root.join("project.toml"), PROJECT).unwrap();
        let png = root.join("assets/a.png");
        fs::create_dir_all(png.parent().unwrap()).unwrap();
        image::RgbaImage::new(4, 2).save(&png).unwrap();
        set_mtime(&png, at(10));
        create_test_file(root, "assets/b.wav", "RIFF", at(10));
        create_test_file(root, "shaders/s.glsl", "void main() {}", at(10));

        let converter = |name: &str| {
            let script = format!("#!/bin/sh\necho {} >> {}\ncp \"$1\" \"$2\"\n", name, log.display());
            write_script(root, name, &script)
        };
        let image_tool = converter("img");
        let ogg_tool = converter("ogg");
        let compiler = write_script(
            root,
            "compiler",
            &format!("#!/bin/sh\necho compiler >> {}\necho compiled > \"$3\"\n", log.display()),
        );

        let tools = ToolPaths {
            shader_compiler: Some(compiler),
            image: Some(format!("{} {{in}} {{out}}", image_tool.display())),
            ogg: Some(format!("{} {{in}} {{out}}", ogg_tool.display())),
            ..Default::default()
        };
        (temp, tools)
    }

    fn write_script(root: &Path, name: &str, body: &str) -> PathBuf {
        let path = create_test_file(root, &format!("tools/{}", name), body, at(0));
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn calls(root: &Path) -> Vec<String> {
        fs::read_to_string(root.join("calls.log"))
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    fn write_previous_manifest(root: &Path, json: &str) {
        create_test_file(root, "build/krom-resources/files.json", json, at(5));
    }

    #[test]
    fn test_end_to_end_with_fresh_shader() {
        let (temp, tools) = create_test_project();
        let root = temp.path();
        create_test_file(root, "build/krom/data/s.glsl", "compiled", at(20));

        let result = BuildPipeline::new(create_test_context(root, tools)).build().unwrap();
        assert_eq!(result.assets, 2);
        assert_eq!(result.shaders_reused, 1);
        assert_eq!(result.shaders_compiled, 0);

        assert_eq!(calls(root), vec!["img".to_string(), "ogg".to_string()]);
        assert!(root.join("build/krom/a.k").exists());
        assert!(root.join("build/krom/b.ogg").exists());

        let manifest = read_manifest(root);
        let names: Vec<&str> = manifest.files.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "s"]);

        let image = manifest.get("a").unwrap();
        assert_eq!(image.kind, "image");
        assert_eq!(image.files, vec!["a.k".to_string()]);
        assert_eq!((image.original_width, image.original_height), (Some(4), Some(2)));
        assert_eq!(manifest.get("b").unwrap().files, vec!["b.ogg".to_string()]);

        let shader = manifest.get("s").unwrap();
        assert_eq!(shader.kind, "shader");
        assert!(shader.files.is_empty());
    }

    #[test]
    fn test_second_run_is_idempotent() {
        let (temp, tools) = create_test_project();
        let root = temp.path();
        let manifest_path = root.join("build/krom-resources/files.json");

        let first = BuildPipeline::new(create_test_context(root, tools.clone())).build().unwrap();
        assert_eq!(first.shaders_compiled, 1);
        assert_eq!(calls(root), vec!["img".to_string(), "ogg".to_string(), "compiler".to_string()]);
        let first_manifest = fs::read(&manifest_path).unwrap();

        fs::remove_file(root.join("calls.log")).unwrap();
        let second = BuildPipeline::new(create_test_context(root, tools)).build().unwrap();
        assert_eq!(second.shaders_compiled, 0);
        assert_eq!(second.shaders_reused, 1);
        assert!(calls(root).is_empty());
        assert_eq!(fs::read(&manifest_path).unwrap(), first_manifest);

        let shader = read_manifest(root);
        assert_eq!(shader.get("s").unwrap().files, vec!["data/s.glsl".to_string()]);
    }

    #[test]
    fn test_fresh_shader_reuses_previous_entry() {
        let (temp, tools) = create_test_project();
        let root = temp.path();
        create_test_file(root, "build/krom/data/s.glsl", "compiled", at(20));
        write_previous_manifest(
            root,
            r#"{"files": [{"name": "s", "files": ["data/s.glsl", "data/s.extra"], "type": "shader"}]}"#,
        );

        BuildPipeline::new(create_test_context(root, tools)).build().unwrap();
        assert!(!calls(root).contains(&"compiler".to_string()));
        assert_eq!(
            read_manifest(root).get("s").unwrap().files,
            vec!["data/s.glsl".to_string(), "data/s.extra".to_string()]
        );
    }

    #[test]
    fn test_incomplete_previous_manifest_forces_recompile() {
        let (temp, tools) = create_test_project();
        let root = temp.path();
        create_test_file(root, "build/krom/data/s.glsl", "compiled", at(20));
        write_previous_manifest(root, r#"{"files": [{"name": "s", "files": [], "type": "shader"}]}"#);

        let result = BuildPipeline::new(create_test_context(root, tools)).build().unwrap();
        assert!(result.recompiled_all);
        assert_eq!(result.shaders_compiled, 1);
        assert!(calls(root).contains(&"compiler".to_string()));
        assert_eq!(read_manifest(root).get("s").unwrap().files, vec!["data/s.glsl".to_string()]);
    }

    #[test]
    fn test_tool_upgrade_invalidates_outputs() {
        let (temp, tools) = create_test_project();
        let root = temp.path();
        BuildPipeline::new(create_test_context(root, tools.clone())).build().unwrap();
        fs::remove_file(root.join("calls.log")).unwrap();

        let compiler = tools.shader_compiler.clone().unwrap();
        set_mtime(&compiler, SystemTime::now() + Duration::from_secs(60));
        BuildPipeline::new(create_test_context(root, tools)).build().unwrap();
        assert_eq!(calls(root), vec!["compiler".to_string()]);
    }

    #[test]
    fn test_missing_audio_encoder_is_fatal() {
        let (temp, mut tools) = create_test_project();
        let root = temp.path();
        tools.ogg = None;

        let err = BuildPipeline::new(create_test_context(root, tools)).build().unwrap_err();
        assert!(err.to_string().contains("b.wav"));
        assert!(!root.join("build/krom-resources/files.json").exists());
    }

    #[test]
    fn test_shader_failure_aborts_run() {
        let (temp, mut tools) = create_test_project();
        let root = temp.path();
        tools.shader_compiler = Some(write_script(root, "broken", "#!/bin/sh\necho 'error' >&2\nexit 2\n"));

        assert!(BuildPipeline::new(create_test_context(root, tools)).build().is_err());
        assert!(!root.join("build/krom-resources/files.json").exists());
        assert!(!root.join("build/krom/data/s.glsl").exists());
    }
}
