//! Logical names and output destinations for source files.
//!
//! Both are computed from the matcher's [`NamingOptions`] templates, which
//! accept `{name}`, `{ext}` and `{dir}` placeholders.

use crate::config::NamingOptions;
use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR_STR};

/// Components of a source path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPath {
    /// Containing directory
    pub dir: PathBuf,
    /// File name without the last extension
    pub name: String,
    /// Last extension including the leading dot, or empty
    pub ext: String,
}

impl ParsedPath {
    pub fn parse(path: &Path) -> Self {
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let name = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        let ext = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        Self { dir, name, ext }
    }

    /// File name including the extension.
    pub fn base(&self) -> String {
        format!("{}{}", self.name, self.ext)
    }
}

/// Logical name and destination resolved for one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportInfo {
    /// Registry name, before manifest normalisation
    pub name: String,
    /// Output path relative to the target system directory, without the
    /// converter-specific extension
    pub destination: String,
}

/// Resolve the export info of a source file.
///
/// `keep_extension` is set for pass-through conversions so the source
/// extension survives in both the destination and the name.
pub fn resolve(
    parsed: &ParsedPath,
    keep_extension: bool,
    options: &NamingOptions,
    project_root: &Path,
) -> ExportInfo {
    let mut name = parsed.name.clone();
    let mut destination = parsed.name.clone();

    let destination_has_ext = options.destination.as_deref().is_some_and(|d| d.contains("{ext}"));
    if (keep_extension || options.noprocessing) && !destination_has_ext {
        destination.push_str(&parsed.ext);
    }
    if let Some(template) = &options.destination {
        destination = replace_pattern(template, &destination, parsed, options, project_root);
    }

    let name_has_ext = options.name.as_deref().is_some_and(|n| n.contains("{ext}"));
    if keep_extension && !name_has_ext {
        name.push_str(&parsed.ext);
    }
    if let Some(template) = &options.name {
        name = replace_pattern(template, &name, parsed, options, project_root);
    }

    ExportInfo { name, destination }
}

/// Substitute the placeholders of one template.
///
/// An empty `{dir}` swallows the slash that follows it; a non-empty one
/// ends with the separator unless the template already supplies a slash.
pub fn replace_pattern(
    template: &str,
    value: &str,
    parsed: &ParsedPath,
    options: &NamingOptions,
    project_root: &Path,
) -> String {
    let base = match &options.name_base_dir {
        Some(dir) => project_root.join(dir),
        None => project_root.to_path_buf(),
    };
    let separator = options.name_path_separator.as_deref().unwrap_or(MAIN_SEPARATOR_STR);
    let relative = relative_path(&base, &parsed.dir).unwrap_or_else(|| {
        tracing::warn!(
            "{} is not comparable with {}, ignoring {{dir}}",
            parsed.dir.display(),
            base.display()
        );
        PathBuf::new()
    });
    let dir = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(separator);

    let substituted = template.replace("{name}", value).replace("{ext}", &parsed.ext);
    if dir.is_empty() {
        substituted.replace("{dir}/", "").replace("{dir}", "")
    } else {
        substituted.replace("{dir}/", &format!("{}/", dir)).replace("{dir}", &(dir + separator))
    }
}

/// Path of `target` relative to `base`, using `..` where needed.
///
/// Both paths must be anchored the same way: absolute on the same root, or
/// both relative. Mixed input has no relative form and yields `None`.
pub fn relative_path(base: &Path, target: &Path) -> Option<PathBuf> {
    if anchor(base) != anchor(target) {
        return None;
    }
    let base: Vec<Component> = base.components().filter(|c| *c != Component::CurDir).collect();
    let target: Vec<Component> = target.components().filter(|c| *c != Component::CurDir).collect();
    let common = base.iter().zip(&target).take_while(|(a, b)| a == b).count();

    let mut out = PathBuf::new();
    for _ in common..base.len() {
        out.push("..");
    }
    for component in &target[common..] {
        out.push(component.as_os_str());
    }
    Some(out)
}

fn anchor(path: &Path) -> Vec<Component<'_>> {
    path.components()
        .take_while(|c| matches!(c, Component::Prefix(_) | Component::RootDir))
        .collect()
}

/// Normalise a name for the manifest.
///
/// Replaces `-`, `@`, space, `.`, `/` and `\` with `_` and prefixes a
/// leading digit with `_`.
pub fn fix_name(name: &str) -> String {
    let fixed: String = name
        .chars()
        .map(|c| match c {
            '-' | '@' | ' ' | '.' | '/' | '\\' => '_',
            c => c,
        })
        .collect();
    if fixed.starts_with(|c: char| c.is_ascii_digit()) {
        format!("_{}", fixed)
    } else {
        fixed
    }
}

/// Replace path separators so a name can be used as a single file name.
pub fn safe_name(name: &str) -> String {
    name.replace(['/', '\\'], "_")
}
