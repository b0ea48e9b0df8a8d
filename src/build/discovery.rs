//! Source file discovery for the build system.
//!
//! Translates the glob-like matcher patterns into anchored regular
//! expressions and walks the directory tree below the literal prefix of
//! each pattern.
//!
//! # Pattern grammar
//!
//! - `**` matches across directory boundaries (`**/` may match nothing)
//! - `*` matches any run of characters except `/`
//! - `?` matches a single character
//! - `\x` matches `x` literally
//!
//! Everything else matches itself, case-sensitively.

use regex::Regex;
use std::fs;
use std::path::{self, Path, PathBuf};

/// Error during source discovery.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DiscoveryError {
    /// Invalid pattern
    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    /// IO error during file enumeration
    #[error("Cannot read directory {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A compiled matcher pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    /// Compile a pattern.
    pub fn new(pattern: &str) -> Result<Self, DiscoveryError> {
        let regex = Regex::new(&translate(pattern)).map_err(|source| {
            DiscoveryError::InvalidPattern { pattern: pattern.to_string(), source }
        })?;
        Ok(Self { source: pattern.to_string(), regex })
    }

    /// Test a forward-slash separated relative path against the pattern.
    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// The original pattern text.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// Translate a pattern into an anchored regular expression.
pub fn translate(pattern: &str) -> String {
    let mut regex = String::from("^(?:");
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    regex.push_str(&regex::escape(&escaped.to_string()));
                }
            }
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                if chars.peek() == Some(&'/') {
                    chars.next();
                    regex.push_str("(?:.*/)?");
                } else {
                    regex.push_str(".*");
                }
            }
            '*' => regex.push_str("[^/]*"),
            '?' => regex.push('.'),
            _ => regex.push_str(&regex::escape(&c.to_string())),
        }
    }

    regex.push_str(")$");
    regex
}

/// Split an absolute matcher pattern into the directory to search and the
/// pattern relative to it.
///
/// The base is the longest run of leading segments without wildcards. A
/// pattern without any wildcard names a single file in its parent directory.
pub fn split_pattern(pattern: &str) -> (PathBuf, String) {
    let segments: Vec<&str> = pattern.split('/').collect();
    let first_glob = segments
        .iter()
        .position(|s| has_wildcard(s))
        .unwrap_or(segments.len().saturating_sub(1));

    let base = segments[..first_glob].iter().map(|s| unescape(s)).collect::<Vec<_>>().join("/");
    let rest = segments[first_glob..].join("/");

    let base = if base.is_empty() && pattern.starts_with('/') {
        PathBuf::from("/")
    } else if base.is_empty() {
        PathBuf::from(".")
    } else {
        PathBuf::from(base)
    };
    (base, rest)
}

fn has_wildcard(segment: &str) -> bool {
    let mut chars = segment.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '*' | '?' => return true,
            _ => {}
        }
    }
    false
}

fn unescape(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut chars = segment.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Discover every file matching a matcher pattern.
///
/// A relative pattern is resolved against the current directory, so the
/// returned paths are always absolute.
pub fn discover(pattern: &str) -> Result<Vec<PathBuf>, DiscoveryError> {
    let (base, relative) = split_pattern(pattern);
    let base =
        path::absolute(&base).map_err(|source| DiscoveryError::Io { path: base.clone(), source })?;
    let pattern = Pattern::new(&relative)?;
    search_files(&base, &pattern)
}

/// Recursively collect the regular files below `base` whose base-relative
/// path matches `pattern`.
///
/// Entries are visited in file-name order. Directories starting with `.` are
/// not descended into.
pub fn search_files(base: &Path, pattern: &Pattern) -> Result<Vec<PathBuf>, DiscoveryError> {
    let mut files = Vec::new();
    search_dir(base, base, pattern, &mut files)?;
    Ok(files)
}

fn search_dir(
    base: &Path,
    current: &Path,
    pattern: &Pattern,
    files: &mut Vec<PathBuf>,
) -> Result<(), DiscoveryError> {
    let io_err = |source| DiscoveryError::Io { path: current.to_path_buf(), source };

    let mut entries = fs::read_dir(current)
        .map_err(io_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_err)?;
    entries.sort_by_key(|e| e.file_name());

    let mut subdirs = Vec::new();
    for entry in entries {
        let path = entry.path();
        if path.is_dir() {
            if !entry.file_name().to_string_lossy().starts_with('.') {
                subdirs.push(path);
            }
            continue;
        }

        let relative = path.strip_prefix(base).unwrap_or(&path);
        let relative = relative.to_string_lossy().replace('\\', "/");
        if pattern.matches(&relative) {
            files.push(path);
        }
    }

    for dir in subdirs {
        search_dir(base, &dir, pattern, files)?;
    }
    Ok(())
}
