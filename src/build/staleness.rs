//! Timestamp-based staleness checks.
//!
//! An output is fresh only when it exists and is strictly newer than both
//! its source and, when a tool binary produced it, that binary. Upgrading a
//! tool therefore invalidates everything it produced.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Why an output has to be regenerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    /// Regeneration was requested for every item
    Forced,
    /// The output does not exist yet
    OutputMissing,
    /// The source is at least as new as the output
    SourceNewer,
    /// The producing tool is at least as new as the output
    ToolNewer,
}

impl std::fmt::Display for StaleReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StaleReason::Forced => write!(f, "forced"),
            StaleReason::OutputMissing => write!(f, "output missing"),
            StaleReason::SourceNewer => write!(f, "source changed"),
            StaleReason::ToolNewer => write!(f, "tool changed"),
        }
    }
}

/// Result of a staleness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale(StaleReason),
}

impl Freshness {
    pub fn is_stale(&self) -> bool {
        matches!(self, Freshness::Stale(_))
    }
}

/// Error during a staleness check.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StalenessError {
    /// The source file cannot be inspected
    #[error("Source file not readable: {}: {source}", path.display())]
    Source {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Classify an output from the modification times involved.
pub fn check(
    source: SystemTime,
    output: Option<SystemTime>,
    tool: Option<SystemTime>,
    force_all: bool,
) -> Freshness {
    if force_all {
        return Freshness::Stale(StaleReason::Forced);
    }
    let Some(output) = output else {
        return Freshness::Stale(StaleReason::OutputMissing);
    };
    if output <= source {
        return Freshness::Stale(StaleReason::SourceNewer);
    }
    if tool.is_some_and(|tool| output <= tool) {
        return Freshness::Stale(StaleReason::ToolNewer);
    }
    Freshness::Fresh
}

/// Whether an output has to be regenerated.
pub fn is_stale(
    source: SystemTime,
    output: Option<SystemTime>,
    tool: Option<SystemTime>,
    force_all: bool,
) -> bool {
    check(source, output, tool, force_all).is_stale()
}

/// Check an output file against its source and optional producing tool.
///
/// A missing source is an error. A missing output or tool just means no
/// timestamp for it.
pub fn check_files(
    source: &Path,
    output: &Path,
    tool: Option<&Path>,
    force_all: bool,
) -> Result<Freshness, StalenessError> {
    let source_time = fs::metadata(source)
        .and_then(|m| m.modified())
        .map_err(|e| StalenessError::Source { path: source.to_path_buf(), source: e })?;
    Ok(check(source_time, modified(output), tool.and_then(modified), force_all))
}

/// Modification time of a path, if it exists.
pub fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}
