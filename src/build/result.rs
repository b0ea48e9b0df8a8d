//! Build result types.
//!
//! Summarises what a pipeline run did.

use super::assets::{AssetKind, AssetRecord};
use super::shaders::{ShaderOutcome, ShaderRecord};
use std::path::PathBuf;
use std::time::Duration;

/// Result of a complete build run.
#[derive(Debug, Default, Clone)]
pub struct BuildResult {
    /// Assets exported (including up-to-date ones)
    pub assets: usize,
    /// Shaders compiled or copied in this run
    pub shaders_compiled: usize,
    /// Shaders reused from the previous run
    pub shaders_reused: usize,
    /// Entries in the written manifest
    pub manifest_entries: usize,
    /// Entries in the embed list
    pub embedded: usize,
    /// Whether every shader was recompiled because of an interrupted previous run
    pub recompiled_all: bool,
    /// Whether the downstream compiler ran
    pub compiled_code: bool,
    /// Path of the written manifest
    pub manifest_path: Option<PathBuf>,
    /// Warning messages
    pub warnings: Vec<String>,
    /// Total build duration
    pub total_duration: Duration,
}

impl BuildResult {
    /// Create a new empty build result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count the records of one run.
    pub fn from_records(assets: &[AssetRecord], shaders: &[ShaderRecord]) -> Self {
        let mut result = Self::new();
        result.assets = assets.len();
        for shader in shaders {
            match shader.outcome {
                ShaderOutcome::Fresh => result.shaders_reused += 1,
                ShaderOutcome::Compiled(_) => result.shaders_compiled += 1,
            }
        }
        for asset in assets.iter().filter(|a| a.files.is_empty()) {
            if asset.kind == AssetKind::Video {
                result.add_warning(format!("Video file {} could not be exported", asset.source.display()));
            }
        }
        result
    }

    /// Set the total duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.total_duration = duration;
        self
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    /// Shaders processed in total.
    pub fn shaders_total(&self) -> usize {
        self.shaders_compiled + self.shaders_reused
    }

    /// Format a summary of the build result.
    pub fn summary(&self) -> String {
        let mut lines = vec![format!(
            "Build succeeded: {} assets, {} shaders ({} compiled, {} up to date), {} manifest entries in {:?}",
            self.assets,
            self.shaders_total(),
            self.shaders_compiled,
            self.shaders_reused,
            self.manifest_entries,
            self.total_duration
        )];
        if self.recompiled_all {
            lines.push("All shaders were recompiled after an incomplete previous build".to_string());
        }
        if self.embedded > 0 {
            lines.push(format!("{} files embedded", self.embedded));
        }

        if !self.warnings.is_empty() {
            lines.push(format!("Warnings ({}): ", self.warnings.len()));
            for warning in self.warnings.iter().take(5) {
                lines.push(format!("  - {}", warning));
            }
            if self.warnings.len() > 5 {
                lines.push(format!("  ... and {} more", self.warnings.len() - 5));
            }
        }

        lines.join("\n")
    }
}
