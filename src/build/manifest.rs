//! Resource manifest.
//!
//! The manifest lists every produced output under its normalised name and is
//! written to `<to>/<target>-resources/files.json`:
//!
//! ```json
//! {
//! 	"files": [
//! 		{
//! 			"name": "a",
//! 			"files": ["a.k"],
//! 			"type": "image",
//! 			"original_width": 64,
//! 			"original_height": 64
//! 		},
//! 		{
//! 			"name": "s",
//! 			"files": ["data/s.glsl"],
//! 			"type": "shader"
//! 		}
//! 	]
//! }
//! ```
//!
//! Entries are sorted by name so unchanged inputs give a byte-identical file.
//! The previous run's manifest is read back to supply the file lists of
//! shaders that were not recompiled.

use super::assets::{AssetKind, AssetRecord};
use super::naming::fix_name;
use super::shaders::{ShaderOutcome, ShaderRecord};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Manifest file name inside the resources directory.
pub const MANIFEST_FILENAME: &str = "files.json";

/// Entry type used for shaders.
pub const SHADER_TYPE: &str = "shader";

/// Error during manifest operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ManifestError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One output artifact in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    /// Output files relative to the target system directory
    #[serde(default, deserialize_with = "null_as_empty")]
    pub files: Vec<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readable: Option<bool>,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl ManifestEntry {
    fn plain(name: String, files: Vec<String>, kind: &str) -> Self {
        Self {
            name,
            files,
            kind: kind.to_string(),
            original_width: None,
            original_height: None,
            readable: None,
        }
    }

    pub fn is_shader(&self) -> bool {
        self.kind == SHADER_TYPE
    }
}

/// The serialised manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub files: Vec<ManifestEntry>,
}

impl Manifest {
    /// Load a manifest from a file.
    ///
    /// Returns `Ok(None)` if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Option<Self>, ManifestError> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    /// Load the previous run's manifest, treating any failure as "no prior state".
    pub fn load_previous(path: &Path) -> Option<Self> {
        match Self::load(path) {
            Ok(manifest) => manifest,
            Err(e) => {
                tracing::debug!("Ignoring previous manifest {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Whether a previous run left a shader without outputs.
    ///
    /// That only happens when the run was interrupted, so every shader has
    /// to be compiled again.
    pub fn needs_full_shader_recompile(&self) -> bool {
        self.files.iter().any(|entry| entry.is_shader() && entry.files.is_empty())
    }

    /// Shader entry for a logical name (compared after normalisation).
    pub fn find_shader(&self, name: &str) -> Option<&ManifestEntry> {
        let fixed = fix_name(name);
        self.files.iter().find(|entry| entry.is_shader() && entry.name == fixed)
    }

    pub fn get(&self, name: &str) -> Option<&ManifestEntry> {
        self.files.iter().find(|entry| entry.name == name)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Serialise as tab-indented JSON.
    pub fn to_json(&self) -> Result<String, ManifestError> {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        self.serialize(&mut serializer)?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    /// Write the manifest, creating the parent directory.
    pub fn save(&self, path: &Path) -> Result<(), ManifestError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

/// Primary outputs of embedded records, one per line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbedList {
    pub files: Vec<String>,
}

impl EmbedList {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn contents(&self) -> String {
        self.files.iter().map(|f| format!("{}\n", f)).collect()
    }

    /// Write the list. Nothing is written for an empty list.
    pub fn save(&self, path: &Path) -> Result<(), ManifestError> {
        if self.is_empty() {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.contents())?;
        Ok(())
    }
}

/// Merges asset and shader records into the manifest and embed list.
#[derive(Debug, Clone, Default)]
pub struct ManifestBuilder {
    previous: Option<Manifest>,
}

impl ManifestBuilder {
    pub fn new(previous: Option<Manifest>) -> Self {
        Self { previous }
    }

    pub fn previous(&self) -> Option<&Manifest> {
        self.previous.as_ref()
    }

    /// Whether the shader stage must ignore timestamps.
    pub fn recompile_all_shaders(&self) -> bool {
        self.previous.as_ref().is_some_and(Manifest::needs_full_shader_recompile)
    }

    /// Concrete files for a shader record.
    ///
    /// Fresh shaders inherit the previous entry of the same normalised name,
    /// or nothing if there is none.
    pub fn resolve_shader(&self, shader: &ShaderRecord) -> Vec<String> {
        match &shader.outcome {
            ShaderOutcome::Compiled(files) => files.clone(),
            ShaderOutcome::Fresh => self
                .previous
                .as_ref()
                .and_then(|m| m.find_shader(&shader.name))
                .map(|entry| entry.files.clone())
                .unwrap_or_default(),
        }
    }

    /// Build the sorted manifest and the embed list.
    ///
    /// When two records normalise to the same name the first one wins.
    pub fn build(&self, assets: &[AssetRecord], shaders: &[ShaderRecord]) -> (Manifest, EmbedList) {
        let asset_entries = assets.iter().map(|asset| {
            let mut entry = ManifestEntry::plain(fix_name(&asset.name), asset.files.clone(), asset.kind.as_str());
            if asset.kind == AssetKind::Image {
                entry.original_width = asset.image_width;
                entry.original_height = asset.image_height;
                entry.readable = asset.readable.then_some(true);
            }
            (entry, asset.embed)
        });
        let shader_entries = shaders.iter().map(|shader| {
            let entry = ManifestEntry::plain(fix_name(&shader.name), self.resolve_shader(shader), SHADER_TYPE);
            (entry, shader.embed)
        });

        let mut seen = HashSet::new();
        let mut files = Vec::new();
        let mut embed = EmbedList::default();
        for (entry, embedded) in asset_entries.chain(shader_entries) {
            if !seen.insert(entry.name.clone()) {
                tracing::warn!("Duplicate asset name {}, keeping the first one", entry.name);
                continue;
            }
            if embedded {
                match entry.files.first() {
                    Some(primary) => embed.files.push(primary.clone()),
                    None => tracing::warn!("Cannot embed {}: it has no output files", entry.name),
                }
            }
            files.push(entry);
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        (Manifest { files }, embed)
    }
}
