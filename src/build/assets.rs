//! Asset discovery and per-type dispatch.

use super::context::BuildContext;
use super::discovery::{self, DiscoveryError};
use super::exporter::{ConversionError, Exporter};
use super::naming::{self, ParsedPath};
use crate::config::{AssetMatcher, NamingOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Asset category, decided by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Image,
    Sound,
    Font,
    Video,
    Blob,
}

impl AssetKind {
    /// Classify a path by its (case-insensitive) extension.
    pub fn from_path(path: &Path) -> Self {
        let ext = path.extension().map(|e| e.to_string_lossy().to_lowercase()).unwrap_or_default();
        match ext.as_str() {
            "png" | "jpg" | "jpeg" | "hdr" => AssetKind::Image,
            "ogg" | "mp3" | "flac" | "wav" => AssetKind::Sound,
            "ttf" | "ttc" | "otf" => AssetKind::Font,
            "mp4" | "webm" | "mov" | "wmv" | "avi" => AssetKind::Video,
            _ => AssetKind::Blob,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Image => "image",
            AssetKind::Sound => "sound",
            AssetKind::Font => "font",
            AssetKind::Video => "video",
            AssetKind::Blob => "blob",
        }
    }

    /// Blobs keep their source extension in name and destination.
    pub fn keeps_extension(&self) -> bool {
        matches!(self, AssetKind::Blob)
    }
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One exported asset.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetRecord {
    /// Logical name, before manifest normalisation
    pub name: String,
    pub source: PathBuf,
    pub kind: AssetKind,
    /// Produced files relative to the system directory
    pub files: Vec<String>,
    pub embed: bool,
    /// Source image dimensions (images only)
    pub image_width: Option<u32>,
    pub image_height: Option<u32>,
    /// Keep pixel data CPU-readable (images only)
    pub readable: bool,
}

/// Error in the asset stage.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AssetError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

/// Exports every asset matched by the project's asset matchers.
pub struct AssetPipeline<'a, E: Exporter> {
    ctx: &'a BuildContext,
    exporter: &'a E,
}

impl<'a, E: Exporter> AssetPipeline<'a, E> {
    pub fn new(ctx: &'a BuildContext, exporter: &'a E) -> Self {
        Self { ctx, exporter }
    }

    /// Run all matchers in declaration order.
    pub fn run(&self) -> Result<Vec<AssetRecord>, AssetError> {
        let mut records = Vec::new();
        for matcher in &self.ctx.project().asset_matchers {
            records.extend(self.export_matcher(matcher)?);
        }
        Ok(records)
    }

    /// Export the files of one matcher sequentially.
    pub fn export_matcher(&self, matcher: &AssetMatcher) -> Result<Vec<AssetRecord>, AssetError> {
        let files = discovery::discover(&matcher.pattern)?;
        let mut records = Vec::with_capacity(files.len());
        for (index, file) in files.iter().enumerate() {
            let parsed = ParsedPath::parse(file);
            tracing::info!("Exporting asset {} of {} ({}).", index + 1, files.len(), parsed.base());
            records.push(self.export_asset(file, &parsed, &matcher.options)?);
        }
        Ok(records)
    }

    /// Export a single file.
    ///
    /// Zero outputs abort the run for images and sounds; for videos they are
    /// only reported.
    pub fn export_asset(
        &self,
        file: &Path,
        parsed: &ParsedPath,
        options: &NamingOptions,
    ) -> Result<AssetRecord, AssetError> {
        let kind = AssetKind::from_path(file);
        let info = naming::resolve(parsed, kind.keeps_extension(), options, self.ctx.project_root());
        let exporter = self.exporter;

        let files = match kind {
            _ if options.noprocessing => exporter.copy_blob(file, &info.destination)?,
            AssetKind::Image => exporter.copy_image(file, &info.destination, options)?,
            AssetKind::Sound => exporter.copy_sound(file, &info.destination, options)?,
            AssetKind::Font => {
                let dest = format!("{}{}", info.destination, parsed.ext);
                exporter.copy_font(file, &dest, options)?
            }
            AssetKind::Video => exporter.copy_video(file, &info.destination, options)?,
            AssetKind::Blob => exporter.copy_blob(file, &info.destination)?,
        };

        if files.is_empty() {
            match kind {
                AssetKind::Image => {
                    return Err(ConversionError::NoOutput {
                        kind: "Image",
                        path: file.to_path_buf(),
                        hint: "the image converter",
                    }
                    .into())
                }
                AssetKind::Sound => {
                    return Err(ConversionError::NoOutput {
                        kind: "Audio",
                        path: file.to_path_buf(),
                        hint: "ffmpeg",
                    }
                    .into())
                }
                AssetKind::Video => tracing::warn!(
                    "Video file {} could not be exported, you have to specify a path to ffmpeg.",
                    file.display()
                ),
                _ => {}
            }
        }

        let (image_width, image_height) = match kind {
            AssetKind::Image => match image::image_dimensions(file) {
                Ok((w, h)) => (Some(w), Some(h)),
                Err(_) => (None, None),
            },
            _ => (None, None),
        };

        Ok(AssetRecord {
            name: info.name,
            source: file.to_path_buf(),
            kind,
            files,
            embed: options.embed,
            image_width,
            image_height,
            readable: kind == AssetKind::Image && options.readable,
        })
    }
}
