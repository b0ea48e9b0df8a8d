//! Per-type asset converters.
//!
//! Every method receives the source file and its destination relative to the
//! target system directory (without the converter's own extension) and
//! returns the files it produced, relative to the system directory. An empty
//! list means the conversion was not possible; whether that is fatal is up to
//! the caller.

use super::context::BuildContext;
use super::staleness::{self, Freshness, StalenessError};
use super::tool::{self, CommandTemplate, ToolError};
use crate::config::{NamingOptions, ToolPaths};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Error during asset conversion.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConversionError {
    /// A required conversion produced no output
    #[error("{kind} file {} could not be exported, you have to specify a path to {hint}.", path.display())]
    NoOutput { kind: &'static str, path: PathBuf, hint: &'static str },
    /// IO error while copying or preparing directories
    #[error("Failed to export {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Built-in image conversion failed
    #[error("Failed to convert image {}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error(transparent)]
    Staleness(#[from] StalenessError),
    #[error(transparent)]
    Tool(#[from] ToolError),
}

/// Converter contract for one target platform.
pub trait Exporter {
    fn copy_image(
        &self,
        from: &Path,
        to: &str,
        options: &NamingOptions,
    ) -> Result<Vec<String>, ConversionError>;

    fn copy_sound(
        &self,
        from: &Path,
        to: &str,
        options: &NamingOptions,
    ) -> Result<Vec<String>, ConversionError>;

    fn copy_font(
        &self,
        from: &Path,
        to: &str,
        options: &NamingOptions,
    ) -> Result<Vec<String>, ConversionError>;

    fn copy_video(
        &self,
        from: &Path,
        to: &str,
        options: &NamingOptions,
    ) -> Result<Vec<String>, ConversionError>;

    /// Copy a file verbatim.
    fn copy_blob(&self, from: &Path, to: &str) -> Result<Vec<String>, ConversionError>;
}

/// Exporter writing into `<to>/<target>` using the discovered tools.
#[derive(Debug, Clone)]
pub struct PlatformExporter {
    system_dir: PathBuf,
    tools: ToolPaths,
}

impl PlatformExporter {
    pub fn new(system_dir: PathBuf, tools: ToolPaths) -> Self {
        Self { system_dir, tools }
    }

    pub fn from_context(ctx: &BuildContext) -> Self {
        Self::new(ctx.system_dir(), ctx.tools().clone())
    }

    fn output(&self, relative: &str) -> Result<PathBuf, ConversionError> {
        let path = self.system_dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| ConversionError::Io { path: parent.to_path_buf(), source })?;
        }
        Ok(path)
    }

    /// Copy `from` to `to` unless the copy is already fresh.
    fn copy_file(&self, from: &Path, to: &str) -> Result<(), ConversionError> {
        let dest = self.output(to)?;
        if staleness::check_files(from, &dest, None, false)? == Freshness::Fresh {
            tracing::debug!("{} is up to date", to);
            return Ok(());
        }
        fs::copy(from, &dest).map_err(|source| ConversionError::Io { path: from.to_path_buf(), source })?;
        Ok(())
    }

    /// Run an encoder template unless its output is fresh.
    ///
    /// Returns whether the output exists afterwards. A missing or failing
    /// encoder is reported as a warning.
    fn encode(
        &self,
        template: Option<&str>,
        from: &Path,
        to: &str,
    ) -> Result<bool, ConversionError> {
        let dest = self.output(to)?;
        let template = template.map(CommandTemplate::parse).transpose()?;
        let tool_path = template.as_ref().and_then(CommandTemplate::program_path);

        let freshness = staleness::check_files(from, &dest, tool_path.as_deref(), false)?;
        if freshness == Freshness::Fresh {
            tracing::debug!("{} is up to date", to);
            return Ok(true);
        }
        let Some(template) = template else {
            return Ok(false);
        };

        match tool::run_committed(&template, from, &dest, &[]) {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!("Converting {} failed: {}", from.display(), e);
                Ok(false)
            }
        }
    }

    /// Re-encode an image as PNG with the `image` crate.
    fn reencode_image(&self, from: &Path, to: &str) -> Result<(), ConversionError> {
        let dest = self.output(to)?;
        if staleness::check_files(from, &dest, None, false)? == Freshness::Fresh {
            return Ok(());
        }
        let img = image::open(from)
            .map_err(|source| ConversionError::Image { path: from.to_path_buf(), source })?;
        let temp = tool::temp_path(&dest);
        if let Err(source) = img.save_with_format(&temp, image::ImageFormat::Png) {
            let _ = fs::remove_file(&temp);
            return Err(ConversionError::Image { path: from.to_path_buf(), source });
        }
        tool::commit(&temp, &dest).map_err(|source| ConversionError::Io { path: dest, source })
    }
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension().is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

impl Exporter for PlatformExporter {
    fn copy_image(
        &self,
        from: &Path,
        to: &str,
        _options: &NamingOptions,
    ) -> Result<Vec<String>, ConversionError> {
        if let Some(image_tool) = self.tools.image.as_deref() {
            let out = format!("{}.k", to);
            return Ok(if self.encode(Some(image_tool), from, &out)? { vec![out] } else { vec![] });
        }
        let out = format!("{}.png", to);
        self.reencode_image(from, &out)?;
        Ok(vec![out])
    }

    fn copy_sound(
        &self,
        from: &Path,
        to: &str,
        options: &NamingOptions,
    ) -> Result<Vec<String>, ConversionError> {
        let lossless = options.quality() >= 1.0;
        if lossless && has_extension(from, "wav") {
            let out = format!("{}.wav", to);
            self.copy_file(from, &out)?;
            return Ok(vec![out]);
        }
        if lossless && has_extension(from, "ogg") {
            let out = format!("{}.ogg", to);
            self.copy_file(from, &out)?;
            return Ok(vec![out]);
        }
        let out = format!("{}.ogg", to);
        Ok(if self.encode(self.tools.ogg.as_deref(), from, &out)? { vec![out] } else { vec![] })
    }

    fn copy_font(
        &self,
        from: &Path,
        to: &str,
        _options: &NamingOptions,
    ) -> Result<Vec<String>, ConversionError> {
        self.copy_blob(from, to)
    }

    fn copy_video(
        &self,
        from: &Path,
        to: &str,
        _options: &NamingOptions,
    ) -> Result<Vec<String>, ConversionError> {
        let out = format!("{}.webm", to);
        Ok(if self.encode(self.tools.webm.as_deref(), from, &out)? { vec![out] } else { vec![] })
    }

    fn copy_blob(&self, from: &Path, to: &str) -> Result<Vec<String>, ConversionError> {
        self.copy_file(from, to)?;
        Ok(vec![to.to_string()])
    }
}
