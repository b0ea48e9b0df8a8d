//! Incremental asset and shader build pipeline
//!
//! Turns the raw assets and shader sources of a project into a target
//! directory plus a deterministic resource manifest.
//!
//! # Overview
//!
//! The build pipeline consists of:
//! - **Discovery**: Find source files using the matcher patterns
//! - **Naming**: Compute logical names and output destinations
//! - **Staleness**: Skip outputs newer than their source and producing tool
//! - **Conversion**: Run per-type converters and the shader compiler
//! - **Manifest**: Merge, sort and write `files.json` and the embed list
//!
//! # Example
//!
//! ```ignore
//! use assetbake::build::{BuildContext, BuildPipeline};
//! use assetbake::config::{load_project, BuildOptions};
//!
//! let options = BuildOptions::default();
//! let project = load_project(&options.from)?;
//! let pipeline = BuildPipeline::new(BuildContext::new(project, options)?);
//!
//! let result = pipeline.build()?;
//! println!("{}", result.summary());
//! ```

pub mod assets;
pub mod compiler;
pub mod context;
pub mod discovery;
pub mod exporter;
pub mod manifest;
pub mod naming;
pub mod pipeline;
pub mod result;
pub mod shaders;
pub mod staleness;
pub mod tool;

pub use assets::*;
pub use compiler::*;
pub use context::*;
pub use discovery::*;
pub use exporter::*;
pub use manifest::*;
pub use naming::*;
pub use pipeline::*;
pub use result::*;
pub use shaders::*;
pub use staleness::*;
pub use tool::*;
