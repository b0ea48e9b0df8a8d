//! assetbake - Incremental asset and shader build pipeline
//!
//! This library provides functionality to:
//! - Load a project description from `project.toml` or a typed builder
//! - Discover assets and shaders with glob-like matcher patterns
//! - Convert them with external tools, skipping up-to-date outputs
//! - Write a deterministic resource manifest and embed list

pub mod build;
pub mod cli;
pub mod config;
