//! Configuration module for the asset pipeline
//!
//! Provides the `project.toml` schema, the project builder and loader, and
//! external tool discovery.

pub mod loader;
pub mod schema;
pub mod tools;

pub use loader::{load_project, ConfigError, ProjectBuilder, PROJECT_FILENAME};
pub use schema::*;
pub use tools::{HostPlatform, ToolPaths};
