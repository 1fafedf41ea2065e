//! Gantry Core - Core library for build orchestration
//!
//! This crate provides the foundational types, error handling, configuration,
//! and the workspace/module model consumed by the resolver and the invoker.

pub mod config;
pub mod error;
pub mod types;
pub mod workspace;

pub use config::{find_config, load_config, load_config_or_default, GantryConfig};
pub use error::{ConfigError, GantryError, Result, WorkspaceError};
pub use types::{BuildMode, TestScope};
pub use workspace::{ArtifactTasks, Module, ModuleId, ModuleKind, VariantModel, Workspace};
