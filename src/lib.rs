//! Autoinstall plan generator library
//!
//! Builds the cloud-config user-data an Ubuntu autoinstall run consumes:
//! storage layout, package selection, identity, and late-commands that embed
//! provisioning scripts as heredocs. The binary in `main.rs` is a thin layer
//! over [`build_plan`] and [`write_plan`].

pub mod cli;
pub mod config_file;
pub mod document;
pub mod embed;
pub mod engine;
pub mod error;
pub mod logic;
pub mod output;
pub mod plan;
pub mod sources;
pub mod types;

// Re-export main types for convenience
pub use config_file::{CommandOptions, IdentityConfig, PlanConfig, SshConfig, UserDataConfig};
pub use document::{Mapping, Value};
pub use embed::{EmbeddedFile, Embedder, Embedding, FileAction, Payload};
pub use error::{PlanError, Result};
pub use output::write_plan;
pub use plan::{InstallPlan, build_plan};
pub use sources::{PlanSources, SourcePaths};
pub use types::{
    Arch, CollisionPolicy, DeploymentProfile, Filesystem, LayoutVariant, RenderStyle,
    StagingPolicy,
};

// Storage engine
pub use engine::render::{render, render_document};
pub use engine::storage::{StorageLayout, StorageNode, calculate_storage_layout};

// Architecture resolver
pub use logic::resolver::{resolve_packages, root_partition_type};
