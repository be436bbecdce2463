//! Type-safe configuration types for plan generation
//!
//! Every value with a textual form on the command line or in a configuration
//! file is a proper Rust enum, so the builder can match exhaustively instead of
//! comparing strings.

use crate::error::{PlanError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{Display, EnumIter, EnumString};

/// Target CPU architecture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Arch {
    #[default]
    Amd64,
    Arm64,
}

impl Arch {
    /// Parse an architecture tag, rejecting anything outside the fixed set.
    pub fn from_tag(tag: &str) -> Result<Self> {
        Self::from_str(tag).map_err(|_| PlanError::ArchitectureUnresolved(tag.to_string()))
    }

    /// Resolve an optional tag. Absence selects `amd64`; an unknown tag is an error.
    pub fn resolve(tag: Option<&str>) -> Result<Self> {
        match tag {
            Some(tag) => Self::from_tag(tag),
            None => Ok(Self::default()),
        }
    }
}

/// Deployment target a configuration preset is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum DeploymentProfile {
    /// Network-served autoinstall: interactive identity, simple layout
    Autoinstall,
    /// Unattended install media: fixed identity, disk matching, firewall
    #[default]
    Iso,
}

/// Whole-layout storage variant. Variants are never mixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum LayoutVariant {
    /// `layout: {name: custom}` on the first disk
    Simple,
    /// Storage v2 config with match-based disk selection and typed partitions
    #[default]
    Matched,
}

impl LayoutVariant {
    /// Staging policy used when the configuration does not name one
    pub fn default_staging(&self) -> StagingPolicy {
        match self {
            Self::Simple => StagingPolicy::Filesystem,
            Self::Matched => StagingPolicy::SwapTyped,
        }
    }
}

/// How the staging partition is declared to the installer.
///
/// Both policies format it ext4 and mount it at `/` during installation; the
/// migration script moves the system to btrfs and repurposes the partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum StagingPolicy {
    /// Plain Linux filesystem partition named `staging`
    Filesystem,
    /// Partition named `swap` with the swap GPT type, converted after install
    SwapTyped,
}

/// Output encoding of the document tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RenderStyle {
    /// Single-line JSON (valid YAML)
    #[default]
    Compact,
    /// Block-style YAML, two-space indentation
    Indented,
}

/// What the embedder does when a heredoc marker appears in the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CollisionPolicy {
    /// Try suffixed alternatives of the preferred marker
    #[default]
    Rotate,
    /// Fail on the first collision
    Reject,
}

/// Filesystem written by a `format` storage node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Filesystem {
    /// FAT32 filesystem for EFI System Partition
    Fat32,
    Ext4,
}
