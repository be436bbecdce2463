//! Content Loader
//!
//! Reads the scripts, unit files, key material and package list that get
//! embedded into the plan. Everything is read up front; the first missing
//! source aborts with [`PlanError::InputUnavailable`] before any assembly.

use crate::error::{PlanError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Source file locations, relative to a sources root unless absolute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SourcePaths {
    pub migrate_script: PathBuf,
    pub firewall_script: PathBuf,
    pub tailscale_setup_script: PathBuf,
    pub first_boot_script: PathBuf,
    pub first_boot_service: PathBuf,
    pub tailscale_apt_key: PathBuf,
    pub packages: PathBuf,
}

impl SourcePaths {
    /// Default layout for a profile directory (`autoinstall`, `iso`) beside
    /// a shared `common` directory.
    pub fn for_profile_dir(profile_dir: &str) -> Self {
        Self {
            migrate_script: Path::new(profile_dir).join("migrate-to-btrfs.sh"),
            ..Self::default()
        }
    }

    /// Resolve every relative path against `root`.
    pub fn rooted_at(&self, root: &Path) -> Self {
        let join = |p: &PathBuf| if p.is_absolute() { p.clone() } else { root.join(p) };
        Self {
            migrate_script: join(&self.migrate_script),
            firewall_script: join(&self.firewall_script),
            tailscale_setup_script: join(&self.tailscale_setup_script),
            first_boot_script: join(&self.first_boot_script),
            first_boot_service: join(&self.first_boot_service),
            tailscale_apt_key: join(&self.tailscale_apt_key),
            packages: join(&self.packages),
        }
    }
}

impl Default for SourcePaths {
    fn default() -> Self {
        Self {
            migrate_script: PathBuf::from("iso/migrate-to-btrfs.sh"),
            firewall_script: PathBuf::from("common/setup-firewall.sh"),
            tailscale_setup_script: PathBuf::from("common/setup-tailscale.sh"),
            first_boot_script: PathBuf::from("common/tailscale-first-boot.sh"),
            first_boot_service: PathBuf::from("common/tailscale-first-boot.service"),
            tailscale_apt_key: PathBuf::from("../ansible/roles/tailscale/files/apt.gpg"),
            packages: PathBuf::from("common/packages.txt"),
        }
    }
}

/// Loaded source content. Immutable once read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanSources {
    pub migrate_script: String,
    /// Only read when the firewall step is enabled
    pub firewall_script: Option<String>,
    pub tailscale_setup_script: String,
    pub first_boot_script: String,
    pub first_boot_service: String,
    pub tailscale_apt_key: Vec<u8>,
    pub packages: String,
}

impl PlanSources {
    /// Read all sources. `with_firewall` controls whether the firewall
    /// script is required.
    pub fn load(paths: &SourcePaths, with_firewall: bool) -> Result<Self> {
        let firewall_script = if with_firewall {
            Some(read_text("setup-firewall.sh", &paths.firewall_script)?)
        } else {
            None
        };

        Ok(Self {
            migrate_script: read_text("migrate-to-btrfs.sh", &paths.migrate_script)?,
            firewall_script,
            tailscale_setup_script: read_text("setup-tailscale.sh", &paths.tailscale_setup_script)?,
            first_boot_script: read_text("tailscale-first-boot.sh", &paths.first_boot_script)?,
            first_boot_service: read_text(
                "tailscale-first-boot.service",
                &paths.first_boot_service,
            )?,
            tailscale_apt_key: read_binary("tailscale-apt.gpg", &paths.tailscale_apt_key)?,
            packages: read_text("packages.txt", &paths.packages)?,
        })
    }
}

fn read_text(name: &str, path: &Path) -> Result<String> {
    debug!("Reading {} from {}", name, path.display());
    fs::read_to_string(path).map_err(|e| PlanError::input_unavailable(name, path, e))
}

fn read_binary(name: &str, path: &Path) -> Result<Vec<u8>> {
    debug!("Reading {} from {}", name, path.display());
    fs::read(path).map_err(|e| PlanError::input_unavailable(name, path, e))
}
