//! Storage Layout Engine
//!
//! Translates a [`LayoutVariant`] + [`StagingPolicy`] into the ordered list of
//! curtin storage nodes (`disk`, `partition`, `format`, `mount`) that the
//! installer applies to the target disk.
//!
//! # Supported Variants
//!
//! | Variant   | Nodes Generated |
//! |-----------|-----------------|
//! | Simple    | Disk → Partition(efi, boot, staging, root) → Format(efi, boot, staging) → Mount |
//! | Matched   | Disk(match largest, SSD first) → typed Partitions(efi, xboot, staging, root) → Format → Mount |
//!
//! The root partition is created but neither formatted nor mounted: the
//! system is installed onto the staging partition and moved to a btrfs root
//! by the migration late-command.
//!
//! # Design
//!
//! - **Pure logic**: No I/O, no side effects, only generates the layout
//! - **Whole variants**: Each variant is built by one function; nodes from
//!   different variants are never combined
//! - **Validated**: Every `device`/`volume` reference must name a node of the
//!   expected kind defined earlier in the list

use crate::document::{Mapping, Value};
use crate::error::{PlanError, Result};
use crate::logic::resolver::{partition_types, root_partition_type};
use crate::types::{Arch, Filesystem, LayoutVariant, StagingPolicy};
use std::collections::HashSet;
use std::fmt;

// ============================================================================
// Storage Node Types
// ============================================================================

/// Node discriminator, in dependency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NodeKind {
    Disk,
    Partition,
    Format,
    Mount,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disk => "disk",
            Self::Partition => "partition",
            Self::Format => "format",
            Self::Mount => "mount",
        };
        f.write_str(name)
    }
}

/// Partition size: a fixed amount or the rest of the disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionSize {
    /// e.g. `512M`, `4G`
    Fixed(String),
    /// Rendered as `-1`
    Remaining,
}

/// One disk-selection rule; the installer takes the first rule that matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskMatch {
    pub size: String,
    pub ssd: Option<bool>,
}

/// Wipe/preserve settings applied to a node in the matched layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WipePolicy {
    pub wipe: String,
    pub preserve: bool,
}

/// A single storage node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageNode {
    Disk {
        id: String,
        ptable: String,
        wipe: Option<WipePolicy>,
        matches: Vec<DiskMatch>,
        grub_device: bool,
    },
    Partition {
        id: String,
        device: String,
        size: PartitionSize,
        flag: Option<String>,
        partition_name: Option<String>,
        partition_type: Option<String>,
        grub_device: bool,
        wipe: Option<WipePolicy>,
    },
    Format {
        id: String,
        volume: String,
        fstype: Filesystem,
    },
    Mount {
        id: String,
        device: String,
        path: String,
    },
}

impl StorageNode {
    pub fn id(&self) -> &str {
        match self {
            Self::Disk { id, .. }
            | Self::Partition { id, .. }
            | Self::Format { id, .. }
            | Self::Mount { id, .. } => id,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Disk { .. } => NodeKind::Disk,
            Self::Partition { .. } => NodeKind::Partition,
            Self::Format { .. } => NodeKind::Format,
            Self::Mount { .. } => NodeKind::Mount,
        }
    }

    /// The node this one depends on, with the kind it must have.
    pub fn reference(&self) -> Option<(&str, NodeKind)> {
        match self {
            Self::Disk { .. } => None,
            Self::Partition { device, .. } => Some((device, NodeKind::Disk)),
            Self::Format { volume, .. } => Some((volume, NodeKind::Partition)),
            Self::Mount { device, .. } => Some((device, NodeKind::Format)),
        }
    }

    /// Render as a curtin config entry.
    pub fn to_value(&self) -> Value {
        let map = Mapping::new().with("type", self.kind().to_string()).with("id", self.id());
        let map = match self {
            Self::Disk { ptable, wipe, matches, grub_device, .. } => {
                let map = with_wipe(map.with("ptable", ptable.as_str()), wipe.as_ref());
                let map = if matches.is_empty() {
                    map
                } else {
                    map.with("match", matches.iter().map(disk_match_value).collect::<Vec<_>>())
                };
                map.with_opt("grub_device", grub_device.then_some(true))
            }
            Self::Partition {
                device,
                size,
                flag,
                partition_name,
                partition_type,
                grub_device,
                wipe,
                ..
            } => {
                let size = match size {
                    PartitionSize::Fixed(s) => Value::from(s.as_str()),
                    PartitionSize::Remaining => Value::Int(-1),
                };
                let map = map
                    .with("device", device.as_str())
                    .with("size", size)
                    .with_opt("flag", flag.as_deref())
                    .with_opt("partition_name", partition_name.as_deref())
                    .with_opt("partition_type", partition_type.as_deref())
                    .with_opt("grub_device", grub_device.then_some(true));
                with_wipe(map, wipe.as_ref())
            }
            Self::Format { volume, fstype, .. } => map
                .with("volume", volume.as_str())
                .with("fstype", fstype.to_string()),
            Self::Mount { device, path, .. } => {
                map.with("device", device.as_str()).with("path", path.as_str())
            }
        };
        Value::Map(map)
    }
}

impl fmt::Display for StorageNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disk { id, ptable, .. } => write!(f, "Disk({}, {})", id, ptable),
            Self::Partition { id, device, size, .. } => {
                let size = match size {
                    PartitionSize::Fixed(s) => s.as_str(),
                    PartitionSize::Remaining => "rest",
                };
                write!(f, "Partition({} on {}, {})", id, device, size)
            }
            Self::Format { id, volume, fstype } => {
                write!(f, "Format({} on {}, fs={})", id, volume, fstype)
            }
            Self::Mount { id, device, path } => write!(f, "Mount({} -> {} at {})", id, device, path),
        }
    }
}

fn with_wipe(map: Mapping, wipe: Option<&WipePolicy>) -> Mapping {
    match wipe {
        Some(policy) => map
            .with("wipe", policy.wipe.as_str())
            .with("preserve", policy.preserve),
        None => map,
    }
}

fn disk_match_value(rule: &DiskMatch) -> Value {
    Value::Map(
        Mapping::new()
            .with("size", rule.size.as_str())
            .with_opt("ssd", rule.ssd),
    )
}

// ============================================================================
// Storage Layout
// ============================================================================

/// A validated, ordered storage layout.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    pub variant: LayoutVariant,
    pub staging: StagingPolicy,
    nodes: Vec<StorageNode>,
}

impl StorageLayout {
    /// Wrap nodes after checking that the list is self-consistent.
    pub fn from_nodes(
        variant: LayoutVariant,
        staging: StagingPolicy,
        nodes: Vec<StorageNode>,
    ) -> Result<Self> {
        validate_nodes(&nodes)?;
        Ok(Self { variant, staging, nodes })
    }

    pub fn nodes(&self) -> &[StorageNode] {
        &self.nodes
    }

    /// Render the `storage` section for this variant.
    pub fn to_value(&self) -> Value {
        let config: Vec<Value> = self.nodes.iter().map(StorageNode::to_value).collect();
        let storage = match self.variant {
            LayoutVariant::Simple => Mapping::new().with(
                "layout",
                Mapping::new().with("name", "custom").with("config", config),
            ),
            LayoutVariant::Matched => Mapping::new()
                .with("version", 2)
                .with("swap", Mapping::new().with("size", 0))
                .with("grub", Mapping::new().with("reorder_uefi", false))
                .with("config", config),
        };
        Value::Map(storage)
    }

    /// Returns a summary of the layout for logging.
    pub fn summary(&self) -> String {
        let mut lines = vec![
            format!("Storage Layout: {}", self.variant),
            format!("  Staging: {}", self.staging),
            format!("  Nodes ({}):", self.nodes.len()),
        ];
        for (i, node) in self.nodes.iter().enumerate() {
            lines.push(format!("    {}. {}", i + 1, node));
        }
        lines.join("\n")
    }
}

/// Check ids are unique, kinds appear in dependency order, every reference
/// resolves to an earlier node of the right kind, and mount paths are unique.
pub fn validate_nodes(nodes: &[StorageNode]) -> Result<()> {
    let mut defined: Vec<(&str, NodeKind)> = Vec::with_capacity(nodes.len());
    let mut mount_paths = HashSet::new();
    let mut last_kind = NodeKind::Disk;

    for (position, node) in nodes.iter().enumerate() {
        let id = node.id();
        if id.is_empty() {
            return Err(PlanError::invalid_layout(format!(
                "node {} ({}) has an empty id",
                position,
                node.kind()
            )));
        }
        if defined.iter().any(|(seen, _)| *seen == id) {
            return Err(PlanError::invalid_layout(format!("duplicate id '{}'", id)));
        }
        if node.kind() < last_kind {
            return Err(PlanError::invalid_layout(format!(
                "{} '{}' appears after a {} node",
                node.kind(),
                id,
                last_kind
            )));
        }

        if let Some((target, expected)) = node.reference() {
            match defined.iter().find(|(seen, _)| *seen == target) {
                Some((_, kind)) if *kind == expected => {}
                Some((_, kind)) => {
                    return Err(PlanError::invalid_layout(format!(
                        "{} '{}' references {} '{}', expected a {}",
                        node.kind(),
                        id,
                        kind,
                        target,
                        expected
                    )));
                }
                None => {
                    return Err(PlanError::invalid_layout(format!(
                        "{} '{}' references '{}' which is not defined earlier",
                        node.kind(),
                        id,
                        target
                    )));
                }
            }
        }

        if let StorageNode::Mount { path, .. } = node {
            if !mount_paths.insert(path.as_str()) {
                return Err(PlanError::invalid_layout(format!(
                    "mount path '{}' is used twice",
                    path
                )));
            }
        }

        defined.push((id, node.kind()));
        last_kind = node.kind();
    }

    Ok(())
}

// ============================================================================
// Layout Calculation
// ============================================================================

/// Build the layout for a variant.
///
/// # Errors
///
/// Returns [`PlanError::InvalidLayout`] only if a variant builder produced an
/// inconsistent node list, which is a defect in this module.
pub fn calculate_storage_layout(
    variant: LayoutVariant,
    staging: StagingPolicy,
    arch: Arch,
) -> Result<StorageLayout> {
    let nodes = match variant {
        LayoutVariant::Simple => simple_nodes(staging),
        LayoutVariant::Matched => matched_nodes(staging, arch),
    };
    StorageLayout::from_nodes(variant, staging, nodes)
}

/// Layout: first disk, untyped partitions.
///
/// ```text
/// disk0
/// ├── efi      512M  fat32  /boot/efi
/// ├── boot     1G    ext4   /boot
/// ├── staging  4G    ext4   /
/// └── root     rest  (migration target)
/// ```
fn simple_nodes(staging: StagingPolicy) -> Vec<StorageNode> {
    // Swap-typed staging is also named "swap", as in the matched layout
    let (staging_name, staging_type) = match staging {
        StagingPolicy::Filesystem => (None, None),
        StagingPolicy::SwapTyped => (Some("swap".to_string()), Some(partition_types::SWAP.to_string())),
    };

    let partition = |id: &str, size: PartitionSize, flag: Option<&str>| StorageNode::Partition {
        id: id.to_string(),
        device: "disk0".to_string(),
        size,
        flag: flag.map(str::to_string),
        partition_name: None,
        partition_type: None,
        grub_device: false,
        wipe: None,
    };
    let staging_partition = StorageNode::Partition {
        id: "staging".to_string(),
        device: "disk0".to_string(),
        size: PartitionSize::Fixed("4G".into()),
        flag: None,
        partition_name: staging_name,
        partition_type: staging_type,
        grub_device: false,
        wipe: None,
    };

    let mut nodes = vec![
        StorageNode::Disk {
            id: "disk0".to_string(),
            ptable: "gpt".to_string(),
            wipe: None,
            matches: Vec::new(),
            grub_device: true,
        },
        partition("efi", PartitionSize::Fixed("512M".into()), Some("boot")),
        partition("boot", PartitionSize::Fixed("1G".into()), None),
        staging_partition,
        partition("root", PartitionSize::Remaining, None),
    ];
    nodes.extend(formats_and_mounts("boot"));
    nodes
}

/// Layout: largest disk (SSD preferred), typed and wiped partitions.
///
/// ```text
/// disk0 (match: largest ssd, then largest)
/// ├── efi      512M  ESP        fat32  /boot/efi   grub device
/// ├── xboot    1G    XBOOTLDR   ext4   /boot
/// ├── staging  4G    swap|linux ext4   /
/// └── root     rest  arch root  (migration target)
/// ```
fn matched_nodes(staging: StagingPolicy, arch: Arch) -> Vec<StorageNode> {
    let wiped = || {
        Some(WipePolicy {
            wipe: "superblock".to_string(),
            preserve: false,
        })
    };
    let (staging_name, staging_type) = match staging {
        StagingPolicy::Filesystem => ("staging", partition_types::LINUX_FILESYSTEM),
        StagingPolicy::SwapTyped => ("swap", partition_types::SWAP),
    };

    let partition = |id: &str, size: PartitionSize, name: &str, ty: &str| StorageNode::Partition {
        id: id.to_string(),
        device: "disk0".to_string(),
        size,
        flag: None,
        partition_name: Some(name.to_string()),
        partition_type: Some(ty.to_string()),
        grub_device: false,
        wipe: wiped(),
    };

    let efi = StorageNode::Partition {
        id: "efi".to_string(),
        device: "disk0".to_string(),
        size: PartitionSize::Fixed("512M".to_string()),
        flag: Some("boot".to_string()),
        partition_name: Some("efi".to_string()),
        partition_type: Some(partition_types::EFI.to_string()),
        grub_device: true,
        wipe: wiped(),
    };

    let mut nodes = vec![
        StorageNode::Disk {
            id: "disk0".to_string(),
            ptable: "gpt".to_string(),
            wipe: Some(WipePolicy {
                wipe: "superblock-recursive".to_string(),
                preserve: false,
            }),
            matches: vec![
                DiskMatch {
                    size: "largest".to_string(),
                    ssd: Some(true),
                },
                DiskMatch {
                    size: "largest".to_string(),
                    ssd: None,
                },
            ],
            grub_device: false,
        },
        efi,
        partition("xboot", PartitionSize::Fixed("1G".into()), "boot", partition_types::XBOOTLDR),
        partition("staging", PartitionSize::Fixed("4G".into()), staging_name, staging_type),
        partition("root", PartitionSize::Remaining, "root", root_partition_type(arch)),
    ];
    nodes.extend(formats_and_mounts("xboot"));
    nodes
}

/// Format and mount nodes shared by both variants.
fn formats_and_mounts(boot_id: &str) -> Vec<StorageNode> {
    let format = |volume: &str, fstype: Filesystem| StorageNode::Format {
        id: format!("{}-fmt", volume),
        volume: volume.to_string(),
        fstype,
    };
    let mount = |volume: &str, path: &str| StorageNode::Mount {
        id: format!("{}-mnt", volume),
        device: format!("{}-fmt", volume),
        path: path.to_string(),
    };

    vec![
        format("efi", Filesystem::Fat32),
        format(boot_id, Filesystem::Ext4),
        format("staging", Filesystem::Ext4),
        mount("efi", "/boot/efi"),
        mount(boot_id, "/boot"),
        mount("staging", "/"),
    ]
}

// ============================================================================
// Tests
// ============================================================================
