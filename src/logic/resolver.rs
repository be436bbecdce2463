//! Architecture Resolver
//!
//! Translates an architecture tag into the concrete values that differ
//! between `amd64` and `arm64` plans: the filtered package list and the root
//! partition's GPT type.
//!
//! # Design
//!
//! - **Pure logic**: No I/O, no side effects, resolved once per build
//! - **Order-preserving**: Packages keep their source order; nothing is sorted
//!   or deduplicated, so the plan mirrors the package file
//! - **Explicit**: Each architecture names the packages it drops
//!
//! # Resolution Rules
//!
//! | Architecture | Dropped packages                  | Root partition type |
//! |--------------|-----------------------------------|---------------------|
//! | `amd64`      | `grub-efi-arm64`                  | x86-64 root         |
//! | `arm64`      | `grub-efi-amd64`, `grub-pc`       | AArch64 root        |

use crate::types::Arch;
use tracing::debug;

/// GPT partition type GUIDs used by the storage layout.
pub mod partition_types {
    /// EFI System Partition
    pub const EFI: &str = "c12a7328-f81f-11d2-ba4b-00a0c93ec93b";
    /// Extended Boot Loader Partition (`/boot`)
    pub const XBOOTLDR: &str = "bc13c2ff-59e6-4262-a352-b275fd6f7172";
    /// Linux swap
    pub const SWAP: &str = "0657fd6d-a4ab-43c4-84e5-0933c84b4f4f";
    /// Generic Linux filesystem data
    pub const LINUX_FILESYSTEM: &str = "0fc63daf-8483-4772-8e79-3d69d8477de4";
    /// Linux root (x86-64)
    pub const ROOT_AMD64: &str = "4f68bce3-e8cd-4db1-96e7-fbcaf984b709";
    /// Linux root (64-bit ARM)
    pub const ROOT_ARM64: &str = "b921b045-1df0-41c3-af44-4c6f280d3fae";
}

/// Boot-loader packages that only install on one architecture.
pub mod arch_only_packages {
    pub const ARM64_ONLY: &[&str] = &["grub-efi-arm64"];
    pub const AMD64_ONLY: &[&str] = &["grub-efi-amd64", "grub-pc"];
}

/// Packages that must not appear in a plan for `arch`.
pub fn excluded_packages(arch: Arch) -> &'static [&'static str] {
    match arch {
        Arch::Amd64 => arch_only_packages::ARM64_ONLY,
        Arch::Arm64 => arch_only_packages::AMD64_ONLY,
    }
}

/// GPT type of the root partition for `arch`.
pub fn root_partition_type(arch: Arch) -> &'static str {
    match arch {
        Arch::Amd64 => partition_types::ROOT_AMD64,
        Arch::Arm64 => partition_types::ROOT_ARM64,
    }
}

/// Resolve the package list for `arch` from the package file content.
///
/// # What This Explicitly Refuses To Do
///
/// - Validate package names: apt reports unknown packages at install time
/// - Deduplicate or sort: the file's order is the plan's order
pub fn resolve_packages(content: &str, arch: Arch) -> Vec<String> {
    let excluded = excluded_packages(arch);
    let packages: Vec<String> = parse_package_list(content)
        .into_iter()
        .filter(|name| !excluded.contains(&name.as_str()))
        .collect();

    debug!("Resolved {} packages for {}", packages.len(), arch);
    packages
}

/// Parse a newline-delimited package file.
///
/// Lines are trimmed; blank lines and lines starting with `#` are skipped.
pub fn parse_package_list(content: &str) -> Vec<String> {
    content
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
