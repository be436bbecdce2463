//! Late-command sequencing.
//!
//! Produces the installer's `late-commands` list in two phases: every file
//! is written first (phase 1), then scripts run and units are enabled
//! (phase 2). Within each phase the order is fixed:
//!
//! | Phase | Step                                              |
//! |-------|---------------------------------------------------|
//! | 1     | migration script                                  |
//! | 1     | firewall script (when enabled)                    |
//! | 1     | bundled `.deb` copies from the install media      |
//! | 1     | tailscale apt key (base64)                        |
//! | 1     | tailscale setup script                            |
//! | 1     | first-boot unit                                   |
//! | 1     | first-boot script + `chmod +x`                    |
//! | 2     | run migration, firewall, tailscale setup          |
//! | 2     | enable first-boot unit, then extra services       |

use crate::config_file::CommandOptions;
use crate::embed::{EmbeddedFile, Embedder, Embedding, FileAction};
use crate::error::{PlanError, Result};
use crate::sources::PlanSources;
use tracing::debug;

/// Directory on the install media holding bundled packages.
pub const MEDIA_EXTRAS_DIR: &str = "/cdrom/pool/extras";

pub const MIGRATE_DEST: &str = "/tmp/migrate-to-btrfs.sh";
pub const FIREWALL_DEST: &str = "/tmp/setup-firewall.sh";
pub const APT_KEY_DEST: &str = "/tmp/tailscale-apt.gpg";
pub const TAILSCALE_SETUP_DEST: &str = "/tmp/setup-tailscale.sh";
pub const FIRST_BOOT_SERVICE_DEST: &str = "/etc/systemd/system/tailscale-first-boot.service";
pub const FIRST_BOOT_SCRIPT_DEST: &str = "/usr/local/bin/tailscale-first-boot";

/// Build the complete `late-commands` list.
pub fn build_late_commands(
    embedder: &Embedder,
    options: &CommandOptions,
    sources: &PlanSources,
) -> Result<Vec<String>> {
    let root = embedder.target_root();

    let migrate = embedder.embed(
        &EmbeddedFile::text(MIGRATE_DEST, &sources.migrate_script, "EOFMIGRATE")
            .then(FileAction::Run),
    )?;

    let firewall = match (options.firewall, sources.firewall_script.as_deref()) {
        (true, Some(script)) => Some(embedder.embed(
            &EmbeddedFile::text(FIREWALL_DEST, script, "EOFFIREWALL").then(FileAction::Run),
        )?),
        (true, None) => {
            return Err(PlanError::config(
                "Firewall step enabled but no firewall script was loaded",
            ));
        }
        (false, _) => None,
    };

    let apt_key = embedder.embed(&EmbeddedFile::binary(
        APT_KEY_DEST,
        &sources.tailscale_apt_key,
        "EOFGPG",
    ))?;

    let tailscale = embedder.embed(
        &EmbeddedFile::text(TAILSCALE_SETUP_DEST, &sources.tailscale_setup_script, "EOFTAILSCALE")
            .then(FileAction::Run),
    )?;

    let service = embedder.embed(
        &EmbeddedFile::text(FIRST_BOOT_SERVICE_DEST, &sources.first_boot_service, "EOFTSSERVICE")
            .then(FileAction::EnableService),
    )?;

    let first_boot = embedder.embed(
        &EmbeddedFile::text(FIRST_BOOT_SCRIPT_DEST, &sources.first_boot_script, "EOFTSBOOT")
            .executable(),
    )?;

    let mut commands = Vec::new();

    // Phase 1: materialize
    commands.extend(migrate.materialize.iter().cloned());
    if let Some(firewall) = &firewall {
        commands.extend(firewall.materialize.iter().cloned());
    }
    for deb in &options.bundled_debs {
        commands.push(format!(
            "cp {}/{} {}/tmp/{} || true",
            MEDIA_EXTRAS_DIR, deb, root, deb
        ));
    }
    for embedding in [&apt_key, &tailscale, &service, &first_boot] {
        commands.extend(embedding.materialize.iter().cloned());
    }

    // Phase 2: execute
    let mut run_order: Vec<&Embedding> = vec![&migrate];
    run_order.extend(firewall.as_ref());
    run_order.extend([&tailscale, &service, &first_boot]);
    for embedding in run_order {
        commands.extend(embedding.follow_up.iter().cloned());
    }
    for unit in &options.enable_services {
        commands.push(embedder.in_target(&format!("systemctl enable {}", unit)));
    }

    debug!("Built {} late-commands", commands.len());
    Ok(commands)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CollisionPolicy;

    fn sources() -> PlanSources {
        PlanSources {
            migrate_script: "#!/bin/bash\nmigrate\n".to_string(),
            firewall_script: Some("ufw enable\n".to_string()),
            tailscale_setup_script: "apt install tailscale\n".to_string(),
            first_boot_script: "#!/bin/bash\ntailscale up\n".to_string(),
            first_boot_service: "[Unit]\nDescription=ts\n".to_string(),
            tailscale_apt_key: vec![1, 2, 3],
            packages: "vim\n".to_string(),
        }
    }

    fn options(firewall: bool, explicit_target: bool) -> CommandOptions {
        CommandOptions {
            firewall,
            bundled_debs: Vec::new(),
            explicit_target,
            enable_services: vec!["ssh".to_string()],
        }
    }

    fn build(options: &CommandOptions, sources: &PlanSources) -> Result<Vec<String>> {
        let embedder = Embedder::new("/target", options.explicit_target, CollisionPolicy::Rotate);
        build_late_commands(&embedder, options, sources)
    }

    #[test]
    fn test_full_sequence_with_firewall() {
        let commands = build(&options(true, true), &sources()).unwrap();
        let heads: Vec<&str> = commands
            .iter()
            .map(|c| c.lines().next().unwrap_or(""))
            .collect();

        assert_eq!(
            heads,
            vec![
                "cat > /target/tmp/migrate-to-btrfs.sh << 'EOFMIGRATE'",
                "cat > /target/tmp/setup-firewall.sh << 'EOFFIREWALL'",
                "base64 -d > /target/tmp/tailscale-apt.gpg << 'EOFGPG'",
                "cat > /target/tmp/setup-tailscale.sh << 'EOFTAILSCALE'",
                "cat > /target/etc/systemd/system/tailscale-first-boot.service << 'EOFTSSERVICE'",
                "cat > /target/usr/local/bin/tailscale-first-boot << 'EOFTSBOOT'",
                "chmod +x /target/usr/local/bin/tailscale-first-boot",
                "curtin in-target --target=/target -- bash /tmp/migrate-to-btrfs.sh",
                "curtin in-target --target=/target -- bash /tmp/setup-firewall.sh",
                "curtin in-target --target=/target -- bash /tmp/setup-tailscale.sh",
                "curtin in-target --target=/target -- systemctl enable tailscale-first-boot.service",
                "curtin in-target --target=/target -- systemctl enable ssh",
            ]
        );
    }

    #[test]
    fn test_without_firewall_and_with_bundled_deb() {
        let mut opts = options(false, false);
        opts.bundled_debs = vec!["tailscale.deb".to_string()];
        let commands = build(&opts, &sources()).unwrap();

        assert!(!commands.iter().any(|c| c.contains("firewall")));
        assert_eq!(
            commands[1],
            "cp /cdrom/pool/extras/tailscale.deb /target/tmp/tailscale.deb || true"
        );
        assert_eq!(
            commands.last().map(String::as_str),
            Some("curtin in-target -- systemctl enable ssh")
        );
    }

    #[test]
    fn test_every_write_precedes_every_execution() {
        let commands = build(&options(true, true), &sources()).unwrap();
        let last_write = commands
            .iter()
            .rposition(|c| !c.starts_with("curtin in-target"))
            .unwrap();
        let first_exec = commands
            .iter()
            .position(|c| c.starts_with("curtin in-target"))
            .unwrap();
        assert!(last_write < first_exec);
    }

    #[test]
    fn test_firewall_enabled_without_script_fails() {
        let mut src = sources();
        src.firewall_script = None;
        let err = build(&options(true, true), &src).unwrap_err();
        assert!(matches!(err, PlanError::Config(_)));
    }

    #[test]
    fn test_marker_collision_in_script_rotates() {
        let mut src = sources();
        src.migrate_script = "echo start\nEOFMIGRATE\necho end\n".to_string();
        let commands = build(&options(false, true), &src).unwrap();
        assert!(commands[0].starts_with("cat > /target/tmp/migrate-to-btrfs.sh << 'EOFMIGRATE_1'\n"));
        assert!(commands[0].ends_with("\nEOFMIGRATE_1"));
    }
}
