//! Plan configuration: every fixed value the builder needs, loaded from JSON
//! or taken from a deployment preset.
//!
//! Nothing here is process-wide: the builder receives a `PlanConfig` and
//! reads only from it, so plans for different deployments can be built side
//! by side in tests.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::embed::is_safe_path;
use crate::error::{PlanError, Result};
use crate::sources::SourcePaths;
use crate::types::{CollisionPolicy, DeploymentProfile, LayoutVariant, RenderStyle, StagingPolicy};

/// yescrypt hash baked into the install-media preset.
const ISO_PASSWORD_HASH: &str =
    "$y$j9T$C9MpXNEcjdAu20JYDtSNy.$XbgglEtgFBA5s5/k865cGsPGOVG1Cdrk.OGZzH5fDKC";

/// Log capture run by the installer when an install step fails.
const DEFAULT_ERROR_COMMAND: &str =
    "journalctl -b --no-pager > /var/log/installer/error-journal.log || true";

/// Identity section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IdentityConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    pub username: String,
    /// Crypted password (`$id$salt$hash`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// SSH server section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SshConfig {
    pub install_server: bool,
    pub allow_pw: bool,
}

/// cloud-init user-data passed through to the installed system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UserDataConfig {
    pub disable_root: bool,
    pub package_update: bool,
    pub package_upgrade: bool,
}

/// Which optional late-commands are generated and how they invoke curtin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CommandOptions {
    /// Embed and run the firewall setup script
    pub firewall: bool,
    /// `.deb` files copied from `/cdrom/pool/extras` into the target's `/tmp`
    #[serde(default)]
    pub bundled_debs: Vec<String>,
    /// Pass `--target=<root>` to `curtin in-target`
    pub explicit_target: bool,
    /// Extra units enabled after the first-boot service
    #[serde(default)]
    pub enable_services: Vec<String>,
}

/// Installation plan configuration that can be saved/loaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PlanConfig {
    pub profile: DeploymentProfile,

    // Locale & Time
    pub locale: String,
    pub timezone: String,
    pub keyboard_layout: String,

    // Identity & access
    pub identity: IdentityConfig,
    pub ssh: SshConfig,
    /// Sections the installer still asks about interactively
    pub interactive_sections: Vec<String>,

    // Installer source
    pub source_id: Option<String>,

    // Storage
    pub layout: LayoutVariant,
    /// `None` takes the layout's default
    pub staging: Option<StagingPolicy>,

    // Commands
    /// Mount point of the installed system while late-commands run
    pub target_root: String,
    pub commands: CommandOptions,
    pub error_commands: Vec<String>,
    pub user_data: UserDataConfig,

    // Output
    pub markers: CollisionPolicy,
    pub style: RenderStyle,
    pub sources: SourcePaths,
}

impl PlanConfig {
    /// Create the preset for a deployment target
    pub fn for_profile(profile: DeploymentProfile) -> Self {
        let common = Self {
            profile,
            locale: "en_US.UTF-8".to_string(),
            timezone: "Etc/UTC".to_string(),
            keyboard_layout: "us".to_string(),
            identity: IdentityConfig {
                hostname: None,
                username: "ubuntu".to_string(),
                password: None,
            },
            ssh: SshConfig {
                install_server: true,
                allow_pw: false,
            },
            interactive_sections: Vec::new(),
            source_id: None,
            layout: LayoutVariant::Matched,
            staging: None,
            target_root: "/target".to_string(),
            commands: CommandOptions {
                firewall: false,
                bundled_debs: Vec::new(),
                explicit_target: true,
                enable_services: vec!["ssh".to_string()],
            },
            error_commands: vec![DEFAULT_ERROR_COMMAND.to_string()],
            user_data: UserDataConfig {
                disable_root: true,
                package_update: true,
                package_upgrade: true,
            },
            markers: CollisionPolicy::Rotate,
            style: RenderStyle::Compact,
            sources: SourcePaths::default(),
        };

        match profile {
            DeploymentProfile::Autoinstall => Self {
                interactive_sections: vec![
                    "network".to_string(),
                    "identity".to_string(),
                    "ssh".to_string(),
                ],
                layout: LayoutVariant::Simple,
                commands: CommandOptions {
                    bundled_debs: vec!["tailscale.deb".to_string()],
                    explicit_target: false,
                    ..common.commands.clone()
                },
                sources: SourcePaths::for_profile_dir("autoinstall"),
                ..common
            },
            DeploymentProfile::Iso => Self {
                identity: IdentityConfig {
                    hostname: Some("bes-server".to_string()),
                    username: "ubuntu".to_string(),
                    password: Some(ISO_PASSWORD_HASH.to_string()),
                },
                source_id: Some("ubuntu-server-minimal".to_string()),
                commands: CommandOptions {
                    firewall: true,
                    ..common.commands.clone()
                },
                sources: SourcePaths::for_profile_dir("iso"),
                ..common
            },
        }
    }

    /// Staging policy after applying the layout default
    pub fn staging_policy(&self) -> StagingPolicy {
        self.staging.unwrap_or_else(|| self.layout.default_staging())
    }

    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json)?;
        Ok(())
    }

    /// Load configuration from a JSON file. Missing fields take the
    /// install-media preset's values.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| PlanError::input_unavailable("plan configuration", path, e))?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("locale", &self.locale),
            ("timezone", &self.timezone),
            ("keyboard-layout", &self.keyboard_layout),
        ] {
            if value.trim().is_empty() {
                return Err(PlanError::config(format!("{} must be specified", field)));
            }
            if value.contains(char::is_whitespace) {
                return Err(PlanError::config(format!("{} cannot contain whitespace", field)));
            }
        }

        validate_username(&self.identity.username)?;
        if let Some(hostname) = &self.identity.hostname {
            validate_hostname(hostname)?;
        }
        if let Some(password) = &self.identity.password {
            if !password.starts_with('$') || password.contains(char::is_whitespace) {
                return Err(PlanError::config(
                    "Password must be a crypt(3) hash such as $y$... or $6$...",
                ));
            }
        }

        // Without an interactive identity section the installer has no way
        // to ask for the missing values
        let interactive_identity = self.interactive_sections.iter().any(|s| s == "identity");
        if !interactive_identity
            && (self.identity.hostname.is_none() || self.identity.password.is_none())
        {
            return Err(PlanError::config(
                "Hostname and password are required unless identity is interactive",
            ));
        }

        if self.interactive_sections.iter().any(|s| s.trim().is_empty()) {
            return Err(PlanError::config("Interactive sections cannot be empty strings"));
        }

        if !is_safe_path(self.target_root.trim_end_matches('/')) {
            return Err(PlanError::config(format!(
                "Target root '{}' must be an absolute path of [A-Za-z0-9/._+@-] other than /",
                self.target_root
            )));
        }

        for deb in &self.commands.bundled_debs {
            if !deb.ends_with(".deb") || !is_shell_word(deb) {
                return Err(PlanError::config(format!("Invalid bundled package '{}'", deb)));
            }
        }
        for unit in &self.commands.enable_services {
            if !is_shell_word(unit) {
                return Err(PlanError::config(format!("Invalid service name '{}'", unit)));
            }
        }
        if self.error_commands.iter().any(|c| c.trim().is_empty()) {
            return Err(PlanError::config("Error commands cannot be empty"));
        }

        Ok(())
    }
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self::for_profile(DeploymentProfile::default())
    }
}

/// Linux account name: lowercase letter or `_` first, then `[a-z0-9_-]`, max 32.
fn validate_username(username: &str) -> Result<()> {
    if username.is_empty() || username.len() > 32 {
        return Err(PlanError::config("Username must be 1-32 characters long"));
    }
    if !username.starts_with(|c: char| c.is_ascii_lowercase() || c == '_') {
        return Err(PlanError::config("Username must start with a lowercase letter"));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
    {
        return Err(PlanError::config(
            "Username can only contain lowercase letters, digits, '_' and '-'",
        ));
    }
    Ok(())
}

/// RFC 1123 host label.
fn validate_hostname(hostname: &str) -> Result<()> {
    if hostname.is_empty() || hostname.len() > 63 {
        return Err(PlanError::config("Hostname must be 1-63 characters long"));
    }
    if hostname.starts_with('-') || hostname.ends_with('-') {
        return Err(PlanError::config("Hostname cannot start or end with '-'"));
    }
    if !hostname.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(PlanError::config(
            "Hostname can only contain letters, numbers, and '-'",
        ));
    }
    Ok(())
}

fn is_shell_word(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '+' | '@'))
}
