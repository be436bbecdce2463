//! Plan Builder
//!
//! Composes configuration, loaded sources and the architecture into the one
//! document the installer reads. There is a single code path for every
//! deployment; differences between deployments live in [`PlanConfig`].
//!
//! # Top-level key order
//!
//! `version`, `interactive`, `source`, `locale`, `timezone`, `keyboard`,
//! `identity`, `ssh`, `storage`, `packages`, `user-data`, `late-commands`,
//! `error-commands`. Optional sections are left out rather than rendered as
//! `null`.

use crate::config_file::PlanConfig;
use crate::document::{Mapping, Value};
use crate::embed::Embedder;
use crate::engine::render::render_document;
use crate::engine::storage::{StorageLayout, calculate_storage_layout};
use crate::error::Result;
use crate::logic::late_commands::build_late_commands;
use crate::logic::resolver::resolve_packages;
use crate::sources::PlanSources;
use crate::types::{Arch, RenderStyle};
use tracing::info;

/// Autoinstall schema version emitted in every plan.
pub const AUTOINSTALL_VERSION: i64 = 1;

/// An assembled plan, ready to render.
#[derive(Debug, Clone)]
pub struct InstallPlan {
    pub arch: Arch,
    pub layout: StorageLayout,
    pub packages: Vec<String>,
    pub late_commands: Vec<String>,
    document: Value,
}

impl InstallPlan {
    /// The full document tree.
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Render with the marker line and trailing newline.
    pub fn render(&self, style: RenderStyle) -> String {
        render_document(&self.document, style)
    }
}

/// Validate `config` and assemble the plan for `arch`.
pub fn build_plan(config: &PlanConfig, arch: Arch, sources: &PlanSources) -> Result<InstallPlan> {
    config.validate()?;

    let packages = resolve_packages(&sources.packages, arch);
    let layout = calculate_storage_layout(config.layout, config.staging_policy(), arch)?;

    let embedder = Embedder::new(
        &config.target_root,
        config.commands.explicit_target,
        config.markers,
    );
    let late_commands = build_late_commands(&embedder, &config.commands, sources)?;

    let document = assemble(config, &layout, &packages, &late_commands);
    info!(
        "Assembled {} plan for {}: {} packages, {} storage nodes, {} late-commands",
        config.profile,
        arch,
        packages.len(),
        layout.nodes().len(),
        late_commands.len()
    );

    Ok(InstallPlan {
        arch,
        layout,
        packages,
        late_commands,
        document,
    })
}

fn assemble(
    config: &PlanConfig,
    layout: &StorageLayout,
    packages: &[String],
    late_commands: &[String],
) -> Value {
    let interactive = (!config.interactive_sections.is_empty())
        .then(|| Mapping::new().with("sections", config.interactive_sections.clone()));
    let source = config
        .source_id
        .as_ref()
        .map(|id| Mapping::new().with("id", id));

    let identity = Mapping::new()
        .with_opt("hostname", config.identity.hostname.as_ref())
        .with("username", &config.identity.username)
        .with_opt("password", config.identity.password.as_ref());

    let ssh = Mapping::new()
        .with("install-server", config.ssh.install_server)
        .with("allow-pw", config.ssh.allow_pw);

    let user_data = Mapping::new()
        .with("disable_root", config.user_data.disable_root)
        .with("package_update", config.user_data.package_update)
        .with("package_upgrade", config.user_data.package_upgrade);

    let plan = Mapping::new()
        .with("version", AUTOINSTALL_VERSION)
        .with_opt("interactive", interactive)
        .with_opt("source", source)
        .with("locale", &config.locale)
        .with("timezone", &config.timezone)
        .with("keyboard", Mapping::new().with("layout", &config.keyboard_layout))
        .with("identity", identity)
        .with("ssh", ssh)
        .with("storage", layout.to_value())
        .with("packages", packages.to_vec())
        .with("user-data", user_data)
        .with("late-commands", late_commands.to_vec())
        .with("error-commands", config.error_commands.clone());

    Value::Map(plan)
}
