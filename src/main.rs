//! autoinstall-gen - Main entry point
//!
//! Loads configuration and sources, builds the plan, renders it completely,
//! and only then writes it out. Any failure exits non-zero with nothing
//! written.

use anyhow::{Context, Result};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use autoinstall::{
    Arch, CollisionPolicy, DeploymentProfile, PlanConfig, PlanSources, RenderStyle, build_plan,
    write_plan,
};

use autoinstall::cli::{Cli, ProfileArg, StyleArg};

/// Log to stderr; stdout carries the rendered plan.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_logging(cli.verbose);
    debug!("CLI arguments parsed: {:?}", cli);

    let arch = Arch::resolve(cli.arch.as_deref())?;
    info!("Target architecture: {}", arch);

    let mut config = match &cli.config {
        Some(path) => PlanConfig::load_from_file(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?,
        None => PlanConfig::for_profile(profile(cli.profile)),
    };
    if let Some(style) = cli.style {
        config.style = match style {
            StyleArg::Compact => RenderStyle::Compact,
            StyleArg::Indented => RenderStyle::Indented,
        };
    }
    if cli.strict_markers {
        config.markers = CollisionPolicy::Reject;
    }

    if let Some(path) = &cli.save_config {
        config.validate().context("Configuration is invalid")?;
        config
            .save_to_file(path)
            .with_context(|| format!("Failed to save configuration to {}", path.display()))?;
        eprintln!("Saved configuration to {}", path.display());
        return Ok(());
    }

    let paths = config.sources.rooted_at(&cli.sources);
    let sources = PlanSources::load(&paths, config.commands.firewall)
        .context("Failed to load plan sources")?;

    let plan = build_plan(&config, arch, &sources).context("Failed to build plan")?;
    let text = plan.render(config.style);

    write_plan(&text, cli.output.as_deref(), arch).context("Failed to write plan")?;
    Ok(())
}

fn profile(arg: ProfileArg) -> DeploymentProfile {
    match arg {
        ProfileArg::Autoinstall => DeploymentProfile::Autoinstall,
        ProfileArg::Iso => DeploymentProfile::Iso,
    }
}
