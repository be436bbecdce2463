use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// autoinstall-gen - Generate Ubuntu autoinstall user-data
#[derive(Parser, Debug)]
#[command(name = "autoinstall-gen")]
#[command(about = "Generates cloud-config user-data for unattended Ubuntu installs")]
#[command(version)]
pub struct Cli {
    /// Output file (stdout when omitted)
    pub output: Option<PathBuf>,

    /// Target architecture: amd64 or arm64 (default: amd64)
    pub arch: Option<String>,

    /// Deployment preset the plan starts from
    #[arg(short, long, value_enum, default_value_t = ProfileArg::Iso)]
    pub profile: ProfileArg,

    /// JSON plan configuration; replaces the preset
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory holding the profile and `common` source directories
    #[arg(short, long, default_value = ".")]
    pub sources: PathBuf,

    /// Output encoding; overrides the configuration
    #[arg(long, value_enum)]
    pub style: Option<StyleArg>,

    /// Fail instead of renaming a heredoc marker found inside a payload
    #[arg(long)]
    pub strict_markers: bool,

    /// Save the effective configuration as JSON and exit
    #[arg(long)]
    pub save_config: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProfileArg {
    /// Network autoinstall with interactive identity
    Autoinstall,
    /// Unattended install media
    Iso,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StyleArg {
    /// Single-line JSON
    Compact,
    /// Block YAML
    Indented,
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as clap::Parser>::parse()
    }
}
