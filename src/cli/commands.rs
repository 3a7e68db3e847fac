//! CLI command definitions using clap

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "kf",
    version,
    about = "Diagnose and remediate workloads stuck on cluster scheduling problems",
    long_about = None,
)]
pub struct Cli {
    /// Kubernetes context to use
    #[arg(long, global = true, env = "KF_CONTEXT")]
    pub context: Option<String>,

    /// Namespace to inspect
    #[arg(short = 'n', long, global = true, env = "KF_NAMESPACE")]
    pub namespace: Option<String>,

    /// Output format
    #[arg(short = 'o', long, global = true, value_enum, default_value = "table")]
    pub output: OutputFormat,

    /// Enable verbose logging
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Config file (defaults to ~/.kubefix/config.toml)
    #[arg(long, global = true, env = "KF_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Namespace to operate on
    pub fn namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or("default")
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Yaml,
}

#[derive(Subcommand)]
pub enum Command {
    /// Inspect the cluster and report findings
    #[command(alias = "diag")]
    Diagnose,

    /// Plan and execute remediations for blocking findings
    #[command(alias = "fix")]
    Remediate(RemediateArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Clone, Debug, Default)]
pub struct RemediateArgs {
    /// Print the plan without touching the cluster
    #[arg(long)]
    pub dry_run: bool,

    /// Overall deadline in seconds (overrides deadline_secs from config)
    #[arg(long, value_name = "SECS")]
    pub deadline: Option<u64>,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}
