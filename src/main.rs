//! kubefix (kf) - diagnose and remediate workloads stuck on cluster scheduling problems

use anyhow::Result;
use clap::Parser;
use kubefix::cli::{Cli, Command};
use kubefix::commands::{self, ExitStatus};
use kubefix::config::{load_config, load_config_from};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => load_config_from(path),
        None => load_config(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(ExitStatus::from_error(&e).code());
        }
    };

    if cli.no_color || !config.colors {
        owo_colors::set_override(false);
    }

    let namespace = cli.namespace();
    let result = match cli.command {
        Command::Diagnose => {
            commands::run_diagnose(cli.context.as_deref(), namespace, cli.output, &config).await
        }
        Command::Remediate(ref args) => {
            commands::run_remediate(cli.context.as_deref(), namespace, args, cli.output, &config)
                .await
        }
        Command::Completions(ref args) => {
            generate_completions(args.shell);
            Ok(ExitStatus::Success)
        }
    };

    let status = match result {
        Ok(status) => status,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitStatus::from_error(&e)
        }
    };

    std::process::exit(status.code());
}

fn setup_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn generate_completions(shell: clap_complete::Shell) {
    use clap::CommandFactory;
    use clap_complete::generate;

    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "kf", &mut std::io::stdout());
}
