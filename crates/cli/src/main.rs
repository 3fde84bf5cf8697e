//! Commitment Reconciler CLI
//!
//! Loads GCP CUD imports, Azure reservation exports and user configs, then
//! plans or applies the changes that bring the control plane inventory in
//! line with them.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use commands::{export, reconcile, InputArgs};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Commitment Reconciler CLI
#[derive(Parser)]
#[command(name = "crc")]
#[command(author, version, about = "Commitment Reconciler: converge cloud commitments into the control plane", long_about = None)]
pub struct Cli {
    /// Control plane endpoint (can also be set via CRC_API_URL env var)
    #[arg(long, env = "CRC_API_URL")]
    pub api_url: Option<String>,

    /// API key sent with every control plane call
    #[arg(long, env = "CRC_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Settings file (TOML or JSON); defaults to ~/.config/crc/config.toml
    #[arg(long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Plan and apply changes against the control plane
    Reconcile {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        run: RunArgs,

        /// Stop after planning; no mutating call is made
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the changes a reconcile would make
    Plan {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Write the desired commitments back as GCP JSON or Azure CSV
    Export {
        #[command(flatten)]
        input: InputArgs,

        /// Target format
        #[arg(long, value_enum)]
        to: export::ExportFormat,

        /// Output file path (stdout if not specified)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

/// Cycle knobs; unset flags fall back to settings
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Delete remote commitments absent from the inputs
    #[arg(long)]
    pub authoritative: bool,

    /// Maximum in-flight control plane calls
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Deadline of each control plane call, in seconds
    #[arg(long, value_name = "SECS")]
    pub call_timeout_secs: Option<u64>,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

fn settings_for(cli: &Cli, run: RunArgs) -> Result<config::ReconcileSettings> {
    let mut settings = config::ReconcileSettings::load(cli.settings.as_deref())?;
    settings.apply(config::SettingsOverrides {
        api_url: cli.api_url.clone(),
        api_key: cli.api_key.clone(),
        authoritative: run.authoritative,
        concurrency: run.concurrency,
        call_timeout_secs: run.call_timeout_secs,
    });
    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match &cli.command {
        Commands::Reconcile { input, run, dry_run } => {
            let settings = settings_for(&cli, run.clone())?;
            reconcile::run(&settings, input, *dry_run, cli.format).await
        }
        Commands::Plan { input, run } => {
            let settings = settings_for(&cli, run.clone())?;
            reconcile::run(&settings, input, true, cli.format).await
        }
        Commands::Export { input, to, output } => {
            export::run(input, *to, output.as_deref())?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
