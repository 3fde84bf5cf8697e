//! Reconcile and plan commands

use anyhow::Result;
use reconciler_lib::{CycleError, ReconcileCycle};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

use super::{load_input, InputArgs};
use crate::config::ReconcileSettings;
use crate::output::{print_error, print_report, OutputFormat};

/// Run one cycle against the control plane. With `dry_run` the cycle stops
/// after planning.
pub async fn run(
    settings: &ReconcileSettings,
    input: &InputArgs,
    dry_run: bool,
    format: OutputFormat,
) -> Result<ExitCode> {
    let cycle_input = load_input(input)?;
    let client = settings.client()?;
    info!(
        endpoint = %client.base_url(),
        documents = cycle_input.documents.len(),
        configs = cycle_input.configs.len(),
        dry_run,
        "Starting reconcile"
    );

    let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling cycle");
            let _ = shutdown_tx.send(());
        }
    });

    let mut cycle = ReconcileCycle::new(Arc::new(client), settings.options(dry_run)).with_source("crc");
    let report = match cycle.run(cycle_input, &mut shutdown_rx).await {
        Ok(report) => report,
        Err(e) => {
            print_cycle_error(&e);
            return Ok(ExitCode::FAILURE);
        }
    };

    print_report(&report, format)?;
    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// One line per offending record or config
fn print_cycle_error(error: &CycleError) {
    match error {
        CycleError::Import(errors) => {
            print_error(&format!("{} record(s) failed to import", errors.len()));
            for e in errors.iter() {
                print_error(&e.to_string());
            }
        }
        CycleError::Match(errors) => {
            print_error(&format!("{} config(s) failed to match", errors.0.len()));
            for e in errors.iter() {
                print_error(&e.to_string());
            }
        }
        CycleError::Observe(e) => print_error(&format!("Failed to list remote commitments: {e}")),
    }
}
