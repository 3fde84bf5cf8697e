//! Output formatting utilities

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use reconciler_lib::reconcile::{IntentOutcome, IntentResult};
use reconciler_lib::{CycleReport, CycleState, ProjectedCommitment};
use std::fmt::Display;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Row for the intents table
#[derive(Tabled)]
struct IntentRow {
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Commitment")]
    key: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Result")]
    result: String,
}

impl IntentRow {
    fn from_outcome(outcome: &IntentOutcome) -> Self {
        Self {
            kind: outcome.kind.to_string(),
            key: outcome.key.to_string(),
            id: format_optional(outcome.id.as_ref()),
            result: color_result(&outcome.result),
        }
    }
}

/// Row for the commitments table
#[derive(Tabled)]
struct CommitmentRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Provider")]
    provider: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Region")]
    region: String,
    #[tabled(rename = "Type")]
    commitment_type: String,
    #[tabled(rename = "CPU")]
    cpu: String,
    #[tabled(rename = "Memory (MiB)")]
    memory: String,
    #[tabled(rename = "Count")]
    count: String,
    #[tabled(rename = "Plan")]
    plan: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Usage")]
    usage: String,
}

impl From<&ProjectedCommitment> for CommitmentRow {
    fn from(p: &ProjectedCommitment) -> Self {
        Self {
            id: format_optional(p.id.as_ref()),
            provider: p.provider.to_string(),
            name: p.name.clone(),
            region: format_optional(p.region.as_ref()),
            commitment_type: format_optional(p.commitment_type.as_ref()),
            cpu: format_optional(p.cpu),
            memory: format_optional(p.memory_mb),
            count: format_optional(p.count),
            plan: format_optional(p.plan.as_ref()),
            status: format_optional(p.status.map(|s| s.as_str())),
            usage: format_usage(p.allowed_usage, p.prioritization),
        }
    }
}

/// Render a cycle report
pub fn print_report(report: &CycleReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        OutputFormat::Table => {
            let title = if report.dry_run { "Reconcile Plan" } else { "Reconcile Result" };
            println!("{}", title.bold());
            println!("{}", "=".repeat(50));
            println!("State:          {}", color_state(report.state));
            let plan = &report.plan;
            println!(
                "Plan:           {} create, {} update, {} delete",
                plan.creates, plan.updates, plan.deletes
            );
            if plan.orphans > 0 || plan.drifted_fields > 0 {
                println!(
                    "Skipped:        {} orphan(s), {} drifted field(s)",
                    plan.orphans, plan.drifted_fields
                );
            }
            if let Some(reason) = &report.abort_reason {
                println!("Abort reason:   {}", reason.red());
                println!(
                    "Intents:        {} completed, {} skipped",
                    report.completed, report.skipped
                );
            }
            println!();

            if report.dry_run {
                for intent in &report.intents {
                    print_info(&intent.to_string());
                }
            } else if !report.outcomes.is_empty() {
                let rows: Vec<IntentRow> = report.outcomes.iter().map(IntentRow::from_outcome).collect();
                println!("{}", Table::new(rows).with(Style::rounded()));
            }

            for warning in &report.warnings {
                print_warning(&warning.to_string());
            }

            println!();
            print_table(report.commitments.iter().map(CommitmentRow::from).collect());

            if report.is_success() {
                print_success("Reconcile finished");
            } else {
                let failed = report.failed_outcomes().count();
                print_error(&format!("Reconcile ended in {} ({} failed call(s))", report.state, failed));
            }
        }
    }
    Ok(())
}

fn print_table<T: Tabled>(items: Vec<T>) {
    if items.is_empty() {
        println!("{}", "No commitments found".yellow());
        return;
    }
    println!("{}", Table::new(items).with(Style::rounded()));
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Unset values render as a dash, distinct from zero
pub fn format_optional<T: Display>(value: Option<T>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "-".to_string(),
    }
}

/// Format the usage policy as a percentage with a priority marker
pub fn format_usage(allowed_usage: Option<f64>, prioritization: Option<bool>) -> String {
    let usage = match allowed_usage {
        Some(u) => format!("{:.0}%", u * 100.0),
        None => "-".to_string(),
    };
    if prioritization == Some(true) {
        format!("{usage} (prioritized)")
    } else {
        usage
    }
}

/// Color a terminal state
pub fn color_state(state: CycleState) -> String {
    match state {
        CycleState::Done => state.to_string().green().to_string(),
        CycleState::PartialFailure => state.to_string().yellow().to_string(),
        CycleState::Aborted => state.to_string().red().to_string(),
        _ => state.to_string(),
    }
}

/// Color an intent result
pub fn color_result(result: &IntentResult) -> String {
    match result {
        IntentResult::Ok { status } => format!("ok ({status})").green().to_string(),
        IntentResult::Failed { status, body } => {
            format!("failed ({status}): {body}").red().to_string()
        }
        IntentResult::Transport { error } => format!("transport: {error}").red().to_string(),
        IntentResult::Skipped => "skipped".yellow().to_string(),
    }
}
