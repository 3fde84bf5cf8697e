//! Offline projection of the desired set back into an input format

use anyhow::{Context, Result};
use clap::ValueEnum;
use reconciler_lib::import::read_documents;
use reconciler_lib::matcher::match_configs;
use reconciler_lib::normalize::normalize_all;
use reconciler_lib::projector::{project, write_azure_csv, write_gcp_json};
use std::path::Path;
use tracing::warn;

use super::{load_input, InputArgs};
use crate::output::print_success;

/// Serialization target of `crc export`
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ExportFormat {
    /// GCP CUD import JSON array
    Gcp,
    /// Azure reservations CSV with canonical headers
    Azure,
}

/// Parse, normalize and match the inputs, then write the projection without
/// contacting the control plane
pub fn run(input: &InputArgs, to: ExportFormat, output: Option<&Path>) -> Result<()> {
    let cycle_input = load_input(input)?;
    let commitments = read_documents(&cycle_input.documents)?;
    let (normalized, mut warnings) = normalize_all(commitments)?;
    let matched = match_configs(normalized, &cycle_input.configs)?;
    warnings.extend(matched.warnings);
    for warning in &warnings {
        warn!(kind = warning.kind(), "{warning}");
    }

    let projected = project(&matched.desired, &[]);
    let rendered = match to {
        ExportFormat::Gcp => write_gcp_json(&projected)?,
        ExportFormat::Azure => {
            let mut buf = Vec::new();
            write_azure_csv(&projected, &mut buf)?;
            String::from_utf8(buf)?
        }
    };

    match output {
        Some(path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            print_success(&format!(
                "Exported {} commitment(s) to {}",
                projected.len(),
                path.display()
            ));
        }
        None => print!("{rendered}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_gcp_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let gcp = dir.path().join("cuds.json");
        std::fs::write(
            &gcp,
            r#"[{"name": "cud", "region": "projects/p/regions/us-east1", "resources": [{"type": "VCPU", "amount": "8"}]}]"#,
        )
        .unwrap();
        let out = dir.path().join("out.json");

        let input = InputArgs {
            gcp: vec![gcp],
            azure: Vec::new(),
            configs: None,
        };
        run(&input, ExportFormat::Gcp, Some(&out)).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(written[0]["name"], "cud");
        assert_eq!(written[0]["region"], "us-east1");
    }

    #[test]
    fn test_export_fails_on_unmatched_config() {
        let dir = tempfile::tempdir().unwrap();
        let gcp = dir.path().join("cuds.json");
        let configs = dir.path().join("configs.json");
        std::fs::write(&gcp, r#"{"name": "cud", "region": "regions/us-east1"}"#).unwrap();
        std::fs::write(&configs, r#"[{"matcher": {"name": "other", "region": "us-east1"}}]"#).unwrap();

        let input = InputArgs {
            gcp: vec![gcp],
            azure: Vec::new(),
            configs: Some(configs),
        };
        assert!(run(&input, ExportFormat::Azure, None).is_err());
    }
}
