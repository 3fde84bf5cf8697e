//! CLI commands and their shared input loading

pub mod export;
pub mod reconcile;

use anyhow::{Context, Result};
use clap::Args;
use reconciler_lib::{CommitmentConfig, CycleInput, InputDocument, SourceFormat};
use std::path::{Path, PathBuf};

/// Input documents and user configs of one run
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// GCP CUD import JSON (an object or an array); repeatable
    #[arg(long = "gcp", value_name = "FILE")]
    pub gcp: Vec<PathBuf>,

    /// Azure reservations CSV export; repeatable
    #[arg(long = "azure", value_name = "FILE")]
    pub azure: Vec<PathBuf>,

    /// JSON array of commitment configs
    #[arg(long, value_name = "FILE")]
    pub configs: Option<PathBuf>,
}

/// Read the documents (GCP files first, then Azure, each in argument order)
/// and the configs into a cycle input
pub fn load_input(args: &InputArgs) -> Result<CycleInput> {
    let sources = args
        .gcp
        .iter()
        .map(|p| (SourceFormat::Gcp, p))
        .chain(args.azure.iter().map(|p| (SourceFormat::Azure, p)));

    let mut documents = Vec::new();
    for (format, path) in sources {
        let document = InputDocument::from_path(format, path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        documents.push(document);
    }

    let configs = match &args.configs {
        Some(path) => load_configs(path)?,
        None => Vec::new(),
    };

    Ok(CycleInput { documents, configs })
}

/// Read a JSON array of commitment configs
pub fn load_configs(path: &Path) -> Result<Vec<CommitmentConfig>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read configs file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse configs file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_input_orders_gcp_before_azure() {
        let dir = tempfile::tempdir().unwrap();
        let gcp = dir.path().join("cuds.json");
        let azure = dir.path().join("res.csv");
        let configs = dir.path().join("configs.json");
        std::fs::write(&gcp, r#"{"name": "cud", "region": "regions/us-east1"}"#).unwrap();
        std::fs::write(&azure, "Name,Region,Provider\nres,eastus,azure\n").unwrap();
        std::fs::write(
            &configs,
            r#"[{"matcher": {"name": "cud", "region": "us-east1"}, "allowed_usage": 0.5}]"#,
        )
        .unwrap();

        let input = load_input(&InputArgs {
            gcp: vec![gcp],
            azure: vec![azure],
            configs: Some(configs),
        })
        .unwrap();

        assert_eq!(input.documents.len(), 2);
        assert_eq!(input.documents[0].format, SourceFormat::Gcp);
        assert_eq!(input.documents[1].format, SourceFormat::Azure);
        assert_eq!(input.configs.len(), 1);
        assert_eq!(input.configs[0].allowed_usage, Some(0.5));
    }

    #[test]
    fn test_load_configs_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("configs.json");
        std::fs::write(&path, "{").unwrap();

        let error = load_configs(&path).unwrap_err();
        assert!(format!("{error:#}").contains("configs.json"));
    }
}
