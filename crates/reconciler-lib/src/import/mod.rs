//! Record parsers for commitment inventories
//!
//! This module provides:
//! - The field dictionary and CSV header resolver
//! - A parser for GCP CUD JSON imports
//! - A parser for Azure Reservations CSV exports
//! - The [`SourceRecord`] sum type that both parsers (and remote observations)
//!   produce before collapsing into canonical [`Commitment`]s

mod azure;
mod fields;
mod gcp;
mod header;


pub use azure::{parse_azure_csv, AzureReservationRow};
pub use fields::{Field, FieldSpec, FIELD_DICTIONARY};
pub use gcp::{parse_gcp_json, GcpCommitmentImport, GcpResource, RESOURCE_MEMORY, RESOURCE_VCPU};
pub use header::{normalize_header, HeaderIndex};

use crate::error::{ImportError, ImportErrors};
use crate::inventory::RemoteCommitment;
use crate::models::{Commitment, MatcherKey};
use crate::normalize::normalize_region;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Input format of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Gcp,
    Azure,
}

/// A raw record from one of the heterogeneous sources
#[derive(Debug, Clone, PartialEq)]
pub enum SourceRecord {
    GcpImport {
        label: String,
        index: usize,
        import: GcpCommitmentImport,
    },
    AzureImport(AzureReservationRow),
    Remote(RemoteCommitment),
}

impl SourceRecord {
    /// Matcher key of the record, computed from its raw fields
    pub fn key(&self) -> MatcherKey {
        match self {
            SourceRecord::GcpImport { import, .. } => MatcherKey::new(
                import.name.as_deref().unwrap_or_default().trim(),
                import.region.as_deref().map(normalize_region).as_deref(),
                import.commitment_type.as_deref(),
            ),
            SourceRecord::AzureImport(row) => MatcherKey::new(
                row.name.as_deref().unwrap_or_default(),
                row.region.as_deref().map(normalize_region).as_deref(),
                row.instance_type.as_deref(),
            ),
            SourceRecord::Remote(remote) => MatcherKey::new(
                &remote.name,
                remote.region.as_deref().map(normalize_region).as_deref(),
                remote.commitment_type.as_deref(),
            ),
        }
    }

    /// Collapse into the canonical struct
    pub fn into_commitment(self) -> Result<Commitment, ImportError> {
        match self {
            SourceRecord::GcpImport {
                label,
                index,
                import,
            } => import.into_commitment(&label, index),
            SourceRecord::AzureImport(row) => row.into_commitment(),
            SourceRecord::Remote(remote) => Ok(remote.into_commitment()),
        }
    }
}

/// Collapse records, reporting every failing record rather than the first
pub fn collapse(records: Vec<SourceRecord>) -> Result<Vec<Commitment>, ImportErrors> {
    let mut commitments = Vec::with_capacity(records.len());
    let mut errors = ImportErrors::default();

    for record in records {
        match record.into_commitment() {
            Ok(commitment) => commitments.push(commitment),
            Err(e) => errors.push(e),
        }
    }

    if errors.is_empty() {
        Ok(commitments)
    } else {
        Err(errors)
    }
}

/// Parse and collapse one in-memory document
pub fn read_commitments<R: Read>(
    format: SourceFormat,
    reader: R,
    label: &str,
) -> Result<Vec<Commitment>, ImportErrors> {
    let records = match format {
        SourceFormat::Gcp => parse_gcp_json(reader, label)?,
        SourceFormat::Azure => parse_azure_csv(reader, label)?,
    };
    collapse(records)
}

/// An input document owned by a cycle
#[derive(Debug, Clone, PartialEq)]
pub struct InputDocument {
    pub format: SourceFormat,
    /// Used in error locations, usually the file name
    pub label: String,
    pub contents: String,
}

impl InputDocument {
    pub fn gcp(label: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            format: SourceFormat::Gcp,
            label: label.into(),
            contents: contents.into(),
        }
    }

    pub fn azure(label: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            format: SourceFormat::Azure,
            label: label.into(),
            contents: contents.into(),
        }
    }

    /// Read a document from disk; the file handle is released before return
    pub fn from_path(format: SourceFormat, path: &Path) -> Result<Self, ImportError> {
        let mut contents = String::new();
        {
            let file = File::open(path)?;
            BufReader::new(file).read_to_string(&mut contents)?;
        }
        Ok(Self {
            format,
            label: path.display().to_string(),
            contents,
        })
    }

    pub fn read(&self) -> Result<Vec<Commitment>, ImportErrors> {
        read_commitments(self.format, self.contents.as_bytes(), &self.label)
    }
}

/// Read every document in order, collecting the failures of all of them
pub fn read_documents(documents: &[InputDocument]) -> Result<Vec<Commitment>, ImportErrors> {
    let mut commitments = Vec::new();
    let mut errors = ImportErrors::default();
    for document in documents {
        match document.read() {
            Ok(parsed) => commitments.extend(parsed),
            Err(e) => errors.extend(e),
        }
    }
    if errors.is_empty() {
        Ok(commitments)
    } else {
        Err(errors)
    }
}
