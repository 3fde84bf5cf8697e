//! GCP committed-use-discount import objects

use super::SourceRecord;
use crate::error::{ImportError, ImportErrors};
use crate::models::{Commitment, Provider};
use serde::{Deserialize, Deserializer, Serialize};
use std::io::Read;

/// Resource type carrying the vCPU count
pub const RESOURCE_VCPU: &str = "VCPU";
/// Resource type carrying memory in MiB
pub const RESOURCE_MEMORY: &str = "MEMORY";

/// One CUD as exported by `gcloud compute commitments list --format=json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GcpCommitmentImport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default)]
    pub resources: Vec<GcpResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub commitment_type: Option<String>,
}

/// A committed resource amount; the API encodes int64 values as strings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GcpResource {
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub amount: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Amount {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(Option::<Amount>::deserialize(deserializer)?.map(|a| match a {
        Amount::Text(s) => s,
        Amount::Number(n) => n.to_string(),
    }))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GcpDocument {
    Many(Vec<GcpCommitmentImport>),
    One(Box<GcpCommitmentImport>),
}

/// Read a GCP import document: a single object or an array of objects
pub fn parse_gcp_json<R: Read>(reader: R, label: &str) -> Result<Vec<SourceRecord>, ImportErrors> {
    let document: GcpDocument =
        serde_json::from_reader(reader).map_err(|source| ImportError::Json {
            location: label.to_string(),
            source,
        })?;

    let imports = match document {
        GcpDocument::Many(imports) => imports,
        GcpDocument::One(import) => vec![*import],
    };

    Ok(imports
        .into_iter()
        .enumerate()
        .map(|(index, import)| SourceRecord::GcpImport {
            label: label.to_string(),
            index,
            import,
        })
        .collect())
}

impl GcpCommitmentImport {
    fn location(&self, label: &str, index: usize) -> String {
        let object = match &self.name {
            Some(name) => format!("gcp object {index} ({name})"),
            None => format!("gcp object {index}"),
        };
        if label.is_empty() {
            object
        } else {
            format!("{label} {object}")
        }
    }

    fn resource_amount(
        &self,
        resource_type: &str,
        field: &str,
        location: &str,
    ) -> Result<Option<i64>, ImportError> {
        let Some(resource) = self
            .resources
            .iter()
            .find(|r| r.resource_type.eq_ignore_ascii_case(resource_type))
        else {
            return Ok(None);
        };

        match resource.amount.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => raw
                .parse::<i64>()
                .map(Some)
                .map_err(|_| ImportError::parse(field, raw, location)),
        }
    }

    /// Collapse into the canonical commitment; the region stays a URL until
    /// normalization
    pub(crate) fn into_commitment(self, label: &str, index: usize) -> Result<Commitment, ImportError> {
        let location = self.location(label, index);

        let name = self
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ImportError::parse("name", self.name.clone().unwrap_or_default(), &location))?
            .to_string();

        let cpu_cores = self.resource_amount(RESOURCE_VCPU, "cpu", &location)?;
        let memory_mib = self.resource_amount(RESOURCE_MEMORY, "memory", &location)?;

        let mut commitment = Commitment::new(Provider::Gcp, name);
        commitment.provider_id = non_empty(self.id);
        commitment.commitment_type = non_empty(self.commitment_type);
        commitment.region = non_empty(self.region);
        commitment.plan = non_empty(self.plan);
        commitment.start_timestamp = non_empty(self.start_timestamp);
        commitment.end_timestamp = non_empty(self.end_timestamp);
        commitment.provider_status = non_empty(self.status);
        commitment.cpu_cores = cpu_cores;
        commitment.memory_mib = memory_mib;

        Ok(commitment)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
