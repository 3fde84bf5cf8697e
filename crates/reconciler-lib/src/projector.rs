//! Flat attribute view of reconciled commitments, and its serialisation
//! back into the input formats

use crate::import::{Field, GcpCommitmentImport, GcpResource, RESOURCE_MEMORY, RESOURCE_VCPU};
use crate::models::{AzureDetails, CommitmentStatus, DesiredCommitment, Provider};
use serde::{Deserialize, Serialize};
use std::io::Write;

/// One commitment as exposed to the declaring tool. Unset fields serialize
/// as `null`, never as zero or an empty string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectedCommitment {
    pub id: Option<String>,
    pub provider: Provider,
    pub provider_id: Option<String>,
    pub name: String,
    pub region: Option<String>,
    #[serde(rename = "type")]
    pub commitment_type: Option<String>,
    pub cpu: Option<i64>,
    pub memory_mb: Option<i64>,
    pub count: Option<i64>,
    pub plan: Option<String>,
    pub status: Option<CommitmentStatus>,
    pub allowed_usage: Option<f64>,
    pub prioritization: Option<bool>,
    pub start_timestamp: Option<String>,
    pub end_timestamp: Option<String>,
    pub provider_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub azure: Option<AzureDetails>,
}

/// Project the desired set; `ids[i]` is the remote id of `desired[i]` if known
pub fn project(desired: &[DesiredCommitment], ids: &[Option<String>]) -> Vec<ProjectedCommitment> {
    desired
        .iter()
        .enumerate()
        .map(|(i, d)| {
            let c = &d.commitment;
            let policy = d.policy();
            ProjectedCommitment {
                id: ids.get(i).cloned().flatten().or_else(|| c.id.clone()),
                provider: c.provider,
                provider_id: c.provider_id.clone(),
                name: c.name.clone(),
                region: c.region.clone(),
                commitment_type: c.commitment_type.clone(),
                cpu: c.cpu_cores,
                memory_mb: c.memory_mib,
                count: c.count,
                plan: c.plan.clone(),
                status: policy.status.or(c.status),
                allowed_usage: policy.allowed_usage,
                prioritization: policy.prioritization,
                start_timestamp: c.start_timestamp.clone(),
                end_timestamp: c.end_timestamp.clone(),
                provider_status: c.provider_status.clone(),
                azure: c.azure.clone(),
            }
        })
        .collect()
}

impl ProjectedCommitment {
    /// Rebuild a GCP import object
    pub fn to_gcp_import(&self) -> GcpCommitmentImport {
        let mut resources = Vec::new();
        if let Some(cpu) = self.cpu {
            resources.push(GcpResource {
                resource_type: RESOURCE_VCPU.to_string(),
                amount: Some(cpu.to_string()),
            });
        }
        if let Some(memory) = self.memory_mb {
            resources.push(GcpResource {
                resource_type: RESOURCE_MEMORY.to_string(),
                amount: Some(memory.to_string()),
            });
        }

        GcpCommitmentImport {
            id: self.provider_id.clone(),
            name: Some(self.name.clone()),
            plan: self.plan.clone(),
            region: self.region.clone(),
            resources,
            start_timestamp: self.start_timestamp.clone(),
            end_timestamp: self.end_timestamp.clone(),
            status: self.provider_status.clone(),
            commitment_type: self.commitment_type.clone(),
        }
    }

    fn azure_cell(&self, field: Field) -> String {
        let azure = self.azure.as_ref();
        let value = match field {
            Field::Provider => Some(self.provider.as_str().to_string()),
            Field::Name => Some(self.name.clone()),
            Field::ReservationId => self.provider_id.clone(),
            Field::Status => self.provider_status.clone(),
            Field::InstanceType => self.commitment_type.clone(),
            Field::ReservationType => azure.and_then(|a| a.reservation_type.clone()),
            Field::Region => self.region.clone(),
            Field::Quantity => self.count.map(|c| c.to_string()),
            Field::PurchaseDate => self.start_timestamp.clone(),
            Field::ExpirationDate => self.end_timestamp.clone(),
            Field::Term => self.plan.clone(),
            Field::Scope => azure.and_then(|a| a.scope.clone()),
            Field::ScopeSubscription => azure.and_then(|a| a.scope_subscription.clone()),
            Field::ScopeResourceGroup => azure.and_then(|a| a.scope_resource_group.clone()),
            Field::DeepLink => azure.and_then(|a| a.deep_link.clone()),
        };
        value.unwrap_or_default()
    }
}

/// Serialize as a GCP import JSON array
pub fn write_gcp_json(projected: &[ProjectedCommitment]) -> serde_json::Result<String> {
    let imports: Vec<GcpCommitmentImport> =
        projected.iter().map(ProjectedCommitment::to_gcp_import).collect();
    serde_json::to_string_pretty(&imports)
}

/// Serialize as a reservations CSV with one column per canonical field,
/// headed by each field's primary alias
pub fn write_azure_csv<W: Write>(projected: &[ProjectedCommitment], writer: W) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(Field::ALL.iter().map(|f| f.aliases()[0]))?;
    for p in projected {
        wtr.write_record(Field::ALL.iter().map(|&f| p.azure_cell(f)))?;
    }
    wtr.flush()?;
    Ok(())
}
