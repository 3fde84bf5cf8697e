//! Control-plane payloads

use crate::models::{AzureDetails, Commitment, CommitmentStatus, Provider, UsagePolicy};
use serde::{Deserialize, Serialize};

/// A commitment as stored by the control plane
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCommitment {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    pub provider: Provider,
    pub name: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub commitment_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<i64>,
    #[serde(default, rename = "memoryMb", skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<CommitmentStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_usage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prioritization: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure: Option<AzureDetails>,
}

impl RemoteCommitment {
    /// Usage settings currently applied on the control plane
    pub fn policy(&self) -> UsagePolicy {
        UsagePolicy {
            allowed_usage: self.allowed_usage,
            prioritization: self.prioritization,
            status: self.status,
        }
    }

    pub(crate) fn into_commitment(self) -> Commitment {
        Commitment {
            id: Some(self.id),
            provider_id: self.provider_id,
            provider: self.provider,
            name: self.name,
            commitment_type: self.commitment_type,
            region: self.region,
            plan: self.plan,
            start_timestamp: self.start_timestamp,
            end_timestamp: self.end_timestamp,
            cpu_cores: self.cpu,
            memory_mib: self.memory_mb,
            count: self.count,
            status: self.status,
            provider_status: self.provider_status,
            azure: self.azure,
        }
    }
}

/// Body of `GET v1/savings/commitments`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListCommitmentsResponse {
    #[serde(default)]
    pub commitments: Vec<RemoteCommitment>,
}

/// Body of a create call: the normalized canonical fields plus any
/// configured usage settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitmentImport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    pub provider: Provider,
    pub name: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub commitment_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<i64>,
    #[serde(default, rename = "memoryMb", skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<CommitmentStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_usage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prioritization: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure: Option<AzureDetails>,
}

impl CommitmentImport {
    pub fn new(commitment: &Commitment, policy: UsagePolicy) -> Self {
        Self {
            provider_id: commitment.provider_id.clone(),
            provider: commitment.provider,
            name: commitment.name.clone(),
            commitment_type: commitment.commitment_type.clone(),
            region: commitment.region.clone(),
            plan: commitment.plan.clone(),
            start_timestamp: commitment.start_timestamp.clone(),
            end_timestamp: commitment.end_timestamp.clone(),
            cpu: commitment.cpu_cores,
            memory_mb: commitment.memory_mib,
            count: commitment.count,
            provider_status: commitment.provider_status.clone(),
            status: policy.status.or(commitment.status),
            allowed_usage: policy.allowed_usage,
            prioritization: policy.prioritization,
            azure: commitment.azure.clone(),
        }
    }
}

/// Body of an update call; only changed usage settings are present
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitmentAssignmentUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_usage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prioritization: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<CommitmentStatus>,
}

impl CommitmentAssignmentUpdate {
    pub fn is_empty(&self) -> bool {
        self.allowed_usage.is_none() && self.prioritization.is_none() && self.status.is_none()
    }

    /// Names of the fields this update changes
    pub fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.allowed_usage.is_some() {
            fields.push("allowed_usage");
        }
        if self.prioritization.is_some() {
            fields.push("prioritization");
        }
        if self.status.is_some() {
            fields.push("status");
        }
        fields
    }

    /// Apply onto a stored commitment
    pub fn apply_to(&self, remote: &mut RemoteCommitment) {
        if let Some(usage) = self.allowed_usage {
            remote.allowed_usage = Some(usage);
        }
        if let Some(prioritization) = self.prioritization {
            remote.prioritization = Some(prioritization);
        }
        if let Some(status) = self.status {
            remote.status = Some(status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_commitment_wire_names() {
        let json = r#"{
            "id": "cmt-1",
            "providerId": "123",
            "provider": "gcp",
            "name": "test-cud",
            "type": "COMPUTE_OPTIMIZED_C2D",
            "region": "us-central1",
            "cpu": 10,
            "memoryMb": 20480,
            "allowedUsage": 0.7,
            "prioritization": true,
            "status": "ACTIVE"
        }"#;
        let remote: RemoteCommitment = serde_json::from_str(json).unwrap();
        assert_eq!(remote.memory_mb, Some(20480));
        assert_eq!(remote.policy().allowed_usage, Some(0.7));

        let commitment = remote.into_commitment();
        assert_eq!(commitment.id.as_deref(), Some("cmt-1"));
        assert_eq!(commitment.memory_mib, Some(20480));
    }

    #[test]
    fn test_update_serializes_only_changed_fields() {
        let update = CommitmentAssignmentUpdate {
            prioritization: Some(false),
            ..Default::default()
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json, serde_json::json!({"prioritization": false}));
        assert_eq!(update.changed_fields(), vec!["prioritization"]);
    }

    #[test]
    fn test_import_carries_policy() {
        let mut commitment = Commitment::new(Provider::Gcp, "cud");
        commitment.cpu_cores = Some(4);
        let import = CommitmentImport::new(
            &commitment,
            UsagePolicy {
                allowed_usage: Some(0.7),
                prioritization: Some(true),
                status: Some(CommitmentStatus::Active),
            },
        );
        assert_eq!(import.cpu, Some(4));
        assert_eq!(import.allowed_usage, Some(0.7));
        assert_eq!(import.status, Some(CommitmentStatus::Active));
    }
}
