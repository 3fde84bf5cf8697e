//! Core data models for the reconciliation engine

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Cloud provider a commitment was purchased from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Gcp,
    Azure,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Gcp => "gcp",
            Provider::Azure => "azure",
        }
    }

    /// Parse a provider tag, ignoring case and surrounding whitespace
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "gcp" | "google" => Some(Provider::Gcp),
            "azure" | "microsoft" => Some(Provider::Azure),
            _ => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Control-plane status of a commitment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CommitmentStatus {
    Active,
    Inactive,
}

impl CommitmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitmentStatus::Active => "ACTIVE",
            CommitmentStatus::Inactive => "INACTIVE",
        }
    }
}

impl FromStr for CommitmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(CommitmentStatus::Active),
            "INACTIVE" => Ok(CommitmentStatus::Inactive),
            other => Err(format!("unknown commitment status: {other}")),
        }
    }
}

impl TryFrom<String> for CommitmentStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CommitmentStatus> for String {
    fn from(status: CommitmentStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for CommitmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Azure-only reservation attributes carried through from the CSV export
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AzureDetails {
    pub reservation_type: Option<String>,
    pub scope: Option<String>,
    pub scope_subscription: Option<String>,
    pub scope_resource_group: Option<String>,
    pub deep_link: Option<String>,
}

impl AzureDetails {
    pub fn is_empty(&self) -> bool {
        self.reservation_type.is_none()
            && self.scope.is_none()
            && self.scope_subscription.is_none()
            && self.scope_resource_group.is_none()
            && self.deep_link.is_none()
    }
}

/// A normalized record of one purchased capacity reservation.
///
/// Optional integers keep "not provided" (`None`) apart from an explicit zero;
/// [`Commitment::cpu_or_zero`] and friends give the zero-filled view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commitment {
    /// Remote control-plane identifier, assigned on first observation
    pub id: Option<String>,
    /// Provider-native identifier (GCP CUD id, Azure reservation id)
    pub provider_id: Option<String>,
    pub provider: Provider,
    pub name: String,
    /// Machine family or VM size
    pub commitment_type: Option<String>,
    pub region: Option<String>,
    /// GCP plan or Azure term
    pub plan: Option<String>,
    pub start_timestamp: Option<String>,
    pub end_timestamp: Option<String>,
    pub cpu_cores: Option<i64>,
    pub memory_mib: Option<i64>,
    pub count: Option<i64>,
    /// Control-plane status
    pub status: Option<CommitmentStatus>,
    /// Raw provider status string
    pub provider_status: Option<String>,
    pub azure: Option<AzureDetails>,
}

impl Commitment {
    /// Create an empty commitment for the given provider and name
    pub fn new(provider: Provider, name: impl Into<String>) -> Self {
        Self {
            id: None,
            provider_id: None,
            provider,
            name: name.into(),
            commitment_type: None,
            region: None,
            plan: None,
            start_timestamp: None,
            end_timestamp: None,
            cpu_cores: None,
            memory_mib: None,
            count: None,
            status: None,
            provider_status: None,
            azure: None,
        }
    }

    /// Matcher key of this commitment
    pub fn key(&self) -> MatcherKey {
        MatcherKey::new(
            &self.name,
            self.region.as_deref(),
            self.commitment_type.as_deref(),
        )
    }

    pub fn cpu_or_zero(&self) -> i64 {
        self.cpu_cores.unwrap_or(0)
    }

    pub fn memory_or_zero(&self) -> i64 {
        self.memory_mib.unwrap_or(0)
    }
}

/// The `(name, region, type)` join key.
///
/// Region is lower-cased on construction so that keys built from differently
/// cased inputs compare equal; type stays case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MatcherKey {
    pub name: String,
    pub region: Option<String>,
    #[serde(rename = "type")]
    pub commitment_type: Option<String>,
}

impl MatcherKey {
    pub fn new(name: &str, region: Option<&str>, commitment_type: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            region: region.map(|r| r.trim().to_ascii_lowercase()),
            commitment_type: commitment_type.map(|t| t.trim().to_string()),
        }
    }
}

impl fmt::Display for MatcherKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.name,
            self.region.as_deref().unwrap_or("*"),
            self.commitment_type.as_deref().unwrap_or("*")
        )
    }
}

/// Matcher block of a user config. Missing region or type act as wildcards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigMatcher {
    #[serde(alias = "match_name")]
    pub name: String,
    #[serde(default, alias = "match_region")]
    pub region: Option<String>,
    #[serde(default, rename = "type", alias = "match_type")]
    pub commitment_type: Option<String>,
}

impl ConfigMatcher {
    /// Whether this matcher selects the given commitment
    pub fn selects(&self, commitment: &Commitment) -> bool {
        if self.name != commitment.name {
            return false;
        }
        if let Some(region) = &self.region {
            let normalized = crate::normalize::normalize_region(region);
            match &commitment.region {
                Some(r) if r.eq_ignore_ascii_case(&normalized) => {}
                _ => return false,
            }
        }
        if let Some(commitment_type) = &self.commitment_type {
            if commitment.commitment_type.as_deref() != Some(commitment_type.trim()) {
                return false;
            }
        }
        true
    }
}

impl fmt::Display for ConfigMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "name={} region={} type={}",
            self.name,
            self.region.as_deref().unwrap_or("*"),
            self.commitment_type.as_deref().unwrap_or("*")
        )
    }
}

/// User override applied to a matched commitment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitmentConfig {
    pub matcher: ConfigMatcher,
    #[serde(default)]
    pub prioritization: Option<bool>,
    #[serde(default)]
    pub allowed_usage: Option<f64>,
    #[serde(default)]
    pub status: Option<CommitmentStatus>,
}

impl CommitmentConfig {
    pub fn new(matcher: ConfigMatcher) -> Self {
        Self {
            matcher,
            prioritization: None,
            allowed_usage: None,
            status: None,
        }
    }

    /// Check the config's own constraints, independent of any commitment
    pub fn validate(&self) -> Result<(), String> {
        if self.matcher.name.trim().is_empty() {
            return Err("match_name must not be empty".to_string());
        }
        if let Some(usage) = self.allowed_usage {
            if !(0.0..=1.0).contains(&usage) {
                return Err(format!("allowed_usage {usage} is outside [0, 1]"));
            }
        }
        Ok(())
    }

    pub fn policy(&self) -> UsagePolicy {
        UsagePolicy {
            allowed_usage: self.allowed_usage,
            prioritization: self.prioritization,
            status: self.status,
        }
    }
}

/// The mutable, user-configurable usage settings of a commitment
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsagePolicy {
    pub allowed_usage: Option<f64>,
    pub prioritization: Option<bool>,
    pub status: Option<CommitmentStatus>,
}

impl UsagePolicy {
    pub fn is_empty(&self) -> bool {
        self.allowed_usage.is_none() && self.prioritization.is_none() && self.status.is_none()
    }
}

/// A commitment fused with the config attached to it by the matcher
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredCommitment {
    pub commitment: Commitment,
    pub config: Option<CommitmentConfig>,
}

impl DesiredCommitment {
    pub fn new(commitment: Commitment) -> Self {
        Self {
            commitment,
            config: None,
        }
    }

    /// Desired usage settings; empty when no config is attached
    pub fn policy(&self) -> UsagePolicy {
        self.config
            .as_ref()
            .map(CommitmentConfig::policy)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(name: &str, region: Option<&str>, commitment_type: Option<&str>) -> ConfigMatcher {
        ConfigMatcher {
            name: name.to_string(),
            region: region.map(String::from),
            commitment_type: commitment_type.map(String::from),
        }
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!(Provider::parse(" Azure "), Some(Provider::Azure));
        assert_eq!(Provider::parse("GCP"), Some(Provider::Gcp));
        assert_eq!(Provider::parse("aws"), None);
    }

    #[test]
    fn test_status_serde_accepts_any_case() {
        let status: CommitmentStatus = serde_json::from_str("\"Inactive\"").unwrap();
        assert_eq!(status, CommitmentStatus::Inactive);
        assert_eq!(
            serde_json::to_string(&CommitmentStatus::Active).unwrap(),
            "\"ACTIVE\""
        );
        assert!(serde_json::from_str::<CommitmentStatus>("\"PAUSED\"").is_err());
    }

    #[test]
    fn test_matcher_key_region_case_insensitive() {
        let a = MatcherKey::new("cud", Some("US-Central1"), Some("C2D"));
        let b = MatcherKey::new("cud", Some("us-central1"), Some("C2D"));
        let c = MatcherKey::new("cud", Some("us-central1"), Some("c2d"));
        assert_eq!(a, b);
        assert_ne!(b, c);
        assert_eq!(a.to_string(), "cud/us-central1/C2D");
    }

    #[test]
    fn test_config_matcher_wildcards() {
        let mut commitment = Commitment::new(Provider::Azure, "res-1");
        commitment.region = Some("eastus".to_string());
        commitment.commitment_type = Some("Standard_D32as_v4".to_string());

        assert!(matcher("res-1", None, None).selects(&commitment));
        assert!(matcher("res-1", Some("EastUS"), None).selects(&commitment));
        assert!(matcher("res-1", None, Some("Standard_D32as_v4")).selects(&commitment));
        assert!(!matcher("res-1", None, Some("standard_d32as_v4")).selects(&commitment));
        assert!(!matcher("res-2", None, None).selects(&commitment));
        assert!(!matcher("res-1", Some("westus"), None).selects(&commitment));
    }

    #[test]
    fn test_config_validation() {
        let mut config = CommitmentConfig::new(matcher("cud", None, None));
        assert!(config.validate().is_ok());

        config.allowed_usage = Some(1.5);
        assert!(config.validate().is_err());

        config.allowed_usage = Some(0.7);
        config.matcher.name = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_deserializes_tool_attribute_names() {
        let json = r#"{
            "matcher": {"match_name": "test-cud", "match_region": "us-central1", "match_type": "COMPUTE_OPTIMIZED_C2D"},
            "allowed_usage": 0.7,
            "prioritization": true,
            "status": "ACTIVE"
        }"#;
        let config: CommitmentConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.matcher.name, "test-cud");
        assert_eq!(config.matcher.region.as_deref(), Some("us-central1"));
        assert_eq!(
            config.matcher.commitment_type.as_deref(),
            Some("COMPUTE_OPTIMIZED_C2D")
        );
        assert_eq!(config.allowed_usage, Some(0.7));
        assert_eq!(config.status, Some(CommitmentStatus::Active));
    }

    #[test]
    fn test_desired_policy_without_config_is_empty() {
        let desired = DesiredCommitment::new(Commitment::new(Provider::Gcp, "cud"));
        assert!(desired.policy().is_empty());
    }
}
