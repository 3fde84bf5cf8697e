//! Pure diff between the desired set and the observed remote inventory

use crate::inventory::{CommitmentAssignmentUpdate, CommitmentImport, RemoteCommitment};
use crate::models::{Commitment, DesiredCommitment, MatcherKey, Provider, UsagePolicy};
use crate::normalize::normalize_commitment;
use crate::report::Warning;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;

const USAGE_EPSILON: f64 = 1e-9;

/// A remote commitment as seen by the planner
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedCommitment {
    pub id: String,
    pub commitment: Commitment,
    pub policy: UsagePolicy,
}

impl ObservedCommitment {
    /// Canonicalize a remote record so it compares against normalized input.
    /// Fields the normalizer rejects are compared as stored.
    pub fn from_remote(remote: RemoteCommitment) -> Self {
        let id = remote.id.clone();
        let policy = remote.policy();
        let commitment = remote.into_commitment();
        let commitment = match normalize_commitment(commitment.clone()) {
            Ok((normalized, _)) => normalized,
            Err(_) => commitment,
        };
        Self {
            id,
            commitment,
            policy,
        }
    }
}

/// Kind of a planned mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IntentKind {
    Delete,
    Create,
    Update,
}

impl IntentKind {
    /// Execution order of the kind groups
    pub const ORDER: [IntentKind; 3] = [IntentKind::Delete, IntentKind::Create, IntentKind::Update];

    pub fn as_str(&self) -> &'static str {
        match self {
            IntentKind::Delete => "DELETE",
            IntentKind::Create => "CREATE",
            IntentKind::Update => "UPDATE",
        }
    }
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One planned mutation against the remote inventory
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "UPPERCASE")]
pub enum Intent {
    Delete {
        id: String,
        key: MatcherKey,
    },
    Create {
        /// Position in the desired set
        index: usize,
        key: MatcherKey,
        payload: CommitmentImport,
    },
    Update {
        id: String,
        index: usize,
        key: MatcherKey,
        delta: CommitmentAssignmentUpdate,
    },
}

impl Intent {
    pub fn kind(&self) -> IntentKind {
        match self {
            Intent::Delete { .. } => IntentKind::Delete,
            Intent::Create { .. } => IntentKind::Create,
            Intent::Update { .. } => IntentKind::Update,
        }
    }

    pub fn key(&self) -> &MatcherKey {
        match self {
            Intent::Delete { key, .. } | Intent::Create { key, .. } | Intent::Update { key, .. } => {
                key
            }
        }
    }

    /// Remote id targeted by the intent; creates have none yet
    pub fn remote_id(&self) -> Option<&str> {
        match self {
            Intent::Delete { id, .. } | Intent::Update { id, .. } => Some(id),
            Intent::Create { .. } => None,
        }
    }

    /// Position in the desired set, for creates and updates
    pub fn desired_index(&self) -> Option<usize> {
        match self {
            Intent::Create { index, .. } | Intent::Update { index, .. } => Some(*index),
            Intent::Delete { .. } => None,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.remote_id() {
            Some(id) => write!(f, "{} {} ({})", self.kind(), self.key(), id),
            None => write!(f, "{} {}", self.kind(), self.key()),
        }
    }
}

/// Ordered intents plus the diagnostics found while diffing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    pub intents: Vec<Intent>,
    pub warnings: Vec<Warning>,
    /// Remote id of the observed record paired with each desired commitment
    pub resolved_ids: Vec<Option<String>>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }

    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary::default();
        for intent in &self.intents {
            match intent.kind() {
                IntentKind::Delete => summary.deletes += 1,
                IntentKind::Create => summary.creates += 1,
                IntentKind::Update => summary.updates += 1,
            }
        }
        for warning in &self.warnings {
            match warning {
                Warning::Orphan { .. } => summary.orphans += 1,
                Warning::ImmutableFieldDrift { .. } => summary.drifted_fields += 1,
                _ => {}
            }
        }
        summary
    }
}

/// Intent counts of a plan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    pub creates: usize,
    pub updates: usize,
    pub deletes: usize,
    pub orphans: usize,
    pub drifted_fields: usize,
}

/// Diff key: provider-native id when present, matcher key otherwise
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum DiffKey {
    ProviderId(Provider, String),
    Matcher(Provider, MatcherKey),
}

impl DiffKey {
    fn of(commitment: &Commitment) -> Self {
        match &commitment.provider_id {
            Some(id) => DiffKey::ProviderId(commitment.provider, id.clone()),
            None => DiffKey::Matcher(commitment.provider, commitment.key()),
        }
    }
}

/// Compute the intents that converge `observed` to `desired`.
///
/// Intents are ordered DELETE, CREATE, UPDATE. Remote records absent from
/// the desired set become DELETEs only when `authoritative` is set and
/// [`Warning::Orphan`] otherwise. A record whose immutable fields drifted
/// gets one [`Warning::ImmutableFieldDrift`] per field and no intent.
pub fn plan(
    desired: &[DesiredCommitment],
    observed: &[ObservedCommitment],
    authoritative: bool,
) -> Plan {
    let mut by_key: HashMap<DiffKey, Vec<usize>> = HashMap::new();
    for (idx, o) in observed.iter().enumerate() {
        by_key.entry(DiffKey::of(&o.commitment)).or_default().push(idx);
    }

    let mut claimed: HashSet<usize> = HashSet::new();
    let mut creates = Vec::new();
    let mut updates = Vec::new();
    let mut warnings = Vec::new();
    let mut resolved_ids = Vec::with_capacity(desired.len());

    for (index, d) in desired.iter().enumerate() {
        let key = d.commitment.key();
        let found = by_key
            .get(&DiffKey::of(&d.commitment))
            .and_then(|candidates| candidates.iter().copied().find(|i| !claimed.contains(i)));

        let Some(obs_idx) = found else {
            resolved_ids.push(None);
            creates.push(Intent::Create {
                index,
                key,
                payload: CommitmentImport::new(&d.commitment, d.policy()),
            });
            continue;
        };

        claimed.insert(obs_idx);
        let o = &observed[obs_idx];
        resolved_ids.push(Some(o.id.clone()));

        let drift = immutable_drift(&o.id, &d.commitment, &o.commitment);
        if !drift.is_empty() {
            warnings.extend(drift);
            continue;
        }

        let delta = usage_delta(&d.policy(), &o.policy);
        if !delta.is_empty() {
            updates.push(Intent::Update {
                id: o.id.clone(),
                index,
                key,
                delta,
            });
        }
    }

    let mut deletes = Vec::new();
    for (idx, o) in observed.iter().enumerate() {
        if claimed.contains(&idx) {
            continue;
        }
        if authoritative {
            deletes.push(Intent::Delete {
                id: o.id.clone(),
                key: o.commitment.key(),
            });
        } else {
            warnings.push(Warning::Orphan {
                id: o.id.clone(),
                key: o.commitment.key(),
            });
        }
    }

    let mut intents = deletes;
    intents.extend(creates);
    intents.extend(updates);

    Plan {
        intents,
        warnings,
        resolved_ids,
    }
}

/// Drift on fields the control plane never changes; only values present on
/// both sides are compared
fn immutable_drift(id: &str, desired: &Commitment, observed: &Commitment) -> Vec<Warning> {
    let fields: [(&str, Option<String>, Option<String>); 6] = [
        (
            "cpu",
            desired.cpu_cores.map(|v| v.to_string()),
            observed.cpu_cores.map(|v| v.to_string()),
        ),
        (
            "memory",
            desired.memory_mib.map(|v| v.to_string()),
            observed.memory_mib.map(|v| v.to_string()),
        ),
        ("plan", desired.plan.clone(), observed.plan.clone()),
        (
            "type",
            desired.commitment_type.clone(),
            observed.commitment_type.clone(),
        ),
        (
            "start_timestamp",
            desired.start_timestamp.clone(),
            observed.start_timestamp.clone(),
        ),
        (
            "end_timestamp",
            desired.end_timestamp.clone(),
            observed.end_timestamp.clone(),
        ),
    ];

    fields
        .into_iter()
        .filter_map(|(field, d, o)| match (d, o) {
            (Some(d), Some(o)) if d != o => Some(Warning::ImmutableFieldDrift {
                id: id.to_string(),
                field: field.to_string(),
                desired: d,
                observed: o,
            }),
            _ => None,
        })
        .collect()
}

/// Fields the desired policy sets and the remote does not already hold
fn usage_delta(desired: &UsagePolicy, observed: &UsagePolicy) -> CommitmentAssignmentUpdate {
    let mut delta = CommitmentAssignmentUpdate::default();

    if let Some(usage) = desired.allowed_usage {
        let same = observed
            .allowed_usage
            .is_some_and(|current| (current - usage).abs() < USAGE_EPSILON);
        if !same {
            delta.allowed_usage = Some(usage);
        }
    }
    if desired.prioritization.is_some() && desired.prioritization != observed.prioritization {
        delta.prioritization = desired.prioritization;
    }
    if desired.status.is_some() && desired.status != observed.status {
        delta.status = desired.status;
    }

    delta
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CommitmentConfig, CommitmentStatus, ConfigMatcher};

    fn gcp(name: &str, provider_id: Option<&str>) -> Commitment {
        let mut c = Commitment::new(Provider::Gcp, name);
        c.provider_id = provider_id.map(String::from);
        c.region = Some("us-central1".to_string());
        c.commitment_type = Some("COMPUTE_OPTIMIZED_C2D".to_string());
        c.cpu_cores = Some(10);
        c.memory_mib = Some(20480);
        c
    }

    fn with_policy(commitment: Commitment, usage: Option<f64>, prioritization: Option<bool>) -> DesiredCommitment {
        let mut config = CommitmentConfig::new(ConfigMatcher {
            name: commitment.name.clone(),
            region: commitment.region.clone(),
            commitment_type: commitment.commitment_type.clone(),
        });
        config.allowed_usage = usage;
        config.prioritization = prioritization;
        DesiredCommitment {
            commitment,
            config: Some(config),
        }
    }

    fn observed(id: &str, commitment: Commitment, policy: UsagePolicy) -> ObservedCommitment {
        ObservedCommitment {
            id: id.to_string(),
            commitment,
            policy,
        }
    }

    #[test]
    fn test_empty_observed_creates_everything() {
        let desired = vec![DesiredCommitment::new(gcp("a", Some("1")))];
        let plan = plan(&desired, &[], false);
        assert_eq!(plan.intents.len(), 1);
        assert_eq!(plan.intents[0].kind(), IntentKind::Create);
        assert_eq!(plan.resolved_ids, vec![None]);
    }

    #[test]
    fn test_equal_sets_plan_nothing() {
        let desired = vec![with_policy(gcp("a", Some("1")), Some(0.5), Some(true))];
        let observed = vec![observed(
            "cmt-1",
            gcp("a", Some("1")),
            UsagePolicy {
                allowed_usage: Some(0.5),
                prioritization: Some(true),
                status: None,
            },
        )];
        let plan = plan(&desired, &observed, true);
        assert!(plan.is_empty());
        assert!(plan.warnings.is_empty());
        assert_eq!(plan.resolved_ids, vec![Some("cmt-1".to_string())]);
    }

    #[test]
    fn test_policy_change_updates_only_changed_fields() {
        let desired = vec![with_policy(gcp("a", Some("1")), Some(0.7), Some(true))];
        let observed = vec![observed(
            "cmt-1",
            gcp("a", Some("1")),
            UsagePolicy {
                allowed_usage: Some(1.0),
                prioritization: Some(true),
                status: Some(CommitmentStatus::Active),
            },
        )];
        let plan = plan(&desired, &observed, false);
        assert_eq!(plan.intents.len(), 1);
        match &plan.intents[0] {
            Intent::Update { id, delta, .. } => {
                assert_eq!(id, "cmt-1");
                assert_eq!(delta.allowed_usage, Some(0.7));
                assert_eq!(delta.prioritization, None);
                assert_eq!(delta.status, None);
            }
            other => panic!("unexpected intent: {other:?}"),
        }
    }

    #[test]
    fn test_unconfigured_commitment_keeps_remote_policy() {
        let desired = vec![DesiredCommitment::new(gcp("a", Some("1")))];
        let observed = vec![observed(
            "cmt-1",
            gcp("a", Some("1")),
            UsagePolicy {
                allowed_usage: Some(0.2),
                prioritization: Some(false),
                status: Some(CommitmentStatus::Inactive),
            },
        )];
        assert!(plan(&desired, &observed, false).is_empty());
    }

    #[test]
    fn test_immutable_drift_skips_record() {
        let desired = vec![with_policy(gcp("a", Some("1")), Some(0.7), None)];
        let mut remote = gcp("a", Some("1"));
        remote.cpu_cores = Some(8);
        let observed = vec![observed("cmt-1", remote, UsagePolicy::default())];

        let plan = plan(&desired, &observed, false);
        assert!(plan.is_empty());
        assert_eq!(plan.warnings.len(), 1);
        match &plan.warnings[0] {
            Warning::ImmutableFieldDrift { id, field, desired, observed } => {
                assert_eq!(id, "cmt-1");
                assert_eq!(field, "cpu");
                assert_eq!(desired, "10");
                assert_eq!(observed, "8");
            }
            other => panic!("unexpected warning: {other:?}"),
        }
    }

    #[test]
    fn test_absent_remote_field_is_not_drift() {
        let desired = vec![DesiredCommitment::new(gcp("a", Some("1")))];
        let mut remote = gcp("a", Some("1"));
        remote.memory_mib = None;
        let plan = plan(&desired, &[observed("cmt-1", remote, UsagePolicy::default())], false);
        assert!(plan.warnings.is_empty());
    }

    #[test]
    fn test_orphans_depend_on_authoritative_mode() {
        let observed = vec![observed("cmt-9", gcp("gone", Some("9")), UsagePolicy::default())];

        let relaxed = plan(&[], &observed, false);
        assert!(relaxed.is_empty());
        assert_eq!(relaxed.warnings[0].kind(), "orphan");

        let strict = plan(&[], &observed, true);
        assert_eq!(
            strict.intents,
            vec![Intent::Delete {
                id: "cmt-9".to_string(),
                key: gcp("gone", None).key(),
            }]
        );
    }

    #[test]
    fn test_matcher_key_fallback_without_provider_id() {
        let desired = vec![DesiredCommitment::new(gcp("a", None))];
        let observed = vec![observed("cmt-1", gcp("a", None), UsagePolicy::default())];
        assert!(plan(&desired, &observed, true).is_empty());
    }

    #[test]
    fn test_intent_order_is_delete_create_update() {
        let desired = vec![
            with_policy(gcp("keep", Some("1")), Some(0.3), None),
            DesiredCommitment::new(gcp("new", Some("2"))),
        ];
        let observed = vec![
            observed("cmt-1", gcp("keep", Some("1")), UsagePolicy::default()),
            observed("cmt-3", gcp("old", Some("3")), UsagePolicy::default()),
        ];
        let plan = plan(&desired, &observed, true);
        let kinds: Vec<IntentKind> = plan.intents.iter().map(Intent::kind).collect();
        assert_eq!(kinds, IntentKind::ORDER.to_vec());

        let summary = plan.summary();
        assert_eq!((summary.deletes, summary.creates, summary.updates), (1, 1, 1));
    }

    #[test]
    fn test_observed_from_remote_normalizes() {
        let remote: RemoteCommitment = serde_json::from_value(serde_json::json!({
            "id": "cmt-1",
            "provider": "gcp",
            "name": "a",
            "region": "projects/p/regions/us-central1",
            "startTimestamp": "2023-01-01T00:00:00-07:00",
            "allowedUsage": 0.4
        }))
        .unwrap();
        let o = ObservedCommitment::from_remote(remote);
        assert_eq!(o.commitment.region.as_deref(), Some("us-central1"));
        assert_eq!(o.commitment.start_timestamp.as_deref(), Some("2023-01-01T07:00:00Z"));
        assert_eq!(o.policy.allowed_usage, Some(0.4));
    }
}
