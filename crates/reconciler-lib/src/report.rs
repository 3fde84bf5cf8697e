//! Diagnostics and the structured report returned by a reconcile cycle

use crate::models::{MatcherKey, Provider};
use crate::projector::ProjectedCommitment;
use crate::reconcile::{CycleState, Intent, IntentOutcome, PlanSummary};
use serde::Serialize;
use thiserror::Error;

/// A non-fatal condition surfaced on the cycle's diagnostic channel.
/// Warnings change the report, never the outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    #[error("{key}: unknown {provider} plan {plan:?} kept as-is")]
    UnknownPlan {
        key: MatcherKey,
        provider: Provider,
        plan: String,
    },

    #[error("config ({matcher}) matched {} commitments; attached to {attached_to}", .others.len() + 1)]
    DuplicateMatch {
        matcher: String,
        attached_to: MatcherKey,
        others: Vec<MatcherKey>,
    },

    #[error("remote commitment {id} ({key}) is not in the desired set")]
    Orphan { id: String, key: MatcherKey },

    #[error("remote commitment {id}: immutable field {field} drifted (desired {desired:?}, observed {observed:?}); record skipped")]
    ImmutableFieldDrift {
        id: String,
        field: String,
        desired: String,
        observed: String,
    },
}

impl Warning {
    /// Short machine-readable kind, used as a log and metric label
    pub fn kind(&self) -> &'static str {
        match self {
            Warning::UnknownPlan { .. } => "unknown_plan",
            Warning::DuplicateMatch { .. } => "duplicate_match",
            Warning::Orphan { .. } => "orphan",
            Warning::ImmutableFieldDrift { .. } => "immutable_field_drift",
        }
    }
}

/// Result of one end-to-end cycle
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    /// Terminal state of the cycle
    pub state: CycleState,
    pub dry_run: bool,
    pub plan: PlanSummary,
    pub intents: Vec<Intent>,
    pub outcomes: Vec<IntentOutcome>,
    pub warnings: Vec<Warning>,
    pub commitments: Vec<ProjectedCommitment>,
    /// Set when the cycle was aborted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<String>,
    /// Intents that ran to a result
    pub completed: usize,
    /// Intents never started
    pub skipped: usize,
}

impl CycleReport {
    pub fn failed_outcomes(&self) -> impl Iterator<Item = &IntentOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_failure())
    }

    /// Whether the host should treat the cycle as successful
    pub fn is_success(&self) -> bool {
        matches!(self.state, CycleState::Done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_display_and_kind() {
        let warning = Warning::DuplicateMatch {
            matcher: "name=cud region=* type=*".to_string(),
            attached_to: MatcherKey::new("cud", Some("us-east1"), None),
            others: vec![MatcherKey::new("cud", Some("us-west1"), None)],
        };
        assert_eq!(warning.kind(), "duplicate_match");
        assert!(warning.to_string().contains("matched 2 commitments"));
    }

    #[test]
    fn test_warning_serializes_with_kind_tag() {
        let warning = Warning::Orphan {
            id: "cmt-1".to_string(),
            key: MatcherKey::new("cud", None, None),
        };
        let json = serde_json::to_value(&warning).unwrap();
        assert_eq!(json["kind"], "orphan");
        assert_eq!(json["id"], "cmt-1");
    }
}
