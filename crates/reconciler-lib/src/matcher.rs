//! Joins user configs to imported commitments by `(name, region, type)`

use crate::error::{MatchError, MatchErrors};
use crate::models::{Commitment, CommitmentConfig, DesiredCommitment, MatcherKey, Provider};
use crate::report::Warning;
use std::collections::HashMap;
use tracing::debug;

/// Fused commitments plus non-fatal matcher diagnostics
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    pub desired: Vec<DesiredCommitment>,
    pub warnings: Vec<Warning>,
}

/// Attach configs to commitments.
///
/// Configs are processed in declaration order. When several commitments
/// match, the config goes to the first one in parse order and the rest are
/// listed in a [`Warning::DuplicateMatch`]. Any config matching nothing fails
/// the whole match; all failures are reported together.
pub fn match_configs(
    commitments: Vec<Commitment>,
    configs: &[CommitmentConfig],
) -> Result<MatchOutcome, MatchErrors> {
    let mut by_name: HashMap<&str, Vec<usize>> = HashMap::new();
    for (idx, commitment) in commitments.iter().enumerate() {
        by_name.entry(commitment.name.as_str()).or_default().push(idx);
    }

    let mut attached: Vec<Option<usize>> = vec![None; commitments.len()];
    let mut warnings = Vec::new();
    let mut errors = Vec::new();

    for (config_idx, config) in configs.iter().enumerate() {
        let matcher = config.matcher.to_string();

        if let Err(reason) = config.validate() {
            errors.push(MatchError::InvalidConfig { matcher, reason });
            continue;
        }

        let candidates: Vec<usize> = by_name
            .get(config.matcher.name.as_str())
            .map(|indices| {
                indices
                    .iter()
                    .copied()
                    .filter(|&i| config.matcher.selects(&commitments[i]))
                    .collect()
            })
            .unwrap_or_default();

        if candidates.is_empty() {
            errors.push(MatchError::Unmatched { matcher });
            continue;
        }

        if config.matcher.region.is_none() {
            if let Some(&gcp) = candidates
                .iter()
                .find(|&&i| commitments[i].provider == Provider::Gcp)
            {
                errors.push(MatchError::RegionRequired {
                    matcher,
                    key: commitments[gcp].key().to_string(),
                });
                continue;
            }
        }

        let Some(&first) = candidates.iter().find(|&&i| attached[i].is_none()) else {
            errors.push(MatchError::AlreadyClaimed {
                matcher,
                key: commitments[candidates[0]].key().to_string(),
            });
            continue;
        };

        let others: Vec<MatcherKey> = candidates
            .iter()
            .filter(|&&i| i != first)
            .map(|&i| commitments[i].key())
            .collect();
        if !others.is_empty() {
            warnings.push(Warning::DuplicateMatch {
                matcher,
                attached_to: commitments[first].key(),
                others,
            });
        }

        debug!(
            config = config_idx,
            commitment = %commitments[first].key(),
            "Attached config to commitment"
        );
        attached[first] = Some(config_idx);
    }

    if !errors.is_empty() {
        return Err(MatchErrors(errors));
    }

    let desired = commitments
        .into_iter()
        .zip(attached)
        .map(|(commitment, config_idx)| DesiredCommitment {
            commitment,
            config: config_idx.map(|i| configs[i].clone()),
        })
        .collect();

    Ok(MatchOutcome { desired, warnings })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CommitmentStatus, ConfigMatcher};

    fn commitment(provider: Provider, name: &str, region: &str, commitment_type: &str) -> Commitment {
        let mut c = Commitment::new(provider, name);
        c.region = Some(region.to_string());
        c.commitment_type = Some(commitment_type.to_string());
        c
    }

    fn config(name: &str, region: Option<&str>, commitment_type: Option<&str>) -> CommitmentConfig {
        CommitmentConfig::new(ConfigMatcher {
            name: name.to_string(),
            region: region.map(String::from),
            commitment_type: commitment_type.map(String::from),
        })
    }

    #[test]
    fn test_exact_matches_attach_without_warnings() {
        let commitments = vec![
            commitment(Provider::Gcp, "a", "us-central1", "C2D"),
            commitment(Provider::Gcp, "b", "us-east1", "N2"),
        ];
        let mut cfg = config("b", Some("us-east1"), Some("N2"));
        cfg.allowed_usage = Some(0.5);
        cfg.status = Some(CommitmentStatus::Inactive);

        let outcome = match_configs(commitments, &[cfg.clone()]).unwrap();
        assert!(outcome.warnings.is_empty());
        assert!(outcome.desired[0].config.is_none());
        assert_eq!(outcome.desired[1].config.as_ref(), Some(&cfg));
        assert_eq!(outcome.desired[1].policy().allowed_usage, Some(0.5));
    }

    #[test]
    fn test_region_matching_ignores_case() {
        let commitments = vec![commitment(Provider::Gcp, "a", "us-central1", "C2D")];
        let outcome = match_configs(commitments, &[config("a", Some("US-CENTRAL1"), None)]).unwrap();
        assert!(outcome.desired[0].config.is_some());
    }

    #[test]
    fn test_type_matching_is_case_sensitive() {
        let commitments = vec![commitment(Provider::Gcp, "a", "us-central1", "C2D")];
        let errors = match_configs(commitments, &[config("a", Some("us-central1"), Some("c2d"))])
            .unwrap_err();
        assert!(matches!(errors.0[0], MatchError::Unmatched { .. }));
    }

    #[test]
    fn test_unmatched_config_is_fatal() {
        let commitments = vec![commitment(Provider::Azure, "a", "eastus", "D4")];
        let errors = match_configs(
            commitments,
            &[config("missing", None, None), config("also-missing", None, None)],
        )
        .unwrap_err();
        assert_eq!(errors.0.len(), 2);
    }

    #[test]
    fn test_duplicate_match_attaches_to_first() {
        let commitments = vec![
            commitment(Provider::Azure, "res", "eastus", "D4"),
            commitment(Provider::Azure, "res", "westus", "D4"),
        ];
        let outcome = match_configs(commitments, &[config("res", None, Some("D4"))]).unwrap();

        assert!(outcome.desired[0].config.is_some());
        assert!(outcome.desired[1].config.is_none());
        assert_eq!(outcome.warnings.len(), 1);
        match &outcome.warnings[0] {
            Warning::DuplicateMatch { others, attached_to, .. } => {
                assert_eq!(attached_to.region.as_deref(), Some("eastus"));
                assert_eq!(others.len(), 1);
                assert_eq!(others[0].region.as_deref(), Some("westus"));
            }
            other => panic!("unexpected warning: {other:?}"),
        }
    }

    #[test]
    fn test_gcp_config_requires_region() {
        let commitments = vec![commitment(Provider::Gcp, "cud", "us-central1", "C2D")];
        let errors = match_configs(commitments, &[config("cud", None, Some("C2D"))]).unwrap_err();
        assert!(matches!(errors.0[0], MatchError::RegionRequired { .. }));
    }

    #[test]
    fn test_second_config_takes_next_unclaimed() {
        let commitments = vec![
            commitment(Provider::Azure, "res", "eastus", "D4"),
            commitment(Provider::Azure, "res", "westus", "D4"),
        ];
        let outcome = match_configs(
            commitments,
            &[config("res", None, None), config("res", None, None)],
        )
        .unwrap();
        assert!(outcome.desired.iter().all(|d| d.config.is_some()));
    }

    #[test]
    fn test_commitment_claimed_once() {
        let commitments = vec![commitment(Provider::Azure, "res", "eastus", "D4")];
        let errors = match_configs(
            commitments,
            &[config("res", Some("eastus"), None), config("res", None, Some("D4"))],
        )
        .unwrap_err();
        assert!(matches!(errors.0[0], MatchError::AlreadyClaimed { .. }));
    }

    #[test]
    fn test_invalid_allowed_usage_is_rejected() {
        let commitments = vec![commitment(Provider::Azure, "res", "eastus", "D4")];
        let mut cfg = config("res", None, None);
        cfg.allowed_usage = Some(-0.1);
        let errors = match_configs(commitments, &[cfg]).unwrap_err();
        assert!(matches!(errors.0[0], MatchError::InvalidConfig { .. }));
    }

    #[test]
    fn test_no_configs_keeps_defaults() {
        let commitments = vec![commitment(Provider::Azure, "res", "eastus", "D4")];
        let outcome = match_configs(commitments, &[]).unwrap();
        assert_eq!(outcome.desired.len(), 1);
        assert!(outcome.desired[0].policy().is_empty());
    }
}
