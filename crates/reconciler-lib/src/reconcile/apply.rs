//! Drives a plan through the [`InventoryApi`]
//!
//! Kind groups run in DELETE, CREATE, UPDATE order with a barrier between
//! them. Within a group up to `concurrency` calls are in flight. A non-expected
//! status fails only its own intent; a transport error or a cancellation
//! stops new submissions, lets in-flight calls finish and skips the rest.

use super::cycle::ReconcileOptions;
use super::plan::{Intent, IntentKind, Plan};
use crate::error::TransportError;
use crate::inventory::{ApiResponse, InventoryApi};
use crate::models::MatcherKey;
use crate::observability::{ReconcilerMetrics, StructuredLogger};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::task::{JoinError, JoinSet};
use tracing::debug;

/// Longest response body kept in a failed outcome
const BODY_EXCERPT_CHARS: usize = 512;

/// Result of a single intent
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum IntentResult {
    Ok { status: u16 },
    Failed { status: u16, body: String },
    Transport { error: String },
    Skipped,
}

impl IntentResult {
    pub fn is_failure(&self) -> bool {
        matches!(self, IntentResult::Failed { .. } | IntentResult::Transport { .. })
    }

    /// Metric label
    pub fn label(&self) -> &'static str {
        match self {
            IntentResult::Ok { .. } => "ok",
            IntentResult::Failed { .. } => "failed",
            IntentResult::Transport { .. } => "transport",
            IntentResult::Skipped => "skipped",
        }
    }
}

/// Per-intent entry of an [`ApplyReport`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentOutcome {
    pub kind: IntentKind,
    pub key: MatcherKey,
    /// Remote id targeted, or assigned by a successful create
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    #[serde(flatten)]
    pub result: IntentResult,
}

/// How an apply run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ApplyStatus {
    Completed,
    PartialFailure,
    Aborted {
        completed: usize,
        skipped: usize,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplyReport {
    /// One outcome per intent, in plan order
    pub outcomes: Vec<IntentOutcome>,
    pub status: ApplyStatus,
}

impl ApplyReport {
    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_failure()).count()
    }

    /// Remote ids assigned by successful creates, by desired index
    pub fn created_ids(&self) -> impl Iterator<Item = (usize, &str)> {
        self.outcomes.iter().filter_map(|o| match (&o.result, o.kind, o.index, &o.id) {
            (IntentResult::Ok { .. }, IntentKind::Create, Some(index), Some(id)) => {
                Some((index, id.as_str()))
            }
            _ => None,
        })
    }
}

fn expected_status(kind: IntentKind) -> u16 {
    match kind {
        IntentKind::Delete => 204,
        IntentKind::Create => 201,
        IntentKind::Update => 200,
    }
}

fn operation(kind: IntentKind) -> &'static str {
    match kind {
        IntentKind::Delete => "delete",
        IntentKind::Create => "create",
        IntentKind::Update => "update",
    }
}

/// Signal received, or lagged past one
pub(super) fn is_cancelled(shutdown: &mut broadcast::Receiver<()>) -> bool {
    matches!(shutdown.try_recv(), Ok(()) | Err(TryRecvError::Lagged(_)))
}

async fn execute(
    api: &dyn InventoryApi,
    intent: &Intent,
    deadline: Duration,
) -> Result<ApiResponse, TransportError> {
    let call = async {
        match intent {
            Intent::Delete { id, .. } => api.delete_commitment(id).await,
            Intent::Create { payload, .. } => api.create_commitment(payload).await,
            Intent::Update { id, delta, .. } => api.update_commitment(id, delta).await,
        }
    };

    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Deadline(deadline)),
    }
}

type CallResult = (usize, Result<ApiResponse, TransportError>, Duration);

struct ApplyState {
    results: Vec<Option<IntentResult>>,
    created: Vec<Option<String>>,
    abort: Option<String>,
}

/// Executes plans against one inventory handle
pub struct Applier {
    api: Arc<dyn InventoryApi>,
    concurrency: usize,
    call_timeout: Duration,
    metrics: ReconcilerMetrics,
    logger: StructuredLogger,
}

impl Applier {
    pub fn new(api: Arc<dyn InventoryApi>, options: &ReconcileOptions, logger: StructuredLogger) -> Self {
        Self {
            api,
            concurrency: options.concurrency.max(1),
            call_timeout: options.call_timeout,
            metrics: ReconcilerMetrics::new(),
            logger,
        }
    }

    /// Execute every intent of `plan`, honouring kind barriers, the
    /// concurrency bound and the cancellation signal
    pub async fn apply(&self, plan: &Plan, shutdown: &mut broadcast::Receiver<()>) -> ApplyReport {
        let intents = &plan.intents;
        let mut state = ApplyState {
            results: vec![None; intents.len()],
            created: vec![None; intents.len()],
            abort: None,
        };

        for kind in IntentKind::ORDER {
            let mut tasks: JoinSet<CallResult> = JoinSet::new();

            for (idx, intent) in intents.iter().enumerate().filter(|(_, i)| i.kind() == kind) {
                if state.abort.is_none() && is_cancelled(shutdown) {
                    state.abort = Some("cancelled".to_string());
                }
                if state.abort.is_some() {
                    break;
                }

                while tasks.len() >= self.concurrency {
                    match tasks.join_next().await {
                        Some(joined) => self.record(&mut state, intents, joined),
                        None => break,
                    }
                }
                if state.abort.is_some() {
                    break;
                }

                debug!(intent = %intent, "Submitting intent");
                let api = Arc::clone(&self.api);
                let intent = intent.clone();
                let deadline = self.call_timeout;
                tasks.spawn(async move {
                    let started = Instant::now();
                    let call =
                        tokio::spawn(async move { execute(api.as_ref(), &intent, deadline).await });
                    let result = match call.await {
                        Ok(result) => result,
                        Err(e) => Err(TransportError::Request(format!("call task failed: {e}"))),
                    };
                    (idx, result, started.elapsed())
                });
            }

            while let Some(joined) = tasks.join_next().await {
                self.record(&mut state, intents, joined);
            }

            if state.abort.is_some() {
                break;
            }
        }

        self.finish(intents, state)
    }

    fn record(&self, state: &mut ApplyState, intents: &[Intent], joined: Result<CallResult, JoinError>) {
        let (idx, result, elapsed) = match joined {
            Ok(call) => call,
            Err(e) => {
                state
                    .abort
                    .get_or_insert_with(|| format!("apply task failed: {e}"));
                return;
            }
        };

        let kind = intents[idx].kind();
        self.metrics
            .observe_api_latency(operation(kind), elapsed.as_secs_f64());

        let outcome = match result {
            Ok(response) if response.status == expected_status(kind) => {
                if kind == IntentKind::Create {
                    state.created[idx] = response.created_id();
                }
                IntentResult::Ok {
                    status: response.status,
                }
            }
            Ok(response) => IntentResult::Failed {
                status: response.status,
                body: response.body_excerpt(BODY_EXCERPT_CHARS),
            },
            Err(e) => {
                let error = e.to_string();
                state.abort.get_or_insert_with(|| error.clone());
                IntentResult::Transport { error }
            }
        };
        state.results[idx] = Some(outcome);
    }

    fn finish(&self, intents: &[Intent], state: ApplyState) -> ApplyReport {
        let ApplyState {
            results,
            created,
            abort,
        } = state;

        let outcomes: Vec<IntentOutcome> = intents
            .iter()
            .zip(results)
            .zip(created)
            .map(|((intent, result), created_id)| {
                let outcome = IntentOutcome {
                    kind: intent.kind(),
                    key: intent.key().clone(),
                    id: intent.remote_id().map(str::to_string).or(created_id),
                    index: intent.desired_index(),
                    result: result.unwrap_or(IntentResult::Skipped),
                };
                self.metrics
                    .inc_intent(outcome.kind.as_str(), outcome.result.label());
                self.logger.log_intent(&outcome);
                outcome
            })
            .collect();

        let skipped = outcomes
            .iter()
            .filter(|o| o.result == IntentResult::Skipped)
            .count();

        let status = match abort {
            Some(reason) => ApplyStatus::Aborted {
                completed: outcomes.len() - skipped,
                skipped,
                reason,
            },
            None if outcomes.iter().any(|o| o.result.is_failure()) => ApplyStatus::PartialFailure,
            None => ApplyStatus::Completed,
        };

        ApplyReport { outcomes, status }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_statuses() {
        assert_eq!(expected_status(IntentKind::Create), 201);
        assert_eq!(expected_status(IntentKind::Update), 200);
        assert_eq!(expected_status(IntentKind::Delete), 204);
    }

    #[test]
    fn test_intent_result_failure_kinds() {
        assert!(!IntentResult::Ok { status: 201 }.is_failure());
        assert!(!IntentResult::Skipped.is_failure());
        assert!(IntentResult::Failed {
            status: 500,
            body: String::new()
        }
        .is_failure());
        assert!(IntentResult::Transport {
            error: "reset".to_string()
        }
        .is_failure());
    }

    #[test]
    fn test_cancellation_detection() {
        let (tx, mut rx) = broadcast::channel::<()>(1);
        assert!(!is_cancelled(&mut rx));
        tx.send(()).unwrap();
        assert!(is_cancelled(&mut rx));

        drop(tx);
        assert!(!is_cancelled(&mut rx));
    }

    #[test]
    fn test_outcome_serializes_flat() {
        let outcome = IntentOutcome {
            kind: IntentKind::Update,
            key: MatcherKey::new("cud", Some("us-east1"), None),
            id: Some("cmt-1".to_string()),
            index: Some(0),
            result: IntentResult::Failed {
                status: 409,
                body: "conflict".to_string(),
            },
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["kind"], "UPDATE");
        assert_eq!(json["result"], "failed");
        assert_eq!(json["status"], 409);
    }
}
