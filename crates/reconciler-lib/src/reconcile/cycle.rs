//! End-to-end reconcile cycle

use super::apply::{is_cancelled, Applier, ApplyStatus};
use super::plan::{plan, ObservedCommitment};
use crate::error::{CycleResult, InventoryError, TransportError};
use crate::import::{read_documents, InputDocument};
use crate::inventory::{InventoryApi, RemoteCommitment};
use crate::matcher::match_configs;
use crate::models::CommitmentConfig;
use crate::normalize::normalize_all;
use crate::observability::{ReconcilerMetrics, StructuredLogger};
use crate::projector::project;
use crate::report::{CycleReport, Warning};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

/// States of a reconcile cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleState {
    Idle,
    Parsing,
    Normalizing,
    Matching,
    Planning,
    Applying,
    Done,
    PartialFailure,
    Aborted,
}

impl CycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleState::Idle => "idle",
            CycleState::Parsing => "parsing",
            CycleState::Normalizing => "normalizing",
            CycleState::Matching => "matching",
            CycleState::Planning => "planning",
            CycleState::Applying => "applying",
            CycleState::Done => "done",
            CycleState::PartialFailure => "partial_failure",
            CycleState::Aborted => "aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CycleState::Done | CycleState::PartialFailure | CycleState::Aborted
        )
    }
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Knobs of a cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileOptions {
    /// Delete remote commitments absent from the desired set
    pub authoritative: bool,
    /// Maximum in-flight API calls within a kind group
    pub concurrency: usize,
    /// Deadline of each API call
    #[serde(with = "duration_secs")]
    pub call_timeout: Duration,
    /// Stop after planning
    pub dry_run: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            authoritative: false,
            concurrency: 4,
            call_timeout: Duration::from_secs(60),
            dry_run: false,
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

/// Inputs owned by one cycle
#[derive(Debug, Clone, Default)]
pub struct CycleInput {
    /// Documents in the order their records should be matched
    pub documents: Vec<InputDocument>,
    pub configs: Vec<CommitmentConfig>,
}

/// One reconcile invocation: parse, normalize, match, plan, apply.
///
/// Holds no state beyond the current run; concurrent cycles each need their
/// own instance.
pub struct ReconcileCycle {
    api: Arc<dyn InventoryApi>,
    options: ReconcileOptions,
    logger: StructuredLogger,
    metrics: ReconcilerMetrics,
    state: CycleState,
}

impl ReconcileCycle {
    pub fn new(api: Arc<dyn InventoryApi>, options: ReconcileOptions) -> Self {
        Self {
            api,
            options,
            logger: StructuredLogger::new("reconcile"),
            metrics: ReconcilerMetrics::new(),
            state: CycleState::Idle,
        }
    }

    /// Label attached to every log record of this cycle
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.logger = StructuredLogger::new(source);
        self
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn options(&self) -> &ReconcileOptions {
        &self.options
    }

    fn transition(&mut self, to: CycleState) {
        self.logger.log_transition(self.state, to);
        self.state = to;
    }

    /// Run the cycle to a terminal state.
    ///
    /// Parse, match and observation failures return `Err` before any
    /// mutating call. Once applying starts, the outcome is in the report.
    pub async fn run(
        &mut self,
        input: CycleInput,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> CycleResult<CycleReport> {
        let started = Instant::now();
        let result = self.execute(input, shutdown).await;
        let elapsed = started.elapsed().as_secs_f64();
        self.metrics.observe_cycle_duration(elapsed);

        match &result {
            Ok(report) => {
                self.metrics.inc_cycle(report.state.as_str());
                self.logger.log_cycle_finished(
                    report.state,
                    report.intents.len(),
                    report.warnings.len(),
                    elapsed,
                );
            }
            Err(e) => {
                self.metrics.inc_cycle("error");
                self.logger.log_cycle_failed(self.state, &e.to_string());
                self.state = CycleState::Aborted;
            }
        }

        result
    }

    async fn execute(
        &mut self,
        input: CycleInput,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> CycleResult<CycleReport> {
        let CycleInput { documents, configs } = input;

        self.transition(CycleState::Parsing);
        let commitments = read_documents(&documents)?;

        self.transition(CycleState::Normalizing);
        let (normalized, mut warnings) = normalize_all(commitments)?;

        self.transition(CycleState::Matching);
        let matched = match_configs(normalized, &configs)?;
        warnings.extend(matched.warnings);
        let desired = matched.desired;

        self.transition(CycleState::Planning);
        if is_cancelled(shutdown) {
            self.report_warnings(&warnings);
            self.transition(CycleState::Aborted);
            return Ok(CycleReport {
                state: CycleState::Aborted,
                dry_run: self.options.dry_run,
                plan: Default::default(),
                commitments: project(&desired, &[]),
                intents: Vec::new(),
                outcomes: Vec::new(),
                warnings,
                abort_reason: Some("cancelled".to_string()),
                completed: 0,
                skipped: 0,
            });
        }

        let observed: Vec<ObservedCommitment> = self
            .observe()
            .await?
            .into_iter()
            .map(ObservedCommitment::from_remote)
            .collect();
        let plan = plan(&desired, &observed, self.options.authoritative);
        warnings.extend(plan.warnings.iter().cloned());
        self.report_warnings(&warnings);

        if self.options.dry_run {
            self.transition(CycleState::Done);
            return Ok(CycleReport {
                state: CycleState::Done,
                dry_run: true,
                plan: plan.summary(),
                commitments: project(&desired, &plan.resolved_ids),
                intents: plan.intents,
                outcomes: Vec::new(),
                warnings,
                abort_reason: None,
                completed: 0,
                skipped: 0,
            });
        }

        self.transition(CycleState::Applying);
        let applier = Applier::new(Arc::clone(&self.api), &self.options, self.logger.clone());
        let applied = applier.apply(&plan, shutdown).await;

        let mut ids = plan.resolved_ids.clone();
        for (index, id) in applied.created_ids() {
            if let Some(slot) = ids.get_mut(index) {
                *slot = Some(id.to_string());
            }
        }

        let ran = applied.outcomes.len();
        let (state, abort_reason, completed, skipped) = match applied.status {
            ApplyStatus::Completed => (CycleState::Done, None, ran, 0),
            ApplyStatus::PartialFailure => (CycleState::PartialFailure, None, ran, 0),
            ApplyStatus::Aborted {
                reason,
                completed,
                skipped,
            } => (CycleState::Aborted, Some(reason), completed, skipped),
        };
        self.transition(state);

        Ok(CycleReport {
            state,
            dry_run: false,
            plan: plan.summary(),
            commitments: project(&desired, &ids),
            intents: plan.intents,
            outcomes: applied.outcomes,
            warnings,
            abort_reason,
            completed,
            skipped,
        })
    }

    /// List the remote inventory under the per-call deadline
    async fn observe(&self) -> Result<Vec<RemoteCommitment>, InventoryError> {
        let deadline = self.options.call_timeout;
        let started = Instant::now();
        let result = tokio::time::timeout(deadline, self.api.list_commitments()).await;
        self.metrics
            .observe_api_latency("list", started.elapsed().as_secs_f64());
        match result {
            Ok(listed) => listed,
            Err(_) => Err(TransportError::Deadline(deadline).into()),
        }
    }

    fn report_warnings(&self, warnings: &[Warning]) {
        for warning in warnings {
            self.metrics.inc_warning(warning.kind());
            self.logger.log_warning(warning);
        }
    }
}
