//! Observability for reconcile cycles
//!
//! Provides:
//! - Prometheus metrics (cycle outcomes, intent results, cycle and API latency, warnings)
//! - Structured logging of cycle transitions, intent outcomes and warnings

use crate::reconcile::{CycleState, IntentOutcome, IntentResult};
use crate::report::Warning;
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter_vec, Histogram,
    HistogramVec, IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{error, info, warn};

/// Buckets for API call latency (in seconds)
const API_LATENCY_BUCKETS: &[f64] = &[0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

/// Buckets for whole-cycle duration (in seconds)
const CYCLE_BUCKETS: &[f64] = &[0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0];

static GLOBAL_METRICS: OnceLock<ReconcilerMetricsInner> = OnceLock::new();

struct ReconcilerMetricsInner {
    cycles_total: IntCounterVec,
    intents_total: IntCounterVec,
    cycle_duration_seconds: Histogram,
    api_latency_seconds: HistogramVec,
    warnings_total: IntCounterVec,
}

impl ReconcilerMetricsInner {
    fn new() -> Self {
        Self {
            cycles_total: register_int_counter_vec!(
                "commitment_reconciler_cycles_total",
                "Reconcile cycles by terminal outcome",
                &["outcome"]
            )
            .expect("Failed to register cycles_total"),

            intents_total: register_int_counter_vec!(
                "commitment_reconciler_intents_total",
                "Executed intents by kind and result",
                &["kind", "result"]
            )
            .expect("Failed to register intents_total"),

            cycle_duration_seconds: register_histogram!(
                "commitment_reconciler_cycle_duration_seconds",
                "Wall time of a reconcile cycle",
                CYCLE_BUCKETS.to_vec()
            )
            .expect("Failed to register cycle_duration_seconds"),

            api_latency_seconds: register_histogram_vec!(
                "commitment_reconciler_api_latency_seconds",
                "Latency of control-plane calls",
                &["operation"],
                API_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register api_latency_seconds"),

            warnings_total: register_int_counter_vec!(
                "commitment_reconciler_warnings_total",
                "Non-fatal diagnostics by kind",
                &["kind"]
            )
            .expect("Failed to register warnings_total"),
        }
    }
}

/// Handle to the process-wide reconciler metrics; clones share them
#[derive(Clone)]
pub struct ReconcilerMetrics {
    _private: (),
}

impl Default for ReconcilerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ReconcilerMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ReconcilerMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ReconcilerMetricsInner {
        GLOBAL_METRICS.get_or_init(ReconcilerMetricsInner::new)
    }

    /// `outcome` is a terminal state name or `error` for fatal pre-plan failures
    pub fn inc_cycle(&self, outcome: &str) {
        self.inner().cycles_total.with_label_values(&[outcome]).inc();
    }

    pub fn observe_cycle_duration(&self, duration_secs: f64) {
        self.inner().cycle_duration_seconds.observe(duration_secs);
    }

    pub fn inc_intent(&self, kind: &str, result: &str) {
        self.inner()
            .intents_total
            .with_label_values(&[kind, result])
            .inc();
    }

    pub fn observe_api_latency(&self, operation: &str, duration_secs: f64) {
        self.inner()
            .api_latency_seconds
            .with_label_values(&[operation])
            .observe(duration_secs);
    }

    pub fn inc_warning(&self, kind: &str) {
        self.inner().warnings_total.with_label_values(&[kind]).inc();
    }
}

/// Structured logger for reconcile events.
///
/// Every record carries the cycle's `source` label so that concurrent
/// cycles can be told apart.
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    source: String,
}

impl StructuredLogger {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Log a state machine transition
    pub fn log_transition(&self, from: CycleState, to: CycleState) {
        info!(
            event = "cycle_transition",
            source = %self.source,
            from = %from,
            to = %to,
            "Reconcile cycle state changed"
        );
    }

    pub fn log_warning(&self, warning: &Warning) {
        warn!(
            event = "reconcile_warning",
            source = %self.source,
            kind = warning.kind(),
            details = %warning,
            "Reconcile warning"
        );
    }

    /// Log the outcome of one executed or skipped intent
    pub fn log_intent(&self, outcome: &IntentOutcome) {
        match &outcome.result {
            IntentResult::Ok { status } => info!(
                event = "intent_applied",
                source = %self.source,
                kind = %outcome.kind,
                key = %outcome.key,
                status = status,
                "Intent applied"
            ),
            IntentResult::Failed { status, body } => warn!(
                event = "intent_failed",
                source = %self.source,
                kind = %outcome.kind,
                key = %outcome.key,
                status = status,
                body = %body,
                "Intent rejected by control plane"
            ),
            IntentResult::Transport { error } => error!(
                event = "intent_transport_error",
                source = %self.source,
                kind = %outcome.kind,
                key = %outcome.key,
                error = %error,
                "Transport failure, aborting cycle"
            ),
            IntentResult::Skipped => info!(
                event = "intent_skipped",
                source = %self.source,
                kind = %outcome.kind,
                key = %outcome.key,
                "Intent skipped"
            ),
        }
    }

    pub fn log_cycle_finished(&self, state: CycleState, intents: usize, warnings: usize, duration_secs: f64) {
        match state {
            CycleState::Done => info!(
                event = "cycle_finished",
                source = %self.source,
                state = %state,
                intents = intents,
                warnings = warnings,
                duration_secs = duration_secs,
                "Reconcile cycle finished"
            ),
            _ => warn!(
                event = "cycle_finished",
                source = %self.source,
                state = %state,
                intents = intents,
                warnings = warnings,
                duration_secs = duration_secs,
                "Reconcile cycle finished with failures"
            ),
        }
    }

    /// Log a fatal pre-plan failure
    pub fn log_cycle_failed(&self, state: CycleState, reason: &str) {
        error!(
            event = "cycle_failed",
            source = %self.source,
            state = %state,
            reason = %reason,
            "Reconcile cycle failed before apply"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_handles_share_registry() {
        let metrics = ReconcilerMetrics::new();
        let clone = metrics.clone();

        metrics.inc_cycle(CycleState::Done.as_str());
        clone.inc_intent("CREATE", "ok");
        clone.observe_api_latency("create", 0.02);
        metrics.observe_cycle_duration(1.5);
        metrics.inc_warning("orphan");

        let count = metrics
            .inner()
            .intents_total
            .with_label_values(&["CREATE", "ok"])
            .get();
        assert!(count >= 1);
    }

    #[test]
    fn test_structured_logger_source() {
        let logger = StructuredLogger::new("reservations.csv");
        assert_eq!(logger.source(), "reservations.csv");
    }
}
