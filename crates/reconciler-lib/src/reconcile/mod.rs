//! Convergence of the remote inventory to the desired commitment set
//!
//! This module provides:
//! - [`plan()`]: a pure diff producing ordered intents
//! - [`Applier`]: bounded-concurrency execution of a plan
//! - [`ReconcileCycle`]: the parse → normalize → match → plan → apply state machine

mod apply;
mod cycle;
mod plan;


pub use apply::{Applier, ApplyReport, ApplyStatus, IntentOutcome, IntentResult};
pub use cycle::{CycleInput, CycleState, ReconcileCycle, ReconcileOptions};
pub use plan::{plan, Intent, IntentKind, ObservedCommitment, Plan, PlanSummary};
