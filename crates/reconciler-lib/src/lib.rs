//! Commitment and reservation reconciliation engine
//!
//! This crate provides the core functionality for:
//! - Parsing GCP CUD imports and Azure reservation exports
//! - Normalizing them into uniform [`Commitment`] records
//! - Matching user configs against imported commitments
//! - Planning and applying changes against the control plane inventory
//! - Projecting the reconciled set back to flat attributes

pub mod error;
pub mod import;
pub mod inventory;
pub mod matcher;
pub mod models;
pub mod normalize;
pub mod observability;
pub mod projector;
pub mod reconcile;
pub mod report;

pub use error::{CycleError, ImportError, ImportErrors, InventoryError, MatchError, MatchErrors, TransportError};
pub use import::{InputDocument, SourceFormat};
pub use inventory::{HttpInventoryClient, HttpInventoryClientBuilder, InventoryApi};
pub use models::*;
pub use observability::{ReconcilerMetrics, StructuredLogger};
pub use projector::ProjectedCommitment;
pub use reconcile::{CycleInput, CycleState, ReconcileCycle, ReconcileOptions};
pub use report::{CycleReport, Warning};
