//! Remote commitment inventory
//!
//! [`InventoryApi`] is the seam between the reconciler and the control
//! plane. Mutating calls return the raw HTTP status and body so the
//! applier can judge them; only connectivity and deadline failures are
//! errors.

mod http;
mod types;

pub use http::{HttpInventoryClient, HttpInventoryClientBuilder, COMMITMENTS_PATH};
pub use types::{
    CommitmentAssignmentUpdate, CommitmentImport, ListCommitmentsResponse, RemoteCommitment,
};

use crate::error::{InventoryError, TransportError};
use async_trait::async_trait;
use serde::Serialize;

/// Status and body of a control-plane response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Remote id assigned by a create call, read from `id` or `commitment.id`
    pub fn created_id(&self) -> Option<String> {
        let value: serde_json::Value = serde_json::from_str(&self.body).ok()?;
        value
            .get("id")
            .or_else(|| value.get("commitment").and_then(|c| c.get("id")))
            .and_then(|id| id.as_str())
            .map(str::to_string)
    }

    /// Body trimmed to at most `max` characters for reports
    pub fn body_excerpt(&self, max: usize) -> String {
        let trimmed = self.body.trim();
        if trimmed.chars().count() <= max {
            return trimmed.to_string();
        }
        let mut excerpt: String = trimmed.chars().take(max).collect();
        excerpt.push_str("...");
        excerpt
    }
}

/// Typed access to the control plane's commitment inventory.
///
/// Implementations must be safe for concurrent use by as many callers as
/// the applier's concurrency bound. No retries are expected at this layer
/// beyond what the implementation itself chooses to do.
#[async_trait]
pub trait InventoryApi: Send + Sync {
    /// Observe every commitment currently stored
    async fn list_commitments(&self) -> Result<Vec<RemoteCommitment>, InventoryError>;

    async fn create_commitment(
        &self,
        payload: &CommitmentImport,
    ) -> Result<ApiResponse, TransportError>;

    async fn update_commitment(
        &self,
        id: &str,
        update: &CommitmentAssignmentUpdate,
    ) -> Result<ApiResponse, TransportError>;

    async fn delete_commitment(&self, id: &str) -> Result<ApiResponse, TransportError>;
}
