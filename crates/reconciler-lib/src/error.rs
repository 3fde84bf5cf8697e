//! Error types for the reconciliation engine
//!
//! Fatal pre-plan failures are aggregated into [`ImportErrors`] and
//! [`MatchErrors`] so the report can list every offending record at once.
//! Non-fatal conditions live in [`crate::report::Warning`].

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Failure to turn one raw input record into a commitment
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("{location}: cannot parse {field} from {raw:?}")]
    Parse {
        field: String,
        raw: String,
        location: String,
    },

    #[error("{location}: provider could not be determined (no provider column and no azure deep link)")]
    ProviderUndetermined { location: String, row: usize },

    #[error("none of the required columns resolved (expected one of: {})", .expected.join(", "))]
    MissingColumns { expected: Vec<&'static str> },

    #[error("{location}: malformed CSV: {source}")]
    Csv {
        location: String,
        #[source]
        source: csv::Error,
    },

    #[error("{location}: malformed JSON: {source}")]
    Json {
        location: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),
}

impl ImportError {
    pub fn parse(field: impl Into<String>, raw: impl Into<String>, location: impl Into<String>) -> Self {
        ImportError::Parse {
            field: field.into(),
            raw: raw.into(),
            location: location.into(),
        }
    }
}

/// All import failures of one cycle
#[derive(Debug, Default)]
pub struct ImportErrors(pub Vec<ImportError>);

impl ImportErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn push(&mut self, error: ImportError) {
        self.0.push(error);
    }

    pub fn extend(&mut self, other: ImportErrors) {
        self.0.extend(other.0);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ImportError> {
        self.0.iter()
    }
}

impl From<ImportError> for ImportErrors {
    fn from(error: ImportError) -> Self {
        ImportErrors(vec![error])
    }
}

impl fmt::Display for ImportErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} record(s) failed to import", self.0.len())?;
        for error in &self.0 {
            write!(f, "; {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ImportErrors {}

/// Failure to join a user config to the imported commitments
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MatchError {
    #[error("config ({matcher}) matched no imported commitment")]
    Unmatched { matcher: String },

    #[error("config ({matcher}) selects GCP commitment {key} but has no match_region")]
    RegionRequired { matcher: String, key: String },

    #[error("config ({matcher}) selects {key}, which is already claimed by another config")]
    AlreadyClaimed { matcher: String, key: String },

    #[error("config ({matcher}) is invalid: {reason}")]
    InvalidConfig { matcher: String, reason: String },
}

/// All matcher failures of one cycle
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MatchErrors(pub Vec<MatchError>);

impl MatchErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MatchError> {
        self.0.iter()
    }
}

impl fmt::Display for MatchErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} config(s) failed to match", self.0.len())?;
        for error in &self.0 {
            write!(f, "; {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for MatchErrors {}

/// Connectivity or deadline failure talking to the control plane
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    #[error("call exceeded deadline of {0:?}")]
    Deadline(Duration),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),
}

/// Failure of a control-plane read
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("control plane returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to decode control plane response: {0}")]
    Decode(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Fatal failure that ends a cycle before any mutating call
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("import failed: {0}")]
    Import(#[from] ImportErrors),

    #[error("matching failed: {0}")]
    Match(#[from] MatchErrors),

    #[error("failed to observe remote inventory: {0}")]
    Observe(#[from] InventoryError),
}

pub type CycleResult<T> = Result<T, CycleError>;
