//! Data engine port
//!
//! Parameterized-query execution against the external data engine. The
//! dispatcher owns statement binding and schema checks; this port only
//! runs a finished statement and returns tabular output or a typed
//! failure.

use async_trait::async_trait;
use thiserror::Error;

/// Tabular output in the engine's neutral shape.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutput {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl QueryOutput {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<serde_json::Value>>) -> Self {
        Self { columns, rows }
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("query timed out")]
    Timeout,

    #[error("permission denied at the data layer: {0}")]
    PermissionDenied(String),

    #[error("malformed query: {0}")]
    MalformedQuery(String),

    /// A lookup key matched no rows. Deterministic, so re-running the
    /// same statement cannot help.
    #[error("no matching rows: {0}")]
    NotFound(String),

    #[error("query execution failed: {0}")]
    Failed(String),
}

impl EngineError {
    /// Whether the dispatcher's single bounded retry applies.
    ///
    /// Permission, malformed-query, and missing-key failures are
    /// deterministic and never retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::Timeout | EngineError::Failed(_))
    }
}

/// Port to the data engine.
#[async_trait]
pub trait DataEnginePort: Send + Sync {
    /// Execute a bound statement, returning at most `max_rows` rows.
    async fn execute(&self, statement: &str, max_rows: usize) -> Result<QueryOutput, EngineError>;
}
