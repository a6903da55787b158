//! Tool domain value objects — immutable result and error types.
//!
//! Every routed tool call produces exactly one [`ToolResult`], flowing back
//! up through the same hops the call traveled down. Failures at any hop
//! (authorization, argument validation, the data engine) become an error
//! result rather than an escaping exception, so the conversation can
//! continue and the agent can explain what went wrong.

use serde::{Deserialize, Serialize};

/// Error attached to a failed [`ToolResult`].
///
/// Error codes classify the failure for upstream handling:
///
/// | Code | Origin |
/// |------|--------|
/// | `UNKNOWN_TOOL` | Tool name absent from the registry |
/// | `UNAUTHORIZED` | Verified role not permitted |
/// | `TOKEN_REJECTED` | Bearer token failed verification |
/// | `INVALID_ARGUMENT` | Arguments fail the declared schema |
/// | `ENGINE_TIMEOUT` | Data engine exceeded its bound |
/// | `ENGINE_EXECUTION` | Data engine reported a failure |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolError {
    pub code: String,
    pub message: String,
}

impl ToolError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn unknown_tool(name: impl Into<String>) -> Self {
        Self::new("UNKNOWN_TOOL", format!("unknown tool: {}", name.into()))
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn token_rejected(message: impl Into<String>) -> Self {
        Self::new("TOKEN_REJECTED", message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new("INVALID_ARGUMENT", message)
    }

    pub fn engine_timeout(message: impl Into<String>) -> Self {
        Self::new("ENGINE_TIMEOUT", message)
    }

    pub fn engine_execution(message: impl Into<String>) -> Self {
        Self::new("ENGINE_EXECUTION", message)
    }
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ToolError {}

/// Tabular query payload, shaped independently of the originating engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPayload {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl QueryPayload {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<serde_json::Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Outcome of a single tool execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Ok,
    Error,
}

/// Immutable result of a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_name: String,
    pub status: ToolStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<QueryPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolError>,
    pub elapsed_ms: u64,
}

impl ToolResult {
    pub fn ok(tool_name: impl Into<String>, payload: QueryPayload, elapsed_ms: u64) -> Self {
        Self {
            tool_name: tool_name.into(),
            status: ToolStatus::Ok,
            payload: Some(payload),
            error: None,
            elapsed_ms,
        }
    }

    pub fn failure(tool_name: impl Into<String>, error: ToolError, elapsed_ms: u64) -> Self {
        Self {
            tool_name: tool_name.into(),
            status: ToolStatus::Error,
            payload: None,
            error: Some(error),
            elapsed_ms,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ToolStatus::Ok
    }

    pub fn payload(&self) -> Option<&QueryPayload> {
        self.payload.as_ref()
    }

    pub fn error(&self) -> Option<&ToolError> {
        self.error.as_ref()
    }
}
