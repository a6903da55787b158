//! Domain layer for sightline
//!
//! This crate contains the identity and tool entities at the core of the
//! session propagation pipeline. It has no dependencies on infrastructure
//! or presentation concerns.
//!
//! # Core Concepts
//!
//! ## Identity propagation
//!
//! A [`Session`] owns the token triple issued at login. Each outbound
//! agent invocation snapshots it into an immutable [`PropagationContext`]
//! carrying only the bearer access token, role, and user id — the refresh
//! token never leaves the session boundary.
//!
//! ## Closed tool set
//!
//! The [`QueryRegistry`] is the fixed catalog of named queries the agent
//! may call. A [`ToolCall`] must name a registry entry; the gateway
//! authorizes it against the caller's *verified* role before dispatch.

pub mod gateway;
pub mod identity;
pub mod stream;
pub mod tool;

// Re-export commonly used types
pub use gateway::{RequestPhase, RequestTrace};
pub use identity::{PropagationContext, Role, Session, TokenTriple};
pub use stream::StreamEvent;
pub use tool::{
    ParamType, QueryDefinition, QueryParameter, QueryPayload, QueryRegistry, ToolCall, ToolError,
    ToolRequest, ToolResult, ToolStatus,
};
