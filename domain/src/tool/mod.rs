//! Tool domain: registered queries and their call/result value types.

pub mod entities;
pub mod value_objects;

pub use entities::{
    ParamType, QueryDefinition, QueryParameter, QueryRegistry, ToolCall, ToolRequest,
};
pub use value_objects::{QueryPayload, ToolError, ToolResult, ToolStatus};
