//! Use cases — the application services driving the pipeline.

pub mod invoke_agent;
pub mod session_lifecycle;

pub use invoke_agent::{InvokeAgentError, InvokeAgentUseCase};
pub use session_lifecycle::{SessionError, SessionManager};
