//! Application layer for sightline
//!
//! This crate contains the port definitions and the session/invocation
//! use cases. It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod store;
pub mod use_cases;

// Re-export commonly used types
pub use config::{InvokePolicy, SessionPolicy};
pub use ports::{
    AgentRuntimePort, AuthError, AuthenticatedUser, DataEnginePort, EngineError,
    IdentityProviderPort, InvokeError, ModelError, ModelTurn, QueryOutput, ReasoningModelPort,
    RefreshError, StreamHandle, TokenGrant, TokenVerifierPort, TranscriptItem, VerifiedIdentity,
    VerifyError,
};
pub use store::CredentialStore;
pub use use_cases::{InvokeAgentError, InvokeAgentUseCase, SessionError, SessionManager};
