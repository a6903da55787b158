//! Ports — interfaces the application layer requires of the outside world.
//!
//! Implementations (adapters) live in the infrastructure layer.

pub mod agent_runtime;
pub mod data_engine;
pub mod identity_provider;
pub mod reasoning_model;
pub mod token_verifier;

pub use agent_runtime::{AgentRuntimePort, InvokeError, StreamHandle};
pub use data_engine::{DataEnginePort, EngineError, QueryOutput};
pub use identity_provider::{
    AuthError, AuthenticatedUser, IdentityProviderPort, RefreshError, TokenGrant,
};
pub use reasoning_model::{ModelError, ModelTurn, ReasoningModelPort, TranscriptItem};
pub use token_verifier::{TokenVerifierPort, VerifiedIdentity, VerifyError};
