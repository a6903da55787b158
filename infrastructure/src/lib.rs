//! Infrastructure layer for sightline
//!
//! This crate contains adapters that implement the ports defined in the
//! application layer: the identity provider, the gateway-side verifier
//! and router, the query dispatcher, the in-memory data engine, the
//! local agent runtime, and configuration file loading.

pub mod config;
pub mod engine;
pub mod executor;
pub mod gateway;
pub mod identity;
pub mod runtime;

// Re-export commonly used types
pub use config::{builtin_registry, ConfigLoader, ConfigValidationError, FileConfig};
pub use engine::MemoryDataEngine;
pub use executor::{DispatchPolicy, QueryDispatcher};
pub use gateway::{CachingVerifier, RouteError, ToolGatewayRouter};
pub use identity::StaticIdentityProvider;
pub use runtime::{HeuristicModel, LocalAgentRuntime, RuntimePolicy};
