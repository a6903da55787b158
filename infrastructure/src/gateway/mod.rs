//! Tool gateway: independent verification and role-based routing.

pub mod router;
pub mod verifier;

pub use router::{RouteError, ToolGatewayRouter};
pub use verifier::CachingVerifier;
