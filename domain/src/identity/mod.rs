//! Identity domain: roles, sessions, and the propagation context.

pub mod context;
pub mod entities;

pub use context::PropagationContext;
pub use entities::{Role, Session, TokenTriple};
