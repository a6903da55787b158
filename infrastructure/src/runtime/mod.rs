//! Agent runtime adapters: the local reasoning loop and its model.

pub mod heuristic;
pub mod local;

pub use heuristic::HeuristicModel;
pub use local::{LocalAgentRuntime, RuntimePolicy};
