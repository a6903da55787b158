//! Backend executor: schema-checked query dispatch.

pub mod dispatcher;

pub use dispatcher::{DispatchPolicy, QueryDispatcher};
