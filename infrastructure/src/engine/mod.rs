//! Data engine adapters.

pub mod memory;

pub use memory::MemoryDataEngine;
