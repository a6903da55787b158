//! Configuration: TOML schema, multi-source loading, built-in defaults.

pub mod file_config;
pub mod loader;

pub use file_config::{builtin_registry, ConfigValidationError, FileConfig};
pub use loader::ConfigLoader;
