//! Configuration management
//!
//! Layered with figment: built-in defaults, project YAML files, then
//! `NIGHTPATCH_*` environment overrides. Validation runs after every load.

pub mod loader;

pub use loader::{ConfigError, ConfigLoader};
