//! Domain layer for nightpatch
//!
//! This module contains the core models and the port traits adapters implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
