//! CLI command implementations.

pub mod config;
pub mod history;
pub mod report;
pub mod run;
