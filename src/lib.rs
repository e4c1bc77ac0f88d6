//! Nightpatch - nightly repository reviewer
//!
//! Each run clones or updates a configured set of repositories, asks an
//! analysis service for at most one bug fix per repository, and opens a
//! pull request only for fixes that survive the safety pipeline.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, errors and port traits
//! - **Service Layer** (`services`): the fix safety pipeline and its stages
//! - **Application Layer** (`application`): the orchestrator, deadline and
//!   shutdown handling, and the per-repository reviewer
//! - **Adapters** (`adapters`): `SQLite`, in-memory, git, GitHub and analysis
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface

pub mod adapters;
pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use application::{DeadlineEnforcer, Orchestrator, OrchestratorConfig, ShutdownHandle};
pub use domain::models::{Config, FixCandidate, RunSummary, TaskOutcome};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{FixDecision, FixSafetyPipeline};
