//! Infrastructure adapters for external systems.

pub mod analysis;
pub mod git;
pub mod github;
pub mod memory;
pub mod sqlite;

pub use analysis::ChatCompletionsAnalyzer;
pub use git::GitCliTransport;
pub use github::{GitHubClient, GitHubPullRequestService};
pub use memory::{InMemoryRejectedFixStore, InMemoryRunHistory};
pub use sqlite::{SqliteRejectedFixStore, SqliteRunHistoryRepository};
