//! GitHub adapter: REST client and the pull request service built on it.

pub mod client;
pub mod models;
pub mod service;

pub use client::GitHubClient;
pub use service::GitHubPullRequestService;
