//! Port for the code host's pull request and issue APIs.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Issue, PullRequestRef};

/// Everything needed to open a pull request for a pushed fix branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestDraft {
    pub branch: String,
    pub title: String,
    pub body: String,
    pub related_issue: Option<u64>,
}

#[async_trait]
pub trait PullRequestService: Send + Sync {
    /// Whether a pull request opened by this tool is still open.
    async fn has_open_managed_pr(&self, repo: &str) -> DomainResult<bool>;

    /// Open issues, excluding pull requests.
    async fn open_issues(&self, repo: &str) -> DomainResult<Vec<Issue>>;

    async fn create_pr(&self, repo: &str, draft: &PullRequestDraft) -> DomainResult<PullRequestRef>;
}
