//! Port for moving repository contents between the code host and disk.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::domain::errors::DomainResult;

#[async_trait]
pub trait RepositoryTransport: Send + Sync {
    /// Clone the repository, or bring an existing working copy up to date
    /// with its default branch. Returns the working directory.
    async fn clone_or_pull(&self, repo: &str) -> DomainResult<PathBuf>;

    /// Create and check out a branch, carrying working tree changes along.
    async fn create_branch(&self, workdir: &Path, branch: &str) -> DomainResult<()>;

    /// Stage `file_path` and commit it.
    async fn commit(&self, workdir: &Path, file_path: &str, message: &str) -> DomainResult<()>;

    async fn push(&self, workdir: &Path, branch: &str) -> DomainResult<()>;

    /// Return to the default branch and delete `branch` locally, and on the
    /// remote when `remote` is set.
    async fn cleanup_branch(&self, workdir: &Path, branch: &str, remote: bool) -> DomainResult<()>;

    /// Drop uncommitted changes in the working tree.
    async fn discard_changes(&self, workdir: &Path) -> DomainResult<()>;
}
