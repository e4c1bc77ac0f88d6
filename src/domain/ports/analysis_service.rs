//! Port for the external reasoning service.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{FixCandidate, Issue, RepositorySnapshot, RunContext, SourceFile};

#[async_trait]
pub trait AnalysisService: Send + Sync {
    /// Propose at most one fix for the repository.
    ///
    /// The returned confidence tier is trusted verbatim.
    async fn analyze(
        &self,
        ctx: &RunContext,
        snapshot: &RepositorySnapshot,
        files: &[SourceFile],
        issues: &[Issue],
    ) -> DomainResult<Option<FixCandidate>>;
}
