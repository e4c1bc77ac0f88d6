//! Repository port for review run history.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{OutcomeRecord, RepositoryTask, ReviewRun, RunContext, RunSummary};

#[async_trait]
pub trait RunHistoryRepository: Send + Sync {
    /// Record the start of a run.
    async fn start_run(&self, ctx: &RunContext) -> DomainResult<()>;

    /// Append one repository outcome.
    async fn record_outcome(&self, run_id: Uuid, task: &RepositoryTask) -> DomainResult<()>;

    /// Finalize a run with its aggregate counts and status.
    async fn complete_run(&self, summary: &RunSummary) -> DomainResult<()>;

    /// Mark a run failed before or during admission.
    async fn fail_run(&self, run_id: Uuid, error: &str) -> DomainResult<()>;

    async fn get_run(&self, run_id: Uuid) -> DomainResult<Option<ReviewRun>>;

    async fn latest_run(&self) -> DomainResult<Option<ReviewRun>>;

    /// Most recent runs first.
    async fn recent_runs(&self, limit: u32) -> DomainResult<Vec<ReviewRun>>;

    async fn outcomes_for_run(&self, run_id: Uuid) -> DomainResult<Vec<OutcomeRecord>>;
}
