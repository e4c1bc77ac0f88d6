//! In-memory stores for tests and `--ephemeral` runs.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    FixKey, OutcomeRecord, RejectedFixRecord, RepositoryTask, ReviewRun, RunContext, RunStatus,
    RunSummary, TaskOutcome,
};
use crate::domain::ports::{RejectedFixStore, RunHistoryRepository};

#[derive(Debug, Default)]
pub struct InMemoryRejectedFixStore {
    records: RwLock<HashMap<String, RejectedFixRecord>>,
}

impl InMemoryRejectedFixStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RejectedFixStore for InMemoryRejectedFixStore {
    async fn get(&self, key: &FixKey) -> DomainResult<Option<RejectedFixRecord>> {
        Ok(self.records.read().await.get(key.as_str()).cloned())
    }

    async fn upsert(&self, record: &RejectedFixRecord) -> DomainResult<()> {
        let mut records = self.records.write().await;
        records
            .entry(record.key.as_str().to_string())
            .and_modify(|existing| {
                existing.reason = record.reason.clone();
                existing.updated_at = record.updated_at;
            })
            .or_insert_with(|| record.clone());
        Ok(())
    }

    async fn count(&self) -> DomainResult<u64> {
        Ok(self.records.read().await.len() as u64)
    }
}

#[derive(Debug, Default)]
struct HistoryState {
    runs: Vec<ReviewRun>,
    outcomes: Vec<OutcomeRecord>,
}

#[derive(Debug, Default)]
pub struct InMemoryRunHistory {
    state: RwLock<HistoryState>,
}

impl InMemoryRunHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

fn outcome_record(run_id: Uuid, task: &RepositoryTask) -> OutcomeRecord {
    let pull_request = match &task.outcome {
        TaskOutcome::Fixed { pull_request, .. } => pull_request.as_ref(),
        _ => None,
    };
    OutcomeRecord {
        run_id,
        repo: task.repo.clone(),
        outcome: task.outcome.kind().to_string(),
        detail: task.outcome.detail(),
        pr_number: pull_request.map(|pr| pr.number),
        pr_url: pull_request.map(|pr| pr.url.clone()),
        submitted_at: task.submitted_at,
        finished_at: task.finished_at,
    }
}

#[async_trait]
impl RunHistoryRepository for InMemoryRunHistory {
    async fn start_run(&self, ctx: &RunContext) -> DomainResult<()> {
        self.state.write().await.runs.push(ReviewRun {
            id: ctx.run_id,
            started_at: ctx.started_at,
            completed_at: None,
            status: RunStatus::Running,
            dry_run: ctx.dry_run,
            repos_reviewed: 0,
            fixes_applied: 0,
            error: None,
        });
        Ok(())
    }

    async fn record_outcome(&self, run_id: Uuid, task: &RepositoryTask) -> DomainResult<()> {
        self.state
            .write()
            .await
            .outcomes
            .push(outcome_record(run_id, task));
        Ok(())
    }

    async fn complete_run(&self, summary: &RunSummary) -> DomainResult<()> {
        let mut state = self.state.write().await;
        let run = state
            .runs
            .iter_mut()
            .find(|r| r.id == summary.context.run_id)
            .ok_or(DomainError::RunNotFound(summary.context.run_id))?;
        run.completed_at = Some(summary.completed_at);
        run.status = summary.status;
        run.repos_reviewed = summary.repos_reviewed() as u32;
        run.fixes_applied = summary.fixes_applied() as u32;
        Ok(())
    }

    async fn fail_run(&self, run_id: Uuid, error: &str) -> DomainResult<()> {
        let mut state = self.state.write().await;
        let run = state
            .runs
            .iter_mut()
            .find(|r| r.id == run_id)
            .ok_or(DomainError::RunNotFound(run_id))?;
        run.completed_at = Some(Utc::now());
        run.status = RunStatus::Failed;
        run.error = Some(error.to_string());
        Ok(())
    }

    async fn get_run(&self, run_id: Uuid) -> DomainResult<Option<ReviewRun>> {
        Ok(self
            .state
            .read()
            .await
            .runs
            .iter()
            .find(|r| r.id == run_id)
            .cloned())
    }

    async fn latest_run(&self) -> DomainResult<Option<ReviewRun>> {
        Ok(self.recent_runs(1).await?.into_iter().next())
    }

    async fn recent_runs(&self, limit: u32) -> DomainResult<Vec<ReviewRun>> {
        let state = self.state.read().await;
        let mut runs: Vec<ReviewRun> = state.runs.iter().rev().cloned().collect();
        // Stable: equal start times keep newest-inserted first.
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        runs.truncate(limit as usize);
        Ok(runs)
    }

    async fn outcomes_for_run(&self, run_id: Uuid) -> DomainResult<Vec<OutcomeRecord>> {
        Ok(self
            .state
            .read()
            .await
            .outcomes
            .iter()
            .filter(|o| o.run_id == run_id)
            .cloned()
            .collect())
    }
}
