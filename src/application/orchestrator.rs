//! Nightly run orchestrator.
//!
//! Admits configured repositories into a bounded worker pool in order,
//! gated at submission time by the deadline and the shutdown flag. Admitted
//! tasks always run to completion; on shutdown the orchestrator stops
//! admitting, drains in-flight work for a bounded time and then finalizes
//! the run.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{error, info, info_span, warn, Instrument};

use crate::application::deadline::DeadlineEnforcer;
use crate::application::shutdown::ShutdownHandle;
use crate::application::worker_slots::WorkerSlotTracker;
use crate::domain::errors::DomainError;
use crate::domain::models::{
    Config, RepositoryTask, RunContext, RunStatus, RunSummary, SkipReason, TaskOutcome,
};
use crate::domain::ports::{Clock, RunHistoryRepository};

pub const ABANDONED_DURING_DRAIN: &str = "abandoned during shutdown drain";

/// The body of one repository task.
#[async_trait]
pub trait RepositoryWorker: Send + Sync {
    /// Review one repository. Failures are reported as outcomes, never raised.
    async fn review(&self, ctx: &RunContext, repo: &str) -> TaskOutcome;
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub max_workers: usize,
    pub drain_timeout: Duration,
    pub drain_poll: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_workers: 3,
            drain_timeout: Duration::from_secs(60),
            drain_poll: Duration::from_millis(250),
        }
    }
}

impl OrchestratorConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_workers: config.max_workers,
            drain_timeout: Duration::from_secs(config.drain_timeout_secs),
            ..Self::default()
        }
    }
}

/// Fatal run errors. Nothing has been admitted when one is returned.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("max_workers must be between 1 and 16, got {0}")]
    InvalidWorkerCount(usize),

    #[error("run history unavailable: {0}")]
    History(#[from] DomainError),
}

type TaskResult = (String, DateTime<Utc>, TaskOutcome);

pub struct Orchestrator {
    worker: Arc<dyn RepositoryWorker>,
    history: Arc<dyn RunHistoryRepository>,
    clock: Arc<dyn Clock>,
    config: OrchestratorConfig,
    shutdown: ShutdownHandle,
    slots: Arc<WorkerSlotTracker>,
}

/// Per-run bookkeeping.
struct RunState {
    ctx: RunContext,
    in_flight: HashMap<String, DateTime<Utc>>,
    finished: HashMap<String, RepositoryTask>,
}

impl Orchestrator {
    pub fn new(
        worker: Arc<dyn RepositoryWorker>,
        history: Arc<dyn RunHistoryRepository>,
        clock: Arc<dyn Clock>,
        config: OrchestratorConfig,
        shutdown: ShutdownHandle,
    ) -> Self {
        let slots = WorkerSlotTracker::new(config.max_workers);
        Self {
            worker,
            history,
            clock,
            config,
            shutdown,
            slots,
        }
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Slots held by in-flight repositories.
    pub fn active_slots(&self) -> usize {
        self.slots.active()
    }

    /// Review every repository once and return the finalized run.
    pub async fn run(
        &self,
        ctx: RunContext,
        repos: &[String],
        deadline: &DeadlineEnforcer,
    ) -> Result<RunSummary, OrchestratorError> {
        if !(1..=16).contains(&self.config.max_workers) {
            return Err(OrchestratorError::InvalidWorkerCount(self.config.max_workers));
        }
        self.history.start_run(&ctx).await?;

        let repos = dedupe(repos);
        info!(
            run_id = %ctx.run_id,
            repositories = repos.len(),
            max_workers = self.config.max_workers,
            cutoff = ?deadline.cutoff(),
            dry_run = ctx.dry_run,
            "Starting review run"
        );

        let mut state = RunState {
            ctx,
            in_flight: HashMap::new(),
            finished: HashMap::new(),
        };
        let semaphore = Arc::new(Semaphore::new(self.config.max_workers));
        let mut join_set: JoinSet<TaskResult> = JoinSet::new();

        for (index, repo) in repos.iter().enumerate() {
            let permit = loop {
                tokio::select! {
                    biased;
                    () = self.shutdown.requested() => break None,
                    Some(joined) = join_set.join_next(), if !join_set.is_empty() => {
                        self.collect(&mut state, joined).await;
                    }
                    permit = Arc::clone(&semaphore).acquire_owned() => break permit.ok(),
                }
            };

            let Some(permit) = permit.filter(|_| !self.shutdown.is_requested()) else {
                info!(run_id = %state.ctx.run_id, skipped = repos.len() - index, "Shutdown requested, admission stopped");
                self.skip_remaining(&mut state, &repos[index..], SkipReason::Shutdown)
                    .await;
                break;
            };

            if deadline.is_past() {
                info!(run_id = %state.ctx.run_id, skipped = repos.len() - index, "Deadline reached, admission stopped");
                self.skip_remaining(&mut state, &repos[index..], SkipReason::Deadline)
                    .await;
                break;
            }

            let submitted_at = self.clock.now();
            let slot = match self.slots.acquire() {
                Ok(slot) => slot,
                Err(e) => {
                    error!(%repo, error = %e, "Worker slot accounting out of step with the pool");
                    let outcome = TaskOutcome::Failed {
                        error: e.to_string(),
                    };
                    self.finish(&mut state, repo, submitted_at, outcome).await;
                    continue;
                }
            };
            state.in_flight.insert(repo.clone(), submitted_at);

            let worker = Arc::clone(&self.worker);
            let clock = Arc::clone(&self.clock);
            let task_ctx = state.ctx.clone();
            let task_repo = repo.clone();
            let span = info_span!("repository", run_id = %state.ctx.run_id, repo = %repo);

            join_set.spawn(
                async move {
                    let _permit = permit;
                    let _slot = slot;
                    info!("Repository admitted");
                    let outcome = AssertUnwindSafe(worker.review(&task_ctx, &task_repo))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|panic| TaskOutcome::Failed {
                            error: format!("task panicked: {}", panic_message(panic.as_ref())),
                        });
                    (task_repo, clock.now(), outcome)
                }
                .instrument(span),
            );
        }

        let drained = self.await_in_flight(&mut state, &mut join_set).await;
        let status = if drained {
            RunStatus::Completed
        } else {
            RunStatus::PartialShutdown
        };

        let stranded: Vec<(String, DateTime<Utc>)> = state.in_flight.drain().collect();
        for (repo, submitted_at) in stranded {
            let error = if drained {
                "task ended without reporting an outcome"
            } else {
                ABANDONED_DURING_DRAIN
            };
            let outcome = TaskOutcome::Failed {
                error: error.to_string(),
            };
            self.finish(&mut state, &repo, submitted_at, outcome).await;
        }

        let tasks = repos
            .iter()
            .filter_map(|repo| state.finished.remove(repo))
            .collect();
        let summary = RunSummary {
            context: state.ctx,
            completed_at: self.clock.now(),
            status,
            tasks,
        };

        if let Err(e) = self.history.complete_run(&summary).await {
            error!(run_id = %summary.context.run_id, error = %e, "Failed to finalize run record");
        }

        info!(
            run_id = %summary.context.run_id,
            status = %summary.status,
            reviewed = summary.repos_reviewed(),
            fixes = summary.fixes_applied(),
            "Review run finished"
        );
        if summary.no_fixes() {
            warn!(
                run_id = %summary.context.run_id,
                alert = "no_fixes",
                reviewed = summary.repos_reviewed(),
                "Run reviewed repositories but produced no fixes"
            );
        }

        Ok(summary)
    }

    /// Wait for admitted tasks. Returns `false` when a shutdown drain timed
    /// out with tasks still running; those tasks are detached, not aborted.
    async fn await_in_flight(&self, state: &mut RunState, join_set: &mut JoinSet<TaskResult>) -> bool {
        while !join_set.is_empty() {
            tokio::select! {
                biased;
                () = self.shutdown.requested() => break,
                joined = join_set.join_next() => {
                    if let Some(joined) = joined {
                        self.collect(state, joined).await;
                    }
                }
            }
        }
        if join_set.is_empty() {
            return true;
        }

        info!(
            run_id = %state.ctx.run_id,
            in_flight = self.slots.active(),
            timeout_secs = self.config.drain_timeout.as_secs(),
            "Draining in-flight repositories"
        );
        let idle = self
            .slots
            .wait_until_idle(self.config.drain_timeout, self.config.drain_poll)
            .await;

        if idle {
            while let Some(joined) = join_set.join_next().await {
                self.collect(state, joined).await;
            }
            return true;
        }

        while let Some(Some(joined)) = join_set.join_next().now_or_never() {
            self.collect(state, joined).await;
        }
        warn!(
            run_id = %state.ctx.run_id,
            remaining = self.slots.active(),
            "Shutdown drain timed out, finalizing with tasks still running"
        );
        join_set.detach_all();
        false
    }

    async fn collect(&self, state: &mut RunState, joined: Result<TaskResult, JoinError>) {
        match joined {
            Ok((repo, finished_at, outcome)) => {
                let submitted_at = state.in_flight.remove(&repo).unwrap_or(finished_at);
                let task = RepositoryTask::new(repo, submitted_at, finished_at, outcome);
                self.record(state, task).await;
            }
            // Panics are caught inside the task, so this is cancellation only.
            Err(e) => error!(run_id = %state.ctx.run_id, error = %e, "Repository task did not complete"),
        }
    }

    async fn finish(
        &self,
        state: &mut RunState,
        repo: &str,
        submitted_at: DateTime<Utc>,
        outcome: TaskOutcome,
    ) {
        let task = RepositoryTask::new(repo, submitted_at, self.clock.now(), outcome);
        self.record(state, task).await;
    }

    async fn skip_remaining(&self, state: &mut RunState, repos: &[String], reason: SkipReason) {
        let now = self.clock.now();
        for repo in repos {
            let task = RepositoryTask::new(repo.as_str(), now, now, TaskOutcome::Skipped { reason });
            self.record(state, task).await;
        }
    }

    async fn record(&self, state: &mut RunState, task: RepositoryTask) {
        match &task.outcome {
            TaskOutcome::Failed { error } => {
                warn!(run_id = %state.ctx.run_id, repo = %task.repo, %error, "Repository failed");
            }
            outcome => {
                info!(run_id = %state.ctx.run_id, repo = %task.repo, outcome = outcome.kind(), detail = ?outcome.detail(), "Repository finished");
            }
        }
        if let Err(e) = self.history.record_outcome(state.ctx.run_id, &task).await {
            error!(run_id = %state.ctx.run_id, repo = %task.repo, error = %e, "Failed to record outcome");
        }
        state.finished.insert(task.repo.clone(), task);
    }
}

fn dedupe(repos: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    repos
        .iter()
        .filter(|repo| {
            let first = seen.insert(repo.as_str());
            if !first {
                warn!(%repo, "Repository listed more than once, reviewing it once");
            }
            first
        })
        .cloned()
        .collect()
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string())
}
