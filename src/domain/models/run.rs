//! Review runs: correlation context, summary and persisted history rows.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::task::RepositoryTask;

/// Correlation context handed explicitly to every task and pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunContext {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub dry_run: bool,
}

impl RunContext {
    pub fn new(started_at: DateTime<Utc>, dry_run: bool) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at,
            dry_run,
        }
    }
}

/// Lifecycle state of a review run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    /// Drain timed out; some tasks were still running when the run was finalized.
    PartialShutdown,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::PartialShutdown => "partial_shutdown",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "partial_shutdown" => Ok(Self::PartialShutdown),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown run status: {other}")),
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregated result of one orchestrator run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub context: RunContext,
    pub completed_at: DateTime<Utc>,
    pub status: RunStatus,
    pub tasks: Vec<RepositoryTask>,
}

impl RunSummary {
    /// Repositories a worker actually picked up.
    pub fn repos_reviewed(&self) -> usize {
        self.tasks.iter().filter(|t| t.outcome.was_admitted()).count()
    }

    pub fn fixes_applied(&self) -> usize {
        self.tasks.iter().filter(|t| t.outcome.is_fixed()).count()
    }

    /// A run that reviewed something but produced no fix.
    ///
    /// Distinguishable for alerting; not an error.
    pub fn no_fixes(&self) -> bool {
        self.repos_reviewed() > 0 && self.fixes_applied() == 0
    }

    pub fn task(&self, repo: &str) -> Option<&RepositoryTask> {
        self.tasks.iter().find(|t| t.repo == repo)
    }
}

/// Persisted review run row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRun {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub dry_run: bool,
    pub repos_reviewed: u32,
    pub fixes_applied: u32,
    pub error: Option<String>,
}

/// Persisted per-repository outcome row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub run_id: Uuid,
    pub repo: String,
    pub outcome: String,
    pub detail: Option<String>,
    pub pr_number: Option<u64>,
    pub pr_url: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
