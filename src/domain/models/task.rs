//! Repository tasks and their terminal outcomes.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::fix::RejectionReason;

/// Why a repository was not worked on in this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The review deadline had passed when a worker became available.
    Deadline,
    /// Shutdown was requested before the repository was admitted.
    Shutdown,
    /// A pull request opened by a previous run is still open.
    OpenPullRequest,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deadline => "deadline",
            Self::Shutdown => "shutdown",
            Self::OpenPullRequest => "open_pull_request",
        }
    }
}

/// Why an admitted repository produced no fix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NoOpReason {
    /// The analysis service proposed nothing.
    NoCandidate,
    /// The safety pipeline refused the candidate.
    Rejected { reason: RejectionReason },
}

/// Reference to a created pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRef {
    pub number: u64,
    pub url: String,
}

/// Terminal outcome of a repository task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskOutcome {
    Skipped {
        reason: SkipReason,
    },
    Fixed {
        file_path: String,
        branch: String,
        pull_request: Option<PullRequestRef>,
        dry_run: bool,
    },
    Failed {
        error: String,
    },
    NoOp {
        reason: NoOpReason,
    },
}

impl TaskOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Skipped { .. } => "skipped",
            Self::Fixed { .. } => "fixed",
            Self::Failed { .. } => "failed",
            Self::NoOp { .. } => "no_op",
        }
    }

    /// Short human-readable detail for reports and history rows.
    pub fn detail(&self) -> Option<String> {
        match self {
            Self::Skipped { reason } => Some(reason.as_str().to_string()),
            Self::Fixed {
                file_path, dry_run, ..
            } => Some(if *dry_run {
                format!("{file_path} (dry run)")
            } else {
                file_path.clone()
            }),
            Self::Failed { error } => Some(error.clone()),
            Self::NoOp {
                reason: NoOpReason::NoCandidate,
            } => Some("no candidate".to_string()),
            Self::NoOp {
                reason: NoOpReason::Rejected { reason },
            } => Some(format!("{}: {reason}", reason.kind())),
        }
    }

    pub fn is_fixed(&self) -> bool {
        matches!(self, Self::Fixed { .. })
    }

    /// Whether a worker actually picked the repository up.
    pub fn was_admitted(&self) -> bool {
        !matches!(
            self,
            Self::Skipped {
                reason: SkipReason::Deadline | SkipReason::Shutdown
            }
        )
    }
}

/// One unit of orchestrator work: a repository in the current run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryTask {
    pub repo: String,
    pub submitted_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: TaskOutcome,
}

impl RepositoryTask {
    pub fn new(
        repo: impl Into<String>,
        submitted_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        outcome: TaskOutcome,
    ) -> Self {
        Self {
            repo: repo.into(),
            submitted_at,
            finished_at,
            outcome,
        }
    }

    /// Error detail when the task failed.
    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            TaskOutcome::Failed { error } => Some(error),
            _ => None,
        }
    }
}

/// A checked-out repository handed to the analysis service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositorySnapshot {
    pub repo: String,
    pub workdir: PathBuf,
}

/// A source file selected for analysis, path relative to the working copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: String,
    pub content: String,
}

/// Split an `owner/name` repository identifier.
pub fn split_repo(repo: &str) -> Option<(&str, &str)> {
    let (owner, name) = repo.split_once('/')?;
    if owner.is_empty() || name.is_empty() || name.contains('/') {
        return None;
    }
    Some((owner, name))
}
