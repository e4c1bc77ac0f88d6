//! SQLite implementation of the RunHistoryRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::{parse_datetime, parse_optional_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    OutcomeRecord, RepositoryTask, ReviewRun, RunContext, RunStatus, RunSummary, TaskOutcome,
};
use crate::domain::ports::RunHistoryRepository;

const RUN_COLUMNS: &str =
    "id, started_at, completed_at, status, dry_run, repos_reviewed, fixes_applied, error";

#[derive(Clone)]
pub struct SqliteRunHistoryRepository {
    pool: SqlitePool,
}

impl SqliteRunHistoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RunHistoryRepository for SqliteRunHistoryRepository {
    async fn start_run(&self, ctx: &RunContext) -> DomainResult<()> {
        sqlx::query("INSERT INTO review_runs (id, started_at, status, dry_run) VALUES (?, ?, ?, ?)")
            .bind(ctx.run_id.to_string())
            .bind(ctx.started_at.to_rfc3339())
            .bind(RunStatus::Running.as_str())
            .bind(ctx.dry_run)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn record_outcome(&self, run_id: Uuid, task: &RepositoryTask) -> DomainResult<()> {
        let (pr_number, pr_url) = match &task.outcome {
            TaskOutcome::Fixed {
                pull_request: Some(pr),
                ..
            } => (Some(pr.number as i64), Some(pr.url.clone())),
            _ => (None, None),
        };

        sqlx::query(
            r#"INSERT INTO repository_outcomes (run_id, repo_name, outcome, detail, pr_number, pr_url, submitted_at, finished_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(run_id.to_string())
        .bind(&task.repo)
        .bind(task.outcome.kind())
        .bind(task.outcome.detail())
        .bind(pr_number)
        .bind(pr_url)
        .bind(task.submitted_at.to_rfc3339())
        .bind(task.finished_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn complete_run(&self, summary: &RunSummary) -> DomainResult<()> {
        let result = sqlx::query(
            "UPDATE review_runs SET completed_at = ?, status = ?, repos_reviewed = ?, fixes_applied = ? WHERE id = ?",
        )
        .bind(summary.completed_at.to_rfc3339())
        .bind(summary.status.as_str())
        .bind(summary.repos_reviewed() as i64)
        .bind(summary.fixes_applied() as i64)
        .bind(summary.context.run_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::RunNotFound(summary.context.run_id));
        }
        Ok(())
    }

    async fn fail_run(&self, run_id: Uuid, error: &str) -> DomainResult<()> {
        let result = sqlx::query(
            "UPDATE review_runs SET completed_at = ?, status = ?, error = ? WHERE id = ?",
        )
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(RunStatus::Failed.as_str())
        .bind(error)
        .bind(run_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::RunNotFound(run_id));
        }
        Ok(())
    }

    async fn get_run(&self, run_id: Uuid) -> DomainResult<Option<ReviewRun>> {
        let row: Option<ReviewRunRow> =
            sqlx::query_as(&format!("SELECT {RUN_COLUMNS} FROM review_runs WHERE id = ?"))
                .bind(run_id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn latest_run(&self) -> DomainResult<Option<ReviewRun>> {
        Ok(self.recent_runs(1).await?.into_iter().next())
    }

    async fn recent_runs(&self, limit: u32) -> DomainResult<Vec<ReviewRun>> {
        let rows: Vec<ReviewRunRow> = sqlx::query_as(&format!(
            "SELECT {RUN_COLUMNS} FROM review_runs ORDER BY started_at DESC, rowid DESC LIMIT ?"
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn outcomes_for_run(&self, run_id: Uuid) -> DomainResult<Vec<OutcomeRecord>> {
        let rows: Vec<OutcomeRow> = sqlx::query_as(
            r#"SELECT run_id, repo_name, outcome, detail, pr_number, pr_url, submitted_at, finished_at
               FROM repository_outcomes WHERE run_id = ? ORDER BY id"#,
        )
        .bind(run_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct ReviewRunRow {
    id: String,
    started_at: String,
    completed_at: Option<String>,
    status: String,
    dry_run: bool,
    repos_reviewed: i64,
    fixes_applied: i64,
    error: Option<String>,
}

impl TryFrom<ReviewRunRow> for ReviewRun {
    type Error = DomainError;

    fn try_from(row: ReviewRunRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<RunStatus>()
            .map_err(DomainError::SerializationError)?;

        Ok(ReviewRun {
            id: parse_uuid(&row.id)?,
            started_at: parse_datetime(&row.started_at)?,
            completed_at: parse_optional_datetime(row.completed_at)?,
            status,
            dry_run: row.dry_run,
            repos_reviewed: u32::try_from(row.repos_reviewed).unwrap_or(0),
            fixes_applied: u32::try_from(row.fixes_applied).unwrap_or(0),
            error: row.error,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OutcomeRow {
    run_id: String,
    repo_name: String,
    outcome: String,
    detail: Option<String>,
    pr_number: Option<i64>,
    pr_url: Option<String>,
    submitted_at: String,
    finished_at: String,
}

impl TryFrom<OutcomeRow> for OutcomeRecord {
    type Error = DomainError;

    fn try_from(row: OutcomeRow) -> Result<Self, Self::Error> {
        Ok(OutcomeRecord {
            run_id: parse_uuid(&row.run_id)?,
            repo: row.repo_name,
            outcome: row.outcome,
            detail: row.detail,
            pr_number: row.pr_number.and_then(|n| u64::try_from(n).ok()),
            pr_url: row.pr_url,
            submitted_at: parse_datetime(&row.submitted_at)?,
            finished_at: parse_datetime(&row.finished_at)?,
        })
    }
}
