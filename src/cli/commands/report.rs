//! `nightpatch report`: per-repository outcomes of one run.

use anyhow::{anyhow, Context, Result};
use clap::Args;
use serde::Serialize;
use uuid::Uuid;

use crate::adapters::sqlite::initialize_database;
use crate::adapters::SqliteRunHistoryRepository;
use crate::cli::commands::history::RunRow;
use crate::cli::output::{list_table, output, truncate, CommandOutput};
use crate::cli::{load_config, GlobalOptions};
use crate::domain::models::OutcomeRecord;
use crate::domain::ports::RunHistoryRepository;

#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Run to report on (defaults to the latest run)
    #[arg(long)]
    pub run_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct OutcomeRow {
    pub repo: String,
    pub outcome: String,
    pub detail: Option<String>,
    pub pr_number: Option<u64>,
    pub pr_url: Option<String>,
    pub duration_secs: i64,
}

impl From<&OutcomeRecord> for OutcomeRow {
    fn from(record: &OutcomeRecord) -> Self {
        Self {
            repo: record.repo.clone(),
            outcome: record.outcome.clone(),
            detail: record.detail.clone(),
            pr_number: record.pr_number,
            pr_url: record.pr_url.clone(),
            duration_secs: (record.finished_at - record.submitted_at).num_seconds(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReportOutput {
    pub run: RunRow,
    pub outcomes: Vec<OutcomeRow>,
}

impl CommandOutput for ReportOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("Run: {}", self.run.id),
            format!("Status: {}", self.run.status),
            format!("Started: {}", self.run.started_at),
        ];
        if let Some(ref completed) = self.run.completed_at {
            lines.push(format!("Completed: {completed}"));
        }
        if self.run.dry_run {
            lines.push("Mode: dry run".to_string());
        }
        lines.push(format!(
            "Reviewed: {}  Fixes: {}",
            self.run.repos_reviewed, self.run.fixes_applied
        ));
        if let Some(ref error) = self.run.error {
            lines.push(format!("Error: {error}"));
        }

        if self.outcomes.is_empty() {
            lines.push("\nNo repository outcomes recorded.".to_string());
            return lines.join("\n");
        }

        let mut table = list_table(&["repository", "outcome", "detail", "pr", "secs"]);
        for row in &self.outcomes {
            table.add_row(vec![
                row.repo.clone(),
                row.outcome.clone(),
                truncate(row.detail.as_deref().unwrap_or("-"), 60),
                row.pr_number.map_or_else(|| "-".to_string(), |n| format!("#{n}")),
                row.duration_secs.to_string(),
            ]);
        }
        lines.push(String::new());
        lines.push(table.to_string());
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: ReportArgs, global: &GlobalOptions) -> Result<()> {
    let config = load_config(global)?;
    let pool = initialize_database(&config.database)
        .await
        .context("Failed to open run history database")?;
    let repo = SqliteRunHistoryRepository::new(pool.clone());

    let run = match args.run_id {
        Some(id) => repo
            .get_run(id)
            .await?
            .ok_or_else(|| anyhow!("Run not found: {id}"))?,
        None => repo
            .latest_run()
            .await?
            .ok_or_else(|| anyhow!("No runs recorded yet"))?,
    };
    let outcomes = repo.outcomes_for_run(run.id).await?;
    pool.close().await;

    let out = ReportOutput {
        run: RunRow::from(&run),
        outcomes: outcomes.iter().map(OutcomeRow::from).collect(),
    };
    output(&out, global.json);
    Ok(())
}
