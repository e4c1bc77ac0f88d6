//! `nightpatch history`: recent review runs.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::adapters::sqlite::initialize_database;
use crate::adapters::SqliteRunHistoryRepository;
use crate::cli::output::{list_table, output, truncate, CommandOutput};
use crate::cli::{load_config, GlobalOptions};
use crate::domain::models::ReviewRun;
use crate::domain::ports::RunHistoryRepository;

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Maximum number of runs to show
    #[arg(short, long, default_value = "10")]
    pub limit: u32,
}

#[derive(Debug, Serialize)]
pub struct RunRow {
    pub id: String,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub status: String,
    pub dry_run: bool,
    pub repos_reviewed: u32,
    pub fixes_applied: u32,
    pub error: Option<String>,
}

impl From<&ReviewRun> for RunRow {
    fn from(run: &ReviewRun) -> Self {
        Self {
            id: run.id.to_string(),
            started_at: run.started_at.to_rfc3339(),
            completed_at: run.completed_at.map(|t| t.to_rfc3339()),
            status: run.status.to_string(),
            dry_run: run.dry_run,
            repos_reviewed: run.repos_reviewed,
            fixes_applied: run.fixes_applied,
            error: run.error.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryOutput {
    pub runs: Vec<RunRow>,
    pub total: usize,
}

impl CommandOutput for HistoryOutput {
    fn to_human(&self) -> String {
        if self.runs.is_empty() {
            return "No runs recorded.".to_string();
        }

        let mut table = list_table(&["id", "started", "status", "reviewed", "fixes", "note"]);
        for run in &self.runs {
            let note = match (&run.error, run.dry_run) {
                (Some(error), _) => truncate(error, 40),
                (None, true) => "dry run".to_string(),
                (None, false) => String::new(),
            };
            table.add_row(vec![
                run.id.chars().take(8).collect::<String>(),
                run.started_at.chars().take(19).collect::<String>(),
                run.status.clone(),
                run.repos_reviewed.to_string(),
                run.fixes_applied.to_string(),
                note,
            ]);
        }
        format!("{} run(s):\n{table}", self.total)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: HistoryArgs, global: &GlobalOptions) -> Result<()> {
    let config = load_config(global)?;
    let pool = initialize_database(&config.database)
        .await
        .context("Failed to open run history database")?;
    let repo = SqliteRunHistoryRepository::new(pool.clone());

    let runs = repo.recent_runs(args.limit).await?;
    pool.close().await;

    let out = HistoryOutput {
        total: runs.len(),
        runs: runs.iter().map(RunRow::from).collect(),
    };
    output(&out, global.json);
    Ok(())
}
