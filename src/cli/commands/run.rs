//! `nightpatch run`: one review pass over every configured repository.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{error, info, warn};

use crate::adapters::sqlite::initialize_database;
use crate::adapters::{
    ChatCompletionsAnalyzer, GitCliTransport, GitHubPullRequestService, InMemoryRejectedFixStore,
    InMemoryRunHistory, SqliteRejectedFixStore, SqliteRunHistoryRepository,
};
use crate::application::{
    listen_for_signals, DeadlineEnforcer, Orchestrator, OrchestratorConfig, RepositoryReviewer,
    ReviewerConfig, ShutdownHandle,
};
use crate::cli::output::{list_table, output, truncate, CommandOutput};
use crate::cli::{init_logging, load_config, GlobalOptions};
use crate::domain::models::{Config, RunContext, RunSummary, RunTimezone, TaskOutcome};
use crate::domain::ports::{Clock, RejectedFixStore, RunHistoryRepository, SystemClock};
use crate::infrastructure::config::ConfigLoader;
use crate::services::source_collector::CollectLimits;
use crate::services::{DiffGuard, FixSafetyPipeline, RejectedFixMemory, SyntaxValidator, TestRunner};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Commit fixes locally but never push or open pull requests
    #[arg(long)]
    pub dry_run: bool,

    /// Keep run history and rejected fixes in memory only
    #[arg(long)]
    pub ephemeral: bool,

    /// Review only these repositories instead of the configured list
    #[arg(long = "repo", value_name = "OWNER/NAME")]
    pub repos: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct OutcomeRow {
    pub repo: String,
    pub outcome: String,
    pub detail: Option<String>,
    pub pull_request: Option<String>,
}

impl From<&crate::domain::models::RepositoryTask> for OutcomeRow {
    fn from(task: &crate::domain::models::RepositoryTask) -> Self {
        let pull_request = match task.outcome {
            TaskOutcome::Fixed {
                pull_request: Some(ref pr),
                ..
            } => Some(pr.url.clone()),
            _ => None,
        };
        Self {
            repo: task.repo.clone(),
            outcome: task.outcome.kind().to_string(),
            detail: task.outcome.detail(),
            pull_request,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RunOutput {
    pub run_id: String,
    pub status: String,
    pub dry_run: bool,
    pub repos_reviewed: usize,
    pub fixes_applied: usize,
    pub no_fixes: bool,
    pub outcomes: Vec<OutcomeRow>,
}

impl From<&RunSummary> for RunOutput {
    fn from(summary: &RunSummary) -> Self {
        Self {
            run_id: summary.context.run_id.to_string(),
            status: summary.status.to_string(),
            dry_run: summary.context.dry_run,
            repos_reviewed: summary.repos_reviewed(),
            fixes_applied: summary.fixes_applied(),
            no_fixes: summary.no_fixes(),
            outcomes: summary.tasks.iter().map(OutcomeRow::from).collect(),
        }
    }
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["repository", "outcome", "detail", "pull request"]);
        for row in &self.outcomes {
            table.add_row(vec![
                row.repo.clone(),
                row.outcome.clone(),
                truncate(row.detail.as_deref().unwrap_or("-"), 60),
                row.pull_request.clone().unwrap_or_else(|| "-".to_string()),
            ]);
        }

        let mut lines = vec![
            format!("Run {} {}", self.run_id, self.status),
            format!(
                "Reviewed {} repositories, {} fix(es){}",
                self.repos_reviewed,
                self.fixes_applied,
                if self.dry_run { " (dry run)" } else { "" }
            ),
        ];
        if !self.outcomes.is_empty() {
            lines.push(String::new());
            lines.push(table.to_string());
        }
        if self.no_fixes {
            lines.push(String::new());
            lines.push("No fixes were produced this run.".to_string());
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

struct Stores {
    history: Arc<dyn RunHistoryRepository>,
    rejected: Arc<dyn RejectedFixStore>,
    pool: Option<SqlitePool>,
}

async fn open_stores(config: &Config, ephemeral: bool) -> Result<Stores> {
    if ephemeral {
        info!("Ephemeral run, history and rejected fixes kept in memory");
        return Ok(Stores {
            history: Arc::new(InMemoryRunHistory::new()),
            rejected: Arc::new(InMemoryRejectedFixStore::new()),
            pool: None,
        });
    }
    let pool = initialize_database(&config.database)
        .await
        .with_context(|| format!("Failed to open database at {}", config.database.path))?;
    Ok(Stores {
        history: Arc::new(SqliteRunHistoryRepository::new(pool.clone())),
        rejected: Arc::new(SqliteRejectedFixStore::new(pool.clone())),
        pool: Some(pool),
    })
}

fn build_transport(config: &Config) -> Result<GitCliTransport> {
    std::fs::create_dir_all(&config.clone_dir)
        .with_context(|| format!("Failed to create clone directory {}", config.clone_dir.display()))?;
    Ok(
        GitCliTransport::new(&config.clone_dir, &config.git, config.github.token.clone())?
            .with_disk_budget_mb(config.max_clone_disk_mb),
    )
}

/// Assemble the pipeline, the reviewer and the orchestrator from config.
fn build_orchestrator(
    config: &Config,
    stores: &Stores,
    transport: GitCliTransport,
    clock: &Arc<dyn Clock>,
    shutdown: ShutdownHandle,
) -> Result<Orchestrator> {
    let validator = SyntaxValidator::from_configs(&config.pipeline.checkers)
        .context("Invalid syntax checker configuration")?;
    let tests = config.pipeline.run_tests.then(|| {
        TestRunner::new(
            config.pipeline.test_command.clone(),
            Duration::from_secs(config.pipeline.test_timeout_secs),
            config.pipeline.test_output_limit,
        )
    });
    let pipeline = FixSafetyPipeline::new(
        RejectedFixMemory::new(Arc::clone(&stores.rejected), Arc::clone(clock)),
        DiffGuard::from_config(&config.pipeline),
        validator,
        tests,
    );

    let pull_requests = GitHubPullRequestService::from_config(&config.github);
    let analysis = ChatCompletionsAnalyzer::new(&config.analysis)?;

    let reviewer = RepositoryReviewer::new(
        Arc::new(transport),
        Arc::new(pull_requests),
        Arc::new(analysis),
        Arc::new(pipeline),
        Arc::clone(clock),
        ReviewerConfig {
            branch_prefix: config.github.branch_prefix.clone(),
            timezone: RunTimezone::from_config(config.timezone.as_deref())?,
            collect: CollectLimits {
                max_files: config.analysis.max_files,
                max_file_bytes: config.analysis.max_file_bytes,
            },
        },
    );

    Ok(Orchestrator::new(
        Arc::new(reviewer),
        Arc::clone(&stores.history),
        Arc::clone(clock),
        OrchestratorConfig::from_config(config),
        shutdown,
    ))
}

fn build_deadline(config: &Config, ctx: &RunContext, clock: &Arc<dyn Clock>) -> Result<DeadlineEnforcer> {
    Ok(match config.deadline {
        Some(ref raw) => DeadlineEnforcer::from_time_of_day(
            raw,
            ctx.started_at,
            RunTimezone::from_config(config.timezone.as_deref())?,
            Arc::clone(clock),
        )?,
        None => DeadlineEnforcer::unbounded(Arc::clone(clock)),
    })
}

/// Leave a failed run in history so a broken night shows up in `history`.
async fn record_fatal(history: &dyn RunHistoryRepository, ctx: &RunContext, err: &anyhow::Error) {
    let message = format!("{err:#}");
    let recorded = match history.start_run(ctx).await {
        Ok(()) => history.fail_run(ctx.run_id, &message).await,
        Err(e) => Err(e),
    };
    if let Err(e) = recorded {
        error!(run_id = %ctx.run_id, error = %e, "Failed to record failed run");
    }
}

pub async fn execute(args: RunArgs, global: &GlobalOptions) -> Result<()> {
    let mut config = load_config(global)?;
    if args.dry_run {
        config.dry_run = true;
    }
    // Working copies of configured repositories survive a `--repo` subset run.
    let mut keep = config.repos.clone();
    if !args.repos.is_empty() {
        keep.extend(args.repos.iter().cloned());
        config.repos = args.repos;
        ConfigLoader::validate(&config)?;
    }
    let _logger = init_logging(&config, global)?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let stores = open_stores(&config, args.ephemeral).await?;
    let ctx = RunContext::new(clock.now(), config.dry_run);
    let shutdown = ShutdownHandle::new();

    let transport = match build_transport(&config) {
        Ok(transport) => transport,
        Err(e) => {
            record_fatal(stores.history.as_ref(), &ctx, &e).await;
            return Err(e);
        }
    };
    if let Err(e) = transport.cleanup_stale(&keep).await {
        warn!(error = %e, "Failed to remove stale working copies");
    }

    let setup = build_deadline(&config, &ctx, &clock).and_then(|deadline| {
        build_orchestrator(&config, &stores, transport, &clock, shutdown.clone()).map(|o| (o, deadline))
    });
    let (orchestrator, deadline) = match setup {
        Ok(parts) => parts,
        Err(e) => {
            record_fatal(stores.history.as_ref(), &ctx, &e).await;
            return Err(e);
        }
    };

    let signals = tokio::spawn(listen_for_signals(shutdown));
    let result = orchestrator.run(ctx, &config.repos, &deadline).await;
    signals.abort();
    if let Some(pool) = stores.pool {
        pool.close().await;
    }

    let summary = result.context("Review run aborted")?;
    output(&RunOutput::from(&summary), global.json);
    Ok(())
}
