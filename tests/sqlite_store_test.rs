//! SQLite-backed memory and history across process restarts.

mod common;

use std::sync::Arc;

use chrono::Utc;
use common::{candidate, read_file, temp_dir, write_file, ManualClock};
use nightpatch::adapters::sqlite::initialize_database;
use nightpatch::adapters::{SqliteRejectedFixStore, SqliteRunHistoryRepository};
use nightpatch::domain::models::{
    Confidence, DatabaseConfig, NoOpReason, RejectionReason, RepositoryTask, RunContext,
    RunStatus, RunSummary, TaskOutcome,
};
use nightpatch::domain::ports::{RejectedFixStore, RunHistoryRepository};
use nightpatch::services::{
    DiffGuard, FixSafetyPipeline, RejectedFixMemory, SyntaxOutcome, SyntaxValidator,
};

fn db_config(dir: &std::path::Path) -> DatabaseConfig {
    DatabaseConfig {
        path: dir.join("state/nightpatch.db").display().to_string(),
        ..DatabaseConfig::default()
    }
}

fn pipeline(store: Arc<SqliteRejectedFixStore>) -> FixSafetyPipeline {
    let (checker, _calls) = common::ScriptedChecker::new(SyntaxOutcome::Valid);
    FixSafetyPipeline::new(
        RejectedFixMemory::new(store, ManualClock::fixed()),
        DiffGuard::default(),
        SyntaxValidator::new(vec![Box::new(checker)]),
        None,
    )
}

#[tokio::test]
async fn test_rejections_survive_reopening_the_database() {
    let state = temp_dir();
    let work = temp_dir();
    write_file(work.path(), "lib.py", "x == None\nx == None\n");
    let fix = candidate("lib.py", "x == None", "x is None", Confidence::High);
    let config = db_config(state.path());

    {
        let pool = initialize_database(&config).await.unwrap();
        let store = Arc::new(SqliteRejectedFixStore::new(pool.clone()));
        let decision = pipeline(Arc::clone(&store))
            .process(&RunContext::new(Utc::now(), false), "o/r", work.path(), &fix)
            .await
            .unwrap();
        assert!(matches!(
            decision.rejection(),
            Some(RejectionReason::AmbiguousMatch { occurrences: 2 })
        ));
        pool.close().await;
    }

    write_file(work.path(), "lib.py", "x == None\n");
    let pool = initialize_database(&config).await.unwrap();
    let store = Arc::new(SqliteRejectedFixStore::new(pool));
    assert_eq!(store.count().await.unwrap(), 1);

    let decision = pipeline(Arc::clone(&store))
        .process(&RunContext::new(Utc::now(), false), "o/r", work.path(), &fix)
        .await
        .unwrap();
    assert!(matches!(
        decision.rejection(),
        Some(RejectionReason::KnownRejected { .. })
    ));
    assert_eq!(read_file(work.path(), "lib.py"), "x == None\n");
}

#[tokio::test]
async fn test_concurrent_upserts_of_same_fix_leave_one_row() {
    let state = temp_dir();
    let pool = initialize_database(&db_config(state.path())).await.unwrap();
    let store = Arc::new(SqliteRejectedFixStore::new(pool));
    let memory = Arc::new(RejectedFixMemory::new(
        Arc::clone(&store) as Arc<dyn RejectedFixStore>,
        ManualClock::fixed(),
    ));

    let mut handles = Vec::new();
    for i in 0..8 {
        let memory = Arc::clone(&memory);
        handles.push(tokio::spawn(async move {
            memory
                .record("o/r", "a.py", "old", "new", &format!("no_match: attempt {i}"))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(store.count().await.unwrap(), 1);
    let previous = memory.previous("o/r", "a.py", "old", "new").await.unwrap();
    assert!(previous.unwrap().reason.starts_with("no_match: attempt"));
}

#[tokio::test]
async fn test_history_persists_between_connections() {
    let state = temp_dir();
    let config = db_config(state.path());
    let ctx = RunContext::new(Utc::now(), true);

    {
        let pool = initialize_database(&config).await.unwrap();
        let history = SqliteRunHistoryRepository::new(pool.clone());
        history.start_run(&ctx).await.unwrap();
        let task = RepositoryTask::new(
            "o/quiet",
            ctx.started_at,
            Utc::now(),
            TaskOutcome::NoOp {
                reason: NoOpReason::NoCandidate,
            },
        );
        history.record_outcome(ctx.run_id, &task).await.unwrap();
        history
            .complete_run(&RunSummary {
                context: ctx.clone(),
                completed_at: Utc::now(),
                status: RunStatus::Completed,
                tasks: vec![task],
            })
            .await
            .unwrap();
        pool.close().await;
    }

    let pool = initialize_database(&config).await.unwrap();
    let history = SqliteRunHistoryRepository::new(pool);
    let run = history.latest_run().await.unwrap().unwrap();
    assert_eq!(run.id, ctx.run_id);
    assert_eq!(run.status, RunStatus::Completed);
    assert!(run.dry_run);
    assert_eq!(run.repos_reviewed, 1);
    assert_eq!(run.fixes_applied, 0);

    let outcomes = history.outcomes_for_run(ctx.run_id).await.unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].repo, "o/quiet");
    assert_eq!(outcomes[0].outcome, "no_op");
}
