//! Common test utilities for integration tests
//!
//! Shared fixtures: a manual clock, a scripted syntax checker and helpers
//! for building candidates and pipelines.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

use nightpatch::adapters::InMemoryRejectedFixStore;
use nightpatch::domain::models::{Confidence, FixCandidate, UnavailablePolicy};
use nightpatch::domain::ports::{Clock, RejectedFixStore};
use nightpatch::services::{
    DiffGuard, FixSafetyPipeline, RejectedFixMemory, SyntaxChecker, SyntaxOutcome,
    SyntaxValidator, TestRunner,
};

/// Create a temporary directory for test isolation
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

pub fn write_file(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

pub fn read_file(root: &Path, rel: &str) -> String {
    std::fs::read_to_string(root.join(rel)).unwrap()
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn at(now: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(now),
        })
    }

    pub fn fixed() -> Arc<Self> {
        Self::at(Utc.with_ymd_and_hms(2026, 10, 19, 1, 0, 0).unwrap())
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Syntax checker for `.py` files with a scripted verdict.
pub struct ScriptedChecker {
    outcome: SyntaxOutcome,
    policy: UnavailablePolicy,
    calls: Arc<AtomicUsize>,
}

impl ScriptedChecker {
    pub fn new(outcome: SyntaxOutcome) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                outcome,
                policy: UnavailablePolicy::FailClosed,
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }

    pub fn with_policy(mut self, policy: UnavailablePolicy) -> Self {
        self.policy = policy;
        self
    }
}

#[async_trait]
impl SyntaxChecker for ScriptedChecker {
    fn name(&self) -> &str {
        "scripted"
    }

    fn handles(&self, extension: &str) -> bool {
        extension == ".py"
    }

    fn on_unavailable(&self) -> UnavailablePolicy {
        self.policy
    }

    async fn validate(&self, path: &Path, _content: &str) -> SyntaxOutcome {
        assert!(path.exists(), "checker must see a staged file");
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

pub fn candidate(file_path: &str, original: &str, replacement: &str, confidence: Confidence) -> FixCandidate {
    FixCandidate {
        file_path: file_path.to_string(),
        original: original.to_string(),
        replacement: replacement.to_string(),
        confidence,
        rationale: "Compare with None by identity".to_string(),
        title: "Use identity comparison with None".to_string(),
        bug_description: "Equality comparison with None".to_string(),
        fix_description: "Use `is None`".to_string(),
        related_issue: None,
    }
}

pub struct PipelineHarness {
    pub pipeline: FixSafetyPipeline,
    pub store: Arc<InMemoryRejectedFixStore>,
    pub checker_calls: Arc<AtomicUsize>,
}

impl PipelineHarness {
    pub fn new(outcome: SyntaxOutcome, test_command: Option<Vec<&str>>) -> Self {
        Self::with_store(outcome, test_command, Arc::new(InMemoryRejectedFixStore::new()))
    }

    pub fn with_store(
        outcome: SyntaxOutcome,
        test_command: Option<Vec<&str>>,
        store: Arc<InMemoryRejectedFixStore>,
    ) -> Self {
        let (checker, checker_calls) = ScriptedChecker::new(outcome);
        let tests = test_command.map(|cmd| {
            TestRunner::new(
                cmd.into_iter().map(str::to_string).collect(),
                Duration::from_millis(500),
                200,
            )
        });
        let memory = RejectedFixMemory::new(
            Arc::clone(&store) as Arc<dyn RejectedFixStore>,
            ManualClock::fixed(),
        );
        let pipeline = FixSafetyPipeline::new(
            memory,
            DiffGuard::default(),
            SyntaxValidator::new(vec![Box::new(checker)]),
            tests,
        );
        Self {
            pipeline,
            store,
            checker_calls,
        }
    }

    pub async fn remembered(&self) -> u64 {
        self.store.count().await.unwrap()
    }

    pub fn checker_calls(&self) -> usize {
        self.checker_calls.load(Ordering::SeqCst)
    }
}

/// A 50-line Python file containing `if x == None:` once, at line 25.
pub fn fifty_line_module() -> String {
    (1..=50)
        .map(|i| {
            if i == 25 {
                "    if x == None:".to_string()
            } else {
                format!("    value_{i} = {i}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
        + "\n"
}
