//! Runs a repository's own test command against the patched working tree.

use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use crate::services::command::{run_command, tail_chars, CommandRun};

/// Result of one test invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestOutcome {
    Passed,
    Failed { exit_code: Option<i32>, output: String },
    TimedOut,
}

impl TestOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, Self::Passed)
    }

    /// Short description used as the rejection reason.
    pub fn describe(&self) -> String {
        match self {
            Self::Passed => "passed".to_string(),
            Self::Failed {
                exit_code: Some(code),
                ..
            } => format!("failed (exit code {code})"),
            Self::Failed { exit_code: None, .. } => "failed (terminated by signal)".to_string(),
            Self::TimedOut => "timed out".to_string(),
        }
    }
}

/// The test command could not be launched. An infrastructure failure,
/// not a verdict on the edit.
#[derive(Debug, Error)]
#[error("failed to launch test command '{program}': {source}")]
pub struct TestLaunchError {
    pub program: String,
    #[source]
    pub source: std::io::Error,
}

#[derive(Debug, Clone)]
pub struct TestRunner {
    command: Vec<String>,
    timeout: Duration,
    output_limit: usize,
}

impl TestRunner {
    /// `command` is program first, then arguments. An empty command always passes.
    pub fn new(command: Vec<String>, timeout: Duration, output_limit: usize) -> Self {
        Self {
            command,
            timeout,
            output_limit,
        }
    }

    pub async fn run(&self, workdir: &Path) -> Result<TestOutcome, TestLaunchError> {
        let Some((program, args)) = self.command.split_first() else {
            return Ok(TestOutcome::Passed);
        };

        info!(
            program = %program,
            workdir = %workdir.display(),
            timeout_secs = self.timeout.as_secs(),
            "running test command"
        );

        match run_command(program, args, workdir, self.timeout).await {
            CommandRun::SpawnFailed(source) => Err(TestLaunchError {
                program: program.clone(),
                source,
            }),
            CommandRun::TimedOut => Ok(TestOutcome::TimedOut),
            CommandRun::Completed { status, output } => {
                if status.success() {
                    Ok(TestOutcome::Passed)
                } else {
                    Ok(TestOutcome::Failed {
                        exit_code: status.code(),
                        output: tail_chars(&output, self.output_limit),
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner(cmd: &[&str], timeout: Duration) -> TestRunner {
        TestRunner::new(cmd.iter().map(|s| (*s).to_string()).collect(), timeout, 50)
    }

    #[tokio::test]
    async fn test_passing_command() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = runner(&["true"], Duration::from_secs(5)).run(dir.path()).await.unwrap();
        assert!(outcome.passed());
    }

    #[tokio::test]
    async fn test_failing_command_captures_exit_code_and_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = runner(
            &["sh", "-c", "for i in $(seq 1 100); do echo line$i; done; exit 4"],
            Duration::from_secs(5),
        )
        .run(dir.path())
        .await
        .unwrap();
        match outcome {
            TestOutcome::Failed { exit_code, output } => {
                assert_eq!(exit_code, Some(4));
                assert!(output.contains("line100"));
                assert!(!output.contains("line1\n"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_runs_in_workdir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker"), "").unwrap();
        let outcome = runner(&["test", "-f", "marker"], Duration::from_secs(5))
            .run(dir.path())
            .await
            .unwrap();
        assert!(outcome.passed());
    }

    #[tokio::test]
    async fn test_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = runner(&["sleep", "5"], Duration::from_millis(100))
            .run(dir.path())
            .await
            .unwrap();
        assert_eq!(outcome, TestOutcome::TimedOut);
        assert_eq!(outcome.describe(), "timed out");
    }

    #[tokio::test]
    async fn test_launch_failure_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = runner(&["nightpatch-no-such-test-runner"], Duration::from_secs(1))
            .run(dir.path())
            .await;
        assert!(result.is_err());
    }
}
