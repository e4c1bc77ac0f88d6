//! Post-edit syntax validation through external checkers.
//!
//! Each checker is selected by file extension and run against a temporary
//! copy of the patched file, never the live working tree. What happens when
//! a checker cannot be run is an explicit per-checker policy:
//! [`UnavailablePolicy::FailClosed`] rejects the edit,
//! [`UnavailablePolicy::FailOpen`] lets it through unvalidated.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{CheckerConfig, RejectionReason, UnavailablePolicy};
use crate::services::command::{run_command, tail_chars, CommandRun};

const CHECKER_OUTPUT_LIMIT: usize = 2_000;

/// What a single checker concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntaxOutcome {
    Valid,
    Invalid { output: String },
    /// The checker could not be run (missing binary, launch error, timeout).
    Unavailable { detail: String },
}

/// Capability shared by every checker variant.
#[async_trait]
pub trait SyntaxChecker: Send + Sync {
    fn name(&self) -> &str;

    /// Whether this checker handles `extension` (leading dot included).
    fn handles(&self, extension: &str) -> bool;

    fn on_unavailable(&self) -> UnavailablePolicy;

    async fn validate(&self, path: &Path, content: &str) -> SyntaxOutcome;
}

/// Checker backed by an external command; the file path is its last argument.
#[derive(Debug, Clone)]
pub struct CommandChecker {
    config: CheckerConfig,
    invalid_pattern: Option<Regex>,
    timeout: Duration,
}

impl CommandChecker {
    pub fn new(config: CheckerConfig) -> DomainResult<Self> {
        let invalid_pattern = config
            .invalid_pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| {
                DomainError::ValidationFailed(format!(
                    "checker '{}' invalid_pattern: {e}",
                    config.name
                ))
            })?;
        let timeout = Duration::from_secs(config.timeout_secs);
        Ok(Self {
            config,
            invalid_pattern,
            timeout,
        })
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl SyntaxChecker for CommandChecker {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn handles(&self, extension: &str) -> bool {
        self.config
            .extensions
            .iter()
            .any(|e| e.eq_ignore_ascii_case(extension))
    }

    fn on_unavailable(&self) -> UnavailablePolicy {
        self.config.on_unavailable
    }

    async fn validate(&self, path: &Path, _content: &str) -> SyntaxOutcome {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let args = self
            .config
            .args
            .iter()
            .map(std::ffi::OsStr::new)
            .chain(std::iter::once(path.as_os_str()));

        match run_command(&self.config.program, args, dir, self.timeout).await {
            CommandRun::SpawnFailed(err) => SyntaxOutcome::Unavailable {
                detail: format!("{}: {err}", self.config.program),
            },
            CommandRun::TimedOut => SyntaxOutcome::Unavailable {
                detail: format!("timed out after {}s", self.timeout.as_secs_f32()),
            },
            CommandRun::Completed { status, output } => {
                if status.success() {
                    return SyntaxOutcome::Valid;
                }
                match &self.invalid_pattern {
                    Some(pattern) if !pattern.is_match(&output) => {
                        debug!(
                            checker = %self.config.name,
                            exit_code = ?status.code(),
                            "checker failed without a syntax error, accepting"
                        );
                        SyntaxOutcome::Valid
                    }
                    _ => SyntaxOutcome::Invalid {
                        output: tail_chars(output.trim(), CHECKER_OUTPUT_LIMIT),
                    },
                }
            }
        }
    }
}

/// Dispatches to the first checker registered for a file's extension.
pub struct SyntaxValidator {
    checkers: Vec<Box<dyn SyntaxChecker>>,
}

impl SyntaxValidator {
    pub fn new(checkers: Vec<Box<dyn SyntaxChecker>>) -> Self {
        Self { checkers }
    }

    pub fn from_configs(configs: &[CheckerConfig]) -> DomainResult<Self> {
        let checkers = configs
            .iter()
            .cloned()
            .map(|c| CommandChecker::new(c).map(|c| Box::new(c) as Box<dyn SyntaxChecker>))
            .collect::<DomainResult<Vec<_>>>()?;
        Ok(Self::new(checkers))
    }

    /// Accept or reject the file at `path` (a temporary copy holding `content`).
    ///
    /// Files with no registered checker pass.
    pub async fn validate(&self, path: &Path, content: &str) -> Result<(), RejectionReason> {
        let Some(extension) = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
        else {
            return Ok(());
        };

        let Some(checker) = self.checkers.iter().find(|c| c.handles(&extension)) else {
            return Ok(());
        };

        match checker.validate(path, content).await {
            SyntaxOutcome::Valid => Ok(()),
            SyntaxOutcome::Invalid { output } => Err(RejectionReason::SyntaxInvalid { output }),
            SyntaxOutcome::Unavailable { detail } => match checker.on_unavailable() {
                UnavailablePolicy::FailOpen => {
                    warn!(
                        checker = checker.name(),
                        %detail,
                        "syntax checker unavailable, proceeding unvalidated"
                    );
                    Ok(())
                }
                UnavailablePolicy::FailClosed => Err(RejectionReason::ValidatorUnavailable {
                    checker: checker.name().to_string(),
                    detail,
                }),
            },
        }
    }
}
