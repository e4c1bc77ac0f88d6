//! Fix safety pipeline.
//!
//! Turns an untrusted candidate into either an applied edit or a named
//! rejection. Stages run in a fixed order and short-circuit on the first
//! rejection:
//!
//! ```text
//! Received -> MemoryChecked -> Matched -> SizeChecked -> SyntaxChecked -> (TestsChecked) -> Applied
//!     \______________\______________\____________\______________\______________\-> Rejected
//! ```
//!
//! The target file is only ever replaced by renaming a fully written
//! temporary file from the same directory over it, so a reader observes
//! either the original bytes or the validated replacement, never a mix.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::errors::DomainError;
use crate::domain::models::{FixCandidate, RejectionReason, RunContext};
use crate::services::content_matcher::{match_span, splice, MatchOutcome};
use crate::services::diff_guard::DiffGuard;
use crate::services::path_guard::{resolve_within, PathGuardError};
use crate::services::rejected_fix_memory::RejectedFixMemory;
use crate::services::syntax_validator::SyntaxValidator;
use crate::services::test_runner::{TestLaunchError, TestRunner};

const RECORDED_REASON_LIMIT: usize = 500;

/// Furthest state a candidate reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Received,
    MemoryChecked,
    Matched,
    SizeChecked,
    SyntaxChecked,
    TestsChecked,
}

/// An edit that is now on disk.
#[derive(Debug, Clone)]
pub struct AppliedFix {
    pub file_path: String,
    pub path: PathBuf,
    original_content: String,
}

impl AppliedFix {
    /// Atomically put the pre-edit content back.
    pub async fn revert(&self) -> io::Result<()> {
        let path = self.path.clone();
        let content = self.original_content.clone();
        blocking(move || write_atomic(&path, &content)).await
    }
}

#[derive(Debug)]
pub enum FixDecision {
    Applied(AppliedFix),
    Rejected {
        reason: RejectionReason,
        stage: PipelineStage,
    },
}

impl FixDecision {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    pub fn rejection(&self) -> Option<&RejectionReason> {
        match self {
            Self::Rejected { reason, .. } => Some(reason),
            Self::Applied(_) => None,
        }
    }
}

/// Infrastructure failures inside the pipeline. The working tree is left
/// holding the original content whenever one of these is returned.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("rejected-fix memory unavailable: {0}")]
    Memory(#[from] DomainError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    TestLaunch(#[from] TestLaunchError),
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> PipelineError + '_ {
    move |source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    }
}

pub struct FixSafetyPipeline {
    memory: RejectedFixMemory,
    diff_guard: DiffGuard,
    validator: SyntaxValidator,
    tests: Option<TestRunner>,
}

impl FixSafetyPipeline {
    pub fn new(
        memory: RejectedFixMemory,
        diff_guard: DiffGuard,
        validator: SyntaxValidator,
        tests: Option<TestRunner>,
    ) -> Self {
        Self {
            memory,
            diff_guard,
            validator,
            tests,
        }
    }

    /// Run a candidate through every stage against the working copy at `workdir`.
    pub async fn process(
        &self,
        ctx: &RunContext,
        repo: &str,
        workdir: &Path,
        candidate: &FixCandidate,
    ) -> Result<FixDecision, PipelineError> {
        let file_path = candidate.file_path.as_str();
        let mut stage = PipelineStage::Received;

        if !candidate.confidence.is_eligible() {
            return Ok(self.rejected(
                ctx,
                repo,
                RejectionReason::InsufficientConfidence {
                    confidence: candidate.confidence,
                },
                stage,
            ));
        }

        let target = match resolve_within(workdir, file_path) {
            Ok(target) => target,
            Err(PathGuardError::Traversal { path, reason }) => {
                warn!(run_id = %ctx.run_id, %repo, %path, %reason, "candidate path rejected");
                return Ok(self.rejected(
                    ctx,
                    repo,
                    RejectionReason::PathTraversal { path },
                    stage,
                ));
            }
            Err(PathGuardError::Io(source)) => {
                return Err(PipelineError::Io {
                    path: workdir.to_path_buf(),
                    source,
                })
            }
        };

        if let Some(previous) = self
            .memory
            .previous(repo, file_path, &candidate.original, &candidate.replacement)
            .await?
        {
            return Ok(self.rejected(
                ctx,
                repo,
                RejectionReason::KnownRejected {
                    previous_reason: previous.reason,
                },
                stage,
            ));
        }
        stage = PipelineStage::MemoryChecked;

        let bytes = match tokio::fs::read(&target).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                let reason = RejectionReason::FileNotFound {
                    path: file_path.to_string(),
                };
                return self.reject_and_record(ctx, repo, candidate, reason, stage).await;
            }
            Err(err) => return Err(io_error(&target)(err)),
        };
        let Ok(content) = String::from_utf8(bytes) else {
            let reason = RejectionReason::UnreadableContent {
                path: file_path.to_string(),
            };
            return self.reject_and_record(ctx, repo, candidate, reason, stage).await;
        };

        let offset = match match_span(&content, &candidate.original) {
            MatchOutcome::One { offset } => offset,
            MatchOutcome::Zero => {
                return self
                    .reject_and_record(ctx, repo, candidate, RejectionReason::NoMatch, stage)
                    .await
            }
            MatchOutcome::Many { count } => {
                let reason = RejectionReason::AmbiguousMatch { occurrences: count };
                return self.reject_and_record(ctx, repo, candidate, reason, stage).await;
            }
        };
        stage = PipelineStage::Matched;

        if let Err(too_large) = self
            .diff_guard
            .check_spans(&candidate.original, &candidate.replacement)
        {
            let reason = RejectionReason::DiffTooLarge {
                original_lines: too_large.original_lines,
                replacement_lines: too_large.replacement_lines,
            };
            return self.reject_and_record(ctx, repo, candidate, reason, stage).await;
        }
        stage = PipelineStage::SizeChecked;

        let patched = splice(&content, offset, &candidate.original, &candidate.replacement);
        let staged = {
            let (path, content) = (target.clone(), patched.clone());
            blocking(move || stage_file(&path, &content))
                .await
                .map_err(io_error(&target))?
        };

        if let Err(reason) = self.validator.validate(staged.path(), &patched).await {
            drop(staged);
            return self.reject_and_record(ctx, repo, candidate, reason, stage).await;
        }
        stage = PipelineStage::SyntaxChecked;

        {
            let path = target.clone();
            blocking(move || staged.persist(&path).map(drop).map_err(|e| e.error))
                .await
                .map_err(io_error(&target))?;
        }
        debug!(run_id = %ctx.run_id, %repo, %file_path, "patched file moved into place");

        let applied = AppliedFix {
            file_path: file_path.to_string(),
            path: target,
            original_content: content,
        };

        if let Some(tests) = &self.tests {
            let outcome = match tests.run(workdir).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    applied.revert().await.map_err(io_error(&applied.path))?;
                    return Err(err.into());
                }
            };

            if !outcome.passed() {
                applied.revert().await.map_err(io_error(&applied.path))?;
                let reason = RejectionReason::TestsFailed {
                    detail: outcome.describe(),
                };
                return self.reject_and_record(ctx, repo, candidate, reason, stage).await;
            }
            stage = PipelineStage::TestsChecked;
        }

        info!(run_id = %ctx.run_id, %repo, %file_path, ?stage, "fix applied");
        Ok(FixDecision::Applied(applied))
    }

    async fn reject_and_record(
        &self,
        ctx: &RunContext,
        repo: &str,
        candidate: &FixCandidate,
        reason: RejectionReason,
        stage: PipelineStage,
    ) -> Result<FixDecision, PipelineError> {
        if reason.is_recorded() {
            let mut text = format!("{}: {reason}", reason.kind());
            if text.len() > RECORDED_REASON_LIMIT {
                let mut cut = RECORDED_REASON_LIMIT;
                while !text.is_char_boundary(cut) {
                    cut -= 1;
                }
                text.truncate(cut);
            }
            self.memory
                .record(
                    repo,
                    &candidate.file_path,
                    &candidate.original,
                    &candidate.replacement,
                    &text,
                )
                .await?;
        }
        Ok(self.rejected(ctx, repo, reason, stage))
    }

    fn rejected(
        &self,
        ctx: &RunContext,
        repo: &str,
        reason: RejectionReason,
        stage: PipelineStage,
    ) -> FixDecision {
        info!(
            run_id = %ctx.run_id,
            %repo,
            rejection = reason.kind(),
            ?stage,
            %reason,
            "fix rejected"
        );
        FixDecision::Rejected { reason, stage }
    }
}

/// Run filesystem work on the blocking pool.
async fn blocking<T, F>(work: F) -> io::Result<T>
where
    F: FnOnce() -> io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(io::Error::other)?
}

/// Write `content` to a new temporary file next to `target`, keeping its
/// extension and permissions. The file is removed when the handle drops.
fn stage_file(target: &Path, content: &str) -> io::Result<tempfile::NamedTempFile> {
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    let suffix = target
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default();

    let mut staged = tempfile::Builder::new()
        .prefix(".nightpatch-")
        .suffix(&suffix)
        .tempfile_in(dir)?;
    staged.write_all(content.as_bytes())?;
    staged.as_file().sync_all()?;

    if let Ok(metadata) = fs::metadata(target) {
        fs::set_permissions(staged.path(), metadata.permissions())?;
    }
    Ok(staged)
}

/// Replace `target` with `content` through a same-directory rename.
pub fn write_atomic(target: &Path, content: &str) -> io::Result<()> {
    let staged = stage_file(target, content)?;
    staged.persist(target).map_err(|e| e.error)?;
    Ok(())
}
