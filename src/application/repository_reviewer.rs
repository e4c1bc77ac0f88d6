//! One repository, one night: clone, analyze, vet, publish.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::application::orchestrator::RepositoryWorker;
use crate::domain::models::{
    FixCandidate, NoOpReason, PullRequestRef, RepositorySnapshot, RunContext, RunTimezone, SkipReason,
    TaskOutcome,
};
use crate::domain::ports::{
    AnalysisService, Clock, PullRequestDraft, PullRequestService, RepositoryTransport,
};
use crate::services::fix_pipeline::{AppliedFix, FixDecision, FixSafetyPipeline};
use crate::services::issue_prioritizer::{filter_actionable, prioritize, DEFAULT_ISSUE_LIMIT};
use crate::services::pr_description::{branch_name, build_body, commit_message};
use crate::services::source_collector::{collect_ranked, CollectLimits};

#[derive(Debug, Clone)]
pub struct ReviewerConfig {
    pub branch_prefix: String,
    pub timezone: RunTimezone,
    pub collect: CollectLimits,
}

pub struct RepositoryReviewer {
    transport: Arc<dyn RepositoryTransport>,
    pull_requests: Arc<dyn PullRequestService>,
    analysis: Arc<dyn AnalysisService>,
    pipeline: Arc<FixSafetyPipeline>,
    clock: Arc<dyn Clock>,
    config: ReviewerConfig,
}

fn failed(error: impl std::fmt::Display) -> TaskOutcome {
    TaskOutcome::Failed {
        error: error.to_string(),
    }
}

impl RepositoryReviewer {
    pub fn new(
        transport: Arc<dyn RepositoryTransport>,
        pull_requests: Arc<dyn PullRequestService>,
        analysis: Arc<dyn AnalysisService>,
        pipeline: Arc<FixSafetyPipeline>,
        clock: Arc<dyn Clock>,
        config: ReviewerConfig,
    ) -> Self {
        Self {
            transport,
            pull_requests,
            analysis,
            pipeline,
            clock,
            config,
        }
    }

    async fn propose(
        &self,
        ctx: &RunContext,
        repo: &str,
        workdir: &Path,
    ) -> Result<Option<FixCandidate>, TaskOutcome> {
        let issues = match self.pull_requests.open_issues(repo).await {
            Ok(issues) => prioritize(filter_actionable(issues), DEFAULT_ISSUE_LIMIT),
            Err(e) => {
                warn!(error = %e, "Could not fetch issues, analyzing without them");
                Vec::new()
            }
        };

        let root = workdir.to_path_buf();
        let ranked_issues = issues.clone();
        let limits = self.config.collect;
        let files = tokio::task::spawn_blocking(move || collect_ranked(&root, &ranked_issues, limits))
            .await
            .map_err(|e| failed(format!("source collection failed: {e}")))?;
        debug!(files = files.len(), issues = issues.len(), "Collected analysis input");

        if files.is_empty() {
            return Ok(None);
        }

        let snapshot = RepositorySnapshot {
            repo: repo.to_string(),
            workdir: workdir.to_path_buf(),
        };
        self.analysis
            .analyze(ctx, &snapshot, &files, &issues)
            .await
            .map_err(|e| failed(format!("analysis failed: {e}")))
    }

    /// Commit the applied fix on its own branch and, outside dry runs,
    /// push it and open a pull request.
    async fn publish(
        &self,
        ctx: &RunContext,
        repo: &str,
        workdir: &Path,
        candidate: &FixCandidate,
        applied: AppliedFix,
    ) -> TaskOutcome {
        let branch = branch_name(
            &self.config.branch_prefix,
            self.clock.now(),
            self.config.timezone,
            &candidate.file_path,
        );

        if let Err(e) = self.transport.create_branch(workdir, &branch).await {
            if let Err(revert) = applied.revert().await {
                warn!(error = %revert, "Failed to revert applied fix");
            }
            if let Err(discard) = self.transport.discard_changes(workdir).await {
                warn!(error = %discard, "Failed to discard working tree changes");
            }
            return failed(format!("create branch failed: {e}"));
        }

        if let Err(e) = self
            .transport
            .commit(workdir, &applied.file_path, &commit_message(candidate))
            .await
        {
            self.cleanup(workdir, &branch, false).await;
            return failed(format!("commit failed: {e}"));
        }

        if ctx.dry_run {
            info!(%branch, file = %applied.file_path, "Dry run, fix committed locally only");
            self.cleanup(workdir, &branch, false).await;
            return TaskOutcome::Fixed {
                file_path: applied.file_path,
                branch,
                pull_request: None,
                dry_run: true,
            };
        }

        if let Err(e) = self.transport.push(workdir, &branch).await {
            self.cleanup(workdir, &branch, false).await;
            return failed(format!("push failed: {e}"));
        }

        let draft = PullRequestDraft {
            branch: branch.clone(),
            title: candidate.title.clone(),
            body: build_body(candidate),
            related_issue: candidate.related_issue,
        };
        let pull_request: PullRequestRef = match self.pull_requests.create_pr(repo, &draft).await {
            Ok(pr) => pr,
            Err(e) => {
                self.cleanup(workdir, &branch, true).await;
                return failed(format!("pull request creation failed: {e}"));
            }
        };

        info!(pr = pull_request.number, url = %pull_request.url, %branch, "Pull request opened");
        TaskOutcome::Fixed {
            file_path: applied.file_path,
            branch,
            pull_request: Some(pull_request),
            dry_run: false,
        }
    }

    async fn cleanup(&self, workdir: &Path, branch: &str, remote: bool) {
        if let Err(e) = self.transport.cleanup_branch(workdir, branch, remote).await {
            warn!(%branch, error = %e, "Branch cleanup failed");
        }
    }
}

#[async_trait]
impl RepositoryWorker for RepositoryReviewer {
    async fn review(&self, ctx: &RunContext, repo: &str) -> TaskOutcome {
        let workdir = match self.transport.clone_or_pull(repo).await {
            Ok(workdir) => workdir,
            Err(e) => return failed(format!("clone failed: {e}")),
        };

        match self.pull_requests.has_open_managed_pr(repo).await {
            Ok(true) => {
                info!("Managed pull request still open, skipping");
                return TaskOutcome::Skipped {
                    reason: SkipReason::OpenPullRequest,
                };
            }
            Ok(false) => {}
            Err(e) => return failed(format!("pull request lookup failed: {e}")),
        }

        let candidate = match self.propose(ctx, repo, &workdir).await {
            Ok(Some(candidate)) => candidate,
            Ok(None) => {
                return TaskOutcome::NoOp {
                    reason: NoOpReason::NoCandidate,
                }
            }
            Err(outcome) => return outcome,
        };
        info!(
            file = %candidate.file_path,
            confidence = %candidate.confidence,
            title = %candidate.title,
            "Candidate fix proposed"
        );

        match self.pipeline.process(ctx, repo, &workdir, &candidate).await {
            Ok(FixDecision::Applied(applied)) => {
                self.publish(ctx, repo, &workdir, &candidate, applied).await
            }
            Ok(FixDecision::Rejected { reason, .. }) => TaskOutcome::NoOp {
                reason: NoOpReason::Rejected { reason },
            },
            Err(e) => failed(format!("fix pipeline failed: {e}")),
        }
    }
}
