pub mod config;
pub mod fix;
pub mod issue;
pub mod run;
pub mod task;
pub mod timezone;

pub use config::{
    AnalysisConfig, AnalysisProvider, CheckerConfig, Config, DatabaseConfig, GitConfig, GitHubConfig,
    LoggingConfig, PipelineConfig, UnavailablePolicy,
};
pub use fix::{Confidence, FixCandidate, FixKey, RejectedFixRecord, RejectionReason};
pub use issue::Issue;
pub use run::{OutcomeRecord, ReviewRun, RunContext, RunStatus, RunSummary};
pub use task::{
    split_repo, NoOpReason, PullRequestRef, RepositorySnapshot, RepositoryTask, SkipReason,
    SourceFile, TaskOutcome,
};
pub use timezone::RunTimezone;
