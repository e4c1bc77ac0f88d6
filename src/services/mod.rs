pub mod command;
pub mod content_matcher;
pub mod diff_guard;
pub mod fix_pipeline;
pub mod issue_prioritizer;
pub mod path_guard;
pub mod pr_description;
pub mod rejected_fix_memory;
pub mod source_collector;
pub mod syntax_validator;
pub mod test_runner;

pub use content_matcher::{match_span, MatchOutcome};
pub use diff_guard::DiffGuard;
pub use fix_pipeline::{AppliedFix, FixDecision, FixSafetyPipeline, PipelineError, PipelineStage};
pub use rejected_fix_memory::RejectedFixMemory;
pub use syntax_validator::{CommandChecker, SyntaxChecker, SyntaxOutcome, SyntaxValidator};
pub use test_runner::{TestOutcome, TestRunner};
