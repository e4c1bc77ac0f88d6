//! Port trait definitions (Hexagonal Architecture)
//!
//! Async trait interfaces that adapters implement:
//! - AnalysisService: proposes zero or one fix per repository
//! - RepositoryTransport: clone, branch, commit and push
//! - PullRequestService: managed pull requests and open issues
//! - RejectedFixStore: keyed storage behind rejected-fix memory
//! - RunHistoryRepository: append-only run and outcome records
//! - Clock: wall-clock source for deadlines and timestamps

pub mod analysis_service;
pub mod clock;
pub mod pr_service;
pub mod rejected_fix_store;
pub mod repository_transport;
pub mod run_history;

pub use analysis_service::AnalysisService;
pub use clock::{Clock, SystemClock};
pub use pr_service::{PullRequestDraft, PullRequestService};
pub use rejected_fix_store::RejectedFixStore;
pub use repository_transport::RepositoryTransport;
pub use run_history::RunHistoryRepository;
