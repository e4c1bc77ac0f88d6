pub mod deadline;
pub mod orchestrator;
pub mod repository_reviewer;
pub mod shutdown;
pub mod worker_slots;

pub use deadline::DeadlineEnforcer;
pub use orchestrator::{Orchestrator, OrchestratorConfig, OrchestratorError, RepositoryWorker};
pub use repository_reviewer::{RepositoryReviewer, ReviewerConfig};
pub use shutdown::{listen_for_signals, ShutdownHandle};
pub use worker_slots::{SlotGuard, WorkerSlotTracker};
