//! Sync orchestrator runtime: the update/wait loop, signal wiring, logging.

mod error;
pub mod orchestrator;
mod runtime;

pub use error::OrchestratorError;
pub use orchestrator::{OrchestratorState, RetryPolicy, RunOutcome, SyncOrchestrator};
pub use runtime::{init_tracing, run, start_blocking};
pub use tokio_util::sync::CancellationToken;
