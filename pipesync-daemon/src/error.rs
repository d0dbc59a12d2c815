use pipesync_core::UpdateError;
use thiserror::Error;

/// Error surface for the orchestrator loop and its runtime.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The batch update failed and retries, if any, were exhausted.
    #[error("update iteration {iteration} failed after {attempts} attempt(s): {source}")]
    UpdateFailure {
        iteration: u64,
        attempts: u32,
        #[source]
        source: UpdateError,
    },

    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
}
