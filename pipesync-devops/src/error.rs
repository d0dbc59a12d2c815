//! Error types for pipesync-devops.

use thiserror::Error;

/// All errors that can arise while pulling build data.
#[derive(Debug, Error)]
pub enum DevOpsError {
    /// Non-success HTTP status from the build API.
    #[error("build API returned HTTP {status} for branch '{branch}'")]
    Status { branch: String, status: u16 },

    /// Network-level failure.
    #[error("transport error for branch '{branch}': {message}")]
    Transport { branch: String, message: String },

    /// The response body was not the expected JSON.
    #[error("malformed build list for branch '{branch}': {source}")]
    Decode {
        branch: String,
        #[source]
        source: std::io::Error,
    },

    /// The blocking fetch task panicked or was cancelled.
    #[error("build fetch task failed: {0}")]
    Join(String),
}

pub(crate) fn request_err(branch: &str, err: ureq::Error) -> DevOpsError {
    match err {
        ureq::Error::Status(status, _) => DevOpsError::Status {
            branch: branch.to_string(),
            status,
        },
        ureq::Error::Transport(transport) => DevOpsError::Transport {
            branch: branch.to_string(),
            message: transport.to_string(),
        },
    }
}
