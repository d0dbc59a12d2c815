//! Error types for pipesync-core.

use thiserror::Error;

/// All errors that can arise while validating startup input.
///
/// Every variant is an invalid-input condition: the caller prints usage and
/// exits without ever entering the run loop.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The branch argument contained no non-empty branch name.
    #[error("branch list is empty")]
    EmptyBranchList,

    /// The wait-period argument did not match the time-span grammar.
    #[error("invalid wait period '{input}': {reason}")]
    InvalidWaitPeriod { input: String, reason: &'static str },

    /// A credential resolved to an empty string.
    #[error("credential '{name}' is empty")]
    EmptyCredential { name: String },
}
