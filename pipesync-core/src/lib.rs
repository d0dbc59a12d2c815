//! pipesync core library — domain types, wait-period grammar, bug queries.
//!
//! Public API surface:
//! - [`types`] — newtypes and the immutable [`RunConfiguration`]
//! - [`wait_period`] — [`WaitPeriod`] and its time-span grammar
//! - [`bug_query`] — [`BugQuery`] catalogue and build records
//! - [`update`] — the [`BatchUpdate`] port
//! - [`error`] — [`ConfigError`]

pub mod bug_query;
pub mod error;
pub mod types;
pub mod update;
pub mod wait_period;

pub use bug_query::{
    generate_bug_queries, BugPriority, BugQuery, BugQuerySet, BuildDefinition, BuildRecord,
    BuildResult,
};
pub use error::ConfigError;
pub use types::{BranchSet, Credentials, RunConfiguration, SecretName, SecretValue};
pub use update::{BatchUpdate, BugCandidate, UpdateError, UpdateReport};
pub use wait_period::WaitPeriod;
