//! # pipesync-devops
//!
//! Batch updater backed by the project-tracking service's build REST API.
//!
//! [`DevOpsBatchUpdate`] lists the latest completed builds for every
//! configured branch and reports the ones matching a bug query. Writing
//! those results to the dashboard database and filing the bugs happen
//! downstream of the [`UpdateReport`](pipesync_core::UpdateReport).

pub mod builds;
pub mod error;

pub use builds::{evaluate, DevOpsBatchUpdate, DEFAULT_ORG_URL, DEFAULT_PROJECT};
pub use error::DevOpsError;
