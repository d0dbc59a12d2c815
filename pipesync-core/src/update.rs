//! The batch-update port the orchestrator drives once per iteration.
//!
//! Implementations fetch build data, evaluate it against the bug-query set
//! and persist results. Their internals are opaque to the orchestrator.

use std::error::Error as StdError;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::bug_query::{BugQuery, BugQuerySet, BuildRecord};
use crate::types::RunConfiguration;

/// One batch update over all configured branches.
#[async_trait]
pub trait BatchUpdate: Send + Sync {
    async fn update(
        &self,
        config: &RunConfiguration,
        queries: &BugQuerySet,
    ) -> Result<UpdateReport, UpdateError>;
}

#[async_trait]
impl<T: BatchUpdate + ?Sized> BatchUpdate for Arc<T> {
    async fn update(
        &self,
        config: &RunConfiguration,
        queries: &BugQuerySet,
    ) -> Result<UpdateReport, UpdateError> {
        (**self).update(config, queries).await
    }
}

/// A failed build that matched a bug query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BugCandidate {
    pub query: BugQuery,
    pub build: BuildRecord,
}

/// What a single update saw.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateReport {
    pub builds_seen: usize,
    pub candidates: Vec<BugCandidate>,
}

/// Failure of a batch update, opaque to the orchestrator.
#[derive(Debug, Error)]
#[error("batch update failed: {0}")]
pub struct UpdateError(#[source] Box<dyn StdError + Send + Sync>);

impl UpdateError {
    pub fn new(source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self(source.into())
    }
}
