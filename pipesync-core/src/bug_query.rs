//! The fixed catalogue of failing-build conditions that warrant a bug report.
//!
//! [`generate_bug_queries`] is pure and deterministic: the same set comes
//! back on every call, and [`BugQuerySet`] collapses duplicates.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Set of bug queries keyed by query identity, iterated in a stable order.
pub type BugQuerySet = BTreeSet<BugQuery>;

// ---------------------------------------------------------------------------
// Build vocabulary
// ---------------------------------------------------------------------------

/// Pipelines whose failures are tracked as bugs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildDefinition {
    Ci,
    EdgeletCi,
    EndToEndTest,
    ConnectivityTest,
    LongHaulTest,
    StressTest,
}

impl BuildDefinition {
    pub const ALL: [BuildDefinition; 6] = [
        BuildDefinition::Ci,
        BuildDefinition::EdgeletCi,
        BuildDefinition::EndToEndTest,
        BuildDefinition::ConnectivityTest,
        BuildDefinition::LongHaulTest,
        BuildDefinition::StressTest,
    ];

    /// Numeric pipeline definition id in the project-tracking service.
    pub fn id(self) -> u32 {
        match self {
            BuildDefinition::Ci => 45137,
            BuildDefinition::EdgeletCi => 37729,
            BuildDefinition::EndToEndTest => 87020,
            BuildDefinition::ConnectivityTest => 98911,
            BuildDefinition::LongHaulTest => 98912,
            BuildDefinition::StressTest => 98913,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            BuildDefinition::Ci => "CI",
            BuildDefinition::EdgeletCi => "Edgelet CI",
            BuildDefinition::EndToEndTest => "End-to-End Test",
            BuildDefinition::ConnectivityTest => "Connectivity Test",
            BuildDefinition::LongHaulTest => "Long Haul Test",
            BuildDefinition::StressTest => "Stress Test",
        }
    }

    /// Work-item area that owns bugs for this pipeline.
    pub fn area_path(self) -> &'static str {
        match self {
            BuildDefinition::Ci | BuildDefinition::EdgeletCi => "One\\IoT\\Platform\\IoTEdge\\Build",
            BuildDefinition::EndToEndTest => "One\\IoT\\Platform\\IoTEdge\\Test",
            BuildDefinition::ConnectivityTest
            | BuildDefinition::LongHaulTest
            | BuildDefinition::StressTest => "One\\IoT\\Platform\\IoTEdge\\Reliability",
        }
    }

    fn is_gating(self) -> bool {
        matches!(
            self,
            BuildDefinition::Ci | BuildDefinition::EdgeletCi | BuildDefinition::EndToEndTest
        )
    }
}

impl fmt::Display for BuildDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Completion result of a build, as reported by the build service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BuildResult {
    Succeeded,
    PartiallySucceeded,
    Failed,
    Canceled,
    None,
}

impl BuildResult {
    pub const FAILING: [BuildResult; 2] = [BuildResult::Failed, BuildResult::PartiallySucceeded];

    pub fn as_str(self) -> &'static str {
        match self {
            BuildResult::Succeeded => "succeeded",
            BuildResult::PartiallySucceeded => "partiallySucceeded",
            BuildResult::Failed => "failed",
            BuildResult::Canceled => "canceled",
            BuildResult::None => "none",
        }
    }
}

impl fmt::Display for BuildResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One completed build pulled from the tracking service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRecord {
    pub id: u64,
    pub definition_id: u32,
    pub build_number: String,
    /// Short branch name (`main`, not `refs/heads/main`).
    pub branch: String,
    pub result: BuildResult,
    pub finish_time: Option<DateTime<Utc>>,
    pub web_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Bug queries
// ---------------------------------------------------------------------------

/// Bug priority assigned to a failure condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BugPriority {
    P1,
    P2,
}

impl BugPriority {
    pub fn level(self) -> u8 {
        match self {
            BugPriority::P1 => 1,
            BugPriority::P2 => 2,
        }
    }
}

/// A declarative failure condition: "builds of `definition` ending in `result`".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BugQuery {
    pub definition: BuildDefinition,
    pub result: BuildResult,
    pub priority: BugPriority,
}

impl BugQuery {
    pub fn new(definition: BuildDefinition, result: BuildResult) -> Self {
        let priority = match (definition.is_gating(), result) {
            (true, BuildResult::Failed) => BugPriority::P1,
            _ => BugPriority::P2,
        };
        Self {
            definition,
            result,
            priority,
        }
    }

    /// Title used for bugs filed from this condition.
    pub fn title(&self) -> String {
        format!("[{}] build {}", self.definition, self.result)
    }

    pub fn area_path(&self) -> &'static str {
        self.definition.area_path()
    }

    pub fn matches(&self, build: &BuildRecord) -> bool {
        build.definition_id == self.definition.id() && build.result == self.result
    }
}

/// Build the fixed catalogue: every tracked pipeline crossed with every
/// failing result.
pub fn generate_bug_queries() -> BugQuerySet {
    BuildDefinition::ALL
        .into_iter()
        .flat_map(|definition| {
            BuildResult::FAILING
                .into_iter()
                .map(move |result| BugQuery::new(definition, result))
        })
        .collect()
}
