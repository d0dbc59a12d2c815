//! Build listing and bug-query evaluation.

use std::collections::BTreeSet;
use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use pipesync_core::{
    BatchUpdate, BugCandidate, BugQuerySet, BuildRecord, BuildResult, RunConfiguration,
    SecretValue, UpdateError, UpdateReport,
};

use crate::error::{request_err, DevOpsError};

pub const DEFAULT_ORG_URL: &str = "https://dev.azure.com/msazure";
pub const DEFAULT_PROJECT: &str = "One";

const BUILD_API_VERSION: &str = "6.0";
const DEFAULT_BUILDS_PER_BRANCH: u32 = 50;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct BuildList {
    value: Vec<BuildDto>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuildDto {
    id: u64,
    build_number: String,
    source_branch: String,
    result: Option<BuildResult>,
    finish_time: Option<DateTime<Utc>>,
    definition: DefinitionRef,
    #[serde(rename = "_links")]
    links: Option<Links>,
}

#[derive(Deserialize)]
struct DefinitionRef {
    id: u32,
}

#[derive(Deserialize)]
struct Links {
    web: Option<Href>,
}

#[derive(Deserialize)]
struct Href {
    href: String,
}

impl BuildDto {
    /// Builds still running carry no result and are skipped.
    fn into_record(self) -> Option<BuildRecord> {
        let result = self.result?;
        let branch = self
            .source_branch
            .strip_prefix("refs/heads/")
            .unwrap_or(&self.source_branch)
            .to_string();
        Some(BuildRecord {
            id: self.id,
            definition_id: self.definition.id,
            build_number: self.build_number,
            branch,
            result,
            finish_time: self.finish_time,
            web_url: self.links.and_then(|links| links.web).map(|web| web.href),
        })
    }
}

// ---------------------------------------------------------------------------
// Updater
// ---------------------------------------------------------------------------

/// [`BatchUpdate`] that reads completed builds from the build REST API.
#[derive(Clone)]
pub struct DevOpsBatchUpdate {
    org_url: String,
    project: String,
    builds_per_branch: u32,
    agent: ureq::Agent,
}

impl DevOpsBatchUpdate {
    pub fn new(org_url: impl Into<String>, project: impl Into<String>) -> Self {
        let mut org_url = org_url.into();
        while org_url.ends_with('/') {
            org_url.pop();
        }
        Self {
            org_url,
            project: project.into(),
            builds_per_branch: DEFAULT_BUILDS_PER_BRANCH,
            agent: ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build(),
        }
    }

    pub fn with_builds_per_branch(mut self, builds: u32) -> Self {
        self.builds_per_branch = builds.max(1);
        self
    }

    fn builds_url(&self) -> String {
        format!("{}/{}/_apis/build/builds", self.org_url, self.project)
    }

    fn fetch_branch(
        &self,
        branch: &str,
        definitions: &str,
        pat: &SecretValue,
    ) -> Result<Vec<BuildRecord>, DevOpsError> {
        let list: BuildList = self
            .agent
            .get(&self.builds_url())
            .set("Authorization", &basic_auth(pat))
            .query("definitions", definitions)
            .query("branchName", &format!("refs/heads/{branch}"))
            .query("statusFilter", "completed")
            .query("queryOrder", "finishTimeDescending")
            .query("$top", &self.builds_per_branch.to_string())
            .query("api-version", BUILD_API_VERSION)
            .call()
            .map_err(|err| request_err(branch, err))?
            .into_json()
            .map_err(|source| DevOpsError::Decode {
                branch: branch.to_string(),
                source,
            })?;
        Ok(list
            .value
            .into_iter()
            .filter_map(BuildDto::into_record)
            .collect())
    }

    fn update_blocking(
        &self,
        branches: &[String],
        pat: &SecretValue,
        queries: &BugQuerySet,
    ) -> Result<UpdateReport, DevOpsError> {
        let definitions = definition_filter(queries);
        let mut report = UpdateReport::default();

        for branch in branches {
            let started = Instant::now();
            let builds = self.fetch_branch(branch, &definitions, pat)?;
            let candidates = evaluate(&builds, queries);
            tracing::info!(
                branch = %branch,
                builds = builds.len(),
                candidates = candidates.len(),
                duration_ms = started.elapsed().as_millis(),
                "fetched branch builds",
            );
            report.builds_seen += builds.len();
            report.candidates.extend(candidates);
        }
        Ok(report)
    }
}

impl fmt::Debug for DevOpsBatchUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DevOpsBatchUpdate")
            .field("org_url", &self.org_url)
            .field("project", &self.project)
            .field("builds_per_branch", &self.builds_per_branch)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl BatchUpdate for DevOpsBatchUpdate {
    async fn update(
        &self,
        config: &RunConfiguration,
        queries: &BugQuerySet,
    ) -> Result<UpdateReport, UpdateError> {
        let this = self.clone();
        let branches: Vec<String> = config.branches().iter().map(str::to_owned).collect();
        let pat = config.credentials().tracking_service_pat().clone();
        let queries = queries.clone();

        tokio::task::spawn_blocking(move || this.update_blocking(&branches, &pat, &queries))
            .await
            .map_err(|err| UpdateError::new(DevOpsError::Join(err.to_string())))?
            .map_err(UpdateError::new)
    }
}

/// Every (query, build) pair where the build satisfies the query.
pub fn evaluate(builds: &[BuildRecord], queries: &BugQuerySet) -> Vec<BugCandidate> {
    builds
        .iter()
        .flat_map(|build| {
            queries
                .iter()
                .filter(|query| query.matches(build))
                .map(|query| BugCandidate {
                    query: query.clone(),
                    build: build.clone(),
                })
        })
        .collect()
}

fn definition_filter(queries: &BugQuerySet) -> String {
    let ids: BTreeSet<u32> = queries.iter().map(|query| query.definition.id()).collect();
    ids.iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn basic_auth(pat: &SecretValue) -> String {
    format!("Basic {}", STANDARD.encode(format!(":{}", pat.expose())))
}

#[cfg(test)]
mod tests {
    use pipesync_core::{generate_bug_queries, BugQuery, BuildDefinition};

    use super::*;

    fn record(id: u64, definition: BuildDefinition, result: BuildResult) -> BuildRecord {
        BuildRecord {
            id,
            definition_id: definition.id(),
            build_number: format!("20240101.{id}"),
            branch: "main".to_string(),
            result,
            finish_time: None,
            web_url: None,
        }
    }

    #[test]
    fn evaluate_reports_only_matching_builds() {
        let queries = generate_bug_queries();
        let builds = vec![
            record(1, BuildDefinition::Ci, BuildResult::Failed),
            record(2, BuildDefinition::Ci, BuildResult::Succeeded),
            record(3, BuildDefinition::StressTest, BuildResult::PartiallySucceeded),
            record(4, BuildDefinition::LongHaulTest, BuildResult::Canceled),
        ];

        let candidates = evaluate(&builds, &queries);
        let ids: Vec<u64> = candidates.iter().map(|c| c.build.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(
            candidates[0].query,
            BugQuery::new(BuildDefinition::Ci, BuildResult::Failed)
        );
    }

    #[test]
    fn definition_filter_lists_each_id_once() {
        let filter = definition_filter(&generate_bug_queries());
        let ids: Vec<&str> = filter.split(',').collect();
        assert_eq!(ids.len(), BuildDefinition::ALL.len());
        assert!(ids.contains(&"45137"));
    }

    #[test]
    fn basic_auth_uses_empty_user_name() {
        // ":pat" base64-encoded
        assert_eq!(basic_auth(&SecretValue::new("pat")), "Basic OnBhdA==");
    }

    #[test]
    fn running_builds_are_skipped_and_branch_is_shortened() {
        let json = r#"{"count":2,"value":[
            {"id":7,"buildNumber":"1","sourceBranch":"refs/heads/release/1.0","result":"failed",
             "finishTime":"2024-01-01T00:00:00Z","definition":{"id":45137},
             "_links":{"web":{"href":"https://example.test/7"}}},
            {"id":8,"buildNumber":"2","sourceBranch":"refs/heads/main",
             "definition":{"id":45137}}
        ]}"#;
        let list: BuildList = serde_json::from_str(json).expect("decode build list");
        let records: Vec<BuildRecord> = list
            .value
            .into_iter()
            .filter_map(BuildDto::into_record)
            .collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].branch, "release/1.0");
        assert_eq!(records[0].web_url.as_deref(), Some("https://example.test/7"));
    }
}
