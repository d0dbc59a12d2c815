//! Domain types shared by the resolver, the orchestrator and the updaters.
//!
//! [`RunConfiguration`] is immutable once built; every field is validated on
//! construction so holders never re-check invariants.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::ConfigError;
use crate::wait_period::WaitPeriod;

// ---------------------------------------------------------------------------
// Secret names
// ---------------------------------------------------------------------------

/// Vault secret holding the tracking-service personal access token.
pub const TRACKING_SERVICE_PAT_SECRET: &str = "TestDashboardVstsPat";
/// Vault secret holding the project personal access token.
pub const PROJECT_PAT_SECRET: &str = "iotedgeDevOpsProjectPAT";
/// Vault secret holding the destination database connection string.
pub const DB_CONNECTION_STRING_SECRET: &str = "TestDashboardDbConnectionString";

/// A strongly-typed name for a secret in the backing store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SecretName(pub String);

impl fmt::Display for SecretName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for SecretName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SecretName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A resolved secret. `Debug` never prints the value and there is no
/// `Display` or `Serialize` impl, so it cannot end up in logs by accident.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretValue(String);

impl SecretValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the secret material. Callers must not log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretValue(<redacted>)")
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// The three secret-backed credentials the batch updater needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    tracking_service_pat: SecretValue,
    project_pat: SecretValue,
    db_connection_string: SecretValue,
}

impl Credentials {
    /// Assemble credentials, rejecting any empty value.
    pub fn new(
        tracking_service_pat: SecretValue,
        project_pat: SecretValue,
        db_connection_string: SecretValue,
    ) -> Result<Self, ConfigError> {
        for (name, value) in [
            (TRACKING_SERVICE_PAT_SECRET, &tracking_service_pat),
            (PROJECT_PAT_SECRET, &project_pat),
            (DB_CONNECTION_STRING_SECRET, &db_connection_string),
        ] {
            if value.is_empty() {
                return Err(ConfigError::EmptyCredential {
                    name: name.to_string(),
                });
            }
        }
        Ok(Self {
            tracking_service_pat,
            project_pat,
            db_connection_string,
        })
    }

    pub fn tracking_service_pat(&self) -> &SecretValue {
        &self.tracking_service_pat
    }

    pub fn project_pat(&self) -> &SecretValue {
        &self.project_pat
    }

    pub fn db_connection_string(&self) -> &SecretValue {
        &self.db_connection_string
    }
}

// ---------------------------------------------------------------------------
// Branches
// ---------------------------------------------------------------------------

/// A non-empty, deduplicated set of branch names.
///
/// Parsed from a comma-separated list. Segments are not trimmed; empty
/// segments (`"a,,b"`, trailing commas) are dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchSet(BTreeSet<String>);

impl BranchSet {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false` for a constructed set; provided for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, branch: &str) -> bool {
        self.0.contains(branch)
    }
}

impl FromStr for BranchSet {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let branches: BTreeSet<String> = s
            .split(',')
            .filter(|segment| !segment.is_empty())
            .map(str::to_owned)
            .collect();
        if branches.is_empty() {
            return Err(ConfigError::EmptyBranchList);
        }
        Ok(Self(branches))
    }
}

impl fmt::Display for BranchSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<&str> = self.iter().collect();
        f.write_str(&joined.join(","))
    }
}

// ---------------------------------------------------------------------------
// RunConfiguration
// ---------------------------------------------------------------------------

/// Everything the orchestrator needs for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct RunConfiguration {
    branches: BranchSet,
    wait_period: WaitPeriod,
    credentials: Credentials,
}

impl RunConfiguration {
    pub fn new(branches: BranchSet, wait_period: WaitPeriod, credentials: Credentials) -> Self {
        Self {
            branches,
            wait_period,
            credentials,
        }
    }

    pub fn branches(&self) -> &BranchSet {
        &self.branches
    }

    pub fn wait_period(&self) -> WaitPeriod {
        self.wait_period
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }
}
