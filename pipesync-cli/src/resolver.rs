//! Input resolution: argument validation plus the three secret lookups.
//!
//! Nothing here exits the process. Invalid input comes back as
//! [`StartupError::InvalidInput`] and the entry point decides what to do.

use std::ffi::OsString;

use clap::Parser;
use thiserror::Error;

use pipesync_core::types::{
    DB_CONNECTION_STRING_SECRET, PROJECT_PAT_SECRET, TRACKING_SERVICE_PAT_SECRET,
};
use pipesync_core::{BranchSet, ConfigError, Credentials, RunConfiguration, SecretName, WaitPeriod};
use pipesync_devops::{DEFAULT_ORG_URL, DEFAULT_PROJECT};
use pipesync_vault::{SecretError, SecretProvider, DEFAULT_VAULT_URL};

/// Printed to standard output whenever the arguments are rejected.
pub const USAGE: &str = "\
*** This service ingests build data from the project-tracking service and uploads it to the database used by the test dashboard. It also generates bugs from failing builds.
Authenticates with the database and the tracking service using secrets from key vault.
pipesync <branches> <wait-period>
Usage:
 branches: comma delimited names of branches
 wait-period: time between db updates (e.g. 00:01:00)";

#[derive(Parser, Debug)]
#[command(
    name = "pipesync",
    version,
    about = "Sync build data into the test dashboard and file bugs for failing builds",
    long_about = None,
)]
pub struct Cli {
    /// Comma delimited names of branches.
    pub branches: BranchSet,

    /// Time between db updates (e.g. 00:01:00).
    pub wait_period: WaitPeriod,

    /// Key vault holding the service secrets.
    #[arg(long, env = "PIPESYNC_VAULT_URL", default_value = DEFAULT_VAULT_URL)]
    pub vault_url: String,

    /// Attempts per update before the run fails (1 = fail fast).
    #[arg(
        long,
        env = "PIPESYNC_UPDATE_ATTEMPTS",
        default_value_t = 1,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub update_attempts: u32,

    /// Organisation URL of the build service.
    #[arg(long, env = "PIPESYNC_DEVOPS_ORG_URL", default_value = DEFAULT_ORG_URL)]
    pub devops_org_url: String,

    /// Project whose builds are ingested.
    #[arg(long, env = "PIPESYNC_DEVOPS_PROJECT", default_value = DEFAULT_PROJECT)]
    pub devops_project: String,
}

/// Why startup did not produce a [`RunConfiguration`].
#[derive(Debug, Error)]
pub enum StartupError {
    /// Malformed invocation; the caller prints [`USAGE`] and exits with 1.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    SecretUnavailable(#[from] SecretError),

    #[error("invalid credentials: {0}")]
    Credentials(#[from] ConfigError),
}

/// Validated arguments together with the assembled configuration.
#[derive(Debug)]
pub struct Resolved {
    pub cli: Cli,
    pub config: RunConfiguration,
}

/// Parse `args` (program name first) without touching any secret.
///
/// Anything but a runnable invocation is invalid input, `--help` and
/// `--version` included: the process only exits 0 after a cancelled run.
pub fn parse_args<I, T>(args: I) -> Result<Cli, StartupError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    Cli::try_parse_from(args).map_err(|err| StartupError::InvalidInput(err.to_string()))
}

/// Parse `args`, then build a provider from the parsed options and resolve
/// the three credentials in a fixed order. The first failing lookup aborts
/// resolution.
pub fn resolve<I, T, P, F>(args: I, make_provider: F) -> Result<Resolved, StartupError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    P: SecretProvider,
    F: FnOnce(&Cli) -> P,
{
    let cli = parse_args(args)?;
    let provider = make_provider(&cli);

    let fetch = |name: &str| provider.resolve(&SecretName::from(name));
    let tracking_service_pat = fetch(TRACKING_SERVICE_PAT_SECRET)?;
    let project_pat = fetch(PROJECT_PAT_SECRET)?;
    let db_connection_string = fetch(DB_CONNECTION_STRING_SECRET)?;
    let credentials = Credentials::new(tracking_service_pat, project_pat, db_connection_string)?;

    let config = RunConfiguration::new(cli.branches.clone(), cli.wait_period, credentials);
    Ok(Resolved { cli, config })
}
