//! pipesync — periodic build-data sync and bug filing agent.
//!
//! # Usage
//!
//! ```text
//! pipesync <branches> <wait-period> [--vault-url URL] [--update-attempts N]
//!          [--devops-org-url URL] [--devops-project NAME]
//! ```
//!
//! Exit status: 0 only after a signal-driven stop. Malformed arguments
//! (`--help` and `--version` included) and startup or update failures exit 1.

mod resolver;

use std::process::ExitCode;

use anyhow::{Context, Result};

use pipesync_core::generate_bug_queries;
use pipesync_daemon::{init_tracing, start_blocking, RetryPolicy, SyncOrchestrator};
use pipesync_devops::DevOpsBatchUpdate;
use pipesync_vault::{KeyVaultSecretProvider, ManagedIdentityCredential};

use resolver::{Resolved, StartupError, USAGE};

fn main() -> Result<ExitCode> {
    let Resolved { cli, config } = match resolver::resolve(std::env::args_os(), |cli| {
        init_tracing();
        KeyVaultSecretProvider::new(&cli.vault_url, ManagedIdentityCredential::from_env())
    }) {
        Ok(resolved) => resolved,
        Err(StartupError::InvalidInput(reason)) => {
            eprintln!("{}", reason.trim_end());
            println!("{USAGE}");
            return Ok(ExitCode::from(1));
        }
        Err(err) => return Err(err).context("startup failed"),
    };

    tracing::info!(
        wait_period = %config.wait_period(),
        branches = %config.branches(),
        "wait period before next update",
    );

    let queries = generate_bug_queries();
    let updater = DevOpsBatchUpdate::new(&cli.devops_org_url, &cli.devops_project);
    let orchestrator = SyncOrchestrator::new(config, queries, updater)
        .with_retry(RetryPolicy::new(cli.update_attempts));

    let outcome = start_blocking(orchestrator).context("sync orchestrator failed")?;
    tracing::info!(iterations = outcome.iterations, "pipesync stopped");
    Ok(ExitCode::SUCCESS)
}
