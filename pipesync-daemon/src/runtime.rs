use tokio_util::sync::CancellationToken;

use pipesync_core::BatchUpdate;

use crate::error::OrchestratorError;
use crate::orchestrator::{RunOutcome, SyncOrchestrator};

/// Start the async runtime and block the current thread until the
/// orchestrator stops or fails.
pub fn start_blocking<U: BatchUpdate>(
    orchestrator: SyncOrchestrator<U>,
) -> Result<RunOutcome, OrchestratorError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(OrchestratorError::Runtime)?;
    runtime.block_on(run(orchestrator, CancellationToken::new()))
}

/// Run the orchestrator with its configured wait period, cancelling `cancel`
/// on Ctrl-C or SIGTERM.
pub async fn run<U: BatchUpdate>(
    orchestrator: SyncOrchestrator<U>,
    cancel: CancellationToken,
) -> Result<RunOutcome, OrchestratorError> {
    // Handlers are registered before the first update so an early signal
    // still stops the loop.
    let signal_handle = match ShutdownSignal::install() {
        Ok(signal) => Some(tokio::spawn(cancel_on_signal(signal, cancel.clone()))),
        Err(err) => {
            tracing::error!(error = %err, "failed to install shutdown signal handler");
            None
        }
    };
    let wait = orchestrator.config().wait_period();
    let result = orchestrator.run(wait, cancel).await;
    if let Some(handle) = signal_handle {
        handle.abort();
    }
    result
}

async fn cancel_on_signal(mut signal: ShutdownSignal, cancel: CancellationToken) {
    tokio::select! {
        _ = cancel.cancelled() => {}
        name = signal.recv() => {
            tracing::info!(signal = name, "received shutdown signal, stopping after current step");
            cancel.cancel();
        }
    }
}

/// Registered Ctrl-C and SIGTERM listeners.
#[cfg(unix)]
struct ShutdownSignal {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl ShutdownSignal {
    fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.interrupt.recv() => "ctrl-c",
            _ = self.terminate.recv() => "SIGTERM",
        }
    }
}

#[cfg(not(unix))]
struct ShutdownSignal {
    ctrl_c: tokio::signal::windows::CtrlC,
}

#[cfg(not(unix))]
impl ShutdownSignal {
    fn install() -> std::io::Result<Self> {
        Ok(Self {
            ctrl_c: tokio::signal::windows::ctrl_c()?,
        })
    }

    async fn recv(&mut self) -> &'static str {
        self.ctrl_c.recv().await;
        "ctrl-c"
    }
}

/// Install the global subscriber. `RUST_LOG` sets the filter (default
/// `info`); `PIPESYNC_LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("PIPESYNC_LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        let _ = fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .try_init();
    } else {
        let _ = fmt().with_env_filter(filter).with_target(false).try_init();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use pipesync_core::{
        generate_bug_queries, BugQuerySet, Credentials, RunConfiguration, SecretValue,
        UpdateError, UpdateReport,
    };

    use super::*;

    struct CountingUpdate(AtomicUsize);

    #[async_trait]
    impl BatchUpdate for CountingUpdate {
        async fn update(
            &self,
            _config: &RunConfiguration,
            _queries: &BugQuerySet,
        ) -> Result<UpdateReport, UpdateError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(UpdateReport::default())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_when_external_token_is_cancelled() {
        let update = Arc::new(CountingUpdate(AtomicUsize::new(0)));
        let config = RunConfiguration::new(
            "main".parse().expect("branches"),
            "00:05:00".parse().expect("wait"),
            Credentials::new(
                SecretValue::new("a"),
                SecretValue::new("b"),
                SecretValue::new("c"),
            )
            .expect("credentials"),
        );
        let orchestrator = SyncOrchestrator::new(config, generate_bug_queries(), update.clone());

        let cancel = CancellationToken::new();
        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                // Lands inside the third wait (updates at 0, 5 and 10 minutes).
                tokio::time::sleep(std::time::Duration::from_secs(12 * 60)).await;
                cancel.cancel();
            })
        };

        let outcome = run(orchestrator, cancel).await.expect("run");
        canceller.await.expect("canceller");
        assert_eq!(outcome.iterations, 3);
        assert_eq!(update.0.load(Ordering::SeqCst), 3);
    }
}
