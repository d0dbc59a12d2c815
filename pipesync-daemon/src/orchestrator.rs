//! The update/wait loop.
//!
//! One logical task: each iteration awaits a single batch update, then
//! either stops (cancellation observed) or waits the configured period.
//! Cancellation is checked after every update and during the wait only; an
//! update already in flight always runs to completion.

use std::time::Instant;

use tokio_util::sync::CancellationToken;

use pipesync_core::{BatchUpdate, BugQuerySet, RunConfiguration, UpdateReport, WaitPeriod};

use crate::error::OrchestratorError;

/// Orchestrator lifecycle. `Stopped` is reached only through cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Running,
    Stopped,
}

/// How often a failing update is attempted within one iteration before the
/// run fails. The default is a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl RetryPolicy {
    /// Fail the run on the first update error.
    pub const FAIL_FAST: RetryPolicy = RetryPolicy { max_attempts: 1 };

    /// `max_attempts` below one is treated as one.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::FAIL_FAST
    }
}

/// Result of a run that ended through cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    pub iterations: u64,
    pub state: OrchestratorState,
}

/// Owns the configuration and the query set for the process lifetime and
/// drives the batch updater on a fixed cadence.
pub struct SyncOrchestrator<U> {
    config: RunConfiguration,
    queries: BugQuerySet,
    updater: U,
    retry: RetryPolicy,
}

impl<U: BatchUpdate> SyncOrchestrator<U> {
    pub fn new(config: RunConfiguration, queries: BugQuerySet, updater: U) -> Self {
        Self {
            config,
            queries,
            updater,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &RunConfiguration {
        &self.config
    }

    /// Run until `cancel` fires. The first update starts immediately.
    ///
    /// Returns `Ok` only after cancellation; an update failure (after
    /// retries) ends the run with [`OrchestratorError::UpdateFailure`].
    pub async fn run(
        &self,
        wait: WaitPeriod,
        cancel: CancellationToken,
    ) -> Result<RunOutcome, OrchestratorError> {
        tracing::info!(
            branches = %self.config.branches(),
            queries = self.queries.len(),
            wait = %wait,
            max_attempts = self.retry.max_attempts(),
            "orchestrator running",
        );

        let mut state = OrchestratorState::Running;
        let mut iterations = 0u64;
        while state == OrchestratorState::Running {
            iterations += 1;
            self.run_iteration(iterations).await?;
            state = next_state(iterations, wait, &cancel).await;
        }

        tracing::info!(iterations, "cancellation requested, orchestrator stopped");
        Ok(RunOutcome { iterations, state })
    }

    async fn run_iteration(&self, iteration: u64) -> Result<UpdateReport, OrchestratorError> {
        let started = Instant::now();
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.updater.update(&self.config, &self.queries).await {
                Ok(report) => {
                    tracing::info!(
                        iteration,
                        attempt,
                        builds = report.builds_seen,
                        bug_candidates = report.candidates.len(),
                        duration_ms = started.elapsed().as_millis(),
                        "batch update completed",
                    );
                    for candidate in &report.candidates {
                        tracing::debug!(
                            build_id = candidate.build.id,
                            branch = %candidate.build.branch,
                            title = %candidate.query.title(),
                            area = candidate.query.area_path(),
                            priority = candidate.query.priority.level(),
                            "bug candidate",
                        );
                    }
                    return Ok(report);
                }
                Err(err) if attempt < self.retry.max_attempts() => {
                    tracing::warn!(iteration, attempt, error = %err, "batch update failed, retrying");
                }
                Err(source) => {
                    tracing::error!(iteration, attempt, error = %source, "batch update failed");
                    return Err(OrchestratorError::UpdateFailure {
                        iteration,
                        attempts: attempt,
                        source,
                    });
                }
            }
        }
    }
}

/// Post-update transition: stop if cancellation is already observed,
/// otherwise wait out `wait` unless cancellation interrupts it.
async fn next_state(
    iteration: u64,
    wait: WaitPeriod,
    cancel: &CancellationToken,
) -> OrchestratorState {
    if cancel.is_cancelled() {
        return OrchestratorState::Stopped;
    }

    tracing::debug!(iteration, wait = %wait, "waiting before next update");
    tokio::select! {
        biased;
        _ = cancel.cancelled() => OrchestratorState::Stopped,
        _ = tokio::time::sleep(wait.as_duration()) => OrchestratorState::Running,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use pipesync_core::{
        generate_bug_queries, BranchSet, Credentials, SecretValue, UpdateError,
    };
    use tokio::sync::Notify;
    use tokio::time::Instant as TokioInstant;

    use super::*;

    /// Updater whose behaviour is scripted per call.
    #[derive(Default)]
    struct ScriptedUpdate {
        calls: Mutex<Vec<TokioInstant>>,
        failures_remaining: AtomicUsize,
        cancel_on_call: Option<(usize, CancellationToken)>,
        called: Notify,
    }

    impl ScriptedUpdate {
        fn cancelling_on(call: usize, token: &CancellationToken) -> Self {
            Self {
                cancel_on_call: Some((call, token.clone())),
                ..Self::default()
            }
        }

        fn failing(mut self, failures: usize) -> Self {
            self.failures_remaining = AtomicUsize::new(failures);
            self
        }

        fn calls(&self) -> Vec<TokioInstant> {
            self.calls.lock().expect("calls lock").clone()
        }
    }

    #[async_trait]
    impl BatchUpdate for ScriptedUpdate {
        async fn update(
            &self,
            _config: &RunConfiguration,
            _queries: &BugQuerySet,
        ) -> Result<UpdateReport, UpdateError> {
            let call = {
                let mut calls = self.calls.lock().expect("calls lock");
                calls.push(TokioInstant::now());
                calls.len()
            };
            self.called.notify_one();

            if let Some((cancel_call, token)) = &self.cancel_on_call {
                if call == *cancel_call {
                    token.cancel();
                }
            }

            let failing = self
                .failures_remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(UpdateError::new(format!("scripted failure on call {call}")));
            }
            Ok(UpdateReport::default())
        }
    }

    fn config(wait: &str) -> RunConfiguration {
        RunConfiguration::new(
            "main,release/1.0".parse::<BranchSet>().expect("branches"),
            wait.parse().expect("wait period"),
            Credentials::new(
                SecretValue::new("pat-a"),
                SecretValue::new("pat-b"),
                SecretValue::new("conn"),
            )
            .expect("credentials"),
        )
    }

    fn orchestrator(update: Arc<ScriptedUpdate>, wait: &str) -> SyncOrchestrator<Arc<ScriptedUpdate>> {
        SyncOrchestrator::new(config(wait), generate_bug_queries(), update)
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn iterations_are_spaced_by_the_wait_period() {
        let token = CancellationToken::new();
        let update = Arc::new(ScriptedUpdate::cancelling_on(3, &token));
        let orchestrator = orchestrator(update.clone(), "00:01:00");
        let wait = orchestrator.config().wait_period();

        let started = TokioInstant::now();
        let outcome = orchestrator.run(wait, token).await.expect("run");

        assert_eq!(outcome.iterations, 3);
        assert_eq!(outcome.state, OrchestratorState::Stopped);
        let calls = update.calls();
        assert_eq!(calls[0], started, "first update runs immediately");
        for pair in calls.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(
                gap >= Duration::from_secs(60) && gap < Duration::from_secs(61),
                "gap was {gap:?}"
            );
        }
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn cancellation_during_first_update_stops_without_waiting() {
        let token = CancellationToken::new();
        let update = Arc::new(ScriptedUpdate::cancelling_on(1, &token));
        let orchestrator = orchestrator(update.clone(), "01:00:00");

        let started = TokioInstant::now();
        let outcome = orchestrator
            .run(orchestrator.config().wait_period(), token)
            .await
            .expect("run");

        assert_eq!(outcome.iterations, 1);
        assert_eq!(update.calls().len(), 1);
        assert_eq!(TokioInstant::now(), started, "no wait after cancellation");
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn pre_cancelled_token_still_runs_exactly_one_update() {
        let token = CancellationToken::new();
        token.cancel();
        let update = Arc::new(ScriptedUpdate::default());
        let orchestrator = orchestrator(update.clone(), "00:00:30");

        let outcome = orchestrator
            .run(orchestrator.config().wait_period(), token)
            .await
            .expect("run");

        assert_eq!(outcome.iterations, 1);
        assert_eq!(update.calls().len(), 1);
    }

    #[tokio::test]
    async fn cancellation_during_wait_ends_it_early() {
        let token = CancellationToken::new();
        let update = Arc::new(ScriptedUpdate::default());
        let orchestrator = Arc::new(orchestrator(update.clone(), "01:00:00"));

        let handle = {
            let orchestrator = orchestrator.clone();
            let token = token.clone();
            tokio::spawn(async move {
                orchestrator
                    .run(orchestrator.config().wait_period(), token)
                    .await
            })
        };

        update.called.notified().await;
        let cancelled_at = std::time::Instant::now();
        token.cancel();

        let outcome = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("run should stop well before the hour-long wait")
            .expect("join")
            .expect("run");
        assert_eq!(outcome.iterations, 1);
        assert!(cancelled_at.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn update_failure_is_fatal_by_default() {
        let token = CancellationToken::new();
        let update = Arc::new(ScriptedUpdate::default().failing(1));
        let orchestrator = orchestrator(update.clone(), "00:01:00");

        let err = orchestrator
            .run(orchestrator.config().wait_period(), token)
            .await
            .unwrap_err();

        match err {
            OrchestratorError::UpdateFailure {
                iteration,
                attempts,
                ..
            } => {
                assert_eq!(iteration, 1);
                assert_eq!(attempts, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(update.calls().len(), 1, "no retry when failing fast");
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn retry_policy_recovers_within_the_iteration() {
        let token = CancellationToken::new();
        let update = Arc::new(ScriptedUpdate::cancelling_on(3, &token).failing(2));
        let orchestrator = orchestrator(update.clone(), "00:01:00").with_retry(RetryPolicy::new(3));

        let started = TokioInstant::now();
        let outcome = orchestrator
            .run(orchestrator.config().wait_period(), token)
            .await
            .expect("run");

        assert_eq!(outcome.iterations, 1);
        let calls = update.calls();
        assert_eq!(calls.len(), 3);
        assert!(calls.iter().all(|at| *at == started), "retries do not wait");
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn exhausted_retries_report_attempt_count() {
        let token = CancellationToken::new();
        let update = Arc::new(ScriptedUpdate::default().failing(usize::MAX));
        let orchestrator = orchestrator(update.clone(), "00:01:00").with_retry(RetryPolicy::new(2));

        let err = orchestrator
            .run(orchestrator.config().wait_period(), token)
            .await
            .unwrap_err();
        assert!(
            matches!(err, OrchestratorError::UpdateFailure { attempts: 2, .. }),
            "got: {err}"
        );
        assert_eq!(update.calls().len(), 2);
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn failure_in_later_iteration_names_that_iteration() {
        // Calls 1 and 2 succeed; the scripted failure is armed for call 3.
        let token = CancellationToken::new();
        let update = Arc::new(FailOnCall {
            fail_on: 3,
            calls: AtomicUsize::new(0),
        });
        let orchestrator = SyncOrchestrator::new(config("00:00:10"), generate_bug_queries(), update.clone());

        let err = orchestrator
            .run(orchestrator.config().wait_period(), token)
            .await
            .unwrap_err();
        assert!(
            matches!(err, OrchestratorError::UpdateFailure { iteration: 3, .. }),
            "got: {err}"
        );
        assert_eq!(update.calls.load(Ordering::SeqCst), 3);
    }

    struct FailOnCall {
        fail_on: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl BatchUpdate for FailOnCall {
        async fn update(
            &self,
            _config: &RunConfiguration,
            _queries: &BugQuerySet,
        ) -> Result<UpdateReport, UpdateError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call == self.fail_on {
                return Err(UpdateError::new("database unreachable"));
            }
            Ok(UpdateReport::default())
        }
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn uncancelled_wait_keeps_running() {
        let token = CancellationToken::new();
        let wait: WaitPeriod = "00:00:45".parse().expect("wait period");

        let started = TokioInstant::now();
        let state = next_state(1, wait, &token).await;

        assert_eq!(state, OrchestratorState::Running);
        assert_eq!(TokioInstant::now() - started, Duration::from_secs(45));
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn observed_cancellation_stops_immediately() {
        let token = CancellationToken::new();
        token.cancel();
        let wait: WaitPeriod = "00:00:45".parse().expect("wait period");

        let started = TokioInstant::now();
        let state = next_state(1, wait, &token).await;

        assert_eq!(state, OrchestratorState::Stopped);
        assert_eq!(TokioInstant::now(), started);
    }

    #[test]
    fn retry_policy_clamps_to_one_attempt() {
        assert_eq!(RetryPolicy::new(0).max_attempts(), 1);
        assert_eq!(RetryPolicy::default(), RetryPolicy::FAIL_FAST);
        assert_eq!(RetryPolicy::new(4).max_attempts(), 4);
    }
}
