//! Per-call retry with exponential backoff and jitter.
//!
//! A call moves through `Attempting -> {Succeeded | Retrying -> Attempting | Failed}`.
//! Retryable failures (rate limit, timeout, 5xx, network) are resubmitted
//! after the next delay of a [`BackoffSchedule`]; fatal failures end the call
//! immediately without consuming retry budget. Every attempt that reports
//! budget metadata, successful or not, is fed to the [`BudgetTracker`].

use crate::{BudgetTracker, RetryConfig};
use rand::Rng;
use sluice_core::{AttemptOutcome, CallFailure, CallReport, CallState, Completion};
use sluice_error::{RemoteError, RemoteErrorKind, RetryableError};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tokio_retry2::{Retry, RetryError};
use tracing::{debug, error, warn};

/// Backoff parameters for one call.
///
/// # Example
///
/// ```
/// use sluice_rate_limit::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(16), Duration::ZERO);
/// let delays: Vec<_> = policy.schedule().collect();
/// assert_eq!(
///     delays,
///     vec![Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(4)]
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
            Duration::from_millis(config.jitter_ms),
        )
    }
}

impl RetryPolicy {
    /// Create a policy.
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration, jitter: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
            jitter,
        }
    }

    /// Retries after the initial attempt.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Jitter-free delay before retry `n` (1-indexed): `min(base * 2^(n-1), max)`.
    pub fn base_delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1);
        2u32.checked_pow(exponent)
            .map_or(self.max_delay, |factor| self.base_delay.saturating_mul(factor))
            .min(self.max_delay)
    }

    /// Delay iterator yielding exactly `max_retries` values.
    pub fn schedule(&self) -> BackoffSchedule {
        BackoffSchedule {
            policy: *self,
            next_retry: 1,
            deadline: None,
        }
    }

    /// Delay iterator that also ends once a delay would run to `deadline`.
    pub fn schedule_until(&self, deadline: Instant) -> BackoffSchedule {
        BackoffSchedule {
            deadline: Some(deadline),
            ..self.schedule()
        }
    }
}

/// Iterator of retry delays consumed by [`tokio_retry2::Retry`].
///
/// Each yielded delay is `min(base * 2^(n-1), max) + U(0, jitter)` and is
/// logged as a retry event. With a deadline, a delay that would end at or
/// after it ends the schedule instead.
#[derive(Debug, Clone)]
pub struct BackoffSchedule {
    policy: RetryPolicy,
    next_retry: u32,
    deadline: Option<Instant>,
}

impl Iterator for BackoffSchedule {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.next_retry > self.policy.max_retries {
            return None;
        }
        let retry = self.next_retry;
        self.next_retry += 1;

        let jitter_ms = self.policy.jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
        };
        let delay = self.policy.base_delay_for(retry) + jitter;

        if self
            .deadline
            .is_some_and(|deadline| Instant::now() + delay >= deadline)
        {
            self.next_retry = u32::MAX;
            warn!(
                attempt = retry,
                delay_ms = delay.as_millis() as u64,
                "Batch deadline reached, not retrying"
            );
            return None;
        }

        warn!(
            attempt = retry,
            max_retries = self.policy.max_retries,
            delay_ms = delay.as_millis() as u64,
            "Retrying call after backoff"
        );
        Some(delay)
    }
}

/// Runs a single logical call through the retry state machine.
#[derive(Debug, Clone)]
pub struct RetryOrchestrator {
    tracker: Arc<BudgetTracker>,
    policy: RetryPolicy,
    call_timeout: Duration,
}

impl RetryOrchestrator {
    /// Create an orchestrator reporting to `tracker`.
    pub fn new(tracker: Arc<BudgetTracker>, policy: RetryPolicy, call_timeout: Duration) -> Self {
        Self {
            tracker,
            policy,
            call_timeout,
        }
    }

    /// The default policy applied by [`Self::execute`].
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute `call` with the orchestrator's policy.
    pub async fn execute<F, Fut>(&self, call: F) -> CallReport
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<Completion, CallFailure>>,
    {
        self.execute_with(call, &self.policy).await
    }

    /// Execute `call` with an explicit policy.
    ///
    /// Makes at most `max_retries + 1` attempts and returns the terminal
    /// report: `Succeeded` with the successful attempt, or `Failed` with the
    /// last failure.
    pub async fn execute_with<F, Fut>(&self, call: F, policy: &RetryPolicy) -> CallReport
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<Completion, CallFailure>>,
    {
        self.run(call, policy.schedule()).await
    }

    /// Execute `call` with the orchestrator's policy, never starting a
    /// backoff that would run to `deadline`.
    ///
    /// An attempt already in flight when the deadline passes completes; if it
    /// fails, its failure is the terminal `Failed` outcome.
    pub async fn execute_until<F, Fut>(&self, call: F, deadline: Instant) -> CallReport
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<Completion, CallFailure>>,
    {
        self.run(call, self.policy.schedule_until(deadline)).await
    }

    async fn run<F, Fut>(&self, call: F, schedule: BackoffSchedule) -> CallReport
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<Completion, CallFailure>>,
    {
        let attempts = AtomicU32::new(0);

        let result = Retry::spawn(schedule, || {
            let attempts = &attempts;
            let call = &call;
            async move {
                let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(attempt, state = %CallState::Attempting, "Starting call attempt");
                match self.attempt(call).await {
                    outcome @ AttemptOutcome::Success { .. } => Ok(outcome),
                    outcome @ AttemptOutcome::RetryableFailure { .. } => {
                        debug!(attempt, state = %CallState::Retrying, "Call attempt failed transiently");
                        Err(RetryError::Transient {
                            err: outcome,
                            retry_after: None,
                        })
                    }
                    outcome => Err(RetryError::Permanent(outcome)),
                }
            }
        })
        .await;

        let attempts = attempts.into_inner();
        match result {
            Ok(outcome) => {
                debug!(attempts, state = %CallState::Succeeded, "Call succeeded");
                CallReport::new(CallState::Succeeded, outcome, attempts)
            }
            Err(outcome) => {
                if let Some(err) = outcome.error() {
                    error!(attempts, error = %err, state = %CallState::Failed, "Call failed");
                }
                CallReport::new(CallState::Failed, outcome, attempts)
            }
        }
    }

    async fn attempt<F, Fut>(&self, call: &F) -> AttemptOutcome
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<Completion, CallFailure>>,
    {
        let started = Instant::now();
        let result = tokio::time::timeout(self.call_timeout, call()).await;
        let latency = started.elapsed();

        match result {
            Ok(Ok(completion)) => {
                if let Some(metadata) = &completion.rate_limit {
                    self.tracker.observe(metadata);
                }
                self.tracker.record_usage(completion.tokens_used);
                AttemptOutcome::Success {
                    tokens_used: completion.tokens_used,
                    latency,
                    budget_observation: completion.rate_limit,
                    output: completion.output,
                }
            }
            Ok(Err(failure)) => {
                if let Some(metadata) = &failure.rate_limit {
                    self.tracker.observe(metadata);
                }
                classify(failure.error, latency)
            }
            Err(_) => classify(
                RemoteError::new(RemoteErrorKind::Timeout(format!(
                    "no response within {}ms",
                    self.call_timeout.as_millis()
                ))),
                latency,
            ),
        }
    }
}

fn classify(error: RemoteError, latency: Duration) -> AttemptOutcome {
    if error.is_retryable() {
        AttemptOutcome::RetryableFailure { error, latency }
    } else {
        AttemptOutcome::FatalFailure { error, latency }
    }
}
