//! Call attempts, per-call reports and the aggregate batch result.

use crate::RateLimitMetadata;
use sluice_error::{RemoteError, RemoteErrorKind};
use std::time::Duration;

/// Successful response from the remote completion service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Tokens billed for the call (input + output)
    pub tokens_used: u64,
    /// Raw model output text
    pub output: String,
    /// Budget metadata reported alongside the response
    pub rate_limit: Option<RateLimitMetadata>,
}

impl Completion {
    /// Create a completion without budget metadata.
    pub fn new(tokens_used: u64, output: impl Into<String>) -> Self {
        Self {
            tokens_used,
            output: output.into(),
            rate_limit: None,
        }
    }

    /// Attach budget metadata.
    pub fn with_rate_limit(mut self, metadata: RateLimitMetadata) -> Self {
        self.rate_limit = Some(metadata);
        self
    }
}

/// Classified failure of a single remote call.
///
/// Failures may still carry budget metadata (a 429 usually does).
#[derive(Debug, Clone)]
pub struct CallFailure {
    /// The classified error
    pub error: RemoteError,
    /// Budget metadata reported alongside the failure, if any
    pub rate_limit: Option<RateLimitMetadata>,
}

impl CallFailure {
    /// Create a failure without budget metadata.
    pub fn new(error: RemoteError) -> Self {
        Self {
            error,
            rate_limit: None,
        }
    }

    /// Attach budget metadata.
    pub fn with_rate_limit(mut self, metadata: RateLimitMetadata) -> Self {
        self.rate_limit = Some(metadata);
        self
    }
}

impl From<RemoteError> for CallFailure {
    fn from(error: RemoteError) -> Self {
        Self::new(error)
    }
}

/// Result of one call attempt.
#[derive(Debug, Clone)]
pub enum AttemptOutcome {
    /// The call completed
    Success {
        /// Tokens billed for the call
        tokens_used: u64,
        /// Wall time of the attempt
        latency: Duration,
        /// Budget metadata observed on the response
        budget_observation: Option<RateLimitMetadata>,
        /// Raw model output
        output: String,
    },
    /// The call failed with a transient error
    RetryableFailure {
        /// The classified error
        error: RemoteError,
        /// Wall time of the attempt
        latency: Duration,
    },
    /// The call failed with a permanent error
    FatalFailure {
        /// The classified error
        error: RemoteError,
        /// Wall time of the attempt
        latency: Duration,
    },
}

impl AttemptOutcome {
    /// Wall time of the attempt.
    pub fn latency(&self) -> Duration {
        match self {
            AttemptOutcome::Success { latency, .. }
            | AttemptOutcome::RetryableFailure { latency, .. }
            | AttemptOutcome::FatalFailure { latency, .. } => *latency,
        }
    }

    /// Tokens billed, zero for failures.
    pub fn tokens_used(&self) -> u64 {
        match self {
            AttemptOutcome::Success { tokens_used, .. } => *tokens_used,
            _ => 0,
        }
    }

    /// Model output for successful attempts.
    pub fn output(&self) -> Option<&str> {
        match self {
            AttemptOutcome::Success { output, .. } => Some(output),
            _ => None,
        }
    }

    /// The error for failed attempts.
    pub fn error(&self) -> Option<&RemoteError> {
        match self {
            AttemptOutcome::RetryableFailure { error, .. }
            | AttemptOutcome::FatalFailure { error, .. } => Some(error),
            AttemptOutcome::Success { .. } => None,
        }
    }

    /// True for [`AttemptOutcome::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Success { .. })
    }
}

/// Retry state machine for a single call.
///
/// `Attempting -> {Succeeded | Retrying -> Attempting | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum CallState {
    /// An attempt is in flight
    Attempting,
    /// Waiting out a backoff delay before the next attempt
    Retrying,
    /// Terminal: the call succeeded
    Succeeded,
    /// Terminal: the call failed fatally or exhausted its retries
    Failed,
}

impl CallState {
    /// True for `Succeeded` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CallState::Succeeded | CallState::Failed)
    }
}

/// Terminal report for one work item.
#[derive(Debug, Clone, derive_getters::Getters)]
pub struct CallReport {
    /// Terminal state
    state: CallState,
    /// Outcome of the last attempt
    outcome: AttemptOutcome,
    /// Number of attempts made (zero if the item never started)
    attempts: u32,
}

impl CallReport {
    /// Create a report from a terminal state and the last attempt's outcome.
    pub fn new(state: CallState, outcome: AttemptOutcome, attempts: u32) -> Self {
        Self {
            state,
            outcome,
            attempts,
        }
    }

    /// Report for an item that was never started because the batch deadline passed.
    #[track_caller]
    pub fn not_started() -> Self {
        Self {
            state: CallState::Failed,
            outcome: AttemptOutcome::FatalFailure {
                error: RemoteError::new(RemoteErrorKind::BatchDeadline),
                latency: Duration::ZERO,
            },
            attempts: 0,
        }
    }

    /// True if the call ended in `Succeeded`.
    pub fn is_success(&self) -> bool {
        self.state == CallState::Succeeded
    }

    /// The captured error for failed calls.
    pub fn error(&self) -> Option<&RemoteError> {
        self.outcome.error()
    }
}

/// Aggregate over every work item of a batch.
///
/// Outcomes are positional: `outcomes()[i]` belongs to the i-th input item.
#[derive(Debug, Clone, derive_getters::Getters)]
pub struct BatchResult {
    /// Per-item reports in input order
    outcomes: Vec<CallReport>,
    /// Tokens billed across all successful calls
    total_tokens: u64,
    /// Wall time of the whole batch
    elapsed: Duration,
    /// Number of items that did not succeed
    failures: usize,
}

impl BatchResult {
    /// Aggregate positional reports into a batch result.
    pub fn from_reports(outcomes: Vec<CallReport>, elapsed: Duration) -> Self {
        let total_tokens = outcomes.iter().map(|r| r.outcome.tokens_used()).sum();
        let failures = outcomes.iter().filter(|r| !r.is_success()).count();
        Self {
            outcomes,
            total_tokens,
            elapsed,
            failures,
        }
    }

    /// Number of items in the batch.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// True if the batch had no items.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Consume the result, returning the positional reports.
    pub fn into_reports(self) -> Vec<CallReport> {
        self.outcomes
    }
}
