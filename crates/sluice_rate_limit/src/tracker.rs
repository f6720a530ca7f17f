//! Live view of the remote service's remaining budget.

use parking_lot::Mutex;
use sluice_core::{BudgetSnapshot, RateLimitMetadata};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, instrument};

/// Lifetime counters of a [`BudgetTracker`].
#[derive(Debug, Clone, Copy, PartialEq, derive_getters::Getters)]
pub struct TrackerStats {
    /// Observations that changed the stored snapshot
    observations: u64,
    /// Tokens reported as used by successful calls
    tokens_used: u64,
    /// Spendable fraction at the time of the read
    fraction: f64,
}

#[derive(Debug)]
struct TrackerState {
    snapshot: BudgetSnapshot,
    observations: u64,
    tokens_used: u64,
}

/// Holds the latest budget snapshot and derives the spendable fraction.
///
/// The tracker is the single writer of budget state. It is shared by handle
/// (`Arc<BudgetTracker>`) with the concurrency controller, the admission gate
/// and the retry orchestrator. All access goes through one short critical
/// section that never performs I/O or awaits.
///
/// Observations arriving within the configured window of the stored one are
/// merged conservatively (lowest remaining wins), so a stale response that
/// completes late can never raise the apparent budget.
///
/// # Example
///
/// ```
/// use sluice_core::RateLimitMetadata;
/// use sluice_rate_limit::BudgetTracker;
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let tracker = BudgetTracker::new(Duration::from_secs(1));
/// assert_eq!(tracker.current_fraction(), 1.0);
///
/// tracker.observe(
///     &RateLimitMetadata::default().with_tokens(1_000, 250, Duration::from_secs(60)),
/// );
/// assert_eq!(tracker.current_fraction(), 0.25);
/// # }
/// ```
#[derive(Debug)]
pub struct BudgetTracker {
    state: Mutex<TrackerState>,
    window: Duration,
}

impl BudgetTracker {
    /// Create a tracker in the optimistic unknown state.
    pub fn new(observation_window: Duration) -> Self {
        Self {
            state: Mutex::new(TrackerState {
                snapshot: BudgetSnapshot::unknown(Instant::now()),
                observations: 0,
                tokens_used: 0,
            }),
            window: observation_window,
        }
    }

    /// Merge budget metadata from a completed call.
    ///
    /// Metadata lacking a complete dimension is not an observation and is
    /// ignored. Returns whether the stored snapshot was updated.
    #[instrument(level = "trace", skip(self, metadata))]
    pub fn observe(&self, metadata: &RateLimitMetadata) -> bool {
        let now = Instant::now();
        let Some(candidate) = BudgetSnapshot::from_metadata(metadata, now) else {
            debug!("Ignoring incomplete rate limit metadata");
            return false;
        };

        let fraction = {
            let mut state = self.state.lock();
            state.snapshot = state.snapshot.merge(&candidate, self.window);
            state.observations += 1;
            state.snapshot.fraction_at(now)
        };

        debug!(fraction, "Observed budget");
        true
    }

    /// Add tokens billed by a successful call to the lifetime total.
    pub fn record_usage(&self, tokens: u64) {
        self.state.lock().tokens_used += tokens;
    }

    /// Spendable fraction in `[0, 1]`; `1.0` while nothing is known.
    pub fn current_fraction(&self) -> f64 {
        let now = Instant::now();
        self.state.lock().snapshot.fraction_at(now)
    }

    /// Time until the nearest known reset; zero if none is known.
    pub fn time_until_reset(&self) -> Duration {
        let now = Instant::now();
        self.state.lock().snapshot.time_until_reset(now)
    }

    /// Remaining tokens, or `None` while the token dimension is unknown.
    pub fn remaining_tokens(&self) -> Option<u64> {
        let now = Instant::now();
        self.state.lock().snapshot.remaining_tokens(now)
    }

    /// Copy of the stored snapshot.
    pub fn snapshot(&self) -> BudgetSnapshot {
        self.state.lock().snapshot
    }

    /// Lifetime counters.
    pub fn stats(&self) -> TrackerStats {
        let now = Instant::now();
        let state = self.state.lock();
        TrackerStats {
            observations: state.observations,
            tokens_used: state.tokens_used,
            fraction: state.snapshot.fraction_at(now),
        }
    }
}
