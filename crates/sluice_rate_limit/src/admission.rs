//! Admission control against the observed token budget.
//!
//! The gate compares an item's estimated cost to the observed remaining
//! tokens scaled by a safety margin. An item that does not fit waits for the
//! budget window to reset (capped), is re-checked once, and then proceeds
//! regardless in degraded mode.

use crate::{AdmissionConfig, BudgetTracker};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovernorRateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

type DirectRateLimiter = GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Path taken by an admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The cost fit the observed budget (or the budget was unknown)
    Immediate,
    /// The caller waited once and the cost then fit
    Waited(Duration),
    /// The caller waited once and proceeded although the cost still did not fit
    Degraded(Duration),
}

impl Admission {
    /// Time spent suspended.
    pub fn waited(&self) -> Duration {
        match self {
            Admission::Immediate => Duration::ZERO,
            Admission::Waited(d) | Admission::Degraded(d) => *d,
        }
    }

    /// True for [`Admission::Degraded`].
    pub fn is_degraded(&self) -> bool {
        matches!(self, Admission::Degraded(_))
    }
}

/// Suspends callers whose estimated cost exceeds the observed budget.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    tracker: Arc<BudgetTracker>,
    safety_margin: f64,
    max_wait: Duration,
    request_limiter: Option<Arc<DirectRateLimiter>>,
}

impl AdmissionGate {
    /// Create a gate reading from `tracker`.
    ///
    /// A configured `requests_per_minute` adds a GCRA ceiling awaited before
    /// every budget check.
    pub fn new(tracker: Arc<BudgetTracker>, config: &AdmissionConfig) -> Self {
        let request_limiter = config
            .requests_per_minute
            .and_then(NonZeroU32::new)
            .map(|rpm| Arc::new(GovernorRateLimiter::direct(Quota::per_minute(rpm))));

        Self {
            tracker,
            safety_margin: config.safety_margin,
            max_wait: config.max_wait(),
            request_limiter,
        }
    }

    /// Suspend until `estimated_cost` is likely to fit, then return.
    ///
    /// Never fails; at worst the caller proceeds in degraded mode after one
    /// wait of at most `max_wait`.
    #[instrument(level = "debug", skip(self))]
    pub async fn admit(&self, estimated_cost: u64) -> Admission {
        self.admit_within(estimated_cost, None).await
    }

    /// As [`Self::admit`], but never waits past `deadline`.
    #[instrument(level = "debug", skip(self, deadline))]
    pub async fn admit_until(&self, estimated_cost: u64, deadline: Instant) -> Admission {
        self.admit_within(estimated_cost, Some(deadline)).await
    }

    async fn admit_within(&self, estimated_cost: u64, deadline: Option<Instant>) -> Admission {
        if let Some(limiter) = &self.request_limiter {
            limiter.until_ready().await;
        }

        let Some(remaining) = self.tracker.remaining_tokens() else {
            return Admission::Immediate;
        };
        if self.fits(estimated_cost, remaining) {
            return Admission::Immediate;
        }

        let mut wait = self.tracker.time_until_reset().min(self.max_wait);
        if let Some(deadline) = deadline {
            wait = wait.min(deadline.saturating_duration_since(Instant::now()));
        }
        info!(
            estimated_cost,
            remaining_tokens = remaining,
            wait_ms = wait.as_millis() as u64,
            "Insufficient budget, delaying admission"
        );
        tokio::time::sleep(wait).await;

        let remaining = self.tracker.remaining_tokens();
        match remaining {
            Some(remaining) if !self.fits(estimated_cost, remaining) => {
                warn!(
                    estimated_cost,
                    remaining_tokens = remaining,
                    wait_ms = wait.as_millis() as u64,
                    degraded = true,
                    "Budget still insufficient after waiting, admitting anyway"
                );
                Admission::Degraded(wait)
            }
            _ => {
                debug!(estimated_cost, ?remaining, "Admitted after waiting");
                Admission::Waited(wait)
            }
        }
    }

    fn fits(&self, estimated_cost: u64, remaining: u64) -> bool {
        estimated_cost as f64 <= remaining as f64 * self.safety_margin
    }
}
