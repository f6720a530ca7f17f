//! Budget snapshots observed from remote-service response metadata.
//!
//! The remote service publishes no static limits. Every response may carry a
//! token dimension and a request-count dimension, each with a limit, the
//! amount remaining in the current window and the time until the window
//! resets. [`RateLimitMetadata`] is the raw, possibly incomplete view a
//! transport extracts from a response; [`BudgetSnapshot`] is the validated,
//! immutable value the tracker stores.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// Rate limit metadata reported by the remote service for a single call.
///
/// Every field is optional; a missing field means "unknown", never an error.
///
/// # Example
///
/// ```
/// use sluice_core::RateLimitMetadata;
/// use std::time::Duration;
///
/// let meta = RateLimitMetadata::default()
///     .with_tokens(10_000, 7_500, Duration::from_secs(6))
///     .with_requests(500, 499, Duration::from_millis(120));
/// assert_eq!(meta.token_remaining, Some(7_500));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitMetadata {
    /// Token limit per window
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_limit: Option<u64>,
    /// Tokens remaining in the current window
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_remaining: Option<u64>,
    /// Time until the token window resets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_reset_after: Option<Duration>,
    /// Request limit per window
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_limit: Option<u64>,
    /// Requests remaining in the current window
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_remaining: Option<u64>,
    /// Time until the request window resets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_reset_after: Option<Duration>,
}

impl RateLimitMetadata {
    /// Set all three token-dimension fields.
    pub fn with_tokens(mut self, limit: u64, remaining: u64, reset_after: Duration) -> Self {
        self.token_limit = Some(limit);
        self.token_remaining = Some(remaining);
        self.token_reset_after = Some(reset_after);
        self
    }

    /// Set all three request-dimension fields.
    pub fn with_requests(mut self, limit: u64, remaining: u64, reset_after: Duration) -> Self {
        self.request_limit = Some(limit);
        self.request_remaining = Some(remaining);
        self.request_reset_after = Some(reset_after);
        self
    }

    /// True when no field at all was reported.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// One budget dimension (tokens or requests) with a known limit.
///
/// Invariant: `remaining <= limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetDimension {
    limit: u64,
    remaining: u64,
    reset_at: Option<Instant>,
}

impl BudgetDimension {
    /// Build a dimension from raw fields observed at `now`.
    ///
    /// Returns `None` unless both the limit and the remaining count are known.
    pub fn observe(
        limit: Option<u64>,
        remaining: Option<u64>,
        reset_after: Option<Duration>,
        now: Instant,
    ) -> Option<Self> {
        let limit = limit?;
        let remaining = remaining?.min(limit);
        Some(Self {
            limit,
            remaining,
            reset_at: reset_after.map(|after| now + after),
        })
    }

    /// The window limit.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// The remaining count as observed, ignoring any reset since.
    pub fn observed_remaining(&self) -> u64 {
        self.remaining
    }

    /// When this dimension resets to its limit, if known.
    pub fn reset_at(&self) -> Option<Instant> {
        self.reset_at
    }

    /// Remaining count as of `now`; a passed reset restores the full limit.
    pub fn remaining_at(&self, now: Instant) -> u64 {
        match self.reset_at {
            Some(reset_at) if reset_at <= now => self.limit,
            _ => self.remaining,
        }
    }

    /// Spendable fraction in `[0, 1]` as of `now`.
    pub fn fraction_at(&self, now: Instant) -> f64 {
        if self.limit == 0 {
            return 0.0;
        }
        (self.remaining_at(now) as f64 / self.limit as f64).clamp(0.0, 1.0)
    }

    /// Time left until the reset, if the reset time is known.
    pub fn time_until_reset(&self, now: Instant) -> Option<Duration> {
        self.reset_at
            .map(|reset_at| reset_at.saturating_duration_since(now))
    }

    /// Combine with a newer, overlapping observation, keeping the lower remaining.
    ///
    /// The newer limit wins; the later reset time wins so waits err long.
    fn merge_conservative(&self, newer: &BudgetDimension, now: Instant) -> BudgetDimension {
        let limit = newer.limit;
        let remaining = self.remaining_at(now).min(newer.remaining).min(limit);
        let reset_at = match (self.reset_at, newer.reset_at) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => b.or(a),
        };
        BudgetDimension {
            limit,
            remaining,
            reset_at,
        }
    }
}

/// Immutable snapshot of both budget dimensions.
///
/// A dimension is `None` while its limit is unknown, which the tracker treats
/// as unconstrained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetSnapshot {
    tokens: Option<BudgetDimension>,
    requests: Option<BudgetDimension>,
    observed_at: Instant,
}

impl BudgetSnapshot {
    /// A snapshot with nothing known yet.
    pub fn unknown(now: Instant) -> Self {
        Self {
            tokens: None,
            requests: None,
            observed_at: now,
        }
    }

    /// Validate raw metadata into a snapshot.
    ///
    /// Returns `None` when neither dimension carries both a limit and a
    /// remaining count; such metadata is not an observation.
    pub fn from_metadata(metadata: &RateLimitMetadata, now: Instant) -> Option<Self> {
        let tokens = BudgetDimension::observe(
            metadata.token_limit,
            metadata.token_remaining,
            metadata.token_reset_after,
            now,
        );
        let requests = BudgetDimension::observe(
            metadata.request_limit,
            metadata.request_remaining,
            metadata.request_reset_after,
            now,
        );
        if tokens.is_none() && requests.is_none() {
            return None;
        }
        Some(Self {
            tokens,
            requests,
            observed_at: now,
        })
    }

    /// Token dimension, if known.
    pub fn tokens(&self) -> Option<&BudgetDimension> {
        self.tokens.as_ref()
    }

    /// Request dimension, if known.
    pub fn requests(&self) -> Option<&BudgetDimension> {
        self.requests.as_ref()
    }

    /// When the observation window this snapshot belongs to opened.
    pub fn observed_at(&self) -> Instant {
        self.observed_at
    }

    /// True until at least one dimension has been observed.
    pub fn is_unknown(&self) -> bool {
        self.tokens.is_none() && self.requests.is_none()
    }

    /// `min(remainingTokens/limitTokens, remainingRequests/limitRequests)`.
    ///
    /// A dimension with an unknown limit contributes `1.0`.
    pub fn fraction_at(&self, now: Instant) -> f64 {
        let tokens = self.tokens.map_or(1.0, |d| d.fraction_at(now));
        let requests = self.requests.map_or(1.0, |d| d.fraction_at(now));
        tokens.min(requests)
    }

    /// Smaller of the known reset times; zero when none is known.
    pub fn time_until_reset(&self, now: Instant) -> Duration {
        [self.tokens, self.requests]
            .iter()
            .flatten()
            .filter_map(|d| d.time_until_reset(now))
            .min()
            .unwrap_or(Duration::ZERO)
    }

    /// Remaining tokens as of `now`, or `None` while unknown.
    pub fn remaining_tokens(&self, now: Instant) -> Option<u64> {
        self.tokens.map(|d| d.remaining_at(now))
    }

    /// Merge a newly observed candidate into this snapshot.
    ///
    /// Within `window` of this snapshot's observation the merge is
    /// conservative: per dimension the lower remaining is kept and the window
    /// anchor does not move. Outside the window the candidate supersedes this
    /// snapshot, except that a dimension the candidate lacks is carried over.
    pub fn merge(&self, candidate: &BudgetSnapshot, window: Duration) -> BudgetSnapshot {
        let now = candidate.observed_at;
        let overlapping = now.saturating_duration_since(self.observed_at) < window;

        let combine = |old: Option<BudgetDimension>, new: Option<BudgetDimension>| {
            match (old, new) {
                (Some(old), Some(new)) if overlapping => Some(old.merge_conservative(&new, now)),
                (old, new) => new.or(old),
            }
        };

        BudgetSnapshot {
            tokens: combine(self.tokens, candidate.tokens),
            requests: combine(self.requests, candidate.requests),
            observed_at: if overlapping && !self.is_unknown() {
                self.observed_at
            } else {
                now
            },
        }
    }
}
