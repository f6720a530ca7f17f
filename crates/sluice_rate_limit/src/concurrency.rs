//! Mapping from budget fraction to admitted parallelism.

use crate::{BudgetTracker, ConcurrencyConfig};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::debug;

/// Derives the admitted parallelism level from the tracker's current fraction.
///
/// | fraction | level |
/// |---|---|
/// | `>= high` | `max_concurrency` |
/// | `[medium, high)` | linear from `min` to `max`, floored |
/// | `[low, medium)` | `min_concurrency` |
/// | `< low` | `critical_concurrency` |
///
/// The controller owns the level; the scheduler reads it once per chunk.
#[derive(Debug)]
pub struct ConcurrencyController {
    tracker: Arc<BudgetTracker>,
    config: ConcurrencyConfig,
    evaluations: AtomicU64,
    last: AtomicUsize,
}

impl ConcurrencyController {
    /// Create a controller reading from `tracker`.
    pub fn new(tracker: Arc<BudgetTracker>, config: ConcurrencyConfig) -> Self {
        let initial = config.max_concurrency;
        Self {
            tracker,
            config,
            evaluations: AtomicU64::new(0),
            last: AtomicUsize::new(initial),
        }
    }

    /// Recommended parallelism for the current budget.
    pub fn recommended_concurrency(&self) -> usize {
        let fraction = self.tracker.current_fraction();
        let level = self.level_for(fraction);
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        self.last.store(level, Ordering::Relaxed);
        debug!(fraction, level, "Evaluated concurrency");
        level
    }

    /// Pure mapping from a fraction to a level under this configuration.
    pub fn level_for(&self, fraction: f64) -> usize {
        let c = &self.config;
        let level = if fraction >= c.high_threshold {
            c.max_concurrency
        } else if fraction >= c.medium_threshold {
            let position = (fraction - c.medium_threshold) / (c.high_threshold - c.medium_threshold);
            let span = c.max_concurrency.saturating_sub(c.min_concurrency) as f64;
            c.min_concurrency + (position * span).floor() as usize
        } else if fraction >= c.low_threshold {
            c.min_concurrency
        } else {
            c.critical_concurrency
        };
        level.max(1)
    }

    /// Number of times [`Self::recommended_concurrency`] has been called.
    pub fn evaluations(&self) -> u64 {
        self.evaluations.load(Ordering::Relaxed)
    }

    /// Most recent recommendation (`max_concurrency` before the first).
    pub fn last_recommendation(&self) -> usize {
        self.last.load(Ordering::Relaxed)
    }

    /// The configuration in use.
    pub fn config(&self) -> &ConcurrencyConfig {
        &self.config
    }
}
