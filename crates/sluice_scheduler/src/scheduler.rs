//! Chunked batch execution.

use crate::CallMetrics;
use futures::stream::{self, StreamExt};
use sluice_core::{BatchResult, CallReport, CompletionTransport, CostEstimator, WorkItem};
use sluice_error::{MalformedInputError, MalformedInputErrorKind, SluiceError, SluiceResult};
use sluice_rate_limit::{
    AdmissionGate, BudgetTracker, ConcurrencyController, RetryOrchestrator, RetryPolicy,
    SluiceConfig,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Fans a batch of work items out over a budget-sized pool of workers.
///
/// The batch is split into chunks. For every chunk the concurrency level is
/// read once from the [`ConcurrencyController`] and the chunk's items run
/// with at most that many in flight, each passing the [`AdmissionGate`]
/// and then the [`RetryOrchestrator`]. A chunk completes fully before the
/// next one is sized. Per-item failures are recorded in the item's slot and
/// never cancel siblings.
///
/// Once the batch timeout elapses no item starts, no admission keeps
/// waiting, and no backoff begins; attempts already in flight complete.
///
/// # Example
///
/// ```rust,ignore
/// use sluice_rate_limit::SluiceConfig;
/// use sluice_scheduler::BatchScheduler;
///
/// let scheduler = BatchScheduler::new(Arc::new(transport), &SluiceConfig::load()?);
/// let result = scheduler.run(&items).await?;
/// println!("{} tokens, {} failures", result.total_tokens(), result.failures());
/// ```
pub struct BatchScheduler {
    transport: Arc<dyn CompletionTransport>,
    tracker: Arc<BudgetTracker>,
    controller: Arc<ConcurrencyController>,
    gate: AdmissionGate,
    retry: RetryOrchestrator,
    estimator: CostEstimator,
    chunk_size: usize,
    batch_timeout: Duration,
    metrics: &'static CallMetrics,
}

impl BatchScheduler {
    /// Build a scheduler with a fresh budget tracker.
    pub fn new(transport: Arc<dyn CompletionTransport>, config: &SluiceConfig) -> Self {
        let tracker = Arc::new(BudgetTracker::new(config.budget.observation_window()));
        Self::with_tracker(transport, tracker, config)
    }

    /// Build a scheduler sharing an existing budget tracker.
    ///
    /// Schedulers talking to the same remote account should share one tracker.
    pub fn with_tracker(
        transport: Arc<dyn CompletionTransport>,
        tracker: Arc<BudgetTracker>,
        config: &SluiceConfig,
    ) -> Self {
        let controller = Arc::new(ConcurrencyController::new(
            tracker.clone(),
            config.concurrency.clone(),
        ));
        let gate = AdmissionGate::new(tracker.clone(), &config.admission);
        let retry = RetryOrchestrator::new(
            tracker.clone(),
            RetryPolicy::from(&config.retry),
            config.batch.call_timeout(),
        );

        Self {
            transport,
            tracker,
            controller,
            gate,
            retry,
            estimator: config.admission.estimator(),
            chunk_size: config.batch.chunk_size.max(1),
            batch_timeout: config.batch.batch_timeout(),
            metrics: CallMetrics::get(),
        }
    }

    /// The budget tracker fed by this scheduler's calls.
    pub fn tracker(&self) -> &Arc<BudgetTracker> {
        &self.tracker
    }

    /// The concurrency controller consulted between chunks.
    pub fn controller(&self) -> &Arc<ConcurrencyController> {
        &self.controller
    }

    /// Run every item and return positional outcomes.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedInputError`] if the batch is empty or an item
    /// cannot be costed. Nothing is admitted or sent in that case. Call
    /// failures never surface here; they are recorded per item.
    #[instrument(skip(self, items), fields(items = items.len()))]
    pub async fn run(&self, items: &[WorkItem]) -> SluiceResult<BatchResult> {
        let costs = self.validate(items)?;
        let started = Instant::now();
        let deadline = started + self.batch_timeout;
        let chunk_count = items.len().div_ceil(self.chunk_size);

        info!(chunk_size = self.chunk_size, chunks = chunk_count, "Starting batch");

        let mut slots: Vec<Option<CallReport>> = vec![None; items.len()];
        let mut previous: Option<usize> = None;

        for chunk in 0..chunk_count {
            if Instant::now() >= deadline {
                warn!(chunk, "Batch deadline elapsed, skipping remaining chunks");
                break;
            }

            let concurrency = self.controller.recommended_concurrency();
            if previous != Some(concurrency) {
                info!(
                    chunk,
                    previous = ?previous,
                    concurrency,
                    fraction = self.tracker.current_fraction(),
                    "Concurrency level changed"
                );
            }
            previous = Some(concurrency);

            let start = chunk * self.chunk_size;
            let end = (start + self.chunk_size).min(items.len());

            let reports: Vec<(usize, CallReport)> = stream::iter(start..end)
                .map(|index| self.process(index, &items[index], costs[index], deadline))
                .buffer_unordered(concurrency)
                .collect()
                .await;

            for (index, report) in reports {
                slots[index] = Some(report);
            }
        }

        let outcomes = slots
            .into_iter()
            .map(|slot| slot.unwrap_or_else(CallReport::not_started))
            .collect();
        let result = BatchResult::from_reports(outcomes, started.elapsed());

        info!(
            items = result.len(),
            total_tokens = result.total_tokens(),
            failures = result.failures(),
            elapsed_ms = result.elapsed().as_millis() as u64,
            "Batch complete"
        );

        Ok(result)
    }

    fn validate(&self, items: &[WorkItem]) -> SluiceResult<Vec<u64>> {
        if items.is_empty() {
            Err(MalformedInputError::new(MalformedInputErrorKind::EmptyBatch))?
        }

        items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                self.estimator.cost_for(item).ok_or_else(|| {
                    let reason = if item.prompt().trim().is_empty() {
                        "prompt is empty"
                    } else {
                        "estimated cost is zero"
                    };
                    SluiceError::from(MalformedInputError::new(
                        MalformedInputErrorKind::InvalidItem {
                            index,
                            reason: reason.to_string(),
                        },
                    ))
                })
            })
            .collect()
    }

    async fn process(
        &self,
        index: usize,
        item: &WorkItem,
        cost: u64,
        deadline: Instant,
    ) -> (usize, CallReport) {
        let provider = self.transport.provider_name();

        if Instant::now() >= deadline {
            debug!(index, key = %item.key(), "Batch deadline elapsed, not starting item");
            return (index, CallReport::not_started());
        }

        let admission = self.gate.admit_until(cost, deadline).await;
        if admission.is_degraded() {
            self.metrics.record_degraded(provider);
        }
        if Instant::now() >= deadline {
            debug!(index, key = %item.key(), "Batch deadline elapsed during admission, not starting item");
            return (index, CallReport::not_started());
        }

        let prompt = item.prompt().as_str();
        let report = self
            .retry
            .execute_until(|| self.transport.invoke(prompt), deadline)
            .await;
        self.metrics.record_call(provider, &report);

        debug!(
            index,
            key = %item.key(),
            state = %report.state(),
            attempts = report.attempts(),
            tokens = report.outcome().tokens_used(),
            "Item finished"
        );

        (index, report)
    }
}
