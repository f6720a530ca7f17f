//! Tests for chunked batch execution.

use async_trait::async_trait;
use sluice_core::{CallFailure, CallState, Completion, CompletionTransport, RateLimitMetadata, WorkItem};
use sluice_error::{MalformedInputErrorKind, RemoteError, RemoteErrorKind, SluiceErrorKind};
use sluice_rate_limit::{BudgetTracker, SluiceConfig};
use sluice_scheduler::BatchScheduler;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Transport whose behaviour is driven by the prompt text.
///
/// - `sleep:<ms>:<text>` waits `ms` milliseconds, then echoes `text`
/// - `fail` returns a fatal bad-request error
/// - an echoed text of `throttle` returns a 429 rate limit rejection
/// - anything else echoes the prompt
#[derive(Default)]
struct ScriptedTransport {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    metadata: Option<RateLimitMetadata>,
}

impl ScriptedTransport {
    fn with_metadata(metadata: RateLimitMetadata) -> Self {
        Self {
            metadata: Some(metadata),
            ..Default::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionTransport for ScriptedTransport {
    async fn invoke(&self, prompt: &str) -> Result<Completion, CallFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let mut output = prompt.to_string();
        if let Some(rest) = prompt.strip_prefix("sleep:") {
            let (ms, text) = rest.split_once(':').unwrap();
            tokio::time::sleep(Duration::from_millis(ms.parse().unwrap())).await;
            output = text.to_string();
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if output == "throttle" {
            return Err(CallFailure::new(RemoteError::new(RemoteErrorKind::RateLimited(
                "slow down".to_string(),
            ))));
        }

        if prompt == "fail" {
            return Err(CallFailure::new(RemoteError::new(RemoteErrorKind::BadRequest(
                "rejected".to_string(),
            ))));
        }

        let completion = Completion::new(10, output);
        Ok(match self.metadata {
            Some(meta) => completion.with_rate_limit(meta),
            None => completion,
        })
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}

fn config(chunk_size: usize) -> SluiceConfig {
    let mut config = SluiceConfig::default();
    config.batch.chunk_size = chunk_size;
    config.retry.jitter_ms = 0;
    config
}

fn items(prompts: &[&str]) -> Vec<WorkItem> {
    prompts
        .iter()
        .enumerate()
        .map(|(i, p)| WorkItem::new(format!("item-{i}"), *p))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_empty_batch_is_malformed_and_sends_nothing() {
    let transport = Arc::new(ScriptedTransport::default());
    let scheduler = BatchScheduler::new(transport.clone(), &config(100));

    let err = scheduler.run(&[]).await.unwrap_err();

    match err.kind() {
        SluiceErrorKind::MalformedInput(e) => {
            assert_eq!(*e.kind(), MalformedInputErrorKind::EmptyBatch)
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(transport.calls(), 0);
    assert_eq!(scheduler.controller().evaluations(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_uncostable_item_rejects_whole_batch() {
    let transport = Arc::new(ScriptedTransport::default());
    let scheduler = BatchScheduler::new(transport.clone(), &config(100));

    let mut batch = items(&["a", "  ", "c"]);
    let err = scheduler.run(&batch).await.unwrap_err();
    assert!(matches!(
        err.kind(),
        SluiceErrorKind::MalformedInput(e)
            if matches!(e.kind(), MalformedInputErrorKind::InvalidItem { index: 1, .. })
    ));

    batch[1] = WorkItem::new("zero", "b").with_cost(0);
    assert!(scheduler.run(&batch).await.is_err());
    assert_eq!(transport.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_outcomes_are_positional_despite_completion_order() {
    let transport = Arc::new(ScriptedTransport::default());
    let scheduler = BatchScheduler::new(transport.clone(), &config(100));

    // Earlier items sleep longer, so they complete last.
    let prompts: Vec<String> = (0..10)
        .map(|i| format!("sleep:{}:out-{i}", (10 - i) * 10))
        .collect();
    let batch: Vec<WorkItem> = prompts
        .iter()
        .enumerate()
        .map(|(i, p)| WorkItem::new(format!("item-{i}"), p.as_str()))
        .collect();

    let result = scheduler.run(&batch).await.unwrap();

    assert_eq!(result.len(), 10);
    for (i, report) in result.outcomes().iter().enumerate() {
        assert_eq!(report.outcome().output(), Some(format!("out-{i}").as_str()));
    }
    assert_eq!(*result.total_tokens(), 100);
    assert_eq!(*result.failures(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_concurrency_evaluated_once_per_chunk() {
    let transport = Arc::new(ScriptedTransport::default());
    let scheduler = BatchScheduler::new(transport.clone(), &config(4));

    let prompts: Vec<String> = (0..12).map(|i| format!("p{i}")).collect();
    let batch: Vec<WorkItem> = prompts.iter().map(|p| WorkItem::new(p.as_str(), p.as_str())).collect();

    let result = scheduler.run(&batch).await.unwrap();

    assert_eq!(result.len(), 12);
    assert_eq!(scheduler.controller().evaluations(), 3);
    assert_eq!(transport.calls(), 12);
}

#[tokio::test(start_paused = true)]
async fn test_failure_is_isolated_to_its_item() {
    let transport = Arc::new(ScriptedTransport::default());
    let scheduler = BatchScheduler::new(transport.clone(), &config(100));

    let result = scheduler
        .run(&items(&["ok-1", "fail", "ok-2"]))
        .await
        .unwrap();

    let states: Vec<CallState> = result.outcomes().iter().map(|r| *r.state()).collect();
    assert_eq!(
        states,
        vec![CallState::Succeeded, CallState::Failed, CallState::Succeeded]
    );
    assert_eq!(*result.failures(), 1);
    assert_eq!(*result.total_tokens(), 20);
    assert_eq!(*result.outcomes()[1].attempts(), 1);
    assert_eq!(transport.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_batch_deadline_skips_remaining_chunks() {
    let transport = Arc::new(ScriptedTransport::default());
    let mut config = config(2);
    config.batch.batch_timeout_secs = 1;
    let scheduler = BatchScheduler::new(transport.clone(), &config);

    let result = scheduler
        .run(&items(&["sleep:2000:a", "sleep:2000:b", "c", "d"]))
        .await
        .unwrap();

    assert_eq!(result.len(), 4);
    assert!(result.outcomes()[0].is_success());
    assert!(result.outcomes()[1].is_success());
    for report in &result.outcomes()[2..] {
        assert_eq!(*report.attempts(), 0);
        assert!(matches!(
            report.error().map(|e| e.kind()),
            Some(RemoteErrorKind::BatchDeadline)
        ));
    }
    assert_eq!(*result.failures(), 2);
    assert_eq!(transport.calls(), 2);
    assert_eq!(scheduler.controller().evaluations(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_observed_budget_lowers_next_chunk_concurrency() {
    let meta = RateLimitMetadata::default().with_tokens(
        1_000_000,
        50_000,
        Duration::from_secs(600),
    );
    let transport = Arc::new(ScriptedTransport::with_metadata(meta));
    let scheduler = BatchScheduler::new(transport.clone(), &config(3));

    let result = scheduler
        .run(&items(&["a", "b", "c", "d", "e", "f", "g"]))
        .await
        .unwrap();

    assert_eq!(*result.failures(), 0);
    assert_eq!(scheduler.controller().evaluations(), 3);
    assert_eq!(scheduler.controller().last_recommendation(), 5);
    assert_eq!(scheduler.tracker().remaining_tokens(), Some(50_000));
}

#[tokio::test(start_paused = true)]
async fn test_chunk_concurrency_bounds_in_flight_calls() {
    let meta = RateLimitMetadata::default().with_tokens(
        1_000_000,
        50_000,
        Duration::from_secs(600),
    );
    let transport = Arc::new(ScriptedTransport::with_metadata(meta));
    let scheduler = BatchScheduler::new(transport.clone(), &config(20));

    // The first chunk primes the tracker; the second runs at the critical floor.
    let prompts: Vec<String> = (0..40).map(|i| format!("sleep:50:{i}")).collect();
    let batch: Vec<WorkItem> = prompts.iter().map(|p| WorkItem::new(p.as_str(), p.as_str())).collect();
    scheduler.run(&batch[..20]).await.unwrap();

    transport.peak_in_flight.store(0, Ordering::SeqCst);
    scheduler.run(&batch[20..]).await.unwrap();

    assert!(transport.peak_in_flight.load(Ordering::SeqCst) <= 5);
}

#[tokio::test(start_paused = true)]
async fn test_batch_deadline_stops_backoff_of_in_flight_item() {
    let transport = Arc::new(ScriptedTransport::default());
    let mut config = config(10);
    config.batch.batch_timeout_secs = 1;
    let scheduler = BatchScheduler::new(transport.clone(), &config);

    let start = Instant::now();
    let result = scheduler.run(&items(&["sleep:500:throttle"])).await.unwrap();

    // The first backoff (1s) would end after the deadline, so no retry starts.
    assert_eq!(start.elapsed(), Duration::from_millis(500));
    let report = &result.outcomes()[0];
    assert_eq!(*report.state(), CallState::Failed);
    assert_eq!(*report.attempts(), 1);
    assert!(matches!(
        report.error().map(|e| e.kind()),
        Some(RemoteErrorKind::RateLimited(_))
    ));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_batch_deadline_caps_admission_wait() {
    let tracker = Arc::new(BudgetTracker::new(Duration::from_secs(1)));
    tracker.observe(&RateLimitMetadata::default().with_tokens(
        1_000_000,
        100,
        Duration::from_secs(3600),
    ));
    let transport = Arc::new(ScriptedTransport::default());
    let mut config = config(10);
    config.batch.batch_timeout_secs = 2;
    let scheduler = BatchScheduler::with_tracker(transport.clone(), tracker, &config);

    let start = Instant::now();
    let result = scheduler.run(&items(&["a"])).await.unwrap();

    assert_eq!(start.elapsed(), Duration::from_secs(2));
    let report = &result.outcomes()[0];
    assert_eq!(*report.attempts(), 0);
    assert!(matches!(
        report.error().map(|e| e.kind()),
        Some(RemoteErrorKind::BatchDeadline)
    ));
    assert_eq!(transport.calls(), 0);
}
