//! Tests for the budget tracker.

use proptest::prelude::*;
use sluice_core::RateLimitMetadata;
use sluice_rate_limit::BudgetTracker;
use std::time::Duration;

fn tokens(limit: u64, remaining: u64, reset: Duration) -> RateLimitMetadata {
    RateLimitMetadata::default().with_tokens(limit, remaining, reset)
}

#[tokio::test(start_paused = true)]
async fn test_unknown_budget_is_optimistic() {
    let tracker = BudgetTracker::new(Duration::from_secs(1));
    assert_eq!(tracker.current_fraction(), 1.0);
    assert_eq!(tracker.remaining_tokens(), None);
    assert_eq!(tracker.time_until_reset(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_incomplete_metadata_is_a_no_op() {
    let tracker = BudgetTracker::new(Duration::from_secs(1));
    let partial = RateLimitMetadata {
        token_remaining: Some(5),
        ..Default::default()
    };

    assert!(!tracker.observe(&partial));
    assert!(!tracker.observe(&RateLimitMetadata::default()));
    assert_eq!(*tracker.stats().observations(), 0);
    assert_eq!(tracker.current_fraction(), 1.0);
}

#[tokio::test(start_paused = true)]
async fn test_fraction_uses_tighter_dimension() {
    let tracker = BudgetTracker::new(Duration::from_secs(1));
    let meta = tokens(10_000, 9_000, Duration::from_secs(60)).with_requests(
        100,
        10,
        Duration::from_secs(1),
    );
    tracker.observe(&meta);

    assert!((tracker.current_fraction() - 0.1).abs() < 1e-9);
    assert_eq!(tracker.time_until_reset(), Duration::from_secs(1));
    assert_eq!(tracker.remaining_tokens(), Some(9_000));
}

#[tokio::test(start_paused = true)]
async fn test_out_of_order_stale_observation_does_not_raise_budget() {
    let tracker = BudgetTracker::new(Duration::from_secs(1));
    tracker.observe(&tokens(1_000, 200, Duration::from_secs(60)));

    tokio::time::advance(Duration::from_millis(100)).await;
    tracker.observe(&tokens(1_000, 800, Duration::from_secs(60)));

    assert_eq!(tracker.remaining_tokens(), Some(200));
}

#[tokio::test(start_paused = true)]
async fn test_in_order_observation_after_window_supersedes() {
    let tracker = BudgetTracker::new(Duration::from_secs(1));
    tracker.observe(&tokens(1_000, 200, Duration::from_secs(60)));

    tokio::time::advance(Duration::from_secs(2)).await;
    tracker.observe(&tokens(1_000, 800, Duration::from_secs(60)));

    assert_eq!(tracker.remaining_tokens(), Some(800));
    assert_eq!(*tracker.stats().observations(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_reset_restores_full_budget() {
    let tracker = BudgetTracker::new(Duration::from_secs(1));
    tracker.observe(&tokens(1_000, 0, Duration::from_secs(3)));
    assert_eq!(tracker.current_fraction(), 0.0);
    assert_eq!(tracker.time_until_reset(), Duration::from_secs(3));

    tokio::time::advance(Duration::from_secs(3)).await;
    assert_eq!(tracker.current_fraction(), 1.0);
    assert_eq!(tracker.time_until_reset(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_usage_is_accumulated() {
    let tracker = BudgetTracker::new(Duration::from_secs(1));
    tracker.record_usage(120);
    tracker.record_usage(80);
    assert_eq!(*tracker.stats().tokens_used(), 200);
}

proptest! {
    #[test]
    fn test_fraction_never_exceeds_lowest_observed_ratio(
        remainings in proptest::collection::vec(0u64..=10_000, 1..20)
    ) {
        // A long window keeps every observation inside one merge window.
        let tracker = BudgetTracker::new(Duration::from_secs(3600));
        for remaining in &remainings {
            tracker.observe(&tokens(10_000, *remaining, Duration::from_secs(600)));
        }

        let lowest = *remainings.iter().min().unwrap() as f64 / 10_000.0;
        prop_assert!(tracker.current_fraction() <= lowest + f64::EPSILON);
    }

    #[test]
    fn test_fraction_stays_in_unit_interval(
        limit in 0u64..=1_000_000,
        remaining in 0u64..=2_000_000,
        requests in proptest::option::of((0u64..=1_000, 0u64..=2_000)),
    ) {
        let tracker = BudgetTracker::new(Duration::from_secs(1));
        let mut meta = tokens(limit, remaining, Duration::from_secs(60));
        if let Some((limit, remaining)) = requests {
            meta = meta.with_requests(limit, remaining, Duration::from_secs(60));
        }
        tracker.observe(&meta);

        let fraction = tracker.current_fraction();
        prop_assert!((0.0..=1.0).contains(&fraction));
    }
}
