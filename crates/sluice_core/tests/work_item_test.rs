//! Tests for work items, cost estimation and batch aggregation.

use sluice_core::{
    AttemptOutcome, BatchResult, CallReport, CallState, CostEstimator, WorkItem,
};
use sluice_error::{RemoteError, RemoteErrorKind};
use std::time::Duration;

#[test]
fn test_estimate_short_text() {
    let estimator = CostEstimator::default();
    // len("Short text") = 10, 10 / 4 = 2, 2 + 6590
    assert_eq!(estimator.estimate("Short text"), 6592);
}

#[test]
fn test_estimate_long_text() {
    let estimator = CostEstimator::default();
    assert_eq!(estimator.estimate(&"A".repeat(8000)), 8590);
}

#[test]
fn test_custom_ratio_and_ceiling() {
    let estimator = CostEstimator::new(2, 100);
    assert_eq!(estimator.estimate("abcdef"), 103);
}

#[test]
fn test_blank_prompt_cannot_be_costed() {
    let estimator = CostEstimator::default();
    assert_eq!(estimator.cost_for(&WorkItem::new("a", "   ")), None);
}

#[test]
fn test_zero_explicit_cost_cannot_be_costed() {
    let estimator = CostEstimator::default();
    let item = WorkItem::new("a", "prompt").with_cost(0);
    assert_eq!(estimator.cost_for(&item), None);
}

#[test]
fn test_batch_result_totals() {
    let success = CallReport::new(
        CallState::Succeeded,
        AttemptOutcome::Success {
            tokens_used: 120,
            latency: Duration::from_millis(30),
            budget_observation: None,
            output: "{}".to_string(),
        },
        1,
    );
    let failure = CallReport::new(
        CallState::Failed,
        AttemptOutcome::FatalFailure {
            error: RemoteError::new(RemoteErrorKind::BadRequest("bad".to_string())),
            latency: Duration::from_millis(5),
        },
        1,
    );

    let result = BatchResult::from_reports(
        vec![success.clone(), failure, success, CallReport::not_started()],
        Duration::from_secs(2),
    );

    assert_eq!(result.len(), 4);
    assert_eq!(*result.total_tokens(), 240);
    assert_eq!(*result.failures(), 2);
    assert_eq!(*result.outcomes()[3].attempts(), 0);
    assert!(matches!(
        result.outcomes()[3].error().map(|e| e.kind()),
        Some(RemoteErrorKind::BatchDeadline)
    ));
}

#[test]
fn test_call_state_terminality() {
    assert!(CallState::Succeeded.is_terminal());
    assert!(CallState::Failed.is_terminal());
    assert!(!CallState::Attempting.is_terminal());
    assert!(!CallState::Retrying.is_terminal());
    assert_eq!(CallState::Retrying.to_string(), "retrying");
}
