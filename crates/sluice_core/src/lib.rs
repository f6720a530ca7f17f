//! Core data types for the Sluice admission-control and retry layer.
//!
//! This crate provides the data model shared by every Sluice component: budget
//! snapshots observed from the remote service, work items, per-attempt and
//! per-call outcomes, the aggregate batch result, and the transport trait the
//! core uses to reach the remote completion service.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod budget;
mod item;
mod outcome;
mod telemetry;
mod transport;

pub use budget::{BudgetDimension, BudgetSnapshot, RateLimitMetadata};
pub use item::{CostEstimator, WorkItem};
pub use outcome::{AttemptOutcome, BatchResult, CallFailure, CallReport, CallState, Completion};
pub use telemetry::init_tracing;
pub use transport::CompletionTransport;
