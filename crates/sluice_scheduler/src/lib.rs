//! Budget-aware batch execution.
//!
//! [`BatchScheduler`] runs a batch of [`sluice_core::WorkItem`]s against a
//! [`sluice_core::CompletionTransport`], sizing parallelism per chunk from the
//! observed budget and recording one positional outcome per item.
//! [`CallMetrics`] exports call volume, failures, latency and tokens through
//! OpenTelemetry.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod metrics;
mod scheduler;

pub use metrics::CallMetrics;
pub use scheduler::BatchScheduler;
