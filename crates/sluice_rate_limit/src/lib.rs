//! Budget tracking, admission control and retry.
//!
//! This crate holds the feedback loop between the remote service's reported
//! budget and the batch layer's behaviour:
//!
//! - [`BudgetTracker`] ingests rate limit metadata from every completed call
//! - [`ConcurrencyController`] maps the spendable fraction to a parallelism level
//! - [`AdmissionGate`] delays calls whose estimated cost does not fit
//! - [`RetryOrchestrator`] retries transient failures with backoff and jitter
//!
//! [`SluiceConfig`] carries every tunable, loaded from layered TOML files and
//! the environment. [`HeaderRateLimitDetector`] turns response headers into
//! [`sluice_core::RateLimitMetadata`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod admission;
mod concurrency;
mod config;
mod detector;
mod retry;
mod tracker;

pub use admission::{Admission, AdmissionGate};
pub use concurrency::ConcurrencyController;
pub use config::{
    AdmissionConfig, BatchConfig, BudgetConfig, ConcurrencyConfig, RetryConfig, SluiceConfig,
};
pub use detector::{HeaderRateLimitDetector, parse_openai_headers, parse_reset_duration};
pub use retry::{BackoffSchedule, RetryOrchestrator, RetryPolicy};
pub use tracker::{BudgetTracker, TrackerStats};
