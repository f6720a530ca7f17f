//! Sluice - budget-aware admission control for rate-limited LLM services
//!
//! Sluice sits between a batch of prompts and a remote completion service
//! that meters usage in tokens and requests per time window. It watches the
//! budget the service reports on every response and uses it to decide how
//! many calls run at once, whether a call should wait for the window to
//! reset, and when a failed call is retried.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use sluice::{BatchScheduler, OpenAiSettingsBuilder, OpenAiTransport, SluiceConfig, WorkItem};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SluiceConfig::load()?;
//!     let settings = OpenAiSettingsBuilder::default().model("gpt-4.1-mini").build()?;
//!     let transport = Arc::new(OpenAiTransport::new(settings)?);
//!
//!     let scheduler = BatchScheduler::new(transport, &config);
//!     let items = vec![WorkItem::new("greeting", "Say hello")];
//!     let result = scheduler.run(&items).await?;
//!     println!("{} tokens", result.total_tokens());
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `sluice_error` - Error types
//! - `sluice_core` - Budget snapshots, work items, outcomes, transport trait
//! - `sluice_rate_limit` - Budget tracker, concurrency controller, admission gate, retry
//! - `sluice_scheduler` - Chunked batch execution and call metrics
//! - `sluice_models` - OpenAI Responses transport
//! - `sluice_rules` - Compliance rule registry, planning and reports
//!
//! This crate re-exports everything and adds [`ComplianceService`], which
//! runs a compliance request end to end.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod service;

pub use service::ComplianceService;

pub use sluice_core::{
    AttemptOutcome, BatchResult, BudgetDimension, BudgetSnapshot, CallFailure, CallReport,
    CallState, Completion, CompletionTransport, CostEstimator, RateLimitMetadata, WorkItem,
    init_tracing,
};
pub use sluice_error::{
    ConfigError, HttpError, JsonError, MalformedInputError, MalformedInputErrorKind,
    RegistryError, RegistryErrorKind, RemoteError, RemoteErrorKind, RetryableError, SluiceError,
    SluiceErrorKind, SluiceResult,
};
pub use sluice_models::{OpenAiSettings, OpenAiSettingsBuilder, OpenAiTransport};
pub use sluice_rate_limit::{
    Admission, AdmissionConfig, AdmissionGate, BatchConfig, BudgetConfig, BudgetTracker,
    ConcurrencyConfig, ConcurrencyController, HeaderRateLimitDetector, RetryConfig,
    RetryOrchestrator, RetryPolicy, SluiceConfig,
};
pub use sluice_rules::{
    ComplianceReport, ComplianceRequest, InstructionRule, Record, RuleHandler, RuleKey,
    RuleRegistry, RuleRequest, RuleVerdict, extract_json,
};
pub use sluice_scheduler::{BatchScheduler, CallMetrics};
