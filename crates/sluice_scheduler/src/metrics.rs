//! Metrics for remote completion calls.
//!
//! Provides OpenTelemetry-based metrics for call volume, failures, latency,
//! token usage and degraded admissions. Recording is a no-op until the host
//! installs a meter provider.

use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram, Meter},
};
use sluice_core::CallReport;
use std::sync::OnceLock;

static METRICS: OnceLock<CallMetrics> = OnceLock::new();

/// Process-wide instruments for remote calls.
///
/// Metrics are labelled with the transport's provider name and the terminal
/// call state.
#[derive(Clone)]
pub struct CallMetrics {
    /// Meter handle kept alive for metric instruments
    _meter: Meter,
    /// Completed logical calls (after retries)
    pub calls: Counter<u64>,
    /// Calls that ended in `Failed`
    pub errors: Counter<u64>,
    /// Latency of the final attempt in seconds
    pub duration: Histogram<f64>,
    /// Tokens billed by successful calls
    pub tokens: Counter<u64>,
    /// Admissions granted despite insufficient observed budget
    pub degraded_admissions: Counter<u64>,
}

impl CallMetrics {
    fn init() -> Self {
        let meter = global::meter("sluice");

        Self {
            _meter: meter.clone(),
            calls: meter
                .u64_counter("sluice.calls")
                .with_description("Completed remote completion calls")
                .build(),
            errors: meter
                .u64_counter("sluice.call.errors")
                .with_description("Remote completion calls that failed")
                .build(),
            duration: meter
                .f64_histogram("sluice.call.duration")
                .with_unit("seconds")
                .with_description("Remote completion call duration")
                .build(),
            tokens: meter
                .u64_counter("sluice.tokens")
                .with_description("Tokens billed by successful calls")
                .build(),
            degraded_admissions: meter
                .u64_counter("sluice.admissions.degraded")
                .with_description("Admissions granted despite insufficient budget")
                .build(),
        }
    }

    /// Get the global call metrics instance.
    pub fn get() -> &'static Self {
        METRICS.get_or_init(Self::init)
    }

    /// Record the terminal report of one call.
    pub fn record_call(&self, provider: &str, report: &CallReport) {
        let labels = &[
            KeyValue::new("provider", provider.to_string()),
            KeyValue::new("state", report.state().to_string()),
        ];
        self.calls.add(1, labels);
        self.duration
            .record(report.outcome().latency().as_secs_f64(), labels);

        match report.error() {
            Some(err) => {
                let labels = &[
                    KeyValue::new("provider", provider.to_string()),
                    KeyValue::new("error_kind", err.kind().label()),
                ];
                self.errors.add(1, labels);
            }
            None => {
                let labels = &[KeyValue::new("provider", provider.to_string())];
                self.tokens.add(report.outcome().tokens_used(), labels);
            }
        }
    }

    /// Record one degraded admission.
    pub fn record_degraded(&self, provider: &str) {
        self.degraded_admissions
            .add(1, &[KeyValue::new("provider", provider.to_string())]);
    }
}

impl Default for CallMetrics {
    fn default() -> Self {
        Self::get().clone()
    }
}
