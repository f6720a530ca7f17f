//! Per-record compliance results.

use crate::{CompliancePlan, parse_output};
use serde::Serialize;
use serde_json::Value;
use sluice_core::{BatchResult, CallReport};
use std::collections::BTreeMap;
use tracing::warn;

/// Result of one rule on one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RuleVerdict {
    /// JSON the model returned
    Parsed(Value),
    /// The call failed or its output was not JSON
    Error {
        /// Error description
        error: String,
    },
}

impl RuleVerdict {
    /// True for [`RuleVerdict::Error`].
    pub fn is_error(&self) -> bool {
        matches!(self, RuleVerdict::Error { .. })
    }

    fn from_report(report: &CallReport) -> Self {
        match (report.is_success(), report.outcome().output()) {
            (true, Some(output)) => match parse_output(output) {
                Ok(value) => RuleVerdict::Parsed(value),
                Err(e) => RuleVerdict::Error {
                    error: e.message,
                },
            },
            _ => RuleVerdict::Error {
                error: report
                    .error()
                    .map_or_else(|| "call produced no output".to_string(), |e| e.to_string()),
            },
        }
    }
}

/// Every rule's verdict for one record.
#[derive(Debug, Clone, PartialEq, Serialize, derive_getters::Getters)]
pub struct RecordReport {
    /// Listing identifier
    id: String,
    /// Market identifier
    market_id: String,
    /// Verdict per rule identifier
    rules: BTreeMap<String, RuleVerdict>,
    /// Tokens billed for this record's calls
    tokens_used: u64,
    /// Summed latency of this record's final attempts
    latency_ms: u64,
}

/// Compliance results grouped by record.
///
/// `ok` is false when any call failed; individual failures are reported in
/// the affected record and never drop other records.
#[derive(Debug, Clone, PartialEq, Serialize, derive_getters::Getters)]
pub struct ComplianceReport {
    /// True if every call succeeded
    ok: bool,
    /// Per-record results in request order
    records: Vec<RecordReport>,
    /// Tokens billed across the batch
    total_tokens: u64,
    /// Wall time of the batch
    elapsed_ms: u64,
    /// Number of calls that did not succeed
    failures: usize,
}

impl ComplianceReport {
    /// Group a batch result back onto the records of `plan`.
    pub fn assemble(plan: &CompliancePlan, result: &BatchResult) -> Self {
        let mut records: Vec<RecordReport> = plan
            .records()
            .iter()
            .map(|(id, market_id)| RecordReport {
                id: id.clone(),
                market_id: market_id.clone(),
                rules: BTreeMap::new(),
                tokens_used: 0,
                latency_ms: 0,
            })
            .collect();

        for (entry, report) in plan.entries().iter().zip(result.outcomes()) {
            let Some(record) = records.get_mut(*entry.record_index()) else {
                continue;
            };
            let verdict = RuleVerdict::from_report(report);
            if verdict.is_error() {
                warn!(record = %record.id, rule = %entry.rule_id(), "Rule produced no usable result");
            }
            record.tokens_used += report.outcome().tokens_used();
            record.latency_ms += report.outcome().latency().as_millis() as u64;
            record.rules.insert(entry.rule_id().clone(), verdict);
        }

        Self {
            ok: *result.failures() == 0,
            records,
            total_tokens: *result.total_tokens(),
            elapsed_ms: result.elapsed().as_millis() as u64,
            failures: *result.failures(),
        }
    }
}
