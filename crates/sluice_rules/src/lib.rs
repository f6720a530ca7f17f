//! Compliance rules for Sluice.
//!
//! A [`ComplianceRequest`] names rules and the records to check. Planning
//! validates the request against a [`RuleRegistry`], resolves each record's
//! market to a [`RuleHandler`], and renders one work item per (record, rule)
//! for the batch scheduler. [`ComplianceReport::assemble`] maps the batch
//! outcomes back onto records, parsing each model response with
//! [`extract_json`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod extraction;
mod registry;
mod report;
mod request;

pub use extraction::{extract_json, parse_output};
pub use registry::{DEFAULT_COLUMNS, InstructionRule, RuleHandler, RuleKey, RuleRegistry};
pub use report::{ComplianceReport, RecordReport, RuleVerdict};
pub use request::{ComplianceRequest, CompliancePlan, PlanEntry, Record, RuleRequest};
