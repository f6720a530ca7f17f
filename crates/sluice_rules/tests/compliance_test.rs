//! Tests for compliance request planning and report assembly.

use serde_json::json;
use sluice_core::{AttemptOutcome, BatchResult, CallReport, CallState};
use sluice_error::{MalformedInputErrorKind, RemoteError, RemoteErrorKind, SluiceErrorKind};
use sluice_rules::{
    ComplianceReport, ComplianceRequest, InstructionRule, Record, RuleKey, RuleRegistry,
    RuleRequest, RuleVerdict,
};
use std::sync::Arc;
use std::time::Duration;

fn malformed(err: &sluice_error::SluiceError) -> MalformedInputErrorKind {
    match err.kind() {
        SluiceErrorKind::MalformedInput(e) => e.kind().clone(),
        other => panic!("expected malformed input, got {}", other),
    }
}

fn two_records() -> Vec<Record> {
    vec![
        Record::new("A1", "MIAMI").with_field("Remarks", "Walk to church"),
        Record::new("B2", "NABOR")
            .with_field("Remarks", "Pool")
            .with_field("Directions", "Exit 4"),
    ]
}

fn success(output: &str, tokens: u64) -> CallReport {
    CallReport::new(
        CallState::Succeeded,
        AttemptOutcome::Success {
            tokens_used: tokens,
            latency: Duration::from_millis(100),
            budget_observation: None,
            output: output.to_string(),
        },
        1,
    )
}

fn failure(kind: RemoteErrorKind) -> CallReport {
    CallReport::new(
        CallState::Failed,
        AttemptOutcome::FatalFailure {
            error: RemoteError::new(kind),
            latency: Duration::from_millis(20),
        },
        1,
    )
}

#[test]
fn test_request_deserializes_wire_names() {
    let request: ComplianceRequest = serde_json::from_value(json!({
        "AIViolationID": [{"ID": "FAIR", "CheckColumns": "Remarks, Directions"}],
        "Data": [{"mlsnum": "A1", "mlsId": "MIAMI", "Remarks": "Nice", "Directions": null}]
    }))
    .unwrap();

    assert_eq!(request.rules, vec![RuleRequest::new("FAIR", ["Remarks", "Directions"])]);
    assert_eq!(request.records[0].id(), "A1");
    assert_eq!(request.records[0].market_id(), "MIAMI");
    assert_eq!(request.records[0].field("Remarks"), Some("Nice"));
    assert_eq!(request.records[0].field("Directions"), None);
}

#[test]
fn test_request_accepts_column_lists() {
    let request: ComplianceRequest = serde_json::from_value(json!({
        "rules": [{"rule_id": "COMP", "columns": ["Remarks"]}],
        "records": [{"id": "A1", "market_id": "MIAMI"}]
    }))
    .unwrap();
    assert_eq!(request.rules[0].columns, vec!["Remarks"]);
}

#[test]
fn test_plan_is_record_major() {
    let request = ComplianceRequest {
        rules: vec![
            RuleRequest::new("FAIR", ["Remarks"]),
            RuleRequest::new("COMP", Vec::<String>::new()),
        ],
        records: two_records(),
    };
    let plan = request.plan(&RuleRegistry::with_defaults()).unwrap();

    let keys: Vec<&str> = plan.items().iter().map(|i| i.key().as_str()).collect();
    assert_eq!(keys, vec!["A1/FAIR", "A1/COMP", "B2/FAIR", "B2/COMP"]);
    assert_eq!(*plan.entries()[2].record_index(), 1);
    assert_eq!(plan.entries()[3].rule_id(), "COMP");

    // Empty column list selects every allowed column.
    let comp_prompt = plan.items()[3].prompt();
    assert!(comp_prompt.contains("Remarks: Pool"));
    assert!(comp_prompt.contains("PrivateRemarks: "));
    assert!(comp_prompt.contains("Directions: Exit 4"));

    let fair_prompt = plan.items()[2].prompt();
    assert!(!fair_prompt.contains("Directions"));
}

#[test]
fn test_plan_uses_market_override() {
    let mut registry = RuleRegistry::with_defaults();
    registry
        .register(
            RuleKey::market("MIAMI", "FAIR"),
            Arc::new(InstructionRule::new("FAIR", "MIAMI OVERRIDE")),
        )
        .unwrap();

    let request = ComplianceRequest {
        rules: vec![RuleRequest::new("FAIR", ["Remarks"])],
        records: two_records(),
    };
    let plan = request.plan(&registry).unwrap();
    assert!(plan.items()[0].prompt().starts_with("MIAMI OVERRIDE"));
    assert!(!plan.items()[1].prompt().starts_with("MIAMI OVERRIDE"));
}

#[test]
fn test_plan_rejects_empty_records() {
    let request = ComplianceRequest {
        rules: vec![RuleRequest::new("FAIR", ["Remarks"])],
        records: vec![],
    };
    let err = request.plan(&RuleRegistry::with_defaults()).unwrap_err();
    assert_eq!(malformed(&err), MalformedInputErrorKind::EmptyBatch);
}

#[test]
fn test_plan_rejects_unknown_rules() {
    let request = ComplianceRequest {
        rules: vec![
            RuleRequest::new("FAIR", ["Remarks"]),
            RuleRequest::new("NOPE", ["Remarks"]),
        ],
        records: two_records(),
    };
    let err = request.plan(&RuleRegistry::with_defaults()).unwrap_err();
    assert_eq!(
        malformed(&err),
        MalformedInputErrorKind::InvalidRule {
            requested: vec!["NOPE".to_string()],
            valid: vec!["COMP".to_string(), "FAIR".to_string(), "PROMO".to_string()],
        }
    );
}

#[test]
fn test_plan_rejects_disallowed_columns() {
    let request = ComplianceRequest {
        rules: vec![RuleRequest::new("PROMO", ["Remarks", "Price"])],
        records: two_records(),
    };
    let err = request.plan(&RuleRegistry::with_defaults()).unwrap_err();
    match malformed(&err) {
        MalformedInputErrorKind::InvalidColumns { rule_id, columns, .. } => {
            assert_eq!(rule_id, "PROMO");
            assert_eq!(columns, vec!["Price"]);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_plan_rejects_stray_record_fields() {
    let request = ComplianceRequest {
        rules: vec![RuleRequest::new("FAIR", ["Remarks"])],
        records: vec![Record::new("A1", "MIAMI").with_field("ListPrice", "100")],
    };
    let err = request.plan(&RuleRegistry::with_defaults()).unwrap_err();
    assert_eq!(
        malformed(&err),
        MalformedInputErrorKind::InvalidRecord {
            record: "A1".to_string(),
            fields: vec!["ListPrice".to_string()],
        }
    );
}

#[test]
fn test_report_groups_outcomes_by_record() {
    let request = ComplianceRequest {
        rules: vec![
            RuleRequest::new("FAIR", ["Remarks"]),
            RuleRequest::new("COMP", ["Remarks"]),
        ],
        records: two_records(),
    };
    let plan = request.plan(&RuleRegistry::with_defaults()).unwrap();
    let result = BatchResult::from_reports(
        vec![
            success("```json\n{\"Remarks\": [\"church\"]}\n```", 50),
            success("{\"Remarks\": []}", 30),
            failure(RemoteErrorKind::BadRequest("prompt rejected".to_string())),
            success("I cannot answer that", 10),
        ],
        Duration::from_secs(2),
    );

    let report = ComplianceReport::assemble(&plan, &result);
    assert!(!report.ok());
    assert_eq!(*report.failures(), 1);
    assert_eq!(*report.total_tokens(), 90);
    assert_eq!(*report.elapsed_ms(), 2000);

    let first = &report.records()[0];
    assert_eq!(first.id(), "A1");
    assert_eq!(*first.tokens_used(), 80);
    assert_eq!(*first.latency_ms(), 200);
    assert_eq!(
        first.rules()["FAIR"],
        RuleVerdict::Parsed(json!({"Remarks": ["church"]}))
    );

    let second = &report.records()[1];
    assert_eq!(second.market_id(), "NABOR");
    assert_eq!(*second.tokens_used(), 10);
    match &second.rules()["FAIR"] {
        RuleVerdict::Error { error } => assert!(error.contains("prompt rejected")),
        other => panic!("unexpected {:?}", other),
    }
    assert!(second.rules()["COMP"].is_error());
}

#[test]
fn test_report_serializes_verdicts_inline() {
    let request = ComplianceRequest {
        rules: vec![RuleRequest::new("FAIR", ["Remarks"])],
        records: vec![Record::new("A1", "MIAMI").with_field("Remarks", "x")],
    };
    let plan = request.plan(&RuleRegistry::with_defaults()).unwrap();
    let result = BatchResult::from_reports(vec![CallReport::not_started()], Duration::ZERO);

    let value = serde_json::to_value(ComplianceReport::assemble(&plan, &result)).unwrap();
    assert_eq!(value["ok"], json!(false));
    let error = value["records"][0]["rules"]["FAIR"]["error"].as_str().unwrap();
    assert!(error.contains("deadline"));
}
