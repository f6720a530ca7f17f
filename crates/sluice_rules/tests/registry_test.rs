//! Tests for rule registration and market-aware resolution.

use sluice_error::{RegistryErrorKind, SluiceErrorKind};
use sluice_rules::{InstructionRule, Record, RuleHandler, RuleKey, RuleRegistry};
use std::sync::Arc;

fn registry_error(err: &sluice_error::SluiceError) -> RegistryErrorKind {
    match err.kind() {
        SluiceErrorKind::Registry(e) => e.kind().clone(),
        other => panic!("expected registry error, got {}", other),
    }
}

#[test]
fn test_defaults_register_stock_rules() {
    let registry = RuleRegistry::with_defaults();
    assert_eq!(registry.len(), 3);
    assert_eq!(registry.rule_ids(), vec!["COMP", "FAIR", "PROMO"]);
    for rule in ["FAIR", "COMP", "PROMO"] {
        assert_eq!(
            registry.allowed_columns(rule),
            vec!["Remarks", "PrivateRemarks", "Directions"]
        );
    }
}

#[test]
fn test_resolve_falls_back_to_default() {
    let registry = RuleRegistry::with_defaults();
    let handler = registry.resolve("MIAMI", "FAIR").unwrap();
    assert_eq!(handler.rule_id(), "FAIR");
}

#[test]
fn test_market_override_wins() {
    let mut registry = RuleRegistry::with_defaults();
    let custom = InstructionRule::new("FAIR", "Miami-specific fair housing check.")
        .with_columns(["Remarks", "ShowingInstructions"]);
    registry
        .register(RuleKey::market("MIAMI", "FAIR"), Arc::new(custom))
        .unwrap();

    let miami = registry.resolve("MIAMI", "FAIR").unwrap();
    assert_eq!(miami.allowed_columns(), ["Remarks", "ShowingInstructions"]);

    let other = registry.resolve("NABOR", "FAIR").unwrap();
    assert_eq!(other.allowed_columns().len(), 3);
}

#[test]
fn test_override_only_rule_resolves_for_its_market() {
    let mut registry = RuleRegistry::with_defaults();
    registry
        .register(
            RuleKey::market("MIAMI", "PRWD"),
            Arc::new(InstructionRule::new("PRWD", "Prohibited words.")),
        )
        .unwrap();

    assert!(registry.knows("PRWD"));
    assert!(registry.resolve("MIAMI", "PRWD").is_ok());

    let err = registry.resolve("NABOR", "PRWD").unwrap_err();
    assert_eq!(
        registry_error(&err),
        RegistryErrorKind::UnknownRule("NABOR_PRWD".to_string())
    );
}

#[test]
fn test_duplicate_registration_rejected() {
    let mut registry = RuleRegistry::with_defaults();
    let err = registry
        .register(
            RuleKey::default_for("FAIR"),
            Arc::new(InstructionRule::new("FAIR", "again")),
        )
        .unwrap_err();
    assert_eq!(
        registry_error(&err),
        RegistryErrorKind::AmbiguousRegistration("FAIR".to_string())
    );
    assert_eq!(registry.len(), 3);
}

#[test]
fn test_unknown_rule_in_empty_registry() {
    let registry = RuleRegistry::new();
    assert!(registry.is_empty());
    assert!(!registry.knows("FAIR"));
    assert!(registry.resolve("MIAMI", "FAIR").is_err());
}

#[test]
fn test_key_display() {
    assert_eq!(RuleKey::default_for("COMP").to_string(), "COMP");
    assert_eq!(RuleKey::market("MIAMI", "PRWD").to_string(), "MIAMI_PRWD");
    assert_eq!(RuleKey::market("MIAMI", "PRWD").market_id(), Some("MIAMI"));
}

#[test]
fn test_instruction_rule_renders_requested_columns_in_order() {
    let rule = InstructionRule::new("FAIR", "Check this.\n");
    let record = Record::new("A1", "MIAMI")
        .with_field("Remarks", "Perfect for young couples")
        .with_field("Directions", "North on US-1");

    let prompt = rule.render(
        &record,
        &["Directions".to_string(), "PrivateRemarks".to_string()],
    );
    assert_eq!(prompt, "Check this.\n\nDirections: North on US-1\nPrivateRemarks: ");
}
