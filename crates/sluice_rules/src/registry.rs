//! Rule handlers and the market-aware registry that dispatches to them.

use crate::Record;
use sluice_error::{RegistryError, RegistryErrorKind, SluiceResult};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Columns every stock rule accepts.
pub const DEFAULT_COLUMNS: [&str; 3] = ["Remarks", "PrivateRemarks", "Directions"];

/// Registry key: a rule identifier, optionally scoped to one market.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleKey {
    market_id: Option<String>,
    rule_id: String,
}

impl RuleKey {
    /// Key for the handler used by every market without an override.
    pub fn default_for(rule_id: impl Into<String>) -> Self {
        Self {
            market_id: None,
            rule_id: rule_id.into(),
        }
    }

    /// Key for a market-specific override.
    pub fn market(market_id: impl Into<String>, rule_id: impl Into<String>) -> Self {
        Self {
            market_id: Some(market_id.into()),
            rule_id: rule_id.into(),
        }
    }

    /// Market the key is scoped to, if any.
    pub fn market_id(&self) -> Option<&str> {
        self.market_id.as_deref()
    }

    /// Rule identifier.
    pub fn rule_id(&self) -> &str {
        &self.rule_id
    }
}

impl fmt::Display for RuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.market_id {
            Some(market) => write!(f, "{}_{}", market, self.rule_id),
            None => write!(f, "{}", self.rule_id),
        }
    }
}

/// Turns one record into the prompt for one compliance rule.
pub trait RuleHandler: Send + Sync + fmt::Debug {
    /// Identifier requests use to select this rule.
    fn rule_id(&self) -> &str;

    /// Record columns this rule can inspect.
    fn allowed_columns(&self) -> &[String];

    /// Render the prompt for `record`, including only `columns`.
    fn render(&self, record: &Record, columns: &[String]) -> String;
}

/// Stock handler: fixed instruction text followed by labelled column values.
///
/// # Example
///
/// ```
/// use sluice_rules::{InstructionRule, Record, RuleHandler};
///
/// let rule = InstructionRule::new("FAIR", "Flag fair housing violations.");
/// let record = Record::new("ML1", "MIAMI").with_field("Remarks", "Great schools nearby");
/// let prompt = rule.render(&record, &["Remarks".to_string()]);
/// assert!(prompt.ends_with("Remarks: Great schools nearby"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionRule {
    rule_id: String,
    instruction: String,
    allowed_columns: Vec<String>,
}

impl InstructionRule {
    /// Create a rule accepting [`DEFAULT_COLUMNS`].
    pub fn new(rule_id: impl Into<String>, instruction: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.into(),
            instruction: instruction.into(),
            allowed_columns: DEFAULT_COLUMNS.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Replace the accepted columns.
    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_columns = columns.into_iter().map(Into::into).collect();
        self
    }
}

impl RuleHandler for InstructionRule {
    fn rule_id(&self) -> &str {
        &self.rule_id
    }

    fn allowed_columns(&self) -> &[String] {
        &self.allowed_columns
    }

    fn render(&self, record: &Record, columns: &[String]) -> String {
        let mut prompt = self.instruction.trim_end().to_string();
        prompt.push_str("\n\n");
        let body: Vec<String> = columns
            .iter()
            .map(|column| format!("{}: {}", column, record.field(column).unwrap_or_default()))
            .collect();
        prompt.push_str(&body.join("\n"));
        prompt
    }
}

/// Lookup table from [`RuleKey`] to handler.
///
/// Populated once at startup. Resolution prefers a market override over the
/// default handler for the same rule.
#[derive(Debug, Default, Clone)]
pub struct RuleRegistry {
    handlers: HashMap<RuleKey, Arc<dyn RuleHandler>>,
}

impl RuleRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the stock `FAIR`, `COMP` and `PROMO` rules.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        let stock = [
            InstructionRule::new(
                "FAIR",
                "Review the listing text below for fair housing violations. Respond with JSON \
                 mapping each column name to a list of offending phrases.",
            ),
            InstructionRule::new(
                "COMP",
                "Review the listing text below for disclosures of buyer agent compensation. \
                 Respond with JSON mapping each column name to a list of offending phrases.",
            ),
            InstructionRule::new(
                "PROMO",
                "Review the listing text below for promotional or advertising content that is \
                 not about the property. Respond with JSON mapping each column name to a list \
                 of offending phrases.",
            ),
        ];
        for rule in stock {
            let key = RuleKey::default_for(rule.rule_id());
            registry.handlers.insert(key, Arc::new(rule));
        }
        registry
    }

    /// Register `handler` under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryErrorKind::AmbiguousRegistration`] if the key is taken.
    #[instrument(skip_all, fields(key = %key))]
    pub fn register(&mut self, key: RuleKey, handler: Arc<dyn RuleHandler>) -> SluiceResult<()> {
        if self.handlers.contains_key(&key) {
            Err(RegistryError::new(RegistryErrorKind::AmbiguousRegistration(
                key.to_string(),
            )))?
        }
        debug!("Registering rule handler");
        self.handlers.insert(key, handler);
        Ok(())
    }

    /// Handler for `rule_id` in `market_id`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryErrorKind::UnknownRule`] if neither a market override
    /// nor a default handler exists.
    pub fn resolve(&self, market_id: &str, rule_id: &str) -> SluiceResult<Arc<dyn RuleHandler>> {
        let scoped = RuleKey::market(market_id, rule_id);
        if let Some(handler) = self.handlers.get(&scoped) {
            debug!(key = %scoped, "Resolved market override");
            return Ok(handler.clone());
        }
        self.handlers
            .get(&RuleKey::default_for(rule_id))
            .cloned()
            .ok_or_else(|| {
                RegistryError::new(RegistryErrorKind::UnknownRule(scoped.to_string())).into()
            })
    }

    /// True if any handler, default or override, exists for `rule_id`.
    pub fn knows(&self, rule_id: &str) -> bool {
        self.handlers.keys().any(|key| key.rule_id == rule_id)
    }

    /// Sorted, deduplicated rule identifiers.
    pub fn rule_ids(&self) -> Vec<String> {
        self.handlers
            .keys()
            .map(|key| key.rule_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Columns accepted for `rule_id`.
    ///
    /// The default handler's columns when one exists, otherwise the union of
    /// every override's columns.
    pub fn allowed_columns(&self, rule_id: &str) -> Vec<String> {
        if let Some(handler) = self.handlers.get(&RuleKey::default_for(rule_id)) {
            return handler.allowed_columns().to_vec();
        }
        let mut seen = BTreeSet::new();
        let mut columns = Vec::new();
        for handler in self
            .handlers
            .iter()
            .filter(|(key, _)| key.rule_id == rule_id)
            .map(|(_, handler)| handler)
        {
            for column in handler.allowed_columns() {
                if seen.insert(column.clone()) {
                    columns.push(column.clone());
                }
            }
        }
        columns
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
