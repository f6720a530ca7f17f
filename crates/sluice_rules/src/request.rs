//! Compliance requests and their expansion into work items.

use crate::RuleRegistry;
use serde::{Deserialize, Deserializer, Serialize};
use sluice_core::WorkItem;
use sluice_error::{MalformedInputError, MalformedInputErrorKind, SluiceResult};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, instrument};

/// One listing to check.
///
/// Every key other than the identifiers is a column value.
///
/// # Example
///
/// ```
/// use sluice_rules::Record;
///
/// let record: Record = serde_json::from_str(
///     r#"{"mlsnum": "A1", "mlsId": "MIAMI", "Remarks": "Walk to the beach"}"#,
/// ).unwrap();
/// assert_eq!(record.id(), "A1");
/// assert_eq!(record.field("Remarks"), Some("Walk to the beach"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_getters::Getters)]
pub struct Record {
    /// Listing identifier
    #[serde(alias = "mlsnum")]
    #[getter(skip)]
    id: String,
    /// Market the listing belongs to
    #[serde(alias = "mlsId", alias = "mls_id")]
    #[getter(skip)]
    market_id: String,
    /// Column values; `null` is kept as an absent value
    #[serde(flatten)]
    fields: BTreeMap<String, Option<String>>,
}

impl Record {
    /// Create a record with no columns.
    pub fn new(id: impl Into<String>, market_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            market_id: market_id.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Set a column value.
    pub fn with_field(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(column.into(), Some(value.into()));
        self
    }

    /// Listing identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Market identifier.
    pub fn market_id(&self) -> &str {
        &self.market_id
    }

    /// Value of `column`, if present and non-null.
    pub fn field(&self, column: &str) -> Option<&str> {
        self.fields.get(column).and_then(|v| v.as_deref())
    }
}

/// A rule to apply and the columns it should inspect.
///
/// `columns` accepts a JSON list or a comma-separated string. An empty list
/// selects every column the rule allows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRequest {
    /// Rule identifier
    #[serde(alias = "ID")]
    pub rule_id: String,
    /// Columns to inspect
    #[serde(alias = "CheckColumns", default, deserialize_with = "list_or_csv")]
    pub columns: Vec<String>,
}

impl RuleRequest {
    /// Create a rule request.
    pub fn new<I, S>(rule_id: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rule_id: rule_id.into(),
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }
}

fn list_or_csv<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Columns {
        List(Vec<String>),
        Csv(String),
    }

    let columns = match Columns::deserialize(deserializer)? {
        Columns::List(list) => list,
        Columns::Csv(csv) => csv.split(',').map(str::to_string).collect(),
    };
    Ok(columns
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect())
}

/// Rules to run over a set of records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceRequest {
    /// Rules applied to every record
    #[serde(alias = "AIViolationID")]
    pub rules: Vec<RuleRequest>,
    /// Records to check
    #[serde(alias = "Data")]
    pub records: Vec<Record>,
}

/// Which (record, rule) pair a planned work item belongs to.
#[derive(Debug, Clone, PartialEq, Eq, derive_getters::Getters)]
pub struct PlanEntry {
    /// Index into [`CompliancePlan::records`]
    record_index: usize,
    /// Rule identifier
    rule_id: String,
}

/// A validated request expanded into work items.
///
/// `items()[i]` and `entries()[i]` describe the same call.
#[derive(Debug, Clone, derive_getters::Getters)]
pub struct CompliancePlan {
    /// Work items in record-major order
    items: Vec<WorkItem>,
    /// Owner of each work item
    entries: Vec<PlanEntry>,
    /// `(id, market_id)` of every record, in request order
    records: Vec<(String, String)>,
    /// Rule identifiers, in request order
    rule_ids: Vec<String>,
}

impl ComplianceRequest {
    /// Validate the request and render one work item per (record, rule).
    ///
    /// # Errors
    ///
    /// Returns [`MalformedInputError`] if there are no records, a rule is
    /// unknown, a rule is asked for columns it does not allow, or a record
    /// carries columns none of the requested rules allow. Returns a registry
    /// error if a record's market resolves to no handler.
    #[instrument(skip_all, fields(rules = self.rules.len(), records = self.records.len()))]
    pub fn plan(&self, registry: &RuleRegistry) -> SluiceResult<CompliancePlan> {
        if self.records.is_empty() || self.rules.is_empty() {
            Err(MalformedInputError::new(MalformedInputErrorKind::EmptyBatch))?
        }

        let unknown: Vec<String> = self
            .rules
            .iter()
            .filter(|rule| !registry.knows(&rule.rule_id))
            .map(|rule| rule.rule_id.clone())
            .collect();
        if !unknown.is_empty() {
            Err(MalformedInputError::new(MalformedInputErrorKind::InvalidRule {
                requested: unknown,
                valid: registry.rule_ids(),
            }))?
        }

        let mut selected = Vec::with_capacity(self.rules.len());
        let mut permitted = BTreeSet::new();
        for rule in &self.rules {
            let allowed = registry.allowed_columns(&rule.rule_id);
            let rejected: Vec<String> = rule
                .columns
                .iter()
                .filter(|c| !allowed.contains(c))
                .cloned()
                .collect();
            if !rejected.is_empty() {
                Err(MalformedInputError::new(MalformedInputErrorKind::InvalidColumns {
                    rule_id: rule.rule_id.clone(),
                    columns: rejected,
                    allowed: allowed.clone(),
                }))?
            }
            let columns = if rule.columns.is_empty() {
                allowed.clone()
            } else {
                rule.columns.clone()
            };
            permitted.extend(allowed);
            selected.push((rule.rule_id.as_str(), columns));
        }

        for record in &self.records {
            let stray: Vec<String> = record
                .fields
                .keys()
                .filter(|column| !permitted.contains(*column))
                .cloned()
                .collect();
            if !stray.is_empty() {
                Err(MalformedInputError::new(MalformedInputErrorKind::InvalidRecord {
                    record: record.id.clone(),
                    fields: stray,
                }))?
            }
        }

        let mut items = Vec::with_capacity(self.records.len() * selected.len());
        let mut entries = Vec::with_capacity(items.capacity());
        for (record_index, record) in self.records.iter().enumerate() {
            for (rule_id, columns) in &selected {
                let handler = registry.resolve(&record.market_id, rule_id)?;
                let prompt = handler.render(record, columns);
                items.push(WorkItem::new(format!("{}/{}", record.id, rule_id), prompt));
                entries.push(PlanEntry {
                    record_index,
                    rule_id: rule_id.to_string(),
                });
            }
        }

        debug!(items = items.len(), "Planned compliance batch");
        Ok(CompliancePlan {
            items,
            entries,
            records: self
                .records
                .iter()
                .map(|r| (r.id.clone(), r.market_id.clone()))
                .collect(),
            rule_ids: self.rules.iter().map(|r| r.rule_id.clone()).collect(),
        })
    }
}
