//! Batch-fatal input validation errors.

/// Conditions that make a batch unusable before any work starts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum MalformedInputErrorKind {
    /// The batch contains no work items
    #[display("Batch contains no work items")]
    EmptyBatch,
    /// A work item cannot be costed or sent
    #[display("Work item {} is unusable: {}", index, reason)]
    InvalidItem {
        /// Position of the item in the batch
        index: usize,
        /// Why the item was rejected
        reason: String,
    },
    /// A requested rule identifier is not registered
    #[display("Invalid rule IDs: {:?}. Valid rules are: {:?}", requested, valid)]
    InvalidRule {
        /// Rule identifiers that were not recognised
        requested: Vec<String>,
        /// Rule identifiers that are registered
        valid: Vec<String>,
    },
    /// A rule was asked to check columns it does not support
    #[display("Invalid CheckColumns for rule '{}': {:?}. Valid columns are: {:?}", rule_id, columns, allowed)]
    InvalidColumns {
        /// Rule identifier
        rule_id: String,
        /// Columns that were rejected
        columns: Vec<String>,
        /// Columns the rule accepts
        allowed: Vec<String>,
    },
    /// A record carries fields no requested rule can use
    #[display("Record '{}' contains invalid fields: {:?}", record, fields)]
    InvalidRecord {
        /// Record identifier
        record: String,
        /// Fields that were rejected
        fields: Vec<String>,
    },
}

/// Malformed input error with location tracking.
///
/// # Examples
///
/// ```
/// use sluice_error::{MalformedInputError, MalformedInputErrorKind};
///
/// let err = MalformedInputError::new(MalformedInputErrorKind::InvalidItem {
///     index: 3,
///     reason: "prompt is empty".to_string(),
/// });
/// assert!(format!("{}", err).contains("Work item 3"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Malformed Input: {} at line {} in {}", kind, line, file)]
pub struct MalformedInputError {
    kind: MalformedInputErrorKind,
    line: u32,
    file: &'static str,
}

impl MalformedInputError {
    /// Create a new malformed input error with caller location tracking.
    #[track_caller]
    pub fn new(kind: MalformedInputErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &MalformedInputErrorKind {
        &self.kind
    }
}
