//! Records flowing through the export pipeline and their outcomes.

use super::ObjectCategory;
use serde::{Deserialize, Serialize};

/// One catalog row: the source text of a programmable object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionRecord {
    /// Schema name.
    pub schema: String,

    /// Object name.
    pub name: String,

    /// Original creation statement as stored in the catalog.
    pub definition: String,
}

impl DefinitionRecord {
    pub fn new(
        schema: impl Into<String>,
        name: impl Into<String>,
        definition: impl Into<String>,
    ) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            definition: definition.into(),
        }
    }

    /// Get the fully qualified object name.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

/// Why a single unit of work failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The script file could not be created.
    FileCreate,
    /// The script file could not be written.
    FileWrite,
    /// Another object in the batch already claimed the file name.
    Collision,
    /// The unit of work panicked before reporting.
    Panicked,
}

/// Result of exporting one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportOutcome {
    /// Target file name (relative to the category directory).
    pub filename: String,

    /// Fully qualified object name.
    pub object: String,

    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,

    /// Human readable error detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ExportOutcome {
    pub fn succeeded(filename: impl Into<String>, object: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            object: object.into(),
            success: true,
            error: None,
            message: None,
        }
    }

    pub fn failed(
        filename: impl Into<String>,
        object: impl Into<String>,
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            filename: filename.into(),
            object: object.into(),
            success: false,
            error: Some(kind),
            message: Some(message.into()),
        }
    }
}

/// Aggregated result of one category.
///
/// `success_count + failures.len()` equals the number of records fetched
/// for the category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub category: ObjectCategory,
    pub success_count: usize,
    /// Failed units, in completion order.
    pub failures: Vec<ExportOutcome>,
    pub duration_ms: u64,
}

impl BatchResult {
    pub fn new(category: ObjectCategory) -> Self {
        Self {
            category,
            success_count: 0,
            failures: Vec::new(),
            duration_ms: 0,
        }
    }

    /// Fold one unit outcome into the result.
    pub fn record(&mut self, outcome: ExportOutcome) {
        if outcome.success {
            self.success_count += 1;
        } else {
            self.failures.push(outcome);
        }
    }

    /// Total number of records accounted for.
    pub fn total(&self) -> usize {
        self.success_count + self.failures.len()
    }

    pub fn is_complete_success(&self) -> bool {
        self.failures.is_empty()
    }
}
