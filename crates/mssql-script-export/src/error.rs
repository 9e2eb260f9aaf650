//! Error types for the export library.

use crate::core::{BatchResult, ObjectCategory};
use std::path::PathBuf;
use thiserror::Error;

/// Exit code for successful runs.
pub const EXIT_SUCCESS: u8 = 0;
/// Exit code for configuration errors.
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Exit code when the catalog cannot be reached.
pub const EXIT_CONNECTIVITY_ERROR: u8 = 2;
/// Exit code when a category fails (query or row decode).
pub const EXIT_CATEGORY_ERROR: u8 = 3;
/// Exit code when some scripts could not be written.
pub const EXIT_PARTIAL_FAILURE: u8 = 4;
/// Exit code for I/O errors outside of a single unit of work.
pub const EXIT_IO_ERROR: u8 = 7;
/// Exit code after SIGINT / SIGTERM.
pub const EXIT_CANCELLED: u8 = 130;

/// Main error type for export operations.
#[derive(Error, Debug)]
pub enum ExportError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The catalog could not be reached or pinged.
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// Submitting the catalog query failed.
    #[error("Query failed for {category}: {message}")]
    Query {
        category: ObjectCategory,
        message: String,
    },

    /// A fetched row could not be decoded into a definition record.
    #[error("Row decode failed for {category}: {message}")]
    RowDecode {
        category: ObjectCategory,
        message: String,
    },

    /// The target script file could not be created.
    #[error("Failed to create {}: {source}", .path.display())]
    FileCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The transformed script could not be written.
    #[error("Failed to write {}: {source}", .path.display())]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Two catalog objects map to the same file name.
    #[error("File name collision: {file_name} already written by {previous}")]
    Collision { file_name: String, previous: String },

    /// IO error (config file, output directories)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Export was cancelled (SIGINT, etc.)
    #[error("Export cancelled")]
    Cancelled,
}

impl ExportError {
    /// Create a Query error for a category.
    pub fn query(category: ObjectCategory, message: impl Into<String>) -> Self {
        ExportError::Query {
            category,
            message: message.into(),
        }
    }

    /// Create a RowDecode error for a category.
    pub fn row_decode(category: ObjectCategory, message: impl Into<String>) -> Self {
        ExportError::RowDecode {
            category,
            message: message.into(),
        }
    }

    /// Whether this error must abort the whole run rather than one category.
    pub fn is_run_fatal(&self) -> bool {
        matches!(self, ExportError::Connectivity(_) | ExportError::Cancelled)
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            ExportError::Config(_) | ExportError::Yaml(_) | ExportError::Json(_) => {
                EXIT_CONFIG_ERROR
            }
            ExportError::Connectivity(_) => EXIT_CONNECTIVITY_ERROR,
            ExportError::Query { .. } | ExportError::RowDecode { .. } => EXIT_CATEGORY_ERROR,
            ExportError::FileCreate { .. }
            | ExportError::FileWrite { .. }
            | ExportError::Collision { .. } => EXIT_PARTIAL_FAILURE,
            ExportError::Io(_) => EXIT_IO_ERROR,
            ExportError::Cancelled => EXIT_CANCELLED,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

impl From<tiberius::error::Error> for ExportError {
    fn from(e: tiberius::error::Error) -> Self {
        ExportError::Connectivity(e.to_string())
    }
}

/// A category-level failure.
///
/// When the failure happened after records were dispatched, `partial` holds
/// the outcomes of the units that ran to completion before the category was
/// marked failed.
#[derive(Error, Debug)]
#[error("{category} export failed: {error}")]
pub struct CategoryError {
    pub category: ObjectCategory,
    #[source]
    pub error: ExportError,
    pub partial: Option<BatchResult>,
}

impl CategoryError {
    pub fn new(category: ObjectCategory, error: ExportError) -> Self {
        Self {
            category,
            error,
            partial: None,
        }
    }

    pub fn with_partial(mut self, partial: BatchResult) -> Self {
        self.partial = Some(partial);
        self
    }
}

/// Result type alias for export operations.
pub type Result<T> = std::result::Result<T, ExportError>;
