//! Core traits for the export pipeline.
//!
//! - [`DefinitionSource`]: yields definition records for one object category
//! - [`ScriptSink`]: persists transformed scripts
//!
//! The coordinator and worker pool only see these traits, so the pipeline
//! can be driven by the SQL Server source or by in-memory test doubles.

use std::path::Path;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;

use super::{DefinitionRecord, ObjectCategory};

/// Finite, non-restartable stream of definition records.
///
/// An `Err` item is a row that could not be decoded; nothing after it is
/// read for the current category.
pub type DefinitionStream = mpsc::Receiver<Result<DefinitionRecord>>;

/// Read programmable object definitions from a catalog.
#[async_trait]
pub trait DefinitionSource: Send + Sync {
    /// Check that the catalog is reachable.
    ///
    /// Fails with `ExportError::Connectivity`.
    async fn ping(&self) -> Result<()>;

    /// Start streaming the definitions of one category.
    ///
    /// Fails with `ExportError::Connectivity` when no connection can be
    /// acquired and `ExportError::Query` when the query is rejected. Rows
    /// that fail to decode arrive as `Err(ExportError::RowDecode)` items.
    async fn fetch(&self, category: ObjectCategory) -> Result<DefinitionStream>;

    /// Get the database type.
    fn db_type(&self) -> &str;
}

/// Persist transformed scripts.
#[async_trait]
pub trait ScriptSink: Send + Sync {
    /// Make sure the category directory exists.
    async fn prepare_dir(&self, dir: &Path) -> Result<()>;

    /// Create or truncate `path` and write `contents` in full.
    ///
    /// Fails with `ExportError::FileCreate` or `ExportError::FileWrite`.
    async fn write_script(&self, path: &Path, contents: &str) -> Result<()>;

    /// Whether this sink actually touches the filesystem.
    fn is_dry_run(&self) -> bool {
        false
    }
}
