//! # mssql-script-export
//!
//! Exports SQL Server stored procedures, functions and views as
//! re-deployable `CREATE OR ALTER` scripts.
//!
//! The library provides:
//!
//! - **Catalog extraction** from `sys.objects` / `sys.sql_modules` over a
//!   pooled tiberius connection
//! - **Idempotent scripts**: every `CREATE <KEYWORD>` clause becomes
//!   `CREATE OR ALTER <KEYWORD>`
//! - **Concurrent export** with a bounded worker pool, one unit of work per
//!   object
//! - **Per-object outcomes**: a failed file never aborts its siblings
//!
//! ## Example
//!
//! ```rust,no_run
//! use mssql_script_export::{Config, Orchestrator};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml")?.with_auto_tuning();
//!     let orchestrator = Orchestrator::new(config).await?;
//!     let summary = orchestrator.run(CancellationToken::new()).await?;
//!     println!("Exported {} objects", summary.objects_exported);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod coordinator;
pub mod core;
pub mod error;
pub mod naming;
pub mod orchestrator;
pub mod pool;
pub mod sink;
pub mod source;
pub mod transform;

#[cfg(test)]
mod testing;

// Re-exports for convenient access
pub use config::{CollisionPolicy, Config, ExportConfig, SourceConfig};
pub use coordinator::{BatchCoordinator, BatchState};
pub use core::{
    BatchResult, DefinitionRecord, DefinitionSource, DefinitionStream, ErrorKind, ExportOutcome,
    ObjectCategory, ScriptSink,
};
pub use error::{CategoryError, ExportError, Result};
pub use naming::FileNamingPolicy;
pub use orchestrator::{CategoryReport, CategoryStatus, ExportSummary, HealthCheckResult, Orchestrator};
pub use pool::ExportPool;
pub use sink::{DryRunSink, FsSink};
pub use source::{MssqlSource, SchemaFilter};
pub use transform::ScriptTransformer;
