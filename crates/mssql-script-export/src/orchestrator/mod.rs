//! Export orchestrator - runs every configured category and builds the run summary.

use crate::config::Config;
use crate::coordinator::BatchCoordinator;
use crate::core::{BatchResult, DefinitionSource, ExportOutcome, ObjectCategory, ScriptSink};
use crate::error::{
    CategoryError, ExportError, Result, EXIT_CANCELLED, EXIT_CATEGORY_ERROR, EXIT_PARTIAL_FAILURE,
    EXIT_SUCCESS,
};
use crate::sink::{DryRunSink, FsSink};
use crate::source::{MssqlSource, SchemaFilter};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Export orchestrator.
pub struct Orchestrator {
    config: Config,
    source: Arc<dyn DefinitionSource>,
    sink: Arc<dyn ScriptSink>,
}

/// Final state of one category in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryStatus {
    /// Every record was accounted for (individual files may still have failed).
    Completed,
    /// The query or the row stream failed.
    Failed,
    /// Not attempted because the run was cancelled.
    Skipped,
}

/// Per-category section of the run summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryReport {
    pub category: ObjectCategory,
    pub status: CategoryStatus,
    /// Scripts written successfully.
    pub exported: usize,
    /// Records whose script could not be written.
    pub failed: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<ExportOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl CategoryReport {
    fn completed(result: BatchResult) -> Self {
        Self {
            category: result.category,
            status: CategoryStatus::Completed,
            exported: result.success_count,
            failed: result.failures.len(),
            failures: result.failures,
            error: None,
            duration_ms: result.duration_ms,
        }
    }

    fn failed(err: CategoryError) -> Self {
        let error = Some(err.error.to_string());
        match err.partial {
            Some(partial) => Self {
                status: CategoryStatus::Failed,
                error,
                ..Self::completed(partial)
            },
            None => Self {
                category: err.category,
                status: CategoryStatus::Failed,
                exported: 0,
                failed: 0,
                failures: Vec::new(),
                error,
                duration_ms: 0,
            },
        }
    }

    fn skipped(category: ObjectCategory) -> Self {
        Self {
            category,
            status: CategoryStatus::Skipped,
            exported: 0,
            failed: 0,
            failures: Vec::new(),
            error: None,
            duration_ms: 0,
        }
    }
}

/// Result of an export run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSummary {
    /// Unique run identifier.
    pub run_id: String,

    /// Hash of the configuration used for this run.
    pub config_hash: String,

    /// Whether scripts were actually written.
    pub dry_run: bool,

    /// When the export started.
    pub started_at: DateTime<Utc>,

    /// When the export completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Scripts written across all categories.
    pub objects_exported: usize,

    /// Scripts that could not be written across all categories.
    pub objects_failed: usize,

    /// Per-category results, in run order.
    pub categories: Vec<CategoryReport>,
}

impl ExportSummary {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// True when every category completed and every script was written.
    pub fn is_success(&self) -> bool {
        self.objects_failed == 0
            && self
                .categories
                .iter()
                .all(|c| c.status == CategoryStatus::Completed)
    }

    /// Process exit code for this run.
    pub fn exit_code(&self) -> u8 {
        if self
            .categories
            .iter()
            .any(|c| c.status == CategoryStatus::Skipped)
        {
            EXIT_CANCELLED
        } else if self
            .categories
            .iter()
            .any(|c| c.status == CategoryStatus::Failed)
        {
            EXIT_CATEGORY_ERROR
        } else if self.objects_failed > 0 {
            EXIT_PARTIAL_FAILURE
        } else {
            EXIT_SUCCESS
        }
    }

    pub fn category(&self, category: ObjectCategory) -> Option<&CategoryReport> {
        self.categories.iter().find(|c| c.category == category)
    }
}

/// Result of a catalog health check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub db_type: String,
    pub connected: bool,
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Orchestrator {
    /// Connect to the catalog described by `config` and write to the filesystem.
    pub async fn new(config: Config) -> Result<Self> {
        let filter = SchemaFilter::new(
            config.export.include_schemas.clone(),
            config.export.exclude_schemas.clone(),
        );
        let source = MssqlSource::connect(&config.source, filter).await?;
        Ok(Self::from_parts(config, Arc::new(source), Arc::new(FsSink::new())))
    }

    /// Build an orchestrator from an existing source and sink.
    pub fn from_parts(
        config: Config,
        source: Arc<dyn DefinitionSource>,
        sink: Arc<dyn ScriptSink>,
    ) -> Self {
        Self {
            config,
            source,
            sink,
        }
    }

    /// Replace the sink with one that writes nothing.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        if dry_run {
            self.sink = Arc::new(DryRunSink);
        }
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run every configured category in order.
    ///
    /// Category failures are recorded in the summary and the next category
    /// is still attempted. A lost catalog connection aborts the run. A
    /// cancelled token stops before the next category starts; units already
    /// dispatched always finish.
    pub async fn run(&self, cancel: CancellationToken) -> Result<ExportSummary> {
        let started_at = Utc::now();
        let timer = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let dry_run = self.sink.is_dry_run();

        info!(
            "Starting export run {}{}",
            run_id,
            if dry_run { " (dry run)" } else { "" }
        );

        let coordinator = BatchCoordinator::new(
            self.source.clone(),
            self.sink.clone(),
            self.config.export.clone(),
        )?;

        let mut reports = Vec::with_capacity(self.config.export.categories.len());
        for &category in &self.config.export.categories {
            if cancel.is_cancelled() {
                warn!("Cancellation requested, skipping {}", category);
                reports.push(CategoryReport::skipped(category));
                continue;
            }

            self.source.ping().await?;

            match coordinator.run_category(category).await {
                Ok(result) => reports.push(CategoryReport::completed(result)),
                Err(err) if err.error.is_run_fatal() => {
                    error!("{}: aborting run: {}", category, err.error);
                    return Err(err.error);
                }
                Err(err) => {
                    error!("{}", err);
                    reports.push(CategoryReport::failed(err));
                }
            }
        }

        let objects_exported = reports.iter().map(|r| r.exported).sum();
        let objects_failed = reports.iter().map(|r| r.failed).sum();
        let summary = ExportSummary {
            run_id,
            config_hash: self.config.hash(),
            dry_run,
            started_at,
            completed_at: Utc::now(),
            duration_seconds: timer.elapsed().as_secs_f64(),
            objects_exported,
            objects_failed,
            categories: reports,
        };

        info!(
            "Export run {} finished: {} exported, {} failed in {:.2}s",
            summary.run_id, summary.objects_exported, summary.objects_failed, summary.duration_seconds
        );

        Ok(summary)
    }

    /// Ping the catalog and report latency.
    pub async fn health_check(&self) -> HealthCheckResult {
        let timer = Instant::now();
        let result = self.source.ping().await;
        HealthCheckResult::new(self.source.db_type(), timer, result)
    }

    /// Connect to the catalog described by `config` and report the outcome.
    ///
    /// Unlike [`Orchestrator::new`] an unreachable server is not an error
    /// here; it is reported as `connected: false`.
    pub async fn check_connection(config: &Config) -> HealthCheckResult {
        let timer = Instant::now();
        let result = MssqlSource::probe(&config.source).await;
        HealthCheckResult::new("mssql", timer, result)
    }
}

impl HealthCheckResult {
    fn new(db_type: &str, started: Instant, result: Result<()>) -> Self {
        Self {
            db_type: db_type.to_string(),
            connected: result.is_ok(),
            latency_ms: started.elapsed().as_millis() as u64,
            error: result.err().map(|e: ExportError| e.to_string()),
        }
    }
}
