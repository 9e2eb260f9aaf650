//! Batch coordinator - drives one object category end-to-end.
//!
//! ```text
//! Idle -> Querying -> Dispatching -> Awaiting -> Aggregating -> Done
//!            |                           |
//!            +---------------------------+--> Failed
//! ```
//!
//! A query failure, or a category directory that cannot be created, moves
//! straight from `Querying` to `Failed`. A row that cannot be decoded
//! stops dispatching, but every unit already handed to the pool is awaited
//! before the category is reported as failed, so files written for earlier
//! rows are complete.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::config::{CollisionPolicy, ExportConfig};
use crate::core::{
    BatchResult, DefinitionSource, ErrorKind, ExportOutcome, ObjectCategory, ScriptSink,
};
use crate::error::{CategoryError, ExportError, Result};
use crate::naming::FileNamingPolicy;
use crate::pool::ExportPool;
use crate::transform::ScriptTransformer;

/// Lifecycle of one category run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Idle,
    Querying,
    Dispatching,
    Awaiting,
    Aggregating,
    Done,
    Failed,
}

impl BatchState {
    /// Whether `next` is a legal successor of this state.
    pub fn can_advance_to(self, next: BatchState) -> bool {
        use BatchState::*;
        matches!(
            (self, next),
            (Idle, Querying)
                | (Querying, Dispatching)
                | (Querying, Failed)
                | (Dispatching, Awaiting)
                | (Awaiting, Aggregating)
                | (Awaiting, Failed)
                | (Aggregating, Done)
                | (Aggregating, Failed)
        )
    }
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

struct StateTracker {
    category: ObjectCategory,
    state: BatchState,
}

impl StateTracker {
    fn new(category: ObjectCategory) -> Self {
        Self {
            category,
            state: BatchState::Idle,
        }
    }

    fn advance(&mut self, next: BatchState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        debug!("{}: {} -> {}", self.category, self.state, next);
        self.state = next;
    }
}

/// Runs categories against a definition source and a script sink.
pub struct BatchCoordinator {
    source: Arc<dyn DefinitionSource>,
    sink: Arc<dyn ScriptSink>,
    transformer: Arc<ScriptTransformer>,
    naming: FileNamingPolicy,
    export: ExportConfig,
}

impl BatchCoordinator {
    /// Create a coordinator.
    pub fn new(
        source: Arc<dyn DefinitionSource>,
        sink: Arc<dyn ScriptSink>,
        export: ExportConfig,
    ) -> Result<Self> {
        let naming = FileNamingPolicy::new(export.default_schema.clone(), export.sanitize_filenames)
            .with_case_insensitive(export.case_insensitive_names);
        Ok(Self {
            source,
            sink,
            transformer: Arc::new(ScriptTransformer::new()?),
            naming,
            export,
        })
    }

    /// Export every object of one category.
    pub async fn run_category(
        &self,
        category: ObjectCategory,
    ) -> std::result::Result<BatchResult, CategoryError> {
        let started = Instant::now();
        let mut state = StateTracker::new(category);
        let dir = self.export.category_dir(category);

        info!("{}: exporting to {}", category, dir.display());

        state.advance(BatchState::Querying);
        let mut stream = match self.source.fetch(category).await {
            Ok(stream) => stream,
            Err(e) => {
                state.advance(BatchState::Failed);
                error!("{}: {}", category, e);
                return Err(CategoryError::new(category, e));
            }
        };

        if let Err(e) = self.sink.prepare_dir(&dir).await {
            state.advance(BatchState::Failed);
            error!("{}: cannot prepare {}: {}", category, dir.display(), e);
            return Err(CategoryError::new(category, e));
        }

        state.advance(BatchState::Dispatching);
        let mut pool = ExportPool::new(
            self.sink.clone(),
            self.transformer.clone(),
            category,
            dir,
            self.export.get_workers(),
        );
        let mut result = BatchResult::new(category);
        let mut claimed: HashMap<String, String> = HashMap::new();
        let mut fatal: Option<ExportError> = None;

        while let Some(item) = stream.recv().await {
            let record = match item {
                Ok(record) => record,
                Err(e) => {
                    error!(
                        "{}: stopping after {} dispatched records: {}",
                        category,
                        pool.dispatched(),
                        e
                    );
                    fatal = Some(e);
                    break;
                }
            };

            let file_name = self.naming.file_name(&record);
            let key = self.naming.collision_key(&file_name);
            match claimed.get(&key) {
                Some(previous) => match self.export.on_collision {
                    CollisionPolicy::Error => {
                        let err = ExportError::Collision {
                            file_name: file_name.clone(),
                            previous: previous.clone(),
                        };
                        warn!("{}: {} skipped: {}", category, record.full_name(), err);
                        result.record(ExportOutcome::failed(
                            file_name,
                            record.full_name(),
                            ErrorKind::Collision,
                            err.to_string(),
                        ));
                        continue;
                    }
                    CollisionPolicy::Overwrite => {
                        warn!(
                            "{}: {} overwrites {} written by {}",
                            category,
                            record.full_name(),
                            file_name,
                            previous
                        );
                    }
                },
                None => {
                    claimed.insert(key, record.full_name());
                }
            }

            if let Err(e) = pool.dispatch(record, file_name).await {
                fatal = Some(e);
                break;
            }
        }
        // Stop the reader before waiting on in-flight units.
        drop(stream);

        let dispatched = pool.dispatched();
        state.advance(BatchState::Awaiting);
        debug!("{}: waiting for {} export units", category, dispatched);
        let outcomes = pool.join().await;

        if let Some(e) = fatal {
            for outcome in outcomes {
                result.record(outcome);
            }
            result.duration_ms = started.elapsed().as_millis() as u64;
            state.advance(BatchState::Failed);
            warn!(
                "{}: {} of {} dispatched scripts written before failure",
                category, result.success_count, dispatched
            );
            return Err(CategoryError::new(category, e).with_partial(result));
        }

        state.advance(BatchState::Aggregating);
        for outcome in outcomes {
            result.record(outcome);
        }
        result.duration_ms = started.elapsed().as_millis() as u64;
        state.advance(BatchState::Done);

        if result.is_complete_success() {
            info!(
                "{}: wrote {} scripts in {}ms",
                category, result.success_count, result.duration_ms
            );
        } else {
            warn!(
                "{}: wrote {} scripts, {} failed",
                category,
                result.success_count,
                result.failures.len()
            );
        }

        Ok(result)
    }
}
