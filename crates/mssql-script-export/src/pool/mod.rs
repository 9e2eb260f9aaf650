//! Bounded worker pool for export units.
//!
//! Every dispatched record becomes one tokio task that transforms the
//! definition and writes it through the [`ScriptSink`]. At most `workers`
//! tasks run at once; [`ExportPool::dispatch`] waits for a free slot, which
//! throttles the record stream instead of spawning one task per row up
//! front. [`ExportPool::join`] is the barrier: it resolves only after every
//! dispatched unit has reported an [`ExportOutcome`].

use std::path::PathBuf;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::core::{DefinitionRecord, ErrorKind, ExportOutcome, ObjectCategory, ScriptSink};
use crate::error::{ExportError, Result};
use crate::transform::ScriptTransformer;

/// Worker pool for one category.
pub struct ExportPool {
    sink: Arc<dyn ScriptSink>,
    transformer: Arc<ScriptTransformer>,
    category: ObjectCategory,
    dir: PathBuf,
    semaphore: Arc<Semaphore>,
    in_flight: FuturesUnordered<BoxFuture<'static, ExportOutcome>>,
    dispatched: usize,
}

impl ExportPool {
    /// Create a pool writing into `dir` with at most `workers` concurrent units.
    pub fn new(
        sink: Arc<dyn ScriptSink>,
        transformer: Arc<ScriptTransformer>,
        category: ObjectCategory,
        dir: PathBuf,
        workers: usize,
    ) -> Self {
        Self {
            sink,
            transformer,
            category,
            dir,
            semaphore: Arc::new(Semaphore::new(workers.max(1))),
            in_flight: FuturesUnordered::new(),
            dispatched: 0,
        }
    }

    /// Number of units dispatched so far.
    pub fn dispatched(&self) -> usize {
        self.dispatched
    }

    /// Spawn the unit of work for one record, writing it to `file_name`.
    ///
    /// Waits for a worker slot first. Once spawned the unit always runs to
    /// completion; its outcome is collected by [`join`](Self::join).
    pub async fn dispatch(&mut self, record: DefinitionRecord, file_name: String) -> Result<()> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ExportError::Cancelled)?;

        let sink = self.sink.clone();
        let transformer = self.transformer.clone();
        let category = self.category;
        let path = self.dir.join(&file_name);
        let object = record.full_name();

        let handle = tokio::spawn({
            let file_name = file_name.clone();
            async move {
                let _permit = permit;
                run_unit(sink, transformer, category, path, file_name, record).await
            }
        });

        let unit = handle.map(move |joined| match joined {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Export unit for {} panicked: {}", object, e);
                ExportOutcome::failed(file_name, object, ErrorKind::Panicked, e.to_string())
            }
        });

        self.in_flight.push(unit.boxed());
        self.dispatched += 1;
        Ok(())
    }

    /// Wait for every dispatched unit and return the outcomes in completion order.
    pub async fn join(mut self) -> Vec<ExportOutcome> {
        let mut outcomes = Vec::with_capacity(self.dispatched);
        while let Some(outcome) = self.in_flight.next().await {
            outcomes.push(outcome);
        }
        debug!(
            "{}: all {} export units finished",
            self.category, self.dispatched
        );
        outcomes
    }
}

/// Transform one definition and write it out.
async fn run_unit(
    sink: Arc<dyn ScriptSink>,
    transformer: Arc<ScriptTransformer>,
    category: ObjectCategory,
    path: PathBuf,
    file_name: String,
    record: DefinitionRecord,
) -> ExportOutcome {
    let object = record.full_name();
    if !transformer.needs_rewrite(&record.definition, category) {
        debug!("{}: no CREATE {} clause to rewrite", object, category.keyword());
    }
    let script = transformer.transform(&record.definition, category);

    match sink.write_script(&path, &script).await {
        Ok(()) => {
            debug!("File {} created successfully", file_name);
            ExportOutcome::succeeded(file_name, object)
        }
        Err(e) => {
            warn!("{}: {}", object, e);
            let kind = match e {
                ExportError::FileCreate { .. } => ErrorKind::FileCreate,
                _ => ErrorKind::FileWrite,
            };
            ExportOutcome::failed(file_name, object, kind, e.to_string())
        }
    }
}
