//! In-memory sources and sinks for pipeline tests.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::core::{DefinitionRecord, DefinitionSource, DefinitionStream, ObjectCategory, ScriptSink};
use crate::error::{ExportError, Result};
use crate::sink::FsSink;

/// Definition source backed by per-category row lists.
#[derive(Default)]
pub struct MemorySource {
    rows: Mutex<HashMap<ObjectCategory, Vec<Result<DefinitionRecord>>>>,
    failing_queries: HashSet<ObjectCategory>,
    pub offline: AtomicBool,
    pub fetches: AtomicUsize,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(self, category: ObjectCategory, records: Vec<DefinitionRecord>) -> Self {
        self.with_rows(category, records.into_iter().map(Ok).collect())
    }

    pub fn with_rows(self, category: ObjectCategory, rows: Vec<Result<DefinitionRecord>>) -> Self {
        self.rows
            .lock()
            .unwrap()
            .insert(category, rows);
        self
    }

    pub fn with_failing_query(mut self, category: ObjectCategory) -> Self {
        self.failing_queries.insert(category);
        self
    }
}

#[async_trait]
impl DefinitionSource for MemorySource {
    async fn ping(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ExportError::Connectivity("catalog offline".into()));
        }
        Ok(())
    }

    async fn fetch(&self, category: ObjectCategory) -> Result<DefinitionStream> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing_queries.contains(&category) {
            return Err(ExportError::query(category, "invalid object name 'sys.sql_modules'"));
        }

        let rows = self
            .rows
            .lock()
            .unwrap()
            .remove(&category)
            .unwrap_or_default();

        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(async move {
            for row in rows {
                if tx.send(row).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }

    fn db_type(&self) -> &str {
        "memory"
    }
}

/// Filesystem sink that fails writes for selected file names.
pub struct FailingSink {
    inner: FsSink,
    fail_on: HashSet<String>,
}

impl FailingSink {
    pub fn new<I, S>(fail_on: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inner: FsSink::new(),
            fail_on: fail_on.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl ScriptSink for FailingSink {
    async fn prepare_dir(&self, dir: &Path) -> Result<()> {
        self.inner.prepare_dir(dir).await
    }

    async fn write_script(&self, path: &Path, contents: &str) -> Result<()> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.fail_on.contains(&name) {
            return Err(ExportError::FileWrite {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "injected write failure"),
            });
        }
        self.inner.write_script(path, contents).await
    }
}

/// Sink that records the peak number of concurrent writes.
#[derive(Default)]
pub struct GatedSink {
    active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub written: AtomicUsize,
}

#[async_trait]
impl ScriptSink for GatedSink {
    async fn prepare_dir(&self, _dir: &Path) -> Result<()> {
        Ok(())
    }

    async fn write_script(&self, _path: &Path, _contents: &str) -> Result<()> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.written.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Sink that panics when asked to write one particular file.
pub struct PanickingSink {
    target: String,
}

impl PanickingSink {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }
}

#[async_trait]
impl ScriptSink for PanickingSink {
    async fn prepare_dir(&self, _dir: &Path) -> Result<()> {
        Ok(())
    }

    async fn write_script(&self, path: &Path, _contents: &str) -> Result<()> {
        if path.ends_with(&self.target) {
            panic!("sink exploded on {}", self.target);
        }
        Ok(())
    }
}
