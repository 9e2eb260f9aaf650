//! Script sinks.

use std::path::Path;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::core::ScriptSink;
use crate::error::{ExportError, Result};

/// Writes scripts to the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct FsSink;

impl FsSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ScriptSink for FsSink {
    async fn prepare_dir(&self, dir: &Path) -> Result<()> {
        tokio::fs::create_dir_all(dir).await?;
        Ok(())
    }

    async fn write_script(&self, path: &Path, contents: &str) -> Result<()> {
        let mut file = tokio::fs::File::create(path)
            .await
            .map_err(|source| ExportError::FileCreate {
                path: path.to_path_buf(),
                source,
            })?;

        let write = async {
            file.write_all(contents.as_bytes()).await?;
            file.flush().await
        };
        write.await.map_err(|source| ExportError::FileWrite {
            path: path.to_path_buf(),
            source,
        })?;

        debug!("Wrote {} bytes to {}", contents.len(), path.display());
        Ok(())
    }
}

/// Accepts every script without writing anything.
#[derive(Debug, Clone, Default)]
pub struct DryRunSink;

#[async_trait]
impl ScriptSink for DryRunSink {
    async fn prepare_dir(&self, dir: &Path) -> Result<()> {
        debug!("[dry-run] would create {}", dir.display());
        Ok(())
    }

    async fn write_script(&self, path: &Path, contents: &str) -> Result<()> {
        debug!("[dry-run] would write {} bytes to {}", contents.len(), path.display());
        Ok(())
    }

    fn is_dry_run(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_fs_sink_creates_and_truncates() {
        let dir = TempDir::new().unwrap();
        let scripts = dir.path().join("sp_scripts");
        let sink = FsSink::new();
        sink.prepare_dir(&scripts).await.unwrap();

        let path = scripts.join("Foo.sql");
        sink.write_script(&path, "a much longer first version").await.unwrap();
        sink.write_script(&path, "short").await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "short");
    }

    #[tokio::test]
    async fn test_fs_sink_missing_dir_is_create_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("Foo.sql");
        let err = FsSink::new().write_script(&path, "x").await.unwrap_err();
        assert!(matches!(err, ExportError::FileCreate { .. }));
    }

    #[tokio::test]
    async fn test_dry_run_sink_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let scripts = dir.path().join("view_scripts");
        let sink = DryRunSink;
        sink.prepare_dir(&scripts).await.unwrap();
        sink.write_script(&scripts.join("v.sql"), "x").await.unwrap();
        assert!(!scripts.exists());
        assert!(sink.is_dry_run());
    }
}
