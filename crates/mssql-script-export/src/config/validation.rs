//! Configuration validation.

use super::Config;
use crate::error::{ExportError, Result};
use std::collections::HashSet;
use std::path::Path;

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Source validation: a raw connection string replaces the individual fields
    if config.source.connection_string.is_none() {
        if config.source.host.is_empty() {
            return Err(ExportError::Config("source.host is required".into()));
        }
        if config.source.database.is_empty() {
            return Err(ExportError::Config("source.database is required".into()));
        }
        if config.source.user.is_empty() {
            return Err(ExportError::Config("source.user is required".into()));
        }
    } else if config
        .source
        .connection_string
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .is_empty()
    {
        return Err(ExportError::Config(
            "source.connection_string cannot be empty".into(),
        ));
    }
    if config.source.max_connections == 0 {
        return Err(ExportError::Config(
            "source.max_connections must be at least 1".into(),
        ));
    }

    // Export validation
    if let Some(0) = config.export.workers {
        return Err(ExportError::Config("export.workers must be at least 1".into()));
    }
    if config.export.categories.is_empty() {
        return Err(ExportError::Config(
            "export.categories must list at least one category".into(),
        ));
    }
    let mut seen = HashSet::new();
    for category in &config.export.categories {
        if !seen.insert(category) {
            return Err(ExportError::Config(format!(
                "export.categories lists '{}' more than once",
                category
            )));
        }
    }
    for (category, dir) in &config.export.directories {
        if dir.trim().is_empty() {
            return Err(ExportError::Config(format!(
                "export.directories.{} cannot be empty",
                category
            )));
        }
        if Path::new(dir).is_absolute() {
            return Err(ExportError::Config(format!(
                "export.directories.{} must be relative to export.output_dir, got '{}'",
                category, dir
            )));
        }
    }
    if config.export.default_schema.is_empty() {
        return Err(ExportError::Config(
            "export.default_schema cannot be empty".into(),
        ));
    }

    Ok(())
}
