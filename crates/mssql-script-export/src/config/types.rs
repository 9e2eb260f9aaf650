//! Configuration type definitions with auto-tuning based on system resources.

use crate::core::ObjectCategory;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use sysinfo::System;
use tracing::info;

/// System resource information for auto-tuning.
#[derive(Debug, Clone)]
pub struct SystemResources {
    /// Total RAM in GB.
    pub total_memory_gb: f64,
    /// Number of CPU cores.
    pub cpu_cores: usize,
}

impl SystemResources {
    /// Detect system resources.
    pub fn detect() -> Self {
        let mut sys = System::new_all();
        sys.refresh_all();

        let total_memory_gb = sys.total_memory() as f64 / (1024.0 * 1024.0 * 1024.0);
        let cpu_cores = sys.cpus().len().max(1);

        Self {
            total_memory_gb,
            cpu_cores,
        }
    }

    /// Log detected system resources.
    pub fn log(&self) {
        info!(
            "System resources: {:.1} GB RAM, {} CPU cores",
            self.total_memory_gb, self.cpu_cores
        );
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Catalog connection (SQL Server).
    pub source: SourceConfig,

    /// Export behavior configuration.
    #[serde(default)]
    pub export: ExportConfig,
}

impl Config {
    /// Apply auto-tuned defaults based on system resources.
    /// Only fills in values that weren't explicitly set in the config file.
    pub fn with_auto_tuning(mut self) -> Self {
        let resources = SystemResources::detect();
        resources.log();
        self.export = self.export.with_auto_tuning(&resources);
        self
    }
}

/// Catalog (SQL Server) connection configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Database host.
    #[serde(default)]
    pub host: String,

    /// Database port (default: 1433).
    #[serde(default = "default_mssql_port")]
    pub port: u16,

    /// Database name.
    #[serde(default)]
    pub database: String,

    /// Username.
    #[serde(default)]
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Encrypt connection (default: "true").
    #[serde(default = "default_true_string")]
    pub encrypt: String,

    /// Trust server certificate (default: false).
    #[serde(default)]
    pub trust_server_cert: bool,

    /// ADO.NET style connection string. Overrides the individual fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_string: Option<String>,

    /// Maximum pooled catalog connections (default: 4).
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("encrypt", &self.encrypt)
            .field("trust_server_cert", &self.trust_server_cert)
            .field(
                "connection_string",
                &self.connection_string.as_ref().map(|_| "[REDACTED]"),
            )
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

/// What to do when two objects map to the same script file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Keep the first object, report the second as a failed export.
    #[default]
    Error,

    /// Write both; the last unit to finish wins.
    Overwrite,
}

/// Export behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Root directory for the category directories (default: ".").
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Categories to export, in order (default: procedure, function, view).
    #[serde(default = "default_categories")]
    pub categories: Vec<ObjectCategory>,

    /// Directory name overrides per category.
    #[serde(default)]
    pub directories: BTreeMap<ObjectCategory, String>,

    /// Schema whose objects are written without a schema prefix (default: "dbo").
    #[serde(default = "default_dbo_schema")]
    pub default_schema: String,

    /// Only export these schemas (empty = all).
    #[serde(default)]
    pub include_schemas: Vec<String>,

    /// Skip these schemas.
    #[serde(default)]
    pub exclude_schemas: Vec<String>,

    /// Concurrent export units. Auto-tuned based on CPU cores if not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,

    /// Replace path-unsafe characters in file names (default: true).
    #[serde(default = "default_true")]
    pub sanitize_filenames: bool,

    /// Duplicate file name handling (default: error).
    #[serde(default)]
    pub on_collision: CollisionPolicy,

    /// Treat file names differing only by case as the same file (default: false).
    #[serde(default)]
    pub case_insensitive_names: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            categories: default_categories(),
            directories: BTreeMap::new(),
            default_schema: default_dbo_schema(),
            include_schemas: Vec::new(),
            exclude_schemas: Vec::new(),
            workers: None,
            sanitize_filenames: true,
            on_collision: CollisionPolicy::default(),
            case_insensitive_names: false,
        }
    }
}

impl ExportConfig {
    /// Apply auto-tuned defaults based on system resources.
    /// Only fills in values that are None (not explicitly set).
    pub fn with_auto_tuning(mut self, resources: &SystemResources) -> Self {
        // File writes are I/O bound: two units per core, 4..=64
        if self.workers.is_none() {
            let workers = (resources.cpu_cores * 2).clamp(4, 64);
            self.workers = Some(workers);
        }

        info!("Auto-tuned config: workers={}", self.get_workers());
        self
    }

    pub fn get_workers(&self) -> usize {
        self.workers.unwrap_or(8)
    }

    /// Directory name for a category (override or default).
    pub fn dir_name(&self, category: ObjectCategory) -> &str {
        self.directories
            .get(&category)
            .map(String::as_str)
            .unwrap_or_else(|| category.default_dir())
    }

    /// Full output directory for a category.
    pub fn category_dir(&self, category: ObjectCategory) -> PathBuf {
        self.output_dir.join(self.dir_name(category))
    }
}

// Default value functions for serde
fn default_mssql_port() -> u16 {
    1433
}

fn default_max_connections() -> u32 {
    4
}

fn default_dbo_schema() -> String {
    "dbo".to_string()
}

fn default_true_string() -> String {
    "true".to_string()
}

fn default_true() -> bool {
    true
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_categories() -> Vec<ObjectCategory> {
    ObjectCategory::ALL.to_vec()
}
