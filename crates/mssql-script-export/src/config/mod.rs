//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
use sha2::{Digest, Sha256};
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML file and replace its source with an ADO.NET connection string.
    ///
    /// The file's own source section may be incomplete.
    pub fn load_with_connection_string<P: AsRef<Path>>(
        path: P,
        connection_string: &str,
    ) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&content)?;
        config.source.connection_string = Some(connection_string.to_string());
        config.validate()?;
        Ok(config)
    }

    /// Build a configuration from an ADO.NET connection string alone.
    ///
    /// Export settings take their defaults.
    pub fn from_connection_string(connection_string: &str) -> Result<Self> {
        let config = Config {
            source: SourceConfig::from_connection_string(connection_string),
            export: ExportConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Compute a SHA256 hash of the configuration, recorded in run summaries.
    pub fn hash(&self) -> String {
        let yaml = serde_yaml::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(yaml.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

impl SourceConfig {
    /// Source configuration backed by a raw connection string.
    pub fn from_connection_string(connection_string: &str) -> Self {
        Self {
            host: String::new(),
            port: 1433,
            database: String::new(),
            user: String::new(),
            password: String::new(),
            encrypt: "true".to_string(),
            trust_server_cert: false,
            connection_string: Some(connection_string.to_string()),
            max_connections: 4,
        }
    }

    /// Host/database label safe to log.
    pub fn display_target(&self) -> String {
        if self.connection_string.is_some() && self.host.is_empty() {
            "<connection string>".to_string()
        } else {
            format!("{}:{}/{}", self.host, self.port, self.database)
        }
    }
}
