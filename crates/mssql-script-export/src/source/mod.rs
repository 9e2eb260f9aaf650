//! SQL Server definition source.
//!
//! Reads programmable object definitions from `sys.objects` joined with
//! `sys.sql_modules` through a bb8 pool of tiberius clients. The pool is an
//! explicit handle owned by [`MssqlSource`]; every `fetch` checks out its own
//! connection and returns it when the row stream is exhausted.

mod query;

pub use query::{definition_query, SchemaFilter};

use std::time::Duration;

use async_trait::async_trait;
use bb8::{Pool, PooledConnection, RunError};
use futures::StreamExt;
use tiberius::{AuthMethod, Client, Config, EncryptionLevel, Query, Row};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info};

use crate::config::SourceConfig;
use crate::core::{DefinitionRecord, DefinitionSource, DefinitionStream, ObjectCategory};
use crate::error::{ExportError, Result};

/// Connection acquisition timeout from pool (30 seconds).
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Idle connection timeout (5 minutes).
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Rows buffered between the catalog reader task and the coordinator.
const ROW_CHANNEL_CAPACITY: usize = 256;

/// Connection manager for bb8 pool with tiberius.
#[derive(Clone)]
struct TiberiusConnectionManager {
    config: SourceConfig,
}

impl TiberiusConnectionManager {
    fn new(config: SourceConfig) -> Self {
        Self { config }
    }

    fn build_config(&self) -> std::result::Result<Config, tiberius::error::Error> {
        if let Some(ref raw) = self.config.connection_string {
            return Config::from_ado_string(raw);
        }

        let mut config = Config::new();
        config.host(&self.config.host);
        config.port(self.config.port);
        config.database(&self.config.database);
        config.authentication(AuthMethod::sql_server(&self.config.user, &self.config.password));

        // Encryption settings
        match self.config.encrypt.to_lowercase().as_str() {
            "false" | "no" | "0" | "disable" => {
                config.encryption(EncryptionLevel::NotSupported);
            }
            _ => {
                if self.config.trust_server_cert {
                    config.trust_cert();
                }
                config.encryption(EncryptionLevel::Required);
            }
        }

        Ok(config)
    }
}

#[async_trait]
impl bb8::ManageConnection for TiberiusConnectionManager {
    type Connection = Client<Compat<TcpStream>>;
    type Error = tiberius::error::Error;

    async fn connect(&self) -> std::result::Result<Self::Connection, Self::Error> {
        let config = self.build_config()?;
        let tcp = TcpStream::connect(config.get_addr())
            .await
            .map_err(|e| tiberius::error::Error::Io {
                kind: e.kind(),
                message: e.to_string(),
            })?;

        tcp.set_nodelay(true).ok();

        Client::connect(config, tcp.compat_write()).await
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> std::result::Result<(), Self::Error> {
        conn.simple_query("SELECT 1").await?.into_row().await?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

type PooledClient = PooledConnection<'static, TiberiusConnectionManager>;

/// SQL Server catalog reader with connection pooling.
pub struct MssqlSource {
    pool: Pool<TiberiusConnectionManager>,
    filter: SchemaFilter,
}

impl MssqlSource {
    /// Connect to the catalog and verify the connection.
    ///
    /// Any failure here is an `ExportError::Connectivity`.
    pub async fn connect(config: &SourceConfig, filter: SchemaFilter) -> Result<Self> {
        let max_size = config.max_connections.max(1);
        let source = Self::open(config, filter, max_size, true).await?;
        source.ping().await?;

        info!(
            "Connected to MSSQL: {} (pool_size={})",
            config.display_target(),
            max_size
        );

        Ok(source)
    }

    /// Open a single connection without retrying and ping it.
    ///
    /// Used by health checks, which must report an unreachable server
    /// instead of waiting out the pool's retry window.
    pub async fn probe(config: &SourceConfig) -> Result<()> {
        let source = Self::open(config, SchemaFilter::default(), 1, false).await?;
        source.ping().await
    }

    async fn open(
        config: &SourceConfig,
        filter: SchemaFilter,
        max_size: u32,
        retry: bool,
    ) -> Result<Self> {
        let manager = TiberiusConnectionManager::new(config.clone());
        let pool = Pool::builder()
            .max_size(max_size)
            .min_idle(Some(1))
            .connection_timeout(POOL_CONNECTION_TIMEOUT)
            .idle_timeout(Some(POOL_IDLE_TIMEOUT))
            .test_on_check_out(true)
            .retry_connection(retry)
            .build(manager)
            .await
            .map_err(|e| {
                ExportError::Connectivity(format!("Failed to create MSSQL pool: {}", e))
            })?;

        Ok(Self { pool, filter })
    }

    /// Get a pooled connection that can move into a reader task.
    async fn get_client(&self) -> Result<PooledClient> {
        self.pool.get_owned().await.map_err(|e| match e {
            RunError::User(e) => ExportError::Connectivity(e.to_string()),
            RunError::TimedOut => ExportError::Connectivity(
                "Timed out waiting for a catalog connection".to_string(),
            ),
        })
    }
}

#[async_trait]
impl DefinitionSource for MssqlSource {
    async fn ping(&self) -> Result<()> {
        let mut client = self.get_client().await?;
        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| ExportError::Connectivity(e.to_string()))?
            .into_row()
            .await
            .map_err(|e| ExportError::Connectivity(e.to_string()))?;
        Ok(())
    }

    async fn fetch(&self, category: ObjectCategory) -> Result<DefinitionStream> {
        let client = self.get_client().await?;
        let (sql, params) = definition_query(category, &self.filter);
        debug!("{}: catalog query\n{}", category, sql);

        let (ready_tx, ready_rx) = oneshot::channel();
        let (tx, rx) = mpsc::channel(ROW_CHANNEL_CAPACITY);

        tokio::spawn(stream_definitions(client, category, sql, params, ready_tx, tx));

        match ready_rx.await {
            Ok(Ok(())) => Ok(rx),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ExportError::query(
                category,
                "catalog reader stopped before the query was submitted",
            )),
        }
    }

    fn db_type(&self) -> &str {
        "mssql"
    }
}

/// Run the category query and forward decoded rows until the stream ends,
/// the receiver goes away, or a row fails to decode.
async fn stream_definitions(
    mut client: PooledClient,
    category: ObjectCategory,
    sql: String,
    params: Vec<String>,
    ready: oneshot::Sender<Result<()>>,
    tx: mpsc::Sender<Result<DefinitionRecord>>,
) {
    let mut query = Query::new(sql);
    for param in &params {
        query.bind(param.as_str());
    }

    let stream = match query.query(&mut *client).await {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(ExportError::query(category, e.to_string())));
            return;
        }
    };
    let _ = ready.send(Ok(()));

    let mut rows = stream.into_row_stream();
    let mut read = 0usize;
    while let Some(item) = rows.next().await {
        let record = item
            .map_err(|e| ExportError::row_decode(category, e.to_string()))
            .and_then(|row| decode_row(&row, category));
        let fatal = record.is_err();

        if tx.send(record).await.is_err() {
            debug!("{}: record receiver dropped after {} rows", category, read);
            return;
        }
        if fatal {
            return;
        }
        read += 1;
    }
    debug!("{}: catalog stream exhausted after {} rows", category, read);
}

/// Decode `(schema, name, definition)` from one catalog row.
fn decode_row(row: &Row, category: ObjectCategory) -> Result<DefinitionRecord> {
    let schema = string_column(row, 0, "schema", category)?;
    let name = string_column(row, 1, "name", category)?;
    let definition = row
        .try_get::<&str, _>(2)
        .map_err(|e| ExportError::row_decode(category, format!("{}.{}: {}", schema, name, e)))?
        .ok_or_else(|| {
            ExportError::row_decode(
                category,
                format!("{}.{}: definition is NULL (encrypted module?)", schema, name),
            )
        })?;

    Ok(DefinitionRecord::new(schema, name, definition))
}

fn string_column(
    row: &Row,
    idx: usize,
    column: &str,
    category: ObjectCategory,
) -> Result<String> {
    row.try_get::<&str, _>(idx)
        .map_err(|e| ExportError::row_decode(category, format!("column {}: {}", column, e)))?
        .map(str::to_string)
        .ok_or_else(|| ExportError::row_decode(category, format!("column {} is NULL", column)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields_config() -> SourceConfig {
        SourceConfig {
            host: "sqlhost".to_string(),
            port: 1444,
            database: "AppDb".to_string(),
            user: "sa".to_string(),
            password: "p;w=d".to_string(),
            encrypt: "false".to_string(),
            trust_server_cert: false,
            connection_string: None,
            max_connections: 2,
        }
    }

    #[test]
    fn test_build_config_from_fields() {
        let manager = TiberiusConnectionManager::new(fields_config());
        let config = manager.build_config().unwrap();
        assert_eq!(config.get_addr(), "sqlhost:1444");
    }

    #[tokio::test]
    async fn test_probe_reports_unreachable_server() {
        let mut source = fields_config();
        source.host = "127.0.0.1".to_string();
        source.port = 1;

        let err = MssqlSource::probe(&source).await.unwrap_err();
        assert!(matches!(err, ExportError::Connectivity(_)));
    }

    #[test]
    fn test_connection_string_takes_precedence() {
        let mut source = fields_config();
        source.connection_string = Some("Server=tcp:other,1433;Database=x".to_string());
        let config = TiberiusConnectionManager::new(source).build_config().unwrap();
        assert_eq!(config.get_addr(), "other:1433");
    }
}
