//! Scan result store
//!
//! Completed scan jobs write their reports into a SQL database; the operator
//! only ever reads the scanned image identifiers back. The backend (postgres,
//! mysql or sqlite) is picked from [`DatabaseConfig`].

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use crate::config::{DatabaseConfig, DatabaseType};
use crate::{Error, Result};

const MAX_CONNECTIONS: u32 = 5;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

const SELECT_SCANNED: &str = "SELECT image_id FROM scan_results";

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS scan_results (
    image_id VARCHAR(512) NOT NULL PRIMARY KEY,
    report TEXT
)
"#;

/// A record asserting that an image identifier has been scanned
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanResult {
    pub image_id: String,
}

/// Queryable store of scanned image identifiers
pub trait ScanResultSource {
    /// List every known scan result
    fn list_scan_results(&self) -> impl Future<Output = Result<Vec<ScanResult>>> + Send;
}

/// Collect scan results into the set of scanned image identifiers
pub fn scanned_set(results: Vec<ScanResult>) -> HashSet<String> {
    results.into_iter().map(|r| r.image_id).collect()
}

/// Connection pool for one of the supported backends
#[derive(Clone, Debug)]
pub enum ScanResultPool {
    Postgres(PgPool),
    MySql(MySqlPool),
    Sqlite(SqlitePool),
}

impl From<PgPool> for ScanResultPool {
    fn from(pool: PgPool) -> Self {
        ScanResultPool::Postgres(pool)
    }
}

impl From<MySqlPool> for ScanResultPool {
    fn from(pool: MySqlPool) -> Self {
        ScanResultPool::MySql(pool)
    }
}

impl From<SqlitePool> for ScanResultPool {
    fn from(pool: SqlitePool) -> Self {
        ScanResultPool::Sqlite(pool)
    }
}

/// Scan result source backed by the scan result database
#[derive(Clone, Debug)]
pub struct DatabaseScanResultSource {
    pool: ScanResultPool,
}

impl DatabaseScanResultSource {
    /// Connect to the configured backend and ensure the results table exists
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = match config.database_type {
            DatabaseType::Postgres => PgPoolOptions::new()
                .max_connections(MAX_CONNECTIONS)
                .acquire_timeout(ACQUIRE_TIMEOUT)
                .connect(&config.dsn)
                .await
                .map(ScanResultPool::from),
            DatabaseType::MySql => MySqlPoolOptions::new()
                .max_connections(MAX_CONNECTIONS)
                .acquire_timeout(ACQUIRE_TIMEOUT)
                .connect(&config.dsn)
                .await
                .map(ScanResultPool::from),
            DatabaseType::Sqlite => SqlitePoolOptions::new()
                .max_connections(MAX_CONNECTIONS)
                .acquire_timeout(ACQUIRE_TIMEOUT)
                .connect(&config.dsn)
                .await
                .map(ScanResultPool::from),
        }
        .map_err(|e| {
            Error::ScanResultError(format!(
                "Failed to connect to {} database: {}",
                config.database_type, e
            ))
        })?;

        info!("Connected to {} scan result database", config.database_type);

        Self::from_pool(pool).await
    }

    /// Wrap an existing pool and ensure the results table exists
    pub async fn from_pool(pool: impl Into<ScanResultPool>) -> Result<Self> {
        let source = Self { pool: pool.into() };
        source.init_schema().await?;
        Ok(source)
    }

    async fn init_schema(&self) -> Result<()> {
        match &self.pool {
            ScanResultPool::Postgres(pool) => {
                sqlx::query(CREATE_TABLE).execute(pool).await.map(|_| ())
            }
            ScanResultPool::MySql(pool) => {
                sqlx::query(CREATE_TABLE).execute(pool).await.map(|_| ())
            }
            ScanResultPool::Sqlite(pool) => {
                sqlx::query(CREATE_TABLE).execute(pool).await.map(|_| ())
            }
        }
        .map_err(|e| Error::ScanResultError(format!("Failed to migrate scan_results: {}", e)))
    }
}

impl ScanResultSource for DatabaseScanResultSource {
    async fn list_scan_results(&self) -> Result<Vec<ScanResult>> {
        let image_ids = match &self.pool {
            ScanResultPool::Postgres(pool) => {
                sqlx::query_scalar::<_, String>(SELECT_SCANNED)
                    .fetch_all(pool)
                    .await
            }
            ScanResultPool::MySql(pool) => {
                sqlx::query_scalar::<_, String>(SELECT_SCANNED)
                    .fetch_all(pool)
                    .await
            }
            ScanResultPool::Sqlite(pool) => {
                sqlx::query_scalar::<_, String>(SELECT_SCANNED)
                    .fetch_all(pool)
                    .await
            }
        }
        .map_err(|e| Error::ScanResultError(format!("Failed to query scan results: {}", e)))?;

        debug!("Loaded {} scan results", image_ids.len());

        Ok(image_ids
            .into_iter()
            .map(|image_id| ScanResult { image_id })
            .collect())
    }
}
