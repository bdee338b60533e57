//! # Storage Engine
//!
//! One interface over two interchangeable backends.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Storage Engine                                  │
//! │                                                                         │
//! │  DbConfig ──► Database::connect(config).await                          │
//! │                    │                                                    │
//! │        ┌───────────┴────────────┐                                      │
//! │        ▼                        ▼                                      │
//! │  Database::Embedded       Database::Pooled                             │
//! │  ┌──────────────────┐     ┌──────────────────┐                         │
//! │  │ in-memory SQLite │     │ PgPool (max N)   │                         │
//! │  │ 1 connection     │     │ acquire timeout  │                         │
//! │  │ flush → file     │     │ no flush         │                         │
//! │  └──────────────────┘     └──────────────────┘                         │
//! │                                                                         │
//! │  query_all / query_one / execute / run_transaction / flush / shutdown  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! SQL is written once with `?` placeholders. The pooled backend rewrites
//! them to `$1..$n` before execution.

pub mod embedded;
pub mod pooled;

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use sqlx::postgres::PgRow;
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Postgres, Sqlite, Transaction};
use tracing::{info, warn};

use crate::error::{DbError, DbResult};
use crate::repository::asset::AssetRepository;
use crate::repository::movement::MovementRepository;
use crate::repository::user::UserRepository;
use crate::schema;

pub use embedded::EmbeddedStore;
pub use pooled::PooledStore;

// =============================================================================
// Configuration
// =============================================================================

/// Admin password used when none is configured.
///
/// The server logs a warning whenever the seed falls back to it.
pub const DEFAULT_ADMIN_PASSWORD: &str = "InvenTrack-Admin#2024";

/// Which backend to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// In-process SQLite flushed to one snapshot file.
    Embedded { snapshot_path: PathBuf },
    /// PostgreSQL server behind a bounded pool.
    Pooled { url: String },
}

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::embedded("data/inventrack.db")
///     .flush_interval(Some(Duration::from_secs(30)))
///     .admin_password("s3cret-admin");
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub backend: Backend,

    /// Pool size for the pooled backend. The embedded store always uses one.
    /// Default: 10
    pub max_connections: u32,

    /// How long a caller waits for a free connection.
    /// Default: 10 seconds
    pub acquire_timeout: Duration,

    /// Safety-net flush period for the embedded store; `None` disables it.
    /// Default: 30 seconds
    pub flush_interval: Option<Duration>,

    /// Password of the administrator seeded into an empty user table.
    pub admin_password: String,
}

impl DbConfig {
    fn with_backend(backend: Backend) -> Self {
        DbConfig {
            backend,
            max_connections: 10,
            acquire_timeout: Duration::from_secs(10),
            flush_interval: Some(Duration::from_secs(30)),
            admin_password: DEFAULT_ADMIN_PASSWORD.to_string(),
        }
    }

    /// Embedded snapshot store at `path`. The file is created on first flush.
    pub fn embedded(path: impl Into<PathBuf>) -> Self {
        DbConfig::with_backend(Backend::Embedded {
            snapshot_path: path.into(),
        })
    }

    /// Pooled store connecting to a PostgreSQL URL.
    pub fn pooled(url: impl Into<String>) -> Self {
        DbConfig::with_backend(Backend::Pooled { url: url.into() })
    }

    /// Sets the maximum number of pooled connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the connection acquire timeout.
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Sets (or disables) the periodic flush.
    pub fn flush_interval(mut self, interval: Option<Duration>) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Sets the seeded administrator password.
    pub fn admin_password(mut self, password: impl Into<String>) -> Self {
        self.admin_password = password.into();
        self
    }
}

// =============================================================================
// Parameters and rows
// =============================================================================

/// A positional query parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    OptText(Option<String>),
    Int(i64),
    Timestamp(DateTime<Utc>),
}

impl From<&str> for SqlParam {
    fn from(value: &str) -> Self {
        SqlParam::Text(value.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(value: String) -> Self {
        SqlParam::Text(value)
    }
}

impl From<&String> for SqlParam {
    fn from(value: &String) -> Self {
        SqlParam::Text(value.clone())
    }
}

impl From<Option<String>> for SqlParam {
    fn from(value: Option<String>) -> Self {
        SqlParam::OptText(value)
    }
}

impl From<i64> for SqlParam {
    fn from(value: i64) -> Self {
        SqlParam::Int(value)
    }
}

impl From<DateTime<Utc>> for SqlParam {
    fn from(value: DateTime<Utc>) -> Self {
        SqlParam::Timestamp(value)
    }
}

/// Builds a `Vec<SqlParam>` from heterogeneous values.
///
/// ```rust,ignore
/// db.query_one::<Asset>("SELECT ... WHERE sku = ? AND quantity >= ?", params![sku, 3_i64])
/// ```
#[macro_export]
macro_rules! params {
    () => { ::std::vec::Vec::<$crate::engine::SqlParam>::new() };
    ($($value:expr),+ $(,)?) => {
        vec![$($crate::engine::SqlParam::from($value)),+]
    };
}

/// Binds every parameter onto a sqlx query, in order.
macro_rules! bind_params {
    ($query:expr, $params:expr) => {{
        let mut query = $query;
        for param in $params {
            query = match param {
                $crate::engine::SqlParam::Text(v) => query.bind(v),
                $crate::engine::SqlParam::OptText(v) => query.bind(v),
                $crate::engine::SqlParam::Int(v) => query.bind(v),
                $crate::engine::SqlParam::Timestamp(v) => query.bind(v),
            };
        }
        query
    }};
}
pub(crate) use bind_params;

/// A row type that decodes from both backends.
pub trait Record:
    for<'r> FromRow<'r, SqliteRow> + for<'r> FromRow<'r, PgRow> + Send + Unpin
{
}

impl<T> Record for T where
    T: for<'r> FromRow<'r, SqliteRow> + for<'r> FromRow<'r, PgRow> + Send + Unpin
{
}

// =============================================================================
// Transactions
// =============================================================================

enum TxInner {
    Embedded(Transaction<'static, Sqlite>),
    Pooled(Transaction<'static, Postgres>),
}

/// The single connection a transaction body runs against.
///
/// Only reachable inside [`Database::run_transaction`]; every statement
/// issued through it commits or rolls back together.
pub struct TxHandle {
    inner: TxInner,
}

impl TxHandle {
    pub async fn query_all<T: Record>(
        &mut self,
        sql: &str,
        params: Vec<SqlParam>,
    ) -> DbResult<Vec<T>> {
        match &mut self.inner {
            TxInner::Embedded(tx) => {
                let rows = bind_params!(sqlx::query_as::<_, T>(sql), params)
                    .fetch_all(&mut **tx)
                    .await?;
                Ok(rows)
            }
            TxInner::Pooled(tx) => {
                let sql = pooled::to_postgres(sql);
                let rows = bind_params!(sqlx::query_as::<_, T>(&sql), params)
                    .fetch_all(&mut **tx)
                    .await?;
                Ok(rows)
            }
        }
    }

    pub async fn query_one<T: Record>(
        &mut self,
        sql: &str,
        params: Vec<SqlParam>,
    ) -> DbResult<Option<T>> {
        match &mut self.inner {
            TxInner::Embedded(tx) => {
                let row = bind_params!(sqlx::query_as::<_, T>(sql), params)
                    .fetch_optional(&mut **tx)
                    .await?;
                Ok(row)
            }
            TxInner::Pooled(tx) => {
                let sql = pooled::to_postgres(sql);
                let row = bind_params!(sqlx::query_as::<_, T>(&sql), params)
                    .fetch_optional(&mut **tx)
                    .await?;
                Ok(row)
            }
        }
    }

    /// Executes one statement and returns the affected row count.
    pub async fn execute(&mut self, sql: &str, params: Vec<SqlParam>) -> DbResult<u64> {
        let affected = match &mut self.inner {
            TxInner::Embedded(tx) => bind_params!(sqlx::query(sql), params)
                .execute(&mut **tx)
                .await?
                .rows_affected(),
            TxInner::Pooled(tx) => {
                let sql = pooled::to_postgres(sql);
                bind_params!(sqlx::query(&sql), params)
                    .execute(&mut **tx)
                    .await?
                    .rows_affected()
            }
        };
        Ok(affected)
    }

    async fn commit(self) -> DbResult<()> {
        match self.inner {
            TxInner::Embedded(tx) => tx.commit().await?,
            TxInner::Pooled(tx) => tx.commit().await?,
        }
        Ok(())
    }

    async fn rollback(self) -> DbResult<()> {
        match self.inner {
            TxInner::Embedded(tx) => tx.rollback().await?,
            TxInner::Pooled(tx) => tx.rollback().await?,
        }
        Ok(())
    }
}

// =============================================================================
// Database
// =============================================================================

/// Storage engine handle, shared by cloning.
///
/// ## Usage
/// ```rust,ignore
/// let db = Database::connect(DbConfig::embedded("data/inventrack.db")).await?;
///
/// let assets = db.assets().list(&AssetFilter::default()).await?;
///
/// db.shutdown().await?;
/// ```
#[derive(Debug, Clone)]
pub enum Database {
    Embedded(EmbeddedStore),
    Pooled(PooledStore),
}

impl Database {
    /// Opens the configured backend, creates the schema if absent and seeds
    /// the default administrator when the user table is empty.
    pub async fn connect(config: DbConfig) -> DbResult<Self> {
        let db = match &config.backend {
            Backend::Embedded { snapshot_path } => {
                info!(path = %snapshot_path.display(), "Opening embedded snapshot store");
                Database::Embedded(EmbeddedStore::open(snapshot_path, &config).await?)
            }
            Backend::Pooled { .. } => {
                info!(
                    max_connections = config.max_connections,
                    "Opening pooled PostgreSQL store"
                );
                Database::Pooled(PooledStore::connect(&config).await?)
            }
        };

        if config.admin_password == DEFAULT_ADMIN_PASSWORD {
            warn!("Using the built-in default admin password; set ADMIN_PASSWORD");
        }
        schema::seed_default_admin(&db, &config.admin_password).await?;

        if let Database::Embedded(store) = &db {
            store.start_flusher(config.flush_interval);
        }

        Ok(db)
    }

    /// Fetches every matching row.
    pub async fn query_all<T: Record>(&self, sql: &str, params: Vec<SqlParam>) -> DbResult<Vec<T>> {
        match self {
            Database::Embedded(store) => store.query_all(sql, params).await,
            Database::Pooled(store) => store.query_all(sql, params).await,
        }
    }

    /// Fetches the first matching row, if any.
    pub async fn query_one<T: Record>(
        &self,
        sql: &str,
        params: Vec<SqlParam>,
    ) -> DbResult<Option<T>> {
        match self {
            Database::Embedded(store) => store.query_one(sql, params).await,
            Database::Pooled(store) => store.query_one(sql, params).await,
        }
    }

    /// Executes one mutation and returns the affected row count.
    ///
    /// The embedded store has flushed the snapshot file when this returns.
    pub async fn execute(&self, sql: &str, params: Vec<SqlParam>) -> DbResult<u64> {
        match self {
            Database::Embedded(store) => store.execute(sql, params).await,
            Database::Pooled(store) => store.execute(sql, params).await,
        }
    }

    async fn begin(&self) -> DbResult<TxHandle> {
        let inner = match self {
            Database::Embedded(store) => TxInner::Embedded(store.begin().await?),
            Database::Pooled(store) => TxInner::Pooled(store.begin().await?),
        };
        Ok(TxHandle { inner })
    }

    /// Runs `body` on one connection inside BEGIN/COMMIT.
    ///
    /// Any error returned by `body` rolls back and is handed back unchanged.
    /// The body runs on a spawned task: dropping the returned future does
    /// not abandon the transaction, it still commits or rolls back. The
    /// embedded store flushes exactly once, after commit.
    ///
    /// ```rust,ignore
    /// let moved = db
    ///     .run_transaction(move |tx| {
    ///         Box::pin(async move {
    ///             tx.execute("UPDATE assets SET quantity = ? WHERE id = ?", params![5_i64, id]).await?;
    ///             Ok::<_, DbError>(())
    ///         })
    ///     })
    ///     .await?;
    /// ```
    pub async fn run_transaction<T, E, F>(&self, body: F) -> Result<T, E>
    where
        T: Send + 'static,
        E: From<DbError> + Send + 'static,
        F: for<'t> FnOnce(&'t mut TxHandle) -> BoxFuture<'t, Result<T, E>> + Send + 'static,
    {
        let task = tokio::spawn(transaction_task(self.clone(), body));

        match task.await {
            Ok(result) => result,
            Err(join_err) => Err(E::from(DbError::TransactionFailed(format!(
                "transaction task aborted: {join_err}"
            )))),
        }
    }

    /// Writes the dataset to durable storage (embedded only).
    pub async fn flush(&self) -> DbResult<()> {
        match self {
            Database::Embedded(store) => store.flush().await,
            Database::Pooled(_) => Ok(()),
        }
    }

    /// Stops background work, performs the final flush and closes the pool.
    pub async fn shutdown(&self) -> DbResult<()> {
        match self {
            Database::Embedded(store) => store.shutdown().await,
            Database::Pooled(store) => {
                store.shutdown().await;
                Ok(())
            }
        }
    }

    /// Checks if the database is healthy (can execute queries).
    pub async fn health_check(&self) -> bool {
        match self {
            Database::Embedded(store) => store.health_check().await,
            Database::Pooled(store) => store.health_check().await,
        }
    }

    /// Path of the snapshot file, for the embedded store.
    pub fn snapshot_path(&self) -> Option<&Path> {
        match self {
            Database::Embedded(store) => Some(store.snapshot_path()),
            Database::Pooled(_) => None,
        }
    }

    /// Whether writes are refused until restart.
    pub fn is_sealed(&self) -> bool {
        match self {
            Database::Embedded(store) => store.is_sealed(),
            Database::Pooled(_) => false,
        }
    }

    /// Returns the asset repository.
    pub fn assets(&self) -> AssetRepository {
        AssetRepository::new(self.clone())
    }

    /// Returns the movement history repository.
    pub fn movements(&self) -> MovementRepository {
        MovementRepository::new(self.clone())
    }

    /// Returns the user repository.
    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.clone())
    }
}

async fn transaction_task<T, E, F>(db: Database, body: F) -> Result<T, E>
where
    E: From<DbError>,
    F: for<'t> FnOnce(&'t mut TxHandle) -> BoxFuture<'t, Result<T, E>>,
{
    let mut tx = db.begin().await?;

    match body(&mut tx).await {
        Ok(value) => {
            tx.commit().await?;
            if let Database::Embedded(store) = &db {
                store.flush().await?;
            }
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "Rollback failed");
            }
            Err(err)
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
