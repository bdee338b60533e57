//! # Embedded Snapshot Store
//!
//! The whole dataset lives in one in-memory SQLite connection and is written
//! to a single snapshot file after every acknowledged write.
//!
//! ## Flush
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  execute(INSERT ...) ──► in-memory SQLite                               │
//! │        │                                                                │
//! │        ▼  flush (serialized by flush_lock)                              │
//! │  VACUUM INTO 'inventrack.db.tmp'                                        │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  fsync(tmp) ──► rename(tmp → inventrack.db)                             │
//! │                                                                         │
//! │  A crash mid-flush leaves the previous snapshot intact.                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Load
//! On open the snapshot (if present) must start with `SQLite format 3\0`.
//! It is attached and its rows copied into the in-memory tables. A restored
//! file must also carry every snapshot table and column before it replaces
//! the current one, so the next start cannot fail on it.
//!
//! ## Sealing
//! After a restore replaces the snapshot file the store is sealed: flushes
//! become no-ops and writes fail with [`DbError::RestartPending`], so the old
//! in-memory dataset can never overwrite the restored file.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tokio::io::AsyncReadExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{bind_params, DbConfig, Record, SqlParam};
use crate::error::{DbError, DbResult};
use crate::schema;

/// Leading bytes of every SQLite database file.
pub const SNAPSHOT_SIGNATURE: &[u8; 16] = b"SQLite format 3\0";

#[derive(Debug)]
struct EmbeddedInner {
    pool: SqlitePool,
    snapshot_path: PathBuf,
    flush_lock: Mutex<()>,
    sealed: AtomicBool,
    flusher: StdMutex<Option<JoinHandle<()>>>,
}

/// In-memory SQLite mirrored to one snapshot file.
#[derive(Debug, Clone)]
pub struct EmbeddedStore {
    inner: Arc<EmbeddedInner>,
}

/// Sibling path used while writing a new snapshot.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Checks that `path` starts with [`SNAPSHOT_SIGNATURE`].
pub async fn validate_snapshot_file(path: &Path) -> DbResult<()> {
    let invalid = |reason: &str| DbError::InvalidSnapshot {
        path: path.display().to_string(),
        reason: reason.to_string(),
    };

    let mut file = tokio::fs::File::open(path).await?;
    let mut header = [0u8; 16];
    let mut read = 0;
    while read < header.len() {
        let n = file.read(&mut header[read..]).await?;
        if n == 0 {
            return Err(invalid("file is shorter than the SQLite header"));
        }
        read += n;
    }

    if &header != SNAPSHOT_SIGNATURE {
        return Err(invalid("missing SQLite signature"));
    }
    Ok(())
}

impl EmbeddedStore {
    /// Opens the in-memory engine, creates the schema and loads the snapshot
    /// at `snapshot_path` if it exists.
    pub async fn open(snapshot_path: &Path, config: &DbConfig) -> DbResult<Self> {
        if let Some(parent) = snapshot_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;
        }

        // Plain `:memory:` filename: sqlx's in-memory mode opens with
        // SQLITE_OPEN_MEMORY, which `VACUUM INTO` inherits for its target.
        let options = SqliteConnectOptions::new()
            .filename(":memory:")
            .foreign_keys(true);

        // One connection for the lifetime of the store: an in-memory
        // database disappears with its last connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        for statement in schema::SQLITE_SCHEMA {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .map_err(|e| DbError::SchemaFailed(e.to_string()))?;
        }

        let store = EmbeddedStore {
            inner: Arc::new(EmbeddedInner {
                pool,
                snapshot_path: snapshot_path.to_path_buf(),
                flush_lock: Mutex::new(()),
                sealed: AtomicBool::new(false),
                flusher: StdMutex::new(None),
            }),
        };

        if tokio::fs::try_exists(snapshot_path).await? {
            store.load_snapshot().await?;
        } else {
            info!(path = %snapshot_path.display(), "No snapshot yet, starting empty");
        }

        Ok(store)
    }

    async fn load_snapshot(&self) -> DbResult<()> {
        let path = &self.inner.snapshot_path;
        validate_snapshot_file(path).await?;

        let mut conn = self.inner.pool.acquire().await?;

        sqlx::query("ATTACH DATABASE ? AS snapshot")
            .bind(path.to_string_lossy().into_owned())
            .execute(&mut *conn)
            .await
            .map_err(|e| DbError::InvalidSnapshot {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        let mut copy_result = Ok(());
        for (table, columns) in schema::SNAPSHOT_TABLES {
            let sql = format!(
                "INSERT INTO main.{table} ({columns}) SELECT {columns} FROM snapshot.{table}"
            );
            match sqlx::query(&sql).execute(&mut *conn).await {
                Ok(result) => debug!(table, rows = result.rows_affected(), "Loaded table"),
                Err(e) => {
                    copy_result = Err(DbError::InvalidSnapshot {
                        path: path.display().to_string(),
                        reason: e.to_string(),
                    });
                    break;
                }
            }
        }

        sqlx::query("DETACH DATABASE snapshot")
            .execute(&mut *conn)
            .await?;

        copy_result?;
        info!(path = %path.display(), "Snapshot loaded");
        Ok(())
    }

    /// Starts the safety-net flush task. Called once after bootstrap.
    pub(crate) fn start_flusher(&self, period: Option<Duration>) {
        let Some(period) = period else {
            return;
        };

        let weak: Weak<EmbeddedInner> = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let store = EmbeddedStore { inner };
                if let Err(e) = store.flush().await {
                    warn!(error = %e, "Periodic snapshot flush failed");
                }
            }
        });

        if let Ok(mut slot) = self.inner.flusher.lock() {
            if let Some(previous) = slot.replace(handle) {
                previous.abort();
            }
        }
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.inner.snapshot_path
    }

    pub fn is_sealed(&self) -> bool {
        self.inner.sealed.load(Ordering::SeqCst)
    }

    /// Refuses further writes and flushes until the process restarts.
    pub fn seal(&self) {
        if !self.inner.sealed.swap(true, Ordering::SeqCst) {
            warn!(path = %self.inner.snapshot_path.display(), "Store sealed until restart");
        }
    }

    fn ensure_writable(&self) -> DbResult<()> {
        if self.is_sealed() {
            return Err(DbError::RestartPending);
        }
        Ok(())
    }

    pub async fn query_all<T: Record>(&self, sql: &str, params: Vec<SqlParam>) -> DbResult<Vec<T>> {
        let rows = bind_params!(sqlx::query_as::<_, T>(sql), params)
            .fetch_all(&self.inner.pool)
            .await?;
        Ok(rows)
    }

    pub async fn query_one<T: Record>(
        &self,
        sql: &str,
        params: Vec<SqlParam>,
    ) -> DbResult<Option<T>> {
        let row = bind_params!(sqlx::query_as::<_, T>(sql), params)
            .fetch_optional(&self.inner.pool)
            .await?;
        Ok(row)
    }

    /// Executes one write and flushes before returning.
    pub async fn execute(&self, sql: &str, params: Vec<SqlParam>) -> DbResult<u64> {
        self.ensure_writable()?;

        let affected = bind_params!(sqlx::query(sql), params)
            .execute(&self.inner.pool)
            .await?
            .rows_affected();

        self.flush().await?;
        Ok(affected)
    }

    pub(crate) async fn begin(&self) -> DbResult<Transaction<'static, Sqlite>> {
        self.ensure_writable()?;
        Ok(self.inner.pool.begin().await?)
    }

    /// Writes the full dataset to the snapshot file.
    ///
    /// No-op once sealed.
    pub async fn flush(&self) -> DbResult<()> {
        if self.is_sealed() {
            debug!("Store sealed, skipping flush");
            return Ok(());
        }

        let _guard = self.inner.flush_lock.lock().await;
        // A restore may have sealed the store while we waited.
        if self.is_sealed() {
            return Ok(());
        }

        let path = &self.inner.snapshot_path;
        let tmp = temp_path(path);

        match tokio::fs::remove_file(&tmp).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        sqlx::query("VACUUM INTO ?")
            .bind(tmp.to_string_lossy().into_owned())
            .execute(&self.inner.pool)
            .await?;

        tokio::fs::File::open(&tmp).await?.sync_all().await?;
        tokio::fs::rename(&tmp, path).await?;

        debug!(path = %path.display(), "Snapshot flushed");
        Ok(())
    }

    /// Replaces the snapshot file with `bytes` and seals the store.
    ///
    /// The bytes are staged next to the snapshot and checked for every
    /// snapshot table first; on failure the current file is left untouched.
    /// The current file is then copied to `safety_copy`. Returns whether a
    /// copy was made (there is nothing to copy before the first flush).
    pub async fn replace_snapshot(&self, bytes: &[u8], safety_copy: &Path) -> DbResult<bool> {
        let _guard = self.inner.flush_lock.lock().await;

        let path = &self.inner.snapshot_path;
        let tmp = temp_path(path);
        tokio::fs::write(&tmp, bytes).await?;

        if let Err(e) = self.check_tables(&tmp).await {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp).await {
                warn!(error = %cleanup, "Failed to remove rejected restore file");
            }
            return Err(e);
        }
        tokio::fs::File::open(&tmp).await?.sync_all().await?;

        let copied = if tokio::fs::try_exists(path).await? {
            tokio::fs::copy(path, safety_copy).await?;
            info!(copy = %safety_copy.display(), "Pre-restore safety copy written");
            true
        } else {
            false
        };

        tokio::fs::rename(&tmp, path).await?;

        self.seal();
        info!(path = %path.display(), bytes = bytes.len(), "Snapshot replaced");
        Ok(copied)
    }

    /// Fails with [`DbError::InvalidSnapshot`] unless the database at `path`
    /// has every table and column the loader copies.
    async fn check_tables(&self, path: &Path) -> DbResult<()> {
        let invalid = |reason: String| DbError::InvalidSnapshot {
            path: path.display().to_string(),
            reason,
        };

        let mut conn = self.inner.pool.acquire().await?;

        sqlx::query("ATTACH DATABASE ? AS upload")
            .bind(path.to_string_lossy().into_owned())
            .execute(&mut *conn)
            .await
            .map_err(|e| invalid(e.to_string()))?;

        let mut result = Ok(());
        for (table, columns) in schema::SNAPSHOT_TABLES {
            let sql = format!("SELECT {columns} FROM upload.{table} LIMIT 0");
            if let Err(e) = sqlx::query(&sql).execute(&mut *conn).await {
                result = Err(invalid(e.to_string()));
                break;
            }
        }

        sqlx::query("DETACH DATABASE upload")
            .execute(&mut *conn)
            .await?;

        result
    }

    /// Stops the periodic flusher, performs the final flush and closes the
    /// connection. The final flush is skipped when sealed.
    pub async fn shutdown(&self) -> DbResult<()> {
        if let Ok(mut slot) = self.inner.flusher.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }

        let result = self.flush().await;
        if let Err(e) = &result {
            error!(error = %e, "Final snapshot flush failed");
        }

        self.inner.pool.close().await;
        info!("Embedded store closed");
        result
    }

    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1")
            .execute(&self.inner.pool)
            .await
            .is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
