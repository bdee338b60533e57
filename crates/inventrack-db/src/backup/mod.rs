//! # Backup Manager
//!
//! Export and restore of the persisted state.
//!
//! ## Restore
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  upload (raw or multipart, ≤ 50 MB, UploadBuffer)                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  extract "database" part ──► starts with "SQLite format 3\0"?           │
//! │                                   │ no  → InvalidFormat (file untouched)│
//! │                                   ▼ yes                                 │
//! │  stage tmp, attach: users / assets / transactions columns present?      │
//! │                                   │ no  → InvalidFormat (file untouched)│
//! │                                   ▼ yes                                 │
//! │  copy live file → inventrack_pre_restore_<millis>.db                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  rename tmp over live file, seal store                                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  RestoreOutcome { restart_required: true }                              │
//! │  RestartSignal fires after restart_delay → host re-runs startup         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The pooled backend has no snapshot file; only the JSON export applies.

pub mod multipart;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

use inventrack_core::{Asset, AssetFilter, Movement, MovementFilter, User};

use crate::engine::embedded::SNAPSHOT_SIGNATURE;
use crate::engine::Database;
use crate::error::DbError;

/// Upload ceiling for restore payloads.
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Delay between acknowledging a restore and firing the restart signal.
pub const DEFAULT_RESTART_DELAY: Duration = Duration::from_millis(1000);

/// Value of the `app` field in JSON exports.
pub const EXPORT_APP_NAME: &str = "InvenTrack";

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum BackupError {
    /// The upload is not a SQLite database.
    #[error("Invalid backup file: {0}")]
    InvalidFormat(String),

    /// The upload exceeded [`MAX_UPLOAD_BYTES`].
    #[error("Upload exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    /// Snapshot export/restore on the pooled backend.
    #[error("Snapshot backup is not available for the pooled store")]
    Unsupported,

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("Backup I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Export serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type BackupResult<T> = Result<T, BackupError>;

// =============================================================================
// Upload buffering
// =============================================================================

/// Accumulates an upload, failing as soon as it grows past the limit.
#[derive(Debug)]
pub struct UploadBuffer {
    bytes: Vec<u8>,
    limit: usize,
}

impl Default for UploadBuffer {
    fn default() -> Self {
        UploadBuffer::with_limit(MAX_UPLOAD_BYTES)
    }
}

impl UploadBuffer {
    pub fn new() -> Self {
        UploadBuffer::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        UploadBuffer {
            bytes: Vec::new(),
            limit,
        }
    }

    /// Appends a chunk of the request body.
    pub fn push(&mut self, chunk: &[u8]) -> BackupResult<()> {
        if self.bytes.len() + chunk.len() > self.limit {
            return Err(BackupError::PayloadTooLarge { limit: self.limit });
        }
        self.bytes.extend_from_slice(chunk);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

// =============================================================================
// Restart signal
// =============================================================================

/// Tells the host to re-run its startup sequence.
///
/// Each trigger bumps a generation counter; hosts wait on
/// [`watch::Receiver::changed`].
#[derive(Debug, Clone)]
pub struct RestartSignal {
    tx: Arc<watch::Sender<u64>>,
}

impl Default for RestartSignal {
    fn default() -> Self {
        RestartSignal::new()
    }
}

impl RestartSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        RestartSignal { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }

    pub fn trigger(&self) {
        self.tx.send_modify(|generation| *generation += 1);
        info!("Restart requested");
    }

    /// Triggers after `delay` on a background task, so the restore response
    /// can be delivered first.
    pub fn schedule(&self, delay: Duration) {
        let signal = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            signal.trigger();
        });
    }
}

// =============================================================================
// Results
// =============================================================================

/// Raw snapshot download.
#[derive(Debug, Clone)]
pub struct SnapshotExport {
    /// `inventrack_backup_YYYY-MM-DD.db`
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Logical JSON export.
#[derive(Debug, Clone)]
pub struct JsonExport {
    /// `inventrack_export_YYYY-MM-DD.json`
    pub filename: String,
    pub document: ExportDocument,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub exported_at: DateTime<Utc>,
    pub app: String,
    pub data: ExportData,
}

/// Password hashes are never part of an export.
#[derive(Debug, Clone, Serialize)]
pub struct ExportData {
    pub assets: Vec<Asset>,
    pub transactions: Vec<Movement>,
    pub users: Vec<User>,
}

impl JsonExport {
    pub fn to_pretty_json(&self) -> BackupResult<String> {
        Ok(serde_json::to_string_pretty(&self.document)?)
    }
}

/// Acknowledgement of a restore.
#[derive(Debug, Clone, Serialize)]
pub struct RestoreOutcome {
    pub restart_required: bool,
    /// Copy of the previous snapshot, when one existed.
    pub safety_copy: Option<PathBuf>,
    pub bytes: usize,
    pub message: String,
}

// =============================================================================
// Manager
// =============================================================================

pub fn backup_filename(now: DateTime<Utc>) -> String {
    format!("inventrack_backup_{}.db", now.format("%Y-%m-%d"))
}

pub fn export_filename(now: DateTime<Utc>) -> String {
    format!("inventrack_export_{}.json", now.format("%Y-%m-%d"))
}

/// `<dir>/<stem>_pre_restore_<unix-millis>.db` next to the live snapshot.
pub fn safety_copy_path(snapshot: &Path, now: DateTime<Utc>) -> PathBuf {
    let stem = snapshot
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "inventrack".to_string());
    snapshot.with_file_name(format!(
        "{stem}_pre_restore_{}.db",
        now.timestamp_millis()
    ))
}

#[derive(Debug, Clone)]
pub struct BackupManager {
    db: Database,
    restart: RestartSignal,
    restart_delay: Duration,
}

impl BackupManager {
    pub fn new(db: Database, restart: RestartSignal) -> Self {
        BackupManager {
            db,
            restart,
            restart_delay: DEFAULT_RESTART_DELAY,
        }
    }

    pub fn restart_delay(mut self, delay: Duration) -> Self {
        self.restart_delay = delay;
        self
    }

    /// Flushes, then returns the snapshot bytes with a dated filename.
    pub async fn export_snapshot(&self) -> BackupResult<SnapshotExport> {
        let Database::Embedded(store) = &self.db else {
            return Err(BackupError::Unsupported);
        };

        store.flush().await?;
        let bytes = tokio::fs::read(store.snapshot_path()).await?;

        let filename = backup_filename(Utc::now());
        info!(filename = %filename, bytes = bytes.len(), "Snapshot exported");
        Ok(SnapshotExport { filename, bytes })
    }

    /// Validates and installs an uploaded snapshot, then schedules a restart.
    ///
    /// `content_type` is the request's Content-Type; multipart bodies are
    /// searched for the snapshot part, anything else is taken as raw bytes.
    pub async fn import_snapshot(
        &self,
        upload: &[u8],
        content_type: Option<&str>,
    ) -> BackupResult<RestoreOutcome> {
        if upload.len() > MAX_UPLOAD_BYTES {
            return Err(BackupError::PayloadTooLarge {
                limit: MAX_UPLOAD_BYTES,
            });
        }

        let Database::Embedded(store) = &self.db else {
            return Err(BackupError::Unsupported);
        };

        let payload = content_type
            .and_then(multipart::boundary)
            .and_then(|b| multipart::extract_file_part(upload, b))
            .unwrap_or(upload);

        if !payload.starts_with(SNAPSHOT_SIGNATURE) {
            warn!(bytes = payload.len(), "Rejected restore upload without SQLite signature");
            return Err(BackupError::InvalidFormat(
                "file is not a SQLite database".to_string(),
            ));
        }

        let safety = safety_copy_path(store.snapshot_path(), Utc::now());
        let copied = match store.replace_snapshot(payload, &safety).await {
            Ok(copied) => copied,
            Err(DbError::InvalidSnapshot { reason, .. }) => {
                warn!(reason = %reason, "Rejected restore upload without the InvenTrack tables");
                return Err(BackupError::InvalidFormat(format!(
                    "database is not an InvenTrack snapshot: {reason}"
                )));
            }
            Err(e) => return Err(e.into()),
        };

        self.restart.schedule(self.restart_delay);

        Ok(RestoreOutcome {
            restart_required: true,
            safety_copy: copied.then_some(safety),
            bytes: payload.len(),
            message: "Restore complete, the server restarts shortly".to_string(),
        })
    }

    /// Backend-independent export of all tables.
    pub async fn export_json(&self) -> BackupResult<JsonExport> {
        let now = Utc::now();
        let document = ExportDocument {
            exported_at: now,
            app: EXPORT_APP_NAME.to_string(),
            data: ExportData {
                assets: self.db.assets().list(&AssetFilter::default()).await?,
                transactions: self.db.movements().list(&MovementFilter::default()).await?,
                users: self.db.users().list().await?,
            },
        };

        Ok(JsonExport {
            filename: export_filename(now),
            document,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_upload_buffer_enforces_limit() {
        let mut buffer = UploadBuffer::with_limit(8);
        buffer.push(b"1234").unwrap();
        buffer.push(b"5678").unwrap();

        let err = buffer.push(b"9").unwrap_err();
        assert!(matches!(err, BackupError::PayloadTooLarge { limit: 8 }));
        assert_eq!(buffer.len(), 8);
    }

    #[test]
    fn test_filenames() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 9, 30, 0).unwrap();
        assert_eq!(backup_filename(now), "inventrack_backup_2026-10-16.db");
        assert_eq!(export_filename(now), "inventrack_export_2026-10-16.json");
    }

    #[test]
    fn test_safety_copy_path() {
        let now = Utc.timestamp_millis_opt(1_760_000_000_123).unwrap();
        let path = safety_copy_path(Path::new("data/inventrack.db"), now);
        assert_eq!(
            path,
            PathBuf::from("data/inventrack_pre_restore_1760000000123.db")
        );
    }

    #[tokio::test]
    async fn test_restart_signal_schedule() {
        let signal = RestartSignal::new();
        let mut rx = signal.subscribe();

        signal.schedule(Duration::from_millis(10));
        tokio::time::timeout(Duration::from_secs(2), rx.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(*rx.borrow(), 1);
    }
}
