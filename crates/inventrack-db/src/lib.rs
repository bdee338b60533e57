//! # inventrack-db: Storage, Ledger and Backup for InvenTrack
//!
//! Everything that touches persisted state lives here: the two storage
//! backends behind one [`Database`] handle, the repositories, the ledger
//! that keeps stock and movement history consistent, and backup/restore.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        InvenTrack Data Flow                             │
//! │                                                                         │
//! │  HTTP handler (POST /api/transactions)                                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  inventrack-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐   │   │
//! │  │   │ LedgerService │    │  Repositories │    │BackupManager │   │   │
//! │  │   │  (ledger.rs)  │───►│ AssetRepo     │    │ (backup/)    │   │   │
//! │  │   │               │    │ MovementRepo  │    │ export/import│   │   │
//! │  │   │               │    │ UserRepo      │    │              │   │   │
//! │  │   └───────┬───────┘    └───────┬───────┘    └──────┬───────┘   │   │
//! │  │           ▼                    ▼                   ▼           │   │
//! │  │   ┌─────────────────────────────────────────────────────────┐  │   │
//! │  │   │            Database (engine/) run_transaction           │  │   │
//! │  │   │   Embedded: in-memory SQLite + snapshot file            │  │   │
//! │  │   │   Pooled:   PostgreSQL connection pool                  │  │   │
//! │  │   └─────────────────────────────────────────────────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  data/inventrack.db  (or DATABASE_URL)                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`engine`] - Backends, parameters, transactions
//! - [`schema`] - DDL for both dialects, default admin seeding
//! - [`repository`] - Asset, movement and user repositories
//! - [`ledger`] - Atomic check-in / check-out
//! - [`backup`] - Snapshot export/restore, JSON export, restart signal
//! - [`password`] - Argon2 hashing
//! - [`error`] - Storage and service error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use inventrack_db::{Actor, Database, DbConfig, LedgerService};
//!
//! let db = Database::connect(DbConfig::embedded("data/inventrack.db")).await?;
//! let ledger = LedgerService::new(db.clone());
//! ledger.record_movement(&asset_id, "check-out", 4, &Actor::new(id, name), None).await?;
//! db.shutdown().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod backup;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod password;
pub mod repository;
pub mod schema;

// =============================================================================
// Re-exports
// =============================================================================

pub use backup::{BackupError, BackupManager, RestartSignal, RestoreOutcome, UploadBuffer};
pub use engine::{Backend, Database, DbConfig, Record, SqlParam, TxHandle};
pub use error::{DbError, DbResult, ServiceError, ServiceResult};
pub use ledger::{Actor, LedgerService};

// Repository re-exports for convenience
pub use repository::asset::AssetRepository;
pub use repository::movement::MovementRepository;
pub use repository::user::UserRepository;
