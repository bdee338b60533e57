//! # Database Error Types
//!
//! Error types for storage operations and the services built on them.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  sqlx::Error / std::io::Error                                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← Adds context and categorization               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ServiceError ← DbError | CoreError (ledger, repositories)             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ApiError (server) ← status code + generic message                     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use inventrack_core::{CoreError, ValidationError};
use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Inserting or renaming to a duplicate SKU
    /// - Duplicate username
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - Movement referencing an asset deleted in the meantime
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - PostgreSQL server unreachable
    /// - Snapshot directory cannot be created
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Schema creation failed.
    #[error("Schema setup failed: {0}")]
    SchemaFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (no connection freed within the acquire timeout).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// The snapshot file does not start with the SQLite signature.
    #[error("Invalid snapshot file {path}: {reason}")]
    InvalidSnapshot { path: String, reason: String },

    /// The snapshot was replaced by a restore; writes wait for the restart.
    ///
    /// ## When This Occurs
    /// - Between a successful restore and the process re-running startup
    #[error("Snapshot was restored, restart pending")]
    RestartPending,

    /// Filesystem error while flushing or restoring the snapshot.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → unique / foreign key / query failure
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// sqlx::Error::Io             → DbError::Io
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                if db_err.is_unique_violation() {
                    // SQLite: "UNIQUE constraint failed: assets.sku"
                    // PostgreSQL: constraint name, e.g. "assets_sku_key"
                    let field = db_err
                        .constraint()
                        .map(str::to_string)
                        .or_else(|| {
                            msg.split("UNIQUE constraint failed: ")
                                .nth(1)
                                .map(str::to_string)
                        })
                        .unwrap_or_else(|| "unknown".to_string());
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if db_err.is_foreign_key_violation() {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            sqlx::Error::Io(io) => DbError::Io(io),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Service Error
// =============================================================================

/// Error returned by services that enforce domain rules on top of storage.
///
/// Business errors keep their class; everything else is a storage failure.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        ServiceError::Core(CoreError::Validation(err))
    }
}

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;
