//! API error mapping.
//!
//! Every error the core can raise converts into an [`ApiError`]: a status,
//! a machine-readable code and a generic message that is safe to show.
//! Internal details are logged here and never placed in `message`.

use serde::Serialize;
use tracing::error;

use inventrack_core::CoreError;
use inventrack_db::{BackupError, DbError, ServiceError};

use crate::config::ConfigError;
use crate::rate_limit::RateLimited;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Validation,
    NotFound,
    Conflict,
    InsufficientStock,
    Forbidden,
    InvalidFormat,
    PayloadTooLarge,
    RateLimited,
    RestartPending,
    Unsupported,
    Storage,
}

/// Error body handed to the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{status} {code:?}: {message}")]
pub struct ApiError {
    #[serde(skip)]
    pub status: u16,
    pub code: ErrorCode,
    #[serde(rename = "error")]
    pub message: String,
    /// Remaining stock, for rejected check-outs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available: Option<i64>,
    /// Seconds until the client may retry, for 429.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

impl ApiError {
    pub fn new(status: u16, code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            status,
            code,
            message: message.into(),
            available: None,
            retry_after_secs: None,
        }
    }

    pub fn storage() -> Self {
        ApiError::new(500, ErrorCode::Storage, "Terjadi kesalahan pada server")
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(e) => ApiError::new(400, ErrorCode::Validation, e.to_string()),
            CoreError::AssetNotFound(_) => {
                ApiError::new(404, ErrorCode::NotFound, "Aset tidak ditemukan")
            }
            CoreError::UserNotFound(_) => {
                ApiError::new(404, ErrorCode::NotFound, "User tidak ditemukan")
            }
            CoreError::InsufficientStock { available, .. } => ApiError {
                available: Some(available),
                ..ApiError::new(
                    400,
                    ErrorCode::InsufficientStock,
                    format!("Stok tidak cukup. Tersedia: {available}"),
                )
            },
            CoreError::SelfDeletion => ApiError::new(
                400,
                ErrorCode::Forbidden,
                "Tidak dapat menghapus akun sendiri",
            ),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, .. } => {
                ApiError::new(404, ErrorCode::NotFound, format!("{entity} tidak ditemukan"))
            }
            DbError::UniqueViolation { field, .. } => ApiError::new(
                409,
                ErrorCode::Conflict,
                match field.as_str() {
                    "sku" => "SKU sudah digunakan".to_string(),
                    "username" => "Username sudah digunakan".to_string(),
                    _ => "Data sudah ada".to_string(),
                },
            ),
            DbError::RestartPending => ApiError::new(
                503,
                ErrorCode::RestartPending,
                "Server sedang memulai ulang setelah restore",
            ),
            other => {
                error!(error = %other, "Storage failure");
                ApiError::storage()
            }
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Core(e) => e.into(),
            ServiceError::Db(e) => e.into(),
        }
    }
}

impl From<BackupError> for ApiError {
    fn from(err: BackupError) -> Self {
        match err {
            BackupError::InvalidFormat(_) => ApiError::new(
                400,
                ErrorCode::InvalidFormat,
                "File bukan database SQLite yang valid",
            ),
            BackupError::PayloadTooLarge { limit } => ApiError::new(
                413,
                ErrorCode::PayloadTooLarge,
                format!("Ukuran file melebihi {} MB", limit / (1024 * 1024)),
            ),
            BackupError::Unsupported => ApiError::new(
                400,
                ErrorCode::Unsupported,
                "Backup file hanya tersedia untuk database SQLite",
            ),
            BackupError::Db(e) => e.into(),
            other => {
                error!(error = %other, "Backup failure");
                ApiError::storage()
            }
        }
    }
}

impl From<RateLimited> for ApiError {
    fn from(err: RateLimited) -> Self {
        ApiError {
            retry_after_secs: Some(err.retry_after.as_secs().max(1)),
            ..ApiError::new(
                429,
                ErrorCode::RateLimited,
                "Terlalu banyak permintaan. Coba lagi nanti.",
            )
        }
    }
}

/// Errors that stop the host from starting.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Storage startup failed: {0}")]
    Db(#[from] DbError),

    #[error("Shutdown did not finish within {0:?}")]
    ShutdownTimeout(std::time::Duration),
}

#[cfg(test)]
mod tests {
    use super::*;
    use inventrack_core::ValidationError;
    use std::time::Duration;

    #[test]
    fn test_insufficient_stock_carries_available() {
        let err: ApiError = ServiceError::Core(CoreError::InsufficientStock {
            sku: "ELE-000001".to_string(),
            available: 6,
            requested: 10,
        })
        .into();

        assert_eq!(err.status, 400);
        assert_eq!(err.code, ErrorCode::InsufficientStock);
        assert_eq!(err.available, Some(6));

        let body = serde_json::to_value(&err).unwrap();
        assert_eq!(body["available"], 6);
        assert_eq!(body["code"], "insufficient_stock");
        assert!(body.get("status").is_none());
    }

    #[test]
    fn test_status_mapping() {
        let validation: ApiError = CoreError::Validation(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        })
        .into();
        assert_eq!(validation.status, 400);

        let missing: ApiError = CoreError::AssetNotFound("x".to_string()).into();
        assert_eq!(missing.status, 404);

        let conflict: ApiError = DbError::duplicate("sku", "ELE-1").into();
        assert_eq!((conflict.status, conflict.code), (409, ErrorCode::Conflict));

        let invalid: ApiError = BackupError::InvalidFormat("bad".to_string()).into();
        assert_eq!(invalid.status, 400);

        let large: ApiError = BackupError::PayloadTooLarge {
            limit: 50 * 1024 * 1024,
        }
        .into();
        assert_eq!(large.status, 413);
        assert!(large.message.contains("50 MB"));

        let limited: ApiError = RateLimited {
            retry_after: Duration::from_millis(300),
        }
        .into();
        assert_eq!(limited.status, 429);
        assert_eq!(limited.retry_after_secs, Some(1));
    }

    #[test]
    fn test_storage_failures_hide_details() {
        let err: ApiError = DbError::QueryFailed("no such table: secret_stuff".to_string()).into();
        assert_eq!(err.status, 500);
        assert!(!err.message.contains("secret_stuff"));

        let io: ApiError = BackupError::Io(std::io::Error::other("disk /dev/sda1 full")).into();
        assert_eq!(io.status, 500);
        assert!(!io.message.contains("sda1"));
    }
}
