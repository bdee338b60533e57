//! # Error Types
//!
//! Domain-specific error types for inventrack-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  inventrack-core errors (this file)                                    │
//! │  ├── CoreError        - Domain rule violations                         │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  inventrack-db errors (separate crate)                                 │
//! │  ├── DbError          - Storage failures                               │
//! │  ├── ServiceError     - CoreError | DbError for services               │
//! │  └── BackupError      - Snapshot export/restore failures               │
//! │                                                                         │
//! │  server errors                                                         │
//! │  └── ApiError         - What the HTTP client sees                      │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ServiceError → ApiError           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Domain rule violations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Asset cannot be found.
    ///
    /// ## When This Occurs
    /// - Asset ID doesn't exist
    /// - Asset was deleted between the lookup and the movement insert
    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    /// User cannot be found.
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// Not enough stock to check out the requested quantity.
    ///
    /// ## User Workflow
    /// ```text
    /// Check-out (qty: 10)
    ///      │
    ///      ▼
    /// Check stock: available=6
    ///      │
    ///      ▼
    /// InsufficientStock { sku: "ELK-000123", available: 6, requested: 10 }
    ///      │
    ///      ▼
    /// UI shows: "Stok tidak cukup. Tersedia: 6"
    /// ```
    #[error("Insufficient stock for {sku}: available {available}, requested {requested}")]
    InsufficientStock {
        sku: String,
        available: i64,
        requested: i64,
    },

    /// A user tried to delete their own account.
    #[error("Users cannot delete their own account")]
    SelfDeletion,

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors, keyed by the offending field.
///
/// Raised before any mutation is attempted; the route layer answers 400.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field such as the asset name or username is blank.
    #[error("{field} is required")]
    Required { field: String },

    /// Password shorter than `MIN_PASSWORD_LEN`.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Negative stock level, or a check-in that would overflow it.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Movement quantity of zero or less.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// SKU containing anything but letters, digits, `-` and `_`.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Unknown movement type or role.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
