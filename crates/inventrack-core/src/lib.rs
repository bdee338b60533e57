//! # inventrack-core: Pure Domain Logic for InvenTrack
//!
//! Domain types, validation and stock arithmetic with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        InvenTrack Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Route handlers (HTTP glue)                      │   │
//! │  │    assets, transactions, users, backup, auth                    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │   inventrack-db: Storage Engine, Ledger, Backup, Repositories   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ inventrack-core (THIS CRATE) ★                  │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │  ledger   │  │  period   │  │ validation│  │   │
//! │  │   │   Asset   │  │  apply    │  │  month    │  │   rules   │  │   │
//! │  │   │ Movement  │  │  ensure   │  │  windows  │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Asset, Movement, User, inputs, aggregates)
//! - [`ledger`] - Stock arithmetic and availability checks
//! - [`period`] - Calendar-month windows for statistics
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use inventrack_core::ledger::apply_movement;
//! use inventrack_core::MovementType;
//!
//! let after = apply_movement(10, MovementType::CheckOut, 4).unwrap();
//! assert_eq!(after, 6);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod ledger;
pub mod period;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Condition assigned to a new asset when none is given.
pub const DEFAULT_CONDITION: &str = "Baru";

/// Assets at or below this quantity count as low stock.
pub const LOW_STOCK_THRESHOLD: i64 = 5;

/// Minimum password length for user accounts.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Username of the administrator seeded into an empty user table.
pub const DEFAULT_ADMIN_USERNAME: &str = "admin";

/// Months shown by the movement chart when the caller does not say.
pub const DEFAULT_STATS_MONTHS: u32 = 6;
