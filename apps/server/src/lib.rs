//! # InvenTrack Server
//!
//! Application host for the InvenTrack core.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Server Components                               │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────────┐│
//! │  │  Admission     │  │  AppState      │  │  ApiError                  ││
//! │  │                │  │                │  │                            ││
//! │  │ • admit_login  │  │ • bootstrap    │  │ • status / code / message  ││
//! │  │ • admit_api    │  │ • shutdown     │  │ • From<ServiceError>       ││
//! │  │ • retry_after  │  │ • ledger/backup│  │ • From<BackupError>        ││
//! │  └────────────────┘  └────────────────┘  └────────────────────────────┘│
//! │                                                                         │
//! │  main: load config → bootstrap → wait for signal or restart → shutdown │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Environment variables (an optional `.env` is read first):
//! - `DB_TYPE` - `sqlite` (default) or `postgres`
//! - `DB_PATH` - Snapshot file (default: `data/inventrack.db`)
//! - `DATABASE_URL` - PostgreSQL connection string
//! - `DB_MAX_CONNECTIONS` / `DB_ACQUIRE_TIMEOUT_SECS` - Pool bounds (10 / 10)
//! - `FLUSH_INTERVAL_SECS` - Periodic snapshot flush, 0 disables (default: 30)
//! - `SHUTDOWN_TIMEOUT_SECS` - Final flush deadline (default: 5)
//! - `RESTART_DELAY_MS` - Delay before restarting after a restore (default: 1000)
//! - `ADMIN_PASSWORD` - Password for the seeded `admin` account
//! - `LOGIN_RATE_LIMIT_MAX` / `LOGIN_RATE_LIMIT_WINDOW_SECS` - (10 / 900)
//! - `API_RATE_LIMIT_MAX` / `API_RATE_LIMIT_WINDOW_SECS` - (120 / 60)

pub mod config;
pub mod error;
pub mod rate_limit;
pub mod state;

// Re-exports
pub use config::{AppConfig, ConfigError};
pub use error::{ApiError, ErrorCode, HostError};
pub use rate_limit::{Admission, RateLimited, SlidingWindowLimiter};
pub use state::AppState;
