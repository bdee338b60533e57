//! # Repository Module
//!
//! Typed access to assets, movement history and users.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Route handler                                                         │
//! │       │                                                                 │
//! │       │  db.assets().list(&filter)                                     │
//! │       ▼                                                                 │
//! │  AssetRepository / MovementRepository / UserRepository                 │
//! │       │                                                                 │
//! │       │  `?` SQL + Vec<SqlParam>                                       │
//! │       ▼                                                                 │
//! │  Database (embedded snapshot store | pooled PostgreSQL)                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Repositories only use the storage engine interface, so the same SQL runs
//! on both backends. Aggregates are cast to BIGINT so they decode to `i64`
//! everywhere (PostgreSQL's `SUM(bigint)` is `numeric`).
//!
//! ## Available Repositories
//!
//! - [`AssetRepository`](asset::AssetRepository) - Asset CRUD, filters, dashboard summary
//! - [`MovementRepository`](movement::MovementRepository) - Movement history and monthly stats
//! - [`UserRepository`](user::UserRepository) - Accounts and credential checks

pub mod asset;
pub mod movement;
pub mod user;

use uuid::Uuid;

/// Single `count` column (counts, sums, single quantities).
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct CountRow {
    pub count: i64,
}

/// Single `value` text column (distinct labels).
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ValueRow {
    pub value: String,
}

/// Helper to generate a new entity ID.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// `%term%` for a case-insensitive `LOWER(col) LIKE ?` match, or `None` when
/// the term is blank.
pub(crate) fn like_pattern(term: Option<&str>) -> Option<String> {
    term.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| format!("%{}%", t.to_lowercase()))
}

/// Treats blank optional strings as absent.
pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern() {
        assert_eq!(like_pattern(Some(" Laptop ")), Some("%laptop%".to_string()));
        assert_eq!(like_pattern(Some("  ")), None);
        assert_eq!(like_pattern(None), None);
    }

    #[test]
    fn test_generate_id_is_uuid() {
        assert!(Uuid::parse_str(&generate_id()).is_ok());
    }
}
