//! # Schema
//!
//! Tables and indexes, created idempotently on every start. There is no
//! migration history: statements use `IF NOT EXISTS` and the layout is the
//! same on both backends apart from column types.
//!
//! ```text
//! users ◄─ ─ ─ ─ ─ ─ (id only) ─ ─ ─ ─ ─ ┐
//!                                        │
//! assets ◄──── FK ON DELETE CASCADE ──── transactions
//! ```

use chrono::Utc;
use inventrack_core::{Role, DEFAULT_ADMIN_USERNAME};
use tracing::info;
use uuid::Uuid;

use crate::engine::Database;
use crate::error::DbResult;
use crate::params;
use crate::password::hash_password_task;

/// SQLite DDL for the embedded store. Timestamps are RFC 3339 text.
pub const SQLITE_SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        username TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        name TEXT NOT NULL,
        role TEXT NOT NULL DEFAULT 'staff'
    )"#,
    r#"CREATE TABLE IF NOT EXISTS assets (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        category TEXT NOT NULL,
        sku TEXT NOT NULL UNIQUE,
        quantity INTEGER NOT NULL DEFAULT 0 CHECK (quantity >= 0),
        asset_condition TEXT NOT NULL DEFAULT 'Baru',
        location TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS transactions (
        id TEXT PRIMARY KEY,
        asset_id TEXT NOT NULL REFERENCES assets(id) ON DELETE CASCADE,
        asset_name TEXT NOT NULL,
        movement_type TEXT NOT NULL,
        quantity INTEGER NOT NULL CHECK (quantity > 0),
        user_id TEXT NOT NULL,
        user_name TEXT NOT NULL,
        note TEXT,
        created_at TEXT NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_assets_sku ON assets(sku)",
    "CREATE INDEX IF NOT EXISTS idx_assets_category ON assets(category)",
    "CREATE INDEX IF NOT EXISTS idx_assets_location ON assets(location)",
    "CREATE INDEX IF NOT EXISTS idx_transactions_asset_id ON transactions(asset_id)",
    "CREATE INDEX IF NOT EXISTS idx_transactions_type ON transactions(movement_type)",
    "CREATE INDEX IF NOT EXISTS idx_transactions_created_at ON transactions(created_at)",
];

/// PostgreSQL DDL for the pooled store.
pub const POSTGRES_SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS users (
        id VARCHAR(50) PRIMARY KEY,
        username VARCHAR(100) NOT NULL UNIQUE,
        password_hash VARCHAR(255) NOT NULL,
        name VARCHAR(255) NOT NULL,
        role VARCHAR(20) NOT NULL DEFAULT 'staff'
    )"#,
    r#"CREATE TABLE IF NOT EXISTS assets (
        id VARCHAR(50) PRIMARY KEY,
        name VARCHAR(255) NOT NULL,
        category VARCHAR(100) NOT NULL,
        sku VARCHAR(100) NOT NULL UNIQUE,
        quantity BIGINT NOT NULL DEFAULT 0 CHECK (quantity >= 0),
        asset_condition VARCHAR(100) NOT NULL DEFAULT 'Baru',
        location VARCHAR(255) NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS transactions (
        id VARCHAR(50) PRIMARY KEY,
        asset_id VARCHAR(50) NOT NULL REFERENCES assets(id) ON DELETE CASCADE,
        asset_name VARCHAR(255) NOT NULL,
        movement_type VARCHAR(20) NOT NULL,
        quantity BIGINT NOT NULL CHECK (quantity > 0),
        user_id VARCHAR(50) NOT NULL,
        user_name VARCHAR(255) NOT NULL,
        note TEXT,
        created_at TIMESTAMPTZ NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_assets_sku ON assets(sku)",
    "CREATE INDEX IF NOT EXISTS idx_assets_category ON assets(category)",
    "CREATE INDEX IF NOT EXISTS idx_assets_location ON assets(location)",
    "CREATE INDEX IF NOT EXISTS idx_transactions_asset_id ON transactions(asset_id)",
    "CREATE INDEX IF NOT EXISTS idx_transactions_type ON transactions(movement_type)",
    "CREATE INDEX IF NOT EXISTS idx_transactions_created_at ON transactions(created_at)",
];

/// Tables copied out of a snapshot on load, parents before children.
pub const SNAPSHOT_TABLES: &[(&str, &str)] = &[
    ("users", "id, username, password_hash, name, role"),
    (
        "assets",
        "id, name, category, sku, quantity, asset_condition, location, created_at, updated_at",
    ),
    (
        "transactions",
        "id, asset_id, asset_name, movement_type, quantity, user_id, user_name, note, created_at",
    ),
];

/// Inserts the default administrator when the user table is empty.
///
/// Returns whether a user was created.
pub async fn seed_default_admin(db: &Database, password: &str) -> DbResult<bool> {
    if db.users().count().await? > 0 {
        return Ok(false);
    }

    let hash = hash_password_task(password).await?;
    db.execute(
        "INSERT INTO users (id, username, password_hash, name, role) VALUES (?, ?, ?, ?, ?)",
        params![
            Uuid::new_v4().to_string(),
            DEFAULT_ADMIN_USERNAME,
            hash,
            "Administrator",
            Role::Admin.as_str()
        ],
    )
    .await?;

    info!(username = DEFAULT_ADMIN_USERNAME, at = %Utc::now(), "Seeded default administrator");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::DbConfig;

    #[tokio::test]
    async fn test_seed_runs_only_on_empty_user_table() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::connect(
            DbConfig::embedded(dir.path().join("inventrack.db")).flush_interval(None),
        )
        .await
        .unwrap();

        // connect() already seeded once.
        assert_eq!(db.users().count().await.unwrap(), 1);
        assert!(!seed_default_admin(&db, "another-password").await.unwrap());
        assert_eq!(db.users().count().await.unwrap(), 1);

        let admin = db
            .users()
            .verify_credentials(DEFAULT_ADMIN_USERNAME, crate::engine::DEFAULT_ADMIN_PASSWORD)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(admin.role, Role::Admin);
    }
}
