//! # Asset Repository
//!
//! Database operations for assets.
//!
//! ## Key Operations
//! - Filtered listing (search, category, location)
//! - CRUD with SKU generation and uniqueness
//! - Dashboard summary and low-stock list
//! - Guarded stock delta (used by the ledger inside its transaction)
//!
//! ## Stock Changes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Two ways quantity changes:                                             │
//! │                                                                         │
//! │  1. update(id, AssetUpdate { quantity: Some(n) })                       │
//! │     Manual correction, no movement recorded.                            │
//! │                                                                         │
//! │  2. LedgerService::record_movement(...)                                 │
//! │     INSERT movement + apply_delta in one transaction:                   │
//! │       check-in : quantity = quantity + n                                │
//! │       check-out: quantity = quantity - n  WHERE quantity >= n           │
//! │     0 rows affected → InsufficientStock, rollback                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use tracing::debug;

use inventrack_core::ledger::generate_sku;
use inventrack_core::period::month_start;
use inventrack_core::validation::{validate_asset_update, validate_new_asset};
use inventrack_core::{
    Asset, AssetFilter, AssetUpdate, CoreError, InventorySummary, MovementType, NewAsset,
    DEFAULT_CONDITION, LOW_STOCK_THRESHOLD,
};

use super::{generate_id, like_pattern, non_blank, CountRow, ValueRow};
use crate::engine::{Database, SqlParam, TxHandle};
use crate::error::{DbError, DbResult, ServiceResult};
use crate::params;

pub(crate) const ASSET_COLUMNS: &str =
    "id, name, category, sku, quantity, asset_condition, location, created_at, updated_at";

/// Repository for asset database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.assets();
///
/// let laptops = repo.list(&AssetFilter { search: Some("laptop".into()), ..Default::default() }).await?;
/// let asset = repo.get_by_sku("ELE-000123").await?;
/// ```
#[derive(Debug, Clone)]
pub struct AssetRepository {
    db: Database,
}

/// Reports a unique violation on insert/update as a duplicate SKU.
fn sku_conflict(err: DbError, sku: &str) -> DbError {
    match err {
        DbError::UniqueViolation { .. } => DbError::duplicate("sku", sku),
        other => other,
    }
}

impl AssetRepository {
    /// Creates a new AssetRepository.
    pub fn new(db: Database) -> Self {
        AssetRepository { db }
    }

    /// Lists assets, most recently updated first.
    ///
    /// `search` matches name, SKU or category (case-insensitive); category
    /// and location are exact matches.
    pub async fn list(&self, filter: &AssetFilter) -> DbResult<Vec<Asset>> {
        let mut sql = format!("SELECT {ASSET_COLUMNS} FROM assets WHERE 1=1");
        let mut params: Vec<SqlParam> = Vec::new();

        if let Some(pattern) = like_pattern(filter.search.as_deref()) {
            sql.push_str(
                " AND (LOWER(name) LIKE ? OR LOWER(sku) LIKE ? OR LOWER(category) LIKE ?)",
            );
            params.extend(std::iter::repeat(SqlParam::from(pattern)).take(3));
        }
        if let Some(category) = non_blank(filter.category.as_deref()) {
            sql.push_str(" AND category = ?");
            params.push(category.into());
        }
        if let Some(location) = non_blank(filter.location.as_deref()) {
            sql.push_str(" AND location = ?");
            params.push(location.into());
        }
        sql.push_str(" ORDER BY updated_at DESC");

        let assets: Vec<Asset> = self.db.query_all(&sql, params).await?;
        debug!(count = assets.len(), "Listed assets");
        Ok(assets)
    }

    /// Gets an asset by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Asset>> {
        self.db
            .query_one(
                &format!("SELECT {ASSET_COLUMNS} FROM assets WHERE id = ?"),
                params![id],
            )
            .await
    }

    /// Gets an asset by SKU (barcode scanner lookup).
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Asset>> {
        self.db
            .query_one(
                &format!("SELECT {ASSET_COLUMNS} FROM assets WHERE sku = ?"),
                params![sku.trim()],
            )
            .await
    }

    /// Creates an asset.
    ///
    /// ## Defaults
    /// - `sku`: `CAT-NNNNNN` from the category and the clock
    /// - `condition`: [`DEFAULT_CONDITION`]
    ///
    /// ## Errors
    /// - Validation: missing name/category/location, negative quantity
    /// - `DbError::UniqueViolation`: SKU already taken
    pub async fn create(&self, new: NewAsset) -> ServiceResult<Asset> {
        validate_new_asset(&new)?;

        let now = Utc::now();
        let sku = non_blank(new.sku.as_deref()).unwrap_or_else(|| generate_sku(&new.category, now));
        let asset = Asset {
            id: generate_id(),
            name: new.name.trim().to_string(),
            category: new.category.trim().to_string(),
            sku,
            quantity: new.quantity,
            condition: non_blank(new.condition.as_deref())
                .unwrap_or_else(|| DEFAULT_CONDITION.to_string()),
            location: new.location.trim().to_string(),
            created_at: now,
            updated_at: now,
        };

        debug!(sku = %asset.sku, "Inserting asset");

        self.db
            .execute(
                &format!(
                    "INSERT INTO assets ({ASSET_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"
                ),
                params![
                    &asset.id,
                    &asset.name,
                    &asset.category,
                    &asset.sku,
                    asset.quantity,
                    &asset.condition,
                    &asset.location,
                    asset.created_at,
                    asset.updated_at
                ],
            )
            .await
            .map_err(|e| sku_conflict(e, &asset.sku))?;

        Ok(asset)
    }

    /// Applies a partial update. Fields left `None` keep their value.
    pub async fn update(&self, id: &str, update: AssetUpdate) -> ServiceResult<Asset> {
        validate_asset_update(&update)?;

        let existing = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::AssetNotFound(id.to_string()))?;

        let asset = Asset {
            name: non_blank(update.name.as_deref()).unwrap_or(existing.name),
            category: non_blank(update.category.as_deref()).unwrap_or(existing.category),
            sku: non_blank(update.sku.as_deref()).unwrap_or(existing.sku),
            quantity: update.quantity.unwrap_or(existing.quantity),
            condition: non_blank(update.condition.as_deref()).unwrap_or(existing.condition),
            location: non_blank(update.location.as_deref()).unwrap_or(existing.location),
            updated_at: Utc::now(),
            ..existing
        };

        debug!(id = %id, "Updating asset");

        let affected = self
            .db
            .execute(
                "UPDATE assets SET name = ?, category = ?, sku = ?, quantity = ?, \
                 asset_condition = ?, location = ?, updated_at = ? WHERE id = ?",
                params![
                    &asset.name,
                    &asset.category,
                    &asset.sku,
                    asset.quantity,
                    &asset.condition,
                    &asset.location,
                    asset.updated_at,
                    id
                ],
            )
            .await
            .map_err(|e| sku_conflict(e, &asset.sku))?;

        if affected == 0 {
            return Err(CoreError::AssetNotFound(id.to_string()).into());
        }

        Ok(asset)
    }

    /// Deletes an asset and, by cascade, its movement history.
    pub async fn delete(&self, id: &str) -> ServiceResult<()> {
        debug!(id = %id, "Deleting asset");

        let affected = self
            .db
            .execute("DELETE FROM assets WHERE id = ?", params![id])
            .await?;

        if affected == 0 {
            return Err(CoreError::AssetNotFound(id.to_string()).into());
        }

        Ok(())
    }

    /// Dashboard figures for the current month.
    pub async fn summary(&self) -> DbResult<InventorySummary> {
        self.summary_at(Utc::now()).await
    }

    /// Dashboard figures, with "this month" taken from `now`.
    pub async fn summary_at(&self, now: DateTime<Utc>) -> DbResult<InventorySummary> {
        let total = self
            .scalar("SELECT COUNT(*) AS count FROM assets", params![])
            .await?;
        let total_quantity = self
            .scalar(
                "SELECT CAST(COALESCE(SUM(quantity), 0) AS BIGINT) AS count FROM assets",
                params![],
            )
            .await?;
        let low_stock = self
            .scalar(
                "SELECT COUNT(*) AS count FROM assets WHERE quantity <= ?",
                params![LOW_STOCK_THRESHOLD],
            )
            .await?;

        let (check_in, check_out) = self
            .db
            .movements()
            .totals_between(month_start(now), None)
            .await?;

        Ok(InventorySummary {
            total,
            total_quantity,
            low_stock,
            check_in_this_month: check_in,
            check_out_this_month: check_out,
        })
    }

    /// Assets at or below the low-stock threshold, emptiest first.
    pub async fn low_stock(&self) -> DbResult<Vec<Asset>> {
        self.db
            .query_all(
                &format!(
                    "SELECT {ASSET_COLUMNS} FROM assets WHERE quantity <= ? ORDER BY quantity ASC, name ASC"
                ),
                params![LOW_STOCK_THRESHOLD],
            )
            .await
    }

    /// Distinct categories, sorted.
    pub async fn categories(&self) -> DbResult<Vec<String>> {
        self.labels("SELECT DISTINCT category AS value FROM assets ORDER BY value")
            .await
    }

    /// Distinct locations, sorted.
    pub async fn locations(&self) -> DbResult<Vec<String>> {
        self.labels("SELECT DISTINCT location AS value FROM assets ORDER BY value")
            .await
    }

    async fn labels(&self, sql: &str) -> DbResult<Vec<String>> {
        let rows: Vec<ValueRow> = self.db.query_all(sql, params![]).await?;
        Ok(rows.into_iter().map(|r| r.value).collect())
    }

    async fn scalar(&self, sql: &str, params: Vec<SqlParam>) -> DbResult<i64> {
        let row: Option<CountRow> = self.db.query_one(sql, params).await?;
        Ok(row.map(|r| r.count).unwrap_or(0))
    }

    // =========================================================================
    // Transaction-scoped helpers (ledger only)
    // =========================================================================

    /// Applies a movement's stock delta inside a transaction.
    ///
    /// Check-out only matches while enough stock remains and check-in only
    /// while the sum still fits in an i64, so the affected row count is 0
    /// when a concurrent movement got there first.
    pub(crate) async fn apply_delta(
        tx: &mut TxHandle,
        asset_id: &str,
        movement_type: MovementType,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> DbResult<u64> {
        match movement_type {
            MovementType::CheckIn => {
                tx.execute(
                    "UPDATE assets SET quantity = quantity + ?, updated_at = ? \
                     WHERE id = ? AND quantity <= ?",
                    params![quantity, now, asset_id, i64::MAX - quantity],
                )
                .await
            }
            MovementType::CheckOut => {
                tx.execute(
                    "UPDATE assets SET quantity = quantity - ?, updated_at = ? \
                     WHERE id = ? AND quantity >= ?",
                    params![quantity, now, asset_id, quantity],
                )
                .await
            }
        }
    }

    /// Current quantity as seen by the transaction.
    pub(crate) async fn quantity_in(tx: &mut TxHandle, asset_id: &str) -> DbResult<Option<i64>> {
        let row: Option<CountRow> = tx
            .query_one(
                "SELECT quantity AS count FROM assets WHERE id = ?",
                params![asset_id],
            )
            .await?;
        Ok(row.map(|r| r.count))
    }
}
