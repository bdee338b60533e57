//! # Movement Repository
//!
//! Read access to the movement history (table `transactions`) plus the
//! insert the ledger performs inside its transaction. Movements are never
//! updated or deleted one by one; they only disappear with their asset.

use chrono::{DateTime, Utc};
use tracing::debug;

use inventrack_core::period::month_windows;
use inventrack_core::{Movement, MovementFilter, MovementType, MonthlyMovement};

use super::{like_pattern, CountRow};
use crate::engine::{Database, SqlParam, TxHandle};
use crate::error::DbResult;
use crate::params;

pub(crate) const MOVEMENT_COLUMNS: &str =
    "id, asset_id, asset_name, movement_type, quantity, user_id, user_name, note, created_at";

/// Per-type quantity total within a time range.
#[derive(Debug, sqlx::FromRow)]
struct TypeTotalRow {
    movement_type: String,
    total: i64,
}

/// Repository for movement history.
#[derive(Debug, Clone)]
pub struct MovementRepository {
    db: Database,
}

impl MovementRepository {
    /// Creates a new MovementRepository.
    pub fn new(db: Database) -> Self {
        MovementRepository { db }
    }

    /// Lists movements, newest first.
    ///
    /// `search` matches asset name, user name or note (case-insensitive).
    pub async fn list(&self, filter: &MovementFilter) -> DbResult<Vec<Movement>> {
        let mut sql = format!("SELECT {MOVEMENT_COLUMNS} FROM transactions WHERE 1=1");
        let mut params: Vec<SqlParam> = Vec::new();

        if let Some(kind) = filter.movement_type {
            sql.push_str(" AND movement_type = ?");
            params.push(kind.as_str().into());
        }
        if let Some(pattern) = like_pattern(filter.search.as_deref()) {
            sql.push_str(
                " AND (LOWER(asset_name) LIKE ? OR LOWER(user_name) LIKE ? \
                 OR LOWER(COALESCE(note, '')) LIKE ?)",
            );
            params.extend(std::iter::repeat(SqlParam::from(pattern)).take(3));
        }
        sql.push_str(" ORDER BY created_at DESC");

        let movements: Vec<Movement> = self.db.query_all(&sql, params).await?;
        debug!(count = movements.len(), "Listed movements");
        Ok(movements)
    }

    /// History of one asset, newest first.
    pub async fn list_for_asset(&self, asset_id: &str) -> DbResult<Vec<Movement>> {
        self.db
            .query_all(
                &format!(
                    "SELECT {MOVEMENT_COLUMNS} FROM transactions WHERE asset_id = ? ORDER BY created_at DESC"
                ),
                params![asset_id],
            )
            .await
    }

    pub async fn count_for_asset(&self, asset_id: &str) -> DbResult<i64> {
        let row: Option<CountRow> = self
            .db
            .query_one(
                "SELECT COUNT(*) AS count FROM transactions WHERE asset_id = ?",
                params![asset_id],
            )
            .await?;
        Ok(row.map(|r| r.count).unwrap_or(0))
    }

    /// Check-in and check-out totals for `[start, end)`; `end = None` means
    /// open-ended.
    pub async fn totals_between(
        &self,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> DbResult<(i64, i64)> {
        let mut sql = String::from(
            "SELECT movement_type, CAST(COALESCE(SUM(quantity), 0) AS BIGINT) AS total \
             FROM transactions WHERE created_at >= ?",
        );
        let mut params = params![start];
        if let Some(end) = end {
            sql.push_str(" AND created_at < ?");
            params.push(end.into());
        }
        sql.push_str(" GROUP BY movement_type");

        let rows: Vec<TypeTotalRow> = self.db.query_all(&sql, params).await?;

        let mut check_in = 0;
        let mut check_out = 0;
        for row in rows {
            match row.movement_type.parse::<MovementType>() {
                Ok(MovementType::CheckIn) => check_in += row.total,
                Ok(MovementType::CheckOut) => check_out += row.total,
                Err(_) => debug!(movement_type = %row.movement_type, "Ignoring unknown movement type"),
            }
        }
        Ok((check_in, check_out))
    }

    /// Per-month totals for the last `months` calendar months, oldest first.
    pub async fn monthly_stats(&self, months: u32) -> DbResult<Vec<MonthlyMovement>> {
        self.monthly_stats_at(Utc::now(), months).await
    }

    /// [`monthly_stats`](Self::monthly_stats) relative to `now`.
    pub async fn monthly_stats_at(
        &self,
        now: DateTime<Utc>,
        months: u32,
    ) -> DbResult<Vec<MonthlyMovement>> {
        let mut stats = Vec::with_capacity(months as usize);
        for window in month_windows(now, months) {
            let (check_in, check_out) = self.totals_between(window.start, Some(window.end)).await?;
            stats.push(MonthlyMovement {
                label: window.label,
                check_in,
                check_out,
            });
        }
        Ok(stats)
    }

    /// Inserts a movement. Only the ledger calls this, inside its
    /// transaction, together with the stock delta.
    pub(crate) async fn insert(tx: &mut TxHandle, movement: &Movement) -> DbResult<()> {
        debug!(
            asset_id = %movement.asset_id,
            movement_type = %movement.movement_type,
            quantity = movement.quantity,
            "Inserting movement"
        );

        tx.execute(
            &format!(
                "INSERT INTO transactions ({MOVEMENT_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"
            ),
            params![
                &movement.id,
                &movement.asset_id,
                &movement.asset_name,
                movement.movement_type.as_str(),
                movement.quantity,
                &movement.user_id,
                &movement.user_name,
                movement.note.clone(),
                movement.created_at
            ],
        )
        .await?;

        Ok(())
    }
}
