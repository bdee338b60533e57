//! # Pooled Client Store
//!
//! PostgreSQL behind a bounded pool. Callers wait at most `acquire_timeout`
//! for a connection, then fail with [`DbError::PoolExhausted`]. There is no
//! implicit flush: the server owns durability.

use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;

use super::{bind_params, Backend, DbConfig, Record, SqlParam};
use crate::error::{DbError, DbResult};
use crate::schema;

/// Rewrites `?` placeholders to PostgreSQL's `$1..$n`.
///
/// Question marks inside single-quoted literals are left alone.
pub fn to_postgres(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut index = 0;
    let mut in_literal = false;

    for c in sql.chars() {
        match c {
            '\'' => {
                in_literal = !in_literal;
                out.push(c);
            }
            '?' if !in_literal => {
                index += 1;
                out.push('$');
                out.push_str(&index.to_string());
            }
            _ => out.push(c),
        }
    }

    out
}

#[derive(Debug, Clone)]
pub struct PooledStore {
    pool: PgPool,
}

impl PooledStore {
    /// Connects the pool and creates the schema if absent.
    pub async fn connect(config: &DbConfig) -> DbResult<Self> {
        let Backend::Pooled { url } = &config.backend else {
            return Err(DbError::ConnectionFailed(
                "pooled store needs a database URL".to_string(),
            ));
        };

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(url)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        for statement in schema::POSTGRES_SCHEMA {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .map_err(|e| DbError::SchemaFailed(e.to_string()))?;
        }

        info!(max_connections = config.max_connections, "PostgreSQL pool ready");
        Ok(PooledStore { pool })
    }

    pub async fn query_all<T: Record>(&self, sql: &str, params: Vec<SqlParam>) -> DbResult<Vec<T>> {
        let sql = to_postgres(sql);
        let rows = bind_params!(sqlx::query_as::<_, T>(&sql), params)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn query_one<T: Record>(
        &self,
        sql: &str,
        params: Vec<SqlParam>,
    ) -> DbResult<Option<T>> {
        let sql = to_postgres(sql);
        let row = bind_params!(sqlx::query_as::<_, T>(&sql), params)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn execute(&self, sql: &str, params: Vec<SqlParam>) -> DbResult<u64> {
        let sql = to_postgres(sql);
        let affected = bind_params!(sqlx::query(&sql), params)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected)
    }

    /// Acquires one connection and issues BEGIN. The connection returns to
    /// the pool when the transaction is committed, rolled back or dropped.
    pub(crate) async fn begin(&self) -> DbResult<Transaction<'static, Postgres>> {
        Ok(self.pool.begin().await?)
    }

    pub async fn shutdown(&self) {
        self.pool.close().await;
        info!("PostgreSQL pool closed");
    }

    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrites_placeholders_in_order() {
        assert_eq!(
            to_postgres("UPDATE assets SET quantity = quantity - ? WHERE id = ? AND quantity >= ?"),
            "UPDATE assets SET quantity = quantity - $1 WHERE id = $2 AND quantity >= $3"
        );
    }

    #[test]
    fn test_leaves_quoted_question_marks() {
        assert_eq!(
            to_postgres("SELECT * FROM transactions WHERE note = 'why?' AND id = ?"),
            "SELECT * FROM transactions WHERE note = 'why?' AND id = $1"
        );
    }

    #[test]
    fn test_no_placeholders_is_unchanged() {
        let sql = "SELECT COUNT(*) AS count FROM users";
        assert_eq!(to_postgres(sql), sql);
    }
}
