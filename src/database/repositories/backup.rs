//! Whole-database snapshot queries used by the backup service

use sqlx::PgPool;
use crate::utils::errors::ShopError;

/// Tables in foreign-key order: parents before children
pub const BACKUP_TABLES: [&str; 8] = [
    "users",
    "plans",
    "orders",
    "payments",
    "user_panel_links",
    "referrals",
    "discount_codes",
    "agent_requests",
];

#[derive(Clone, Debug)]
pub struct BackupRepository {
    pool: PgPool,
}

impl BackupRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Rows of every backed-up table as JSON arrays, read from one snapshot
    pub async fn dump_tables(&self) -> Result<Vec<(String, serde_json::Value)>, ShopError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let mut tables = Vec::with_capacity(BACKUP_TABLES.len());
        for table in BACKUP_TABLES {
            let (rows,): (serde_json::Value,) = sqlx::query_as(&format!(
                "SELECT COALESCE(json_agg(t ORDER BY t.id), '[]'::json) FROM {table} t"
            ))
            .fetch_one(&mut *tx)
            .await?;
            tables.push((table.to_string(), rows));
        }

        tx.commit().await?;
        Ok(tables)
    }

    /// Replace the contents of every table with the given rows
    pub async fn restore_tables(&self, tables: &[(String, serde_json::Value)]) -> Result<u64, ShopError> {
        for (table, _) in tables {
            ensure_known_table(table)?;
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!("TRUNCATE {} RESTART IDENTITY CASCADE", BACKUP_TABLES.join(", ")))
            .execute(&mut *tx)
            .await?;

        // users.referred_by points at users, so self references are restored in a second pass
        let mut restored = 0;
        for table in BACKUP_TABLES {
            let Some((_, rows)) = tables.iter().find(|(name, _)| name == table) else {
                continue;
            };

            let result = if table == "users" {
                sqlx::query(
                    "INSERT INTO users SELECT * FROM jsonb_populate_recordset(NULL::users, \
                     (SELECT jsonb_agg(jsonb_set(e, '{referred_by}', 'null'::jsonb)) FROM jsonb_array_elements($1) e))"
                )
                .bind(rows)
                .execute(&mut *tx)
                .await?
            } else {
                sqlx::query(&format!("INSERT INTO {table} SELECT * FROM jsonb_populate_recordset(NULL::{table}, $1)"))
                    .bind(rows)
                    .execute(&mut *tx)
                    .await?
            };
            restored += result.rows_affected();

            if table == "users" {
                sqlx::query(
                    "UPDATE users u SET referred_by = (e->>'referred_by')::BIGINT \
                     FROM jsonb_array_elements($1) e WHERE u.id = (e->>'id')::BIGINT AND e->>'referred_by' IS NOT NULL"
                )
                .bind(rows)
                .execute(&mut *tx)
                .await?;
            }

            sqlx::query(&format!(
                "SELECT setval(pg_get_serial_sequence('{table}', 'id'), COALESCE((SELECT MAX(id) FROM {table}), 0) + 1, false)"
            ))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(restored)
    }
}

fn ensure_known_table(table: &str) -> Result<(), ShopError> {
    if BACKUP_TABLES.contains(&table) {
        Ok(())
    } else {
        Err(ShopError::InvalidInput(format!("unknown table in backup: {}", table)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_known_tables_accepted() {
        assert!(ensure_known_table("users").is_ok());
        assert!(ensure_known_table("users; DROP TABLE users").is_err());
    }
}
