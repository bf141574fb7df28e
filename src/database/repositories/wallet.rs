//! Wallet ledger operations
//!
//! Every balance change is paired with a `payments` row of method `wallet`
//! inside the same transaction. Debits lock the user row first so concurrent
//! purchases cannot overdraw the balance.

use sqlx::{PgConnection, PgPool};
use crate::models::payment::Payment;
use crate::utils::errors::ShopError;
use crate::utils::helpers::generate_transaction_id;

pub(crate) const PAYMENT_COLUMNS: &str = "id, user_id, order_id, amount, currency, payment_method, payment_gateway, \
    transaction_id, authority, status, description, created_at, updated_at";

#[derive(Clone, Debug)]
pub struct WalletRepository {
    pool: PgPool,
}

impl WalletRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn balance(&self, user_id: i64) -> Result<i64, ShopError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT wallet_balance FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|(balance,)| balance)
            .ok_or(ShopError::UserNotFound { user_id })
    }

    /// Add funds and record the ledger row
    pub async fn credit(&self, user_id: i64, amount: i64, description: &str, order_id: Option<i64>) -> Result<Payment, ShopError> {
        let mut tx = self.pool.begin().await?;
        let entry = credit_in(&mut tx, user_id, amount, description, order_id).await?;
        tx.commit().await?;
        Ok(entry)
    }

    /// Remove funds if the balance covers them
    pub async fn debit(&self, user_id: i64, amount: i64, description: &str, order_id: Option<i64>) -> Result<Payment, ShopError> {
        let mut tx = self.pool.begin().await?;
        let entry = debit_in(&mut tx, user_id, amount, description, order_id).await?;
        tx.commit().await?;
        Ok(entry)
    }

    /// Move funds between two users atomically
    pub async fn transfer(&self, from_user: i64, to_user: i64, amount: i64, description: &str) -> Result<(Payment, Payment), ShopError> {
        if from_user == to_user {
            return Err(ShopError::InvalidInput("cannot transfer to the same wallet".to_string()));
        }

        let mut tx = self.pool.begin().await?;
        let out = debit_in(&mut tx, from_user, amount, description, None).await?;
        let incoming = credit_in(&mut tx, to_user, amount, description, None).await?;
        tx.commit().await?;

        Ok((out, incoming))
    }

    /// Overwrite the balance, clamped at zero, recording the delta
    pub async fn set_balance(&self, user_id: i64, new_balance: i64, description: &str) -> Result<Option<Payment>, ShopError> {
        let target = new_balance.max(0);
        let mut tx = self.pool.begin().await?;
        let current = lock_balance(&mut tx, user_id).await?;
        let delta = target - current;

        if delta == 0 {
            tx.commit().await?;
            return Ok(None);
        }

        sqlx::query("UPDATE users SET wallet_balance = $2, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .bind(target)
            .execute(&mut *tx)
            .await?;
        let entry = insert_ledger_row(&mut tx, user_id, delta, description, None).await?;
        tx.commit().await?;

        Ok(Some(entry))
    }

    /// Wallet ledger rows for a user, newest first
    pub async fn history(&self, user_id: i64, limit: i64, offset: i64) -> Result<Vec<Payment>, ShopError> {
        let rows = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE user_id = $1 AND payment_method = 'wallet' \
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

async fn lock_balance(conn: &mut PgConnection, user_id: i64) -> Result<i64, ShopError> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT wallet_balance FROM users WHERE id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

    row.map(|(balance,)| balance)
        .ok_or(ShopError::UserNotFound { user_id })
}

async fn insert_ledger_row(conn: &mut PgConnection, user_id: i64, amount: i64, description: &str, order_id: Option<i64>) -> Result<Payment, ShopError> {
    let entry = sqlx::query_as::<_, Payment>(&format!(
        r#"
        INSERT INTO payments (user_id, order_id, amount, payment_method, transaction_id, status, description)
        VALUES ($1, $2, $3, 'wallet', $4, 'success', $5)
        RETURNING {PAYMENT_COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(order_id)
    .bind(amount)
    .bind(generate_transaction_id())
    .bind(description)
    .fetch_one(&mut *conn)
    .await?;

    Ok(entry)
}

/// Credit inside a caller-owned transaction
pub(crate) async fn credit_in(conn: &mut PgConnection, user_id: i64, amount: i64, description: &str, order_id: Option<i64>) -> Result<Payment, ShopError> {
    if amount <= 0 {
        return Err(ShopError::InvalidAmount(format!("credit amount must be positive, got {}", amount)));
    }

    let updated = sqlx::query("UPDATE users SET wallet_balance = wallet_balance + $2, updated_at = NOW() WHERE id = $1")
        .bind(user_id)
        .bind(amount)
        .execute(&mut *conn)
        .await?;
    if updated.rows_affected() == 0 {
        return Err(ShopError::UserNotFound { user_id });
    }

    insert_ledger_row(conn, user_id, amount, description, order_id).await
}

/// Debit inside a caller-owned transaction
pub(crate) async fn debit_in(conn: &mut PgConnection, user_id: i64, amount: i64, description: &str, order_id: Option<i64>) -> Result<Payment, ShopError> {
    if amount <= 0 {
        return Err(ShopError::InvalidAmount(format!("debit amount must be positive, got {}", amount)));
    }

    let balance = lock_balance(conn, user_id).await?;
    if balance < amount {
        return Err(ShopError::InsufficientBalance { balance, required: amount });
    }

    sqlx::query("UPDATE users SET wallet_balance = wallet_balance - $2, updated_at = NOW() WHERE id = $1")
        .bind(user_id)
        .bind(amount)
        .execute(&mut *conn)
        .await?;

    insert_ledger_row(conn, user_id, -amount, description, order_id).await
}
