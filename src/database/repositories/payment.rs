//! Payment repository implementation

use sqlx::PgPool;
use chrono::{DateTime, Utc};
use crate::models::payment::{Payment, CreatePaymentRequest, PaymentStatus};
use crate::utils::errors::ShopError;
use crate::utils::helpers::generate_transaction_id;
use super::wallet::{credit_in, PAYMENT_COLUMNS};

#[derive(Clone, Debug)]
pub struct PaymentRepository {
    pool: PgPool,
}

/// Successful non-wallet payments in a time window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaymentWindowTotals {
    pub success_count: i64,
    pub success_amount: i64,
    pub all_count: i64,
}

impl PaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, request: CreatePaymentRequest) -> Result<Payment, ShopError> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            r#"
            INSERT INTO payments (user_id, order_id, amount, currency, payment_method, payment_gateway, transaction_id, status, description)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(request.user_id)
        .bind(request.order_id)
        .bind(request.amount)
        .bind(request.currency)
        .bind(request.payment_method.as_str())
        .bind(request.payment_gateway)
        .bind(generate_transaction_id())
        .bind(request.status.as_str())
        .bind(request.description)
        .fetch_one(&self.pool)
        .await?;

        Ok(payment)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Payment>, ShopError> {
        let payment = sqlx::query_as::<_, Payment>(&format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(payment)
    }

    pub async fn find_by_transaction_id(&self, transaction_id: &str) -> Result<Option<Payment>, ShopError> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE transaction_id = $1"
        ))
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(payment)
    }

    /// Move a pending payment to `status`.
    ///
    /// Returns `None` when the payment is no longer pending, so a repeated
    /// confirmation cannot apply twice.
    pub async fn transition_from_pending(
        &self,
        id: i64,
        status: PaymentStatus,
        transaction_id: Option<&str>,
        authority: Option<&str>,
    ) -> Result<Option<Payment>, ShopError> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            r#"
            UPDATE payments
            SET status = $2,
                transaction_id = COALESCE($3, transaction_id),
                authority = COALESCE($4, authority),
                updated_at = $5
            WHERE id = $1 AND status = 'pending'
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status.as_str())
        .bind(transaction_id)
        .bind(authority)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(payment)
    }

    /// Approve a pending top-up and credit the wallet in one transaction
    pub async fn approve_topup(&self, id: i64) -> Result<Option<Payment>, ShopError> {
        let mut tx = self.pool.begin().await?;

        let payment = sqlx::query_as::<_, Payment>(&format!(
            "UPDATE payments SET status = 'success', updated_at = NOW() \
             WHERE id = $1 AND status = 'pending' AND order_id IS NULL RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(payment) = payment else {
            tx.rollback().await?;
            return Ok(None);
        };

        let description = format!("Top-up #{}", payment.id);
        credit_in(&mut tx, payment.user_id, payment.amount, &description, None).await?;
        tx.commit().await?;

        Ok(Some(payment))
    }

    pub async fn list_by_user(&self, user_id: i64, limit: i64, offset: i64) -> Result<Vec<Payment>, ShopError> {
        let payments = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE user_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    /// Pending payments awaiting admin review, oldest first
    pub async fn list_pending(&self, limit: i64) -> Result<Vec<Payment>, ShopError> {
        let payments = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE status = 'pending' ORDER BY created_at, id LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    pub async fn count_by_status(&self) -> Result<Vec<(String, i64)>, ShopError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM payments WHERE payment_method <> 'wallet' GROUP BY status"
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Totals over money received from outside the wallet since `since`
    pub async fn window_totals(&self, since: DateTime<Utc>) -> Result<PaymentWindowTotals, ShopError> {
        let (success_count, success_amount, all_count): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'success'),
                COALESCE(SUM(amount) FILTER (WHERE status = 'success'), 0)::BIGINT,
                COUNT(*)
            FROM payments
            WHERE payment_method <> 'wallet' AND created_at >= $1
            "#
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(PaymentWindowTotals { success_count, success_amount, all_count })
    }
}
