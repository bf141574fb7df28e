//! Order repository implementation

use sqlx::PgPool;
use chrono::{DateTime, Utc};
use crate::models::order::{Order, CreateOrderRequest, OrderStatus};
use crate::utils::errors::ShopError;

const ORDER_COLUMNS: &str = "id, user_id, plan_id, plan_name, days, traffic_gb, price, discount_code, \
    discount_amount, final_price, status, panel_uuid, secret_uuid, created_at, updated_at";

#[derive(Clone, Debug)]
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, request: CreateOrderRequest) -> Result<Order, ShopError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            r#"
            INSERT INTO orders (user_id, plan_id, plan_name, days, traffic_gb, price, discount_code, discount_amount, final_price, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'pending')
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(request.user_id)
        .bind(request.plan_id)
        .bind(request.plan_name)
        .bind(request.days)
        .bind(request.traffic_gb)
        .bind(request.price)
        .bind(request.discount_code)
        .bind(request.discount_amount)
        .bind(request.final_price)
        .fetch_one(&self.pool)
        .await?;

        Ok(order)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Order>, ShopError> {
        let order = sqlx::query_as::<_, Order>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(order)
    }

    pub async fn set_status(&self, id: i64, status: OrderStatus) -> Result<Order, ShopError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "UPDATE orders SET status = $2, updated_at = $3 WHERE id = $1 RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id)
        .bind(status.as_str())
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ShopError::OrderNotFound { order_id: id })?;

        Ok(order)
    }

    /// Mark an order delivered with the panel account created for it
    pub async fn mark_completed(&self, id: i64, panel_uuid: &str, secret_uuid: &str) -> Result<Order, ShopError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            r#"
            UPDATE orders
            SET status = 'completed', panel_uuid = $2, secret_uuid = $3, updated_at = $4
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(panel_uuid)
        .bind(secret_uuid)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ShopError::OrderNotFound { order_id: id })?;

        Ok(order)
    }

    pub async fn list_by_user(&self, user_id: i64, limit: i64) -> Result<Vec<Order>, ShopError> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2"
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    pub async fn count(&self) -> Result<i64, ShopError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }

    pub async fn count_by_user(&self, user_id: i64) -> Result<i64, ShopError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE user_id = $1 AND status = 'completed'")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }

    pub async fn count_since(&self, since: DateTime<Utc>) -> Result<i64, ShopError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE created_at >= $1")
            .bind(since)
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }

    /// Sum of final prices of completed orders created since `since`
    pub async fn revenue_since(&self, since: Option<DateTime<Utc>>) -> Result<i64, ShopError> {
        let (total,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(SUM(final_price), 0)::BIGINT FROM orders \
             WHERE status = 'completed' AND ($1::TIMESTAMPTZ IS NULL OR created_at >= $1)"
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }
}
