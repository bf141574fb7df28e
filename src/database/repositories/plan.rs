//! Plan repository implementation

use sqlx::PgPool;
use chrono::Utc;
use crate::models::plan::{Plan, CreatePlanRequest, UpdatePlanRequest};
use crate::utils::errors::ShopError;

const PLAN_COLUMNS: &str = "id, name, description, days, traffic_gb, price, panel_mode, product_name, \
    max_ips, monthly_package, is_active, sort_order, created_at, updated_at";

#[derive(Clone, Debug)]
pub struct PlanRepository {
    pool: PgPool,
}

impl PlanRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, request: CreatePlanRequest) -> Result<Plan, ShopError> {
        let plan = sqlx::query_as::<_, Plan>(&format!(
            r#"
            INSERT INTO plans (name, description, days, traffic_gb, price, panel_mode, product_name, max_ips, monthly_package, sort_order)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {PLAN_COLUMNS}
            "#
        ))
        .bind(request.name)
        .bind(request.description)
        .bind(request.days)
        .bind(request.traffic_gb)
        .bind(request.price)
        .bind(request.panel_mode.unwrap_or_else(|| "no_reset".to_string()))
        .bind(request.product_name)
        .bind(request.max_ips.unwrap_or(1))
        .bind(request.monthly_package)
        .bind(request.sort_order.unwrap_or(0))
        .fetch_one(&self.pool)
        .await?;

        Ok(plan)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Plan>, ShopError> {
        let plan = sqlx::query_as::<_, Plan>(&format!("SELECT {PLAN_COLUMNS} FROM plans WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(plan)
    }

    /// Plans visible in the shop
    pub async fn list_active(&self) -> Result<Vec<Plan>, ShopError> {
        let plans = sqlx::query_as::<_, Plan>(&format!(
            "SELECT {PLAN_COLUMNS} FROM plans WHERE is_active = TRUE ORDER BY sort_order, price, id"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(plans)
    }

    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Plan>, ShopError> {
        let plans = sqlx::query_as::<_, Plan>(&format!(
            "SELECT {PLAN_COLUMNS} FROM plans ORDER BY sort_order, id LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(plans)
    }

    pub async fn update(&self, id: i64, request: UpdatePlanRequest) -> Result<Option<Plan>, ShopError> {
        let plan = sqlx::query_as::<_, Plan>(&format!(
            r#"
            UPDATE plans
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                days = COALESCE($4, days),
                traffic_gb = COALESCE($5, traffic_gb),
                price = COALESCE($6, price),
                panel_mode = COALESCE($7, panel_mode),
                product_name = COALESCE($8, product_name),
                max_ips = COALESCE($9, max_ips),
                monthly_package = COALESCE($10, monthly_package),
                is_active = COALESCE($11, is_active),
                sort_order = COALESCE($12, sort_order),
                updated_at = $13
            WHERE id = $1
            RETURNING {PLAN_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(request.name)
        .bind(request.description)
        .bind(request.days)
        .bind(request.traffic_gb)
        .bind(request.price)
        .bind(request.panel_mode)
        .bind(request.product_name)
        .bind(request.max_ips)
        .bind(request.monthly_package)
        .bind(request.is_active)
        .bind(request.sort_order)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(plan)
    }

    pub async fn toggle_active(&self, id: i64) -> Result<Option<Plan>, ShopError> {
        let plan = sqlx::query_as::<_, Plan>(&format!(
            "UPDATE plans SET is_active = NOT is_active, updated_at = NOW() WHERE id = $1 RETURNING {PLAN_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(plan)
    }

    pub async fn delete(&self, id: i64) -> Result<bool, ShopError> {
        let result = sqlx::query("DELETE FROM plans WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn count(&self) -> Result<i64, ShopError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM plans")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }

    pub async fn count_active(&self) -> Result<i64, ShopError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM plans WHERE is_active = TRUE")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }
}
