//! Discount code repository implementation

use sqlx::PgPool;
use crate::models::discount::{DiscountCode, CreateDiscountRequest, UpdateDiscountRequest};
use crate::utils::errors::ShopError;

const DISCOUNT_COLUMNS: &str = "id, code, description, discount_type, discount_value, max_uses, used_count, \
    valid_from, valid_until, is_active, created_at, updated_at";

#[derive(Clone, Debug)]
pub struct DiscountRepository {
    pool: PgPool,
}

impl DiscountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a code; `None` if the code is already taken
    pub async fn create(&self, request: CreateDiscountRequest) -> Result<Option<DiscountCode>, ShopError> {
        let code = sqlx::query_as::<_, DiscountCode>(&format!(
            r#"
            INSERT INTO discount_codes (code, description, discount_type, discount_value, max_uses, valid_from, valid_until)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (code) DO NOTHING
            RETURNING {DISCOUNT_COLUMNS}
            "#
        ))
        .bind(request.code.to_uppercase())
        .bind(request.description)
        .bind(request.discount_type.as_str())
        .bind(request.discount_value)
        .bind(request.max_uses)
        .bind(request.valid_from)
        .bind(request.valid_until)
        .fetch_optional(&self.pool)
        .await?;

        Ok(code)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<DiscountCode>, ShopError> {
        let code = sqlx::query_as::<_, DiscountCode>(&format!("SELECT {DISCOUNT_COLUMNS} FROM discount_codes WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(code)
    }

    pub async fn find_by_code(&self, code: &str) -> Result<Option<DiscountCode>, ShopError> {
        let code = sqlx::query_as::<_, DiscountCode>(&format!(
            "SELECT {DISCOUNT_COLUMNS} FROM discount_codes WHERE code = $1"
        ))
        .bind(code.trim().to_uppercase())
        .fetch_optional(&self.pool)
        .await?;

        Ok(code)
    }

    /// Count one use, unless the code ran out in the meantime
    pub async fn increment_use(&self, id: i64) -> Result<bool, ShopError> {
        let result = sqlx::query(
            r#"
            UPDATE discount_codes
            SET used_count = used_count + 1, updated_at = NOW()
            WHERE id = $1 AND is_active = TRUE AND (max_uses = 0 OR used_count < max_uses)
            "#
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Give back a use counted for an order that did not go through
    pub async fn release_use_by_code(&self, code: &str) -> Result<bool, ShopError> {
        let result = sqlx::query(
            r#"
            UPDATE discount_codes
            SET used_count = used_count - 1, updated_at = NOW()
            WHERE code = $1 AND used_count > 0
            "#
        )
        .bind(code.trim().to_uppercase())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn update(&self, id: i64, request: UpdateDiscountRequest) -> Result<Option<DiscountCode>, ShopError> {
        let code = sqlx::query_as::<_, DiscountCode>(&format!(
            r#"
            UPDATE discount_codes
            SET code = COALESCE($2, code),
                description = COALESCE($3, description),
                discount_type = COALESCE($4, discount_type),
                discount_value = COALESCE($5, discount_value),
                max_uses = COALESCE($6, max_uses),
                valid_from = COALESCE($7, valid_from),
                valid_until = COALESCE($8, valid_until),
                is_active = COALESCE($9, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {DISCOUNT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(request.code.map(|c| c.to_uppercase()))
        .bind(request.description)
        .bind(request.discount_type.map(|t| t.as_str()))
        .bind(request.discount_value)
        .bind(request.max_uses)
        .bind(request.valid_from)
        .bind(request.valid_until)
        .bind(request.is_active)
        .fetch_optional(&self.pool)
        .await?;

        Ok(code)
    }

    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<DiscountCode>, ShopError> {
        let codes = sqlx::query_as::<_, DiscountCode>(&format!(
            "SELECT {DISCOUNT_COLUMNS} FROM discount_codes ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(codes)
    }

    pub async fn count(&self) -> Result<i64, ShopError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM discount_codes")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }

    pub async fn toggle_active(&self, id: i64) -> Result<Option<DiscountCode>, ShopError> {
        let code = sqlx::query_as::<_, DiscountCode>(&format!(
            "UPDATE discount_codes SET is_active = NOT is_active, updated_at = NOW() WHERE id = $1 RETURNING {DISCOUNT_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(code)
    }

    pub async fn delete(&self, id: i64) -> Result<bool, ShopError> {
        let result = sqlx::query("DELETE FROM discount_codes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
