//! User repository implementation

use sqlx::PgPool;
use chrono::{DateTime, Utc};
use crate::models::user::{User, CreateUserRequest, UpdateUserRequest, UserPanelLink};
use crate::utils::errors::ShopError;

const USER_COLUMNS: &str = "id, telegram_id, username, first_name, last_name, phone, language_code, \
    is_admin, is_agent, is_active, is_blocked, wallet_balance, referral_code, referred_by, created_at, updated_at";

#[derive(Clone)]
#[derive(Debug)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new user
    pub async fn create(&self, request: CreateUserRequest) -> Result<User, ShopError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (telegram_id, username, first_name, last_name, language_code, referral_code, is_admin, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(request.telegram_id)
        .bind(request.username)
        .bind(request.first_name)
        .bind(request.last_name)
        .bind(request.language_code.unwrap_or_else(|| "fa".to_string()))
        .bind(request.referral_code)
        .bind(request.is_admin)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    /// Find user by ID
    pub async fn find_by_id(&self, id: i64) -> Result<Option<User>, ShopError> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Find user by Telegram ID
    pub async fn find_by_telegram_id(&self, telegram_id: i64) -> Result<Option<User>, ShopError> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE telegram_id = $1"))
            .bind(telegram_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Find user owning a referral code
    pub async fn find_by_referral_code(&self, code: &str) -> Result<Option<User>, ShopError> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE referral_code = $1"))
            .bind(code.trim().to_uppercase())
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    pub async fn referral_code_exists(&self, code: &str) -> Result<bool, ShopError> {
        let (exists,) = sqlx::query_as::<_, (bool,)>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE referral_code = $1)"
        )
        .bind(code)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// Update user
    pub async fn update(&self, id: i64, request: UpdateUserRequest) -> Result<User, ShopError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET username = COALESCE($2, username),
                first_name = COALESCE($3, first_name),
                last_name = COALESCE($4, last_name),
                phone = COALESCE($5, phone),
                language_code = COALESCE($6, language_code),
                is_admin = COALESCE($7, is_admin),
                is_agent = COALESCE($8, is_agent),
                is_active = COALESCE($9, is_active),
                is_blocked = COALESCE($10, is_blocked),
                updated_at = $11
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(request.username)
        .bind(request.first_name)
        .bind(request.last_name)
        .bind(request.phone)
        .bind(request.language_code)
        .bind(request.is_admin)
        .bind(request.is_agent)
        .bind(request.is_active)
        .bind(request.is_blocked)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ShopError::UserNotFound { user_id: id })?;

        Ok(user)
    }

    /// Set the referrer once; returns false if the user already had one
    pub async fn set_referred_by(&self, id: i64, referrer_id: i64) -> Result<bool, ShopError> {
        let result = sqlx::query(
            "UPDATE users SET referred_by = $2, updated_at = NOW() WHERE id = $1 AND referred_by IS NULL AND id <> $2"
        )
        .bind(id)
        .bind(referrer_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// List all users with pagination
    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, ShopError> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    /// Search by name or username, or exact Telegram id for numeric queries
    pub async fn search(&self, query: &str, limit: i64) -> Result<Vec<User>, ShopError> {
        let pattern = format!("%{}%", query.trim().trim_start_matches('@'));
        let telegram_id = query.trim().parse::<i64>().ok();

        let users = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS} FROM users
            WHERE first_name ILIKE $1
               OR last_name ILIKE $1
               OR username ILIKE $1
               OR ($2::BIGINT IS NOT NULL AND telegram_id = $2)
            ORDER BY created_at DESC
            LIMIT $3
            "#
        ))
        .bind(pattern)
        .bind(telegram_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    /// Count total users
    pub async fn count(&self) -> Result<i64, ShopError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }

    pub async fn count_active(&self) -> Result<i64, ShopError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE is_active = TRUE AND is_blocked = FALSE")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }

    pub async fn count_admins(&self) -> Result<i64, ShopError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE is_admin = TRUE")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }

    pub async fn count_created_since(&self, since: DateTime<Utc>) -> Result<i64, ShopError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE created_at >= $1")
            .bind(since)
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }

    /// Telegram ids of every admin stored in the database
    pub async fn admin_telegram_ids(&self) -> Result<Vec<i64>, ShopError> {
        let rows: Vec<(i64,)> = sqlx::query_as("SELECT telegram_id FROM users WHERE is_admin = TRUE")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Store an account provisioned on the panel
    pub async fn create_panel_link(&self, user_id: i64, order_id: Option<i64>, panel_uuid: &str, secret_uuid: &str) -> Result<UserPanelLink, ShopError> {
        let link = sqlx::query_as::<_, UserPanelLink>(
            r#"
            INSERT INTO user_panel_links (user_id, order_id, panel_uuid, secret_uuid)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, order_id, panel_uuid, secret_uuid, created_at
            "#
        )
        .bind(user_id)
        .bind(order_id)
        .bind(panel_uuid)
        .bind(secret_uuid)
        .fetch_one(&self.pool)
        .await?;

        Ok(link)
    }

    pub async fn panel_links(&self, user_id: i64) -> Result<Vec<UserPanelLink>, ShopError> {
        let links = sqlx::query_as::<_, UserPanelLink>(
            "SELECT id, user_id, order_id, panel_uuid, secret_uuid, created_at FROM user_panel_links WHERE user_id = $1 ORDER BY created_at DESC"
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(links)
    }
}
