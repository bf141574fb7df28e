//! Agent request repository implementation

use sqlx::PgPool;
use crate::models::agent_request::{AgentRequest, CreateAgentRequest};
use crate::utils::errors::ShopError;

const AGENT_REQUEST_COLUMNS: &str = "id, user_id, full_name, phone, email, address, experience, status, \
    rejection_reason, created_at, updated_at";

#[derive(Clone, Debug)]
pub struct AgentRequestRepository {
    pool: PgPool,
}

impl AgentRequestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, request: CreateAgentRequest) -> Result<AgentRequest, ShopError> {
        let row = sqlx::query_as::<_, AgentRequest>(&format!(
            r#"
            INSERT INTO agent_requests (user_id, full_name, phone, email, address, experience)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {AGENT_REQUEST_COLUMNS}
            "#
        ))
        .bind(request.user_id)
        .bind(request.full_name)
        .bind(request.phone)
        .bind(request.email)
        .bind(request.address)
        .bind(request.experience)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<AgentRequest>, ShopError> {
        let row = sqlx::query_as::<_, AgentRequest>(&format!(
            "SELECT {AGENT_REQUEST_COLUMNS} FROM agent_requests WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Most recent request of a user
    pub async fn find_latest_by_user(&self, user_id: i64) -> Result<Option<AgentRequest>, ShopError> {
        let row = sqlx::query_as::<_, AgentRequest>(&format!(
            "SELECT {AGENT_REQUEST_COLUMNS} FROM agent_requests WHERE user_id = $1 ORDER BY created_at DESC, id DESC LIMIT 1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn list_pending(&self, limit: i64) -> Result<Vec<AgentRequest>, ShopError> {
        let rows = sqlx::query_as::<_, AgentRequest>(&format!(
            "SELECT {AGENT_REQUEST_COLUMNS} FROM agent_requests WHERE status = 'pending' ORDER BY created_at LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn count_by_status(&self) -> Result<Vec<(String, i64)>, ShopError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM agent_requests GROUP BY status"
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Approve a pending request and flag the user as agent
    pub async fn approve(&self, id: i64) -> Result<Option<AgentRequest>, ShopError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, AgentRequest>(&format!(
            "UPDATE agent_requests SET status = 'approved', updated_at = NOW() \
             WHERE id = $1 AND status = 'pending' RETURNING {AGENT_REQUEST_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query("UPDATE users SET is_agent = TRUE, updated_at = NOW() WHERE id = $1")
            .bind(row.user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(row))
    }

    pub async fn reject(&self, id: i64, reason: &str) -> Result<Option<AgentRequest>, ShopError> {
        let row = sqlx::query_as::<_, AgentRequest>(&format!(
            "UPDATE agent_requests SET status = 'rejected', rejection_reason = $2, updated_at = NOW() \
             WHERE id = $1 AND status = 'pending' RETURNING {AGENT_REQUEST_COLUMNS}"
        ))
        .bind(id)
        .bind(reason)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }
}
