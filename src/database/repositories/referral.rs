//! Referral repository implementation

use sqlx::PgPool;
use crate::models::referral::{Referral, ReferralStats, ReferredUser, TopReferrer};
use crate::utils::errors::ShopError;
use super::wallet::credit_in;

const REFERRAL_COLUMNS: &str = "id, referrer_id, referred_id, commission_amount, commission_status, order_id, created_at, updated_at";

#[derive(Clone, Debug)]
pub struct ReferralRepository {
    pool: PgPool,
}

impl ReferralRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a referral link; `None` if the pair already exists
    pub async fn create(&self, referrer_id: i64, referred_id: i64) -> Result<Option<Referral>, ShopError> {
        let referral = sqlx::query_as::<_, Referral>(&format!(
            r#"
            INSERT INTO referrals (referrer_id, referred_id)
            VALUES ($1, $2)
            ON CONFLICT (referrer_id, referred_id) DO NOTHING
            RETURNING {REFERRAL_COLUMNS}
            "#
        ))
        .bind(referrer_id)
        .bind(referred_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(referral)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Referral>, ShopError> {
        let referral = sqlx::query_as::<_, Referral>(&format!("SELECT {REFERRAL_COLUMNS} FROM referrals WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(referral)
    }

    /// The referral row naming `referred_id` as the invited user
    pub async fn find_by_referred(&self, referred_id: i64) -> Result<Option<Referral>, ShopError> {
        let referral = sqlx::query_as::<_, Referral>(&format!(
            "SELECT {REFERRAL_COLUMNS} FROM referrals WHERE referred_id = $1 ORDER BY created_at LIMIT 1"
        ))
        .bind(referred_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(referral)
    }

    /// Attach a commission to a referral that has none yet
    pub async fn set_commission(&self, id: i64, amount: i64, order_id: i64) -> Result<Option<Referral>, ShopError> {
        let referral = sqlx::query_as::<_, Referral>(&format!(
            r#"
            UPDATE referrals
            SET commission_amount = $2, order_id = $3, updated_at = NOW()
            WHERE id = $1 AND commission_amount = 0 AND commission_status = 'pending'
            RETURNING {REFERRAL_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(amount)
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(referral)
    }

    /// Mark a pending commission paid and credit the referrer in one transaction
    pub async fn pay_commission(&self, id: i64) -> Result<Option<Referral>, ShopError> {
        let mut tx = self.pool.begin().await?;

        let referral = sqlx::query_as::<_, Referral>(&format!(
            r#"
            UPDATE referrals
            SET commission_status = 'paid', updated_at = NOW()
            WHERE id = $1 AND commission_status = 'pending' AND commission_amount > 0
            RETURNING {REFERRAL_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(referral) = referral else {
            tx.rollback().await?;
            return Ok(None);
        };

        let description = format!("Referral commission #{}", referral.id);
        credit_in(&mut tx, referral.referrer_id, referral.commission_amount, &description, referral.order_id).await?;
        tx.commit().await?;

        Ok(Some(referral))
    }

    pub async fn stats(&self, referrer_id: i64) -> Result<ReferralStats, ShopError> {
        let (referred_count, total_commission, pending_commission): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(commission_amount) FILTER (WHERE commission_status = 'paid'), 0)::BIGINT,
                COALESCE(SUM(commission_amount) FILTER (WHERE commission_status = 'pending'), 0)::BIGINT
            FROM referrals
            WHERE referrer_id = $1
            "#
        )
        .bind(referrer_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(ReferralStats { referred_count, total_commission, pending_commission })
    }

    pub async fn referred_users(&self, referrer_id: i64, limit: i64) -> Result<Vec<ReferredUser>, ShopError> {
        let users = sqlx::query_as::<_, ReferredUser>(
            r#"
            SELECT u.id AS user_id, u.telegram_id, u.username, u.first_name, u.last_name, r.created_at AS referred_at
            FROM referrals r
            JOIN users u ON u.id = r.referred_id
            WHERE r.referrer_id = $1
            ORDER BY r.created_at DESC
            LIMIT $2
            "#
        )
        .bind(referrer_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    pub async fn pending_commissions(&self, limit: i64) -> Result<Vec<Referral>, ShopError> {
        let referrals = sqlx::query_as::<_, Referral>(&format!(
            "SELECT {REFERRAL_COLUMNS} FROM referrals WHERE commission_status = 'pending' AND commission_amount > 0 \
             ORDER BY created_at LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(referrals)
    }

    pub async fn top_referrers(&self, limit: i64) -> Result<Vec<TopReferrer>, ShopError> {
        let rows = sqlx::query_as::<_, TopReferrer>(
            r#"
            SELECT
                u.id AS user_id,
                u.telegram_id,
                u.username,
                u.first_name,
                COUNT(r.id) AS referral_count,
                COALESCE(SUM(r.commission_amount), 0)::BIGINT AS total_commission
            FROM users u
            JOIN referrals r ON r.referrer_id = u.id
            GROUP BY u.id, u.telegram_id, u.username, u.first_name
            ORDER BY referral_count DESC, total_commission DESC
            LIMIT $1
            "#
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
