//! Referral ledger model

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

text_enum!(
    CommissionStatus {
        Pending => "pending",
        Paid => "paid",
    }
);

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Referral {
    pub id: i64,
    pub referrer_id: i64,
    pub referred_id: i64,
    pub commission_amount: i64,
    pub commission_status: String,
    pub order_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Aggregate numbers shown on a user's referral page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralStats {
    pub referred_count: i64,
    pub total_commission: i64,
    pub pending_commission: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ReferredUser {
    pub user_id: i64,
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub referred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TopReferrer {
    pub user_id: i64,
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub referral_count: i64,
    pub total_commission: i64,
}
