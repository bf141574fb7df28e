//! User model

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub language_code: String,
    pub is_admin: bool,
    pub is_agent: bool,
    pub is_active: bool,
    pub is_blocked: bool,
    pub wallet_balance: i64,
    pub referral_code: String,
    pub referred_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn display_name(&self) -> String {
        crate::utils::helpers::display_name(
            self.first_name.as_deref(),
            self.last_name.as_deref(),
            self.username.as_deref(),
            self.telegram_id,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub language_code: Option<String>,
    pub referral_code: String,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub language_code: Option<String>,
    pub is_admin: Option<bool>,
    pub is_agent: Option<bool>,
    pub is_active: Option<bool>,
    pub is_blocked: Option<bool>,
}

/// Account provisioned on the panel for a bot user
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserPanelLink {
    pub id: i64,
    pub user_id: i64,
    pub order_id: Option<i64>,
    pub panel_uuid: String,
    pub secret_uuid: String,
    pub created_at: DateTime<Utc>,
}
