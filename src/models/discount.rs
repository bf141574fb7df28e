//! Discount code model

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

text_enum!(
    DiscountType {
        Percentage => "percentage",
        Fixed => "fixed",
    }
);

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DiscountCode {
    pub id: i64,
    pub code: String,
    pub description: Option<String>,
    pub discount_type: String,
    pub discount_value: i64,
    /// Zero means unlimited
    pub max_uses: i32,
    pub used_count: i32,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DiscountCode {
    pub fn kind(&self) -> Option<DiscountType> {
        self.discount_type.parse().ok()
    }

    pub fn has_uses_left(&self) -> bool {
        self.max_uses == 0 || self.used_count < self.max_uses
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateDiscountRequest {
    pub code: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub max_uses: i32,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
}

/// Fields an admin changed on an existing code; `None` keeps the stored value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateDiscountRequest {
    pub code: Option<String>,
    pub description: Option<String>,
    pub discount_type: Option<DiscountType>,
    pub discount_value: Option<i64>,
    pub max_uses: Option<i32>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}
