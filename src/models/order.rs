//! Order model

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

text_enum!(
    /// Order lifecycle: pending -> paid -> completed, or failed
    OrderStatus {
        Pending => "pending",
        Paid => "paid",
        Completed => "completed",
        Failed => "failed",
    }
);

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    pub plan_id: Option<i64>,
    pub plan_name: String,
    pub days: i32,
    pub traffic_gb: i32,
    pub price: i64,
    pub discount_code: Option<String>,
    pub discount_amount: i64,
    pub final_price: i64,
    pub status: String,
    pub panel_uuid: Option<String>,
    pub secret_uuid: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn status(&self) -> Option<OrderStatus> {
        self.status.parse().ok()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub user_id: i64,
    pub plan_id: i64,
    pub plan_name: String,
    pub days: i32,
    pub traffic_gb: i32,
    pub price: i64,
    pub discount_code: Option<String>,
    pub discount_amount: i64,
    pub final_price: i64,
}
