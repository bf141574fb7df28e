//! Subscription plan model

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Plan {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub days: i32,
    pub traffic_gb: i32,
    pub price: i64,
    pub panel_mode: String,
    pub product_name: Option<String>,
    pub max_ips: i32,
    pub monthly_package: bool,
    pub is_active: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatePlanRequest {
    pub name: String,
    pub description: Option<String>,
    pub days: i32,
    pub traffic_gb: i32,
    pub price: i64,
    pub panel_mode: Option<String>,
    pub product_name: Option<String>,
    pub max_ips: Option<i32>,
    pub monthly_package: bool,
    pub sort_order: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdatePlanRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub days: Option<i32>,
    pub traffic_gb: Option<i32>,
    pub price: Option<i64>,
    pub panel_mode: Option<String>,
    pub product_name: Option<String>,
    pub max_ips: Option<i32>,
    pub monthly_package: Option<bool>,
    pub is_active: Option<bool>,
    pub sort_order: Option<i32>,
}
