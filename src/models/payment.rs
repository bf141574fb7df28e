//! Payment model
//!
//! A payment row is also the wallet ledger: every balance change writes one
//! row with a signed amount and method `wallet`.

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

text_enum!(
    PaymentMethod {
        Wallet => "wallet",
        Online => "online",
        Manual => "manual",
    }
);

text_enum!(
    /// Only `Pending` may transition to another status
    PaymentStatus {
        Pending => "pending",
        Success => "success",
        Failed => "failed",
        Cancelled => "cancelled",
    }
);

impl PaymentStatus {
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        matches!(self, PaymentStatus::Pending) && next != PaymentStatus::Pending
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: i64,
    pub user_id: i64,
    pub order_id: Option<i64>,
    pub amount: i64,
    pub currency: String,
    pub payment_method: String,
    pub payment_gateway: Option<String>,
    pub transaction_id: Option<String>,
    pub authority: Option<String>,
    pub status: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn status(&self) -> Option<PaymentStatus> {
        self.status.parse().ok()
    }

    pub fn method(&self) -> Option<PaymentMethod> {
        self.payment_method.parse().ok()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePaymentRequest {
    pub user_id: i64,
    pub order_id: Option<i64>,
    pub amount: i64,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub payment_gateway: Option<String>,
    pub status: PaymentStatus,
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_pending_transitions() {
        assert!(PaymentStatus::Pending.can_transition_to(PaymentStatus::Success));
        assert!(PaymentStatus::Pending.can_transition_to(PaymentStatus::Cancelled));
        assert!(!PaymentStatus::Pending.can_transition_to(PaymentStatus::Pending));
        assert!(!PaymentStatus::Success.can_transition_to(PaymentStatus::Failed));
        assert!(!PaymentStatus::Failed.can_transition_to(PaymentStatus::Success));
    }
}
