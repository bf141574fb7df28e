//! Data models module
//!
//! This module contains all data structures used throughout the application

/// Declares a status enum stored as lowercase text in the database.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = crate::utils::errors::ShopError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(crate::utils::errors::ShopError::InvalidInput(format!(
                        "unknown {} value: {}",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

pub mod user;
pub mod plan;
pub mod order;
pub mod payment;
pub mod referral;
pub mod discount;
pub mod agent_request;

// Re-export commonly used models
pub use user::{User, CreateUserRequest, UpdateUserRequest, UserPanelLink};
pub use plan::{Plan, CreatePlanRequest, UpdatePlanRequest};
pub use order::{Order, CreateOrderRequest, OrderStatus};
pub use payment::{Payment, CreatePaymentRequest, PaymentMethod, PaymentStatus};
pub use referral::{Referral, CommissionStatus, ReferralStats, ReferredUser, TopReferrer};
pub use discount::{DiscountCode, CreateDiscountRequest, UpdateDiscountRequest, DiscountType};
pub use agent_request::{AgentRequest, CreateAgentRequest, AgentRequestStatus};

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_status_round_trip_through_text() {
        assert_eq!(PaymentStatus::from_str("success").unwrap(), PaymentStatus::Success);
        assert_eq!(OrderStatus::Completed.as_str(), "completed");
        assert_eq!(DiscountType::Percentage.to_string(), "percentage");
        assert!(AgentRequestStatus::from_str("maybe").is_err());
    }
}
