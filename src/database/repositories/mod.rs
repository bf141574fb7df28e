//! Database repositories module
//!
//! This module contains all repository implementations for data access

pub mod user;
pub mod plan;
pub mod order;
pub mod payment;
pub mod wallet;
pub mod referral;
pub mod discount;
pub mod agent_request;
pub mod backup;

// Re-export repositories
pub use user::UserRepository;
pub use plan::PlanRepository;
pub use order::OrderRepository;
pub use payment::{PaymentRepository, PaymentWindowTotals};
pub use wallet::WalletRepository;
pub use referral::ReferralRepository;
pub use discount::DiscountRepository;
pub use agent_request::AgentRequestRepository;
pub use backup::{BackupRepository, BACKUP_TABLES};
