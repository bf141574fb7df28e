//! HiddyShop Telegram Bot
//!
//! A Telegram storefront for Hiddify VPN subscriptions. This library provides
//! the building blocks: the plan catalogue, wallet ledger, orders provisioned
//! on the Hiddify panel, referral commissions, discount codes, agent
//! applications and an admin console, with multi-language support.

pub mod config;
pub mod handlers;
pub mod services;
pub mod models;
pub mod database;
pub mod state;
pub mod i18n;
pub mod utils;
pub mod middleware;

// Re-export commonly used types
pub use config::Settings;
pub use utils::errors::{ShopError, Result};

// Re-export main components for easy access
pub use database::DatabaseService;
pub use services::ServiceFactory;
pub use state::{AppContext, ScenarioManager, StateStorage};
pub use i18n::I18n;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn info() -> String {
    format!("{} v{}", NAME, VERSION)
}
