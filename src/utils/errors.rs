//! Error handling for HiddyShop
//!
//! This module defines the main error types used throughout the application
//! and provides a unified error handling strategy.

use thiserror::Error;

/// Main error type for HiddyShop application
#[derive(Error, Debug)]
pub enum ShopError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Telegram API error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    #[error("Panel API error: {0}")]
    Panel(#[from] PanelError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("User not found: {user_id}")]
    UserNotFound { user_id: i64 },

    #[error("User is blocked: {user_id}")]
    UserBlocked { user_id: i64 },

    #[error("Plan not found: {plan_id}")]
    PlanNotFound { plan_id: i64 },

    #[error("Order not found: {order_id}")]
    OrderNotFound { order_id: i64 },

    #[error("Payment not found: {payment_id}")]
    PaymentNotFound { payment_id: i64 },

    #[error("Insufficient balance: have {balance}, need {required}")]
    InsufficientBalance { balance: i64, required: i64 },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Discount code rejected: {0}")]
    DiscountInvalid(String),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

/// Hiddify panel API specific errors
#[derive(Error, Debug)]
pub enum PanelError {
    #[error("Panel request failed: {0}")]
    Request(String),

    #[error("Panel returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Panel request timed out")]
    Timeout,

    #[error("Invalid panel response: {0}")]
    InvalidResponse(String),

    #[error("Panel circuit is open, retry in {retry_after_secs}s")]
    CircuitOpen { retry_after_secs: u64 },
}

/// Result type alias for HiddyShop operations
pub type Result<T> = std::result::Result<T, ShopError>;

/// Result type alias for panel operations
pub type PanelResult<T> = std::result::Result<T, PanelError>;

impl ShopError {
    /// Check if the error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            ShopError::Database(_) => false,
            ShopError::Migration(_) => false,
            ShopError::Telegram(_) => true,
            ShopError::Panel(_) => true,
            ShopError::Config(_) => false,
            ShopError::PermissionDenied(_) => false,
            ShopError::UserNotFound { .. } => false,
            ShopError::UserBlocked { .. } => false,
            ShopError::PlanNotFound { .. } => false,
            ShopError::OrderNotFound { .. } => false,
            ShopError::PaymentNotFound { .. } => false,
            ShopError::InsufficientBalance { .. } => true,
            ShopError::InvalidAmount(_) => true,
            ShopError::DiscountInvalid(_) => true,
            ShopError::InvalidStateTransition { .. } => false,
            ShopError::Redis(_) => true,
            ShopError::Http(_) => true,
            ShopError::Serialization(_) => false,
            ShopError::Io(_) => true,
            ShopError::RateLimitExceeded => true,
            ShopError::InvalidInput(_) => true,
            ShopError::ServiceUnavailable(_) => true,
            ShopError::UrlParse(_) => false,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ShopError::Database(_) => ErrorSeverity::Critical,
            ShopError::Migration(_) => ErrorSeverity::Critical,
            ShopError::Config(_) => ErrorSeverity::Critical,
            ShopError::PermissionDenied(_) => ErrorSeverity::Warning,
            ShopError::UserBlocked { .. } => ErrorSeverity::Warning,
            ShopError::RateLimitExceeded => ErrorSeverity::Warning,
            ShopError::InvalidInput(_)
            | ShopError::InvalidAmount(_)
            | ShopError::DiscountInvalid(_)
            | ShopError::InsufficientBalance { .. } => ErrorSeverity::Info,
            _ => ErrorSeverity::Error,
        }
    }

    /// Translation key of the message shown to the user for this error
    pub fn user_message_key(&self) -> &'static str {
        match self {
            ShopError::PermissionDenied(_) => "errors.permission_denied",
            ShopError::UserBlocked { .. } => "errors.user_blocked",
            ShopError::UserNotFound { .. } => "errors.user_not_found",
            ShopError::PlanNotFound { .. } => "errors.plan_not_found",
            ShopError::OrderNotFound { .. } | ShopError::PaymentNotFound { .. } => "errors.not_found",
            ShopError::InsufficientBalance { .. } => "errors.insufficient_balance",
            ShopError::InvalidAmount(_) => "errors.invalid_amount",
            ShopError::DiscountInvalid(_) => "errors.discount_invalid",
            ShopError::InvalidStateTransition { .. } => "errors.already_processed",
            ShopError::RateLimitExceeded => "errors.rate_limited",
            ShopError::InvalidInput(_) => "errors.invalid_input",
            ShopError::Panel(_) | ShopError::ServiceUnavailable(_) => "errors.panel_unavailable",
            _ => "errors.generic",
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "INFO"),
            ErrorSeverity::Warning => write!(f, "WARN"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_balance_is_user_facing() {
        let err = ShopError::InsufficientBalance { balance: 10, required: 50 };
        assert!(err.is_recoverable());
        assert_eq!(err.severity(), ErrorSeverity::Info);
        assert_eq!(err.user_message_key(), "errors.insufficient_balance");
        assert_eq!(err.to_string(), "Insufficient balance: have 10, need 50");
    }

    #[test]
    fn test_panel_error_conversion() {
        let err: ShopError = PanelError::CircuitOpen { retry_after_secs: 30 }.into();
        assert!(matches!(err, ShopError::Panel(_)));
        assert_eq!(err.user_message_key(), "errors.panel_unavailable");
    }

    #[test]
    fn test_config_error_is_critical() {
        let err = ShopError::Config("missing token".to_string());
        assert!(!err.is_recoverable());
        assert_eq!(err.severity().to_string(), "CRITICAL");
    }
}
