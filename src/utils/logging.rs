//! Logging configuration and setup
//!
//! Structured logging for the shop: a stdout layer plus a daily rolling file,
//! and a handful of helpers so user, admin and payment events carry the same
//! field names everywhere.

use tracing::{info, warn, error};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use crate::config::LoggingConfig;
use crate::utils::errors::{Result, ShopError};

/// Initialize logging based on configuration.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the lifetime of the process.
pub fn init_logging(config: &LoggingConfig) -> Result<WorkerGuard> {
    let file_appender = tracing_appender::rolling::daily(&config.directory, &config.file_prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stdout))
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(non_blocking))
        .try_init()
        .map_err(|e| ShopError::Config(format!("Failed to initialize logging: {}", e)))?;

    info!("Logging initialized with level: {}", config.level);
    Ok(guard)
}

/// Log user actions with structured data
pub fn log_user_action(user_id: i64, action: &str, details: Option<&str>) {
    info!(
        user_id = user_id,
        action = action,
        details = details,
        "User action performed"
    );
}

/// Log admin actions
pub fn log_admin_action(admin_id: i64, action: &str, target: Option<&str>, details: Option<&str>) {
    warn!(
        admin_id = admin_id,
        action = action,
        target = target,
        details = details,
        "Admin action performed"
    );
}

/// Log money movements
pub fn log_payment_event(user_id: i64, amount: i64, method: &str, status: &str, payment_id: Option<i64>) {
    info!(
        user_id = user_id,
        amount = amount,
        method = method,
        status = status,
        payment_id = payment_id,
        "Payment event"
    );
}

/// Log errors with the handler context they occurred in
pub fn log_error_with_context(err: &ShopError, context: &str, user_id: Option<i64>) {
    error!(
        error = %err,
        severity = %err.severity(),
        recoverable = err.is_recoverable(),
        context = context,
        user_id = user_id,
        "Operation failed"
    );
}
