//! Logging middleware
//!
//! Structured logs for incoming updates and handler timings.

use std::time::Instant;
use teloxide::types::{ChatKind, Message, Update, UpdateKind};
use tracing::{info, debug, warn, Span};

/// Handlers slower than this are logged as warnings
const SLOW_OPERATION_MS: u128 = 1000;

/// Logging middleware for bot interactions
#[derive(Clone)]
pub struct LoggingMiddleware {
    log_user_interactions: bool,
    log_performance: bool,
}

impl LoggingMiddleware {
    pub fn new(log_user_interactions: bool, log_performance: bool) -> Self {
        Self {
            log_user_interactions,
            log_performance,
        }
    }

    /// Log incoming update
    pub fn log_update(&self, update: &Update) {
        if !self.log_user_interactions {
            return;
        }

        match &update.kind {
            UpdateKind::Message(message) => self.log_message(message),
            UpdateKind::CallbackQuery(callback) => {
                info!(
                    update_id = update.id.0,
                    user_id = callback.from.id.0,
                    callback_data = callback.data.as_deref().unwrap_or("none"),
                    "Callback query received"
                );
            }
            _ => {
                debug!(update_id = update.id.0, "Ignored update type received");
            }
        }
    }

    /// Log message details; text is only logged at debug level
    pub fn log_message(&self, message: &Message) {
        let chat_type = match message.chat.kind {
            ChatKind::Private(_) => "private",
            ChatKind::Public(_) => "public",
        };
        let user_id = message.from.as_ref().map(|u| u.id.0);

        match message.text() {
            Some(text) if text.starts_with('/') => {
                info!(user_id = ?user_id, chat_type = chat_type, command = %text.split_whitespace().next().unwrap_or(text), "Command received")
            }
            Some(text) => {
                debug!(user_id = ?user_id, chat_type = chat_type, length = text.chars().count(), "Text message received")
            }
            None => debug!(user_id = ?user_id, chat_type = chat_type, "Non-text message received"),
        }
    }

    /// Start timing an operation; `None` when performance logging is off
    pub fn track(&self, operation: &str) -> Option<PerformanceTracker> {
        self.log_performance.then(|| PerformanceTracker::new(operation.to_string()))
    }
}

impl Default for LoggingMiddleware {
    fn default() -> Self {
        Self::new(true, true)
    }
}

/// Performance tracker for measuring operation duration
pub struct PerformanceTracker {
    operation: String,
    start_time: Instant,
    _span: Span,
}

impl PerformanceTracker {
    fn new(operation: String) -> Self {
        let span = tracing::info_span!("performance", operation = %operation);
        Self {
            operation,
            start_time: Instant::now(),
            _span: span,
        }
    }

    /// Complete the performance tracking and log the result
    pub fn complete(self, success: bool) -> u128 {
        let duration_ms = self.start_time.elapsed().as_millis();

        if duration_ms > SLOW_OPERATION_MS {
            warn!(operation = %self.operation, duration_ms = duration_ms, success = success, "Slow operation detected");
        } else if success {
            debug!(operation = %self.operation, duration_ms = duration_ms, "Operation completed successfully");
        } else {
            warn!(operation = %self.operation, duration_ms = duration_ms, "Operation failed");
        }
        duration_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracking_respects_flag() {
        assert!(LoggingMiddleware::new(true, false).track("handler").is_none());
        let tracker = LoggingMiddleware::default().track("handler");
        assert!(tracker.is_some());
    }

    #[test]
    fn test_performance_tracker() {
        let tracker = PerformanceTracker::new("test_operation".to_string());
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert!(tracker.complete(true) >= 10);
    }
}
