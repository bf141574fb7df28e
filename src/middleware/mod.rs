//! Middleware module
//!
//! This module contains middleware for update processing

pub mod logging;
pub mod rate_limit;

// Re-export commonly used middleware
pub use logging::LoggingMiddleware;
pub use rate_limit::{allow_update, RateLimitMiddleware};
