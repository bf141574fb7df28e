//! Utility modules
//!
//! This module contains common utilities used throughout the application,
//! including error handling, logging setup, formatting and input validation.

pub mod errors;
pub mod logging;
pub mod helpers;
pub mod validators;

pub use errors::{ShopError, PanelError, Result};
