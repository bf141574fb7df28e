//! Internationalization module
//!
//! This module handles multi-language support for the shop bot.
//! Persian is the default language; English is the bundled alternative.

pub mod loader;

// Re-export commonly used i18n components
pub use loader::{I18n, TranslationParams, params};
