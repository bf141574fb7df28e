//! Configuration validation module
//!
//! This module provides validation functions for application configuration
//! to ensure all required settings are properly configured.

use crate::utils::errors::{ShopError, Result};
use crate::utils::validators::validate_bank_card;
use super::Settings;

/// Validate all configuration settings
pub fn validate_settings(settings: &Settings) -> Result<()> {
    validate_bot_config(&settings.bot)?;
    validate_database_config(&settings.database)?;
    validate_redis_config(&settings.redis)?;
    validate_panel_config(&settings.panel)?;
    validate_shop_config(&settings.shop)?;
    validate_i18n_config(&settings.i18n)?;
    validate_logging_config(&settings.logging)?;
    validate_rate_limit_config(&settings.rate_limit)?;

    Ok(())
}

/// Validate bot configuration
fn validate_bot_config(config: &super::BotConfig) -> Result<()> {
    if config.token.is_empty() {
        return Err(ShopError::Config("Bot token is required".to_string()));
    }

    if !config.token.contains(':') {
        return Err(ShopError::Config(
            "Bot token must have the form <id>:<secret>".to_string()
        ));
    }

    if config.admin_ids.is_empty() {
        return Err(ShopError::Config(
            "At least one admin ID must be configured".to_string()
        ));
    }

    if let Some(webhook_url) = &config.webhook_url {
        url::Url::parse(webhook_url)?;
    }

    Ok(())
}

/// Validate database configuration
fn validate_database_config(config: &super::DatabaseConfig) -> Result<()> {
    if config.url.is_empty() {
        return Err(ShopError::Config("Database URL is required".to_string()));
    }

    if config.max_connections == 0 {
        return Err(ShopError::Config(
            "Max connections must be greater than 0".to_string()
        ));
    }

    if config.min_connections > config.max_connections {
        return Err(ShopError::Config(
            "Min connections cannot be greater than max connections".to_string()
        ));
    }

    Ok(())
}

/// Validate Redis configuration
fn validate_redis_config(config: &super::RedisConfig) -> Result<()> {
    if config.url.is_empty() {
        return Err(ShopError::Config("Redis URL is required".to_string()));
    }

    if config.ttl_seconds == 0 {
        return Err(ShopError::Config(
            "Redis TTL must be greater than 0".to_string()
        ));
    }

    Ok(())
}

/// Validate panel configuration
fn validate_panel_config(config: &super::PanelConfig) -> Result<()> {
    let parsed = url::Url::parse(&config.base_url)?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ShopError::Config(format!(
            "Panel base URL must be http or https, got {}",
            parsed.scheme()
        )));
    }

    if config.api_key.is_empty() {
        return Err(ShopError::Config("Panel API key is required".to_string()));
    }

    if config.proxy_path.trim_matches('/').is_empty() {
        return Err(ShopError::Config("Panel proxy path is required".to_string()));
    }

    if config.timeout_seconds == 0 {
        return Err(ShopError::Config(
            "Panel timeout must be greater than 0".to_string()
        ));
    }

    if config.requests_per_second == 0 {
        return Err(ShopError::Config(
            "Panel requests per second must be greater than 0".to_string()
        ));
    }

    if config.breaker_threshold == 0 {
        return Err(ShopError::Config(
            "Panel breaker threshold must be greater than 0".to_string()
        ));
    }

    Ok(())
}

/// Validate storefront rules
fn validate_shop_config(config: &super::ShopConfig) -> Result<()> {
    if !(0..=100).contains(&config.referral_commission_percent) {
        return Err(ShopError::Config(
            "Referral commission percent must be between 0 and 100".to_string()
        ));
    }

    if config.min_topup <= 0 {
        return Err(ShopError::Config(
            "Minimum top-up must be greater than 0".to_string()
        ));
    }

    if config.min_topup > config.max_topup {
        return Err(ShopError::Config(
            "Minimum top-up cannot be greater than maximum top-up".to_string()
        ));
    }

    if let Some(card) = &config.card_number {
        if !validate_bank_card(card) {
            return Err(ShopError::Config(
                "Configured card number is not a valid 16-digit card".to_string()
            ));
        }
    }

    Ok(())
}

/// Validate internationalization configuration
fn validate_i18n_config(config: &super::I18nConfig) -> Result<()> {
    if config.default_language.is_empty() {
        return Err(ShopError::Config("Default language is required".to_string()));
    }

    if config.supported_languages.is_empty() {
        return Err(ShopError::Config(
            "At least one supported language is required".to_string()
        ));
    }

    if !config.supported_languages.contains(&config.default_language) {
        return Err(ShopError::Config(
            "Default language must be in supported languages".to_string()
        ));
    }

    Ok(())
}

/// Validate logging configuration
fn validate_logging_config(config: &super::LoggingConfig) -> Result<()> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.level.to_lowercase().as_str()) {
        return Err(ShopError::Config(format!(
            "Invalid log level: {}. Must be one of: {}",
            config.level,
            valid_levels.join(", ")
        )));
    }

    if config.directory.is_empty() {
        return Err(ShopError::Config("Log directory is required".to_string()));
    }

    Ok(())
}

/// Validate rate limit configuration
fn validate_rate_limit_config(config: &super::RateLimitConfig) -> Result<()> {
    if config.max_requests == 0 || config.window_seconds == 0 {
        return Err(ShopError::Config(
            "Rate limit values must be greater than 0".to_string()
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn valid_settings() -> Settings {
        let mut settings = Settings::default();
        settings.bot.token = "123456:ABC-DEF".to_string();
        settings.bot.admin_ids = vec![1];
        settings.panel.api_key = "key".to_string();
        settings
    }

    #[test]
    fn test_valid_settings() {
        assert!(validate_settings(&valid_settings()).is_ok());
    }

    #[test]
    fn test_missing_token() {
        let mut settings = valid_settings();
        settings.bot.token = String::new();
        assert_matches!(validate_settings(&settings), Err(ShopError::Config(_)));
    }

    #[test]
    fn test_bad_panel_url() {
        let mut settings = valid_settings();
        settings.panel.base_url = "not a url".to_string();
        assert_matches!(validate_settings(&settings), Err(ShopError::UrlParse(_)));

        settings.panel.base_url = "ftp://panel.example.com".to_string();
        assert_matches!(validate_settings(&settings), Err(ShopError::Config(_)));
    }

    #[test]
    fn test_commission_range() {
        let mut settings = valid_settings();
        settings.shop.referral_commission_percent = 101;
        assert!(validate_settings(&settings).is_err());
        settings.shop.referral_commission_percent = 0;
        assert!(validate_settings(&settings).is_ok());
    }

    #[test]
    fn test_topup_bounds() {
        let mut settings = valid_settings();
        settings.shop.min_topup = 500_000;
        settings.shop.max_topup = 100_000;
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_card_number_luhn() {
        let mut settings = valid_settings();
        settings.shop.card_number = Some("4111 1111 1111 1112".to_string());
        assert!(validate_settings(&settings).is_err());
        settings.shop.card_number = Some("4111 1111 1111 1111".to_string());
        assert!(validate_settings(&settings).is_ok());
    }

    #[test]
    fn test_default_language_supported() {
        let mut settings = valid_settings();
        settings.i18n.default_language = "de".to_string();
        assert!(validate_settings(&settings).is_err());
    }
}
