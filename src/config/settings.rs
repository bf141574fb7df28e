//! Application settings management
//!
//! This module defines the configuration structure and provides methods
//! for loading settings from TOML files and environment variables.

use serde::{Deserialize, Serialize};

/// Main application configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub bot: BotConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub panel: PanelConfig,
    pub shop: ShopConfig,
    pub backup: BackupConfig,
    pub i18n: I18nConfig,
    pub logging: LoggingConfig,
    pub rate_limit: RateLimitConfig,
    pub features: FeaturesConfig,
}

/// Telegram bot configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BotConfig {
    pub token: String,
    pub bot_name: String,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub admin_ids: Vec<i64>,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Redis configuration for conversation state
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedisConfig {
    pub url: String,
    pub prefix: String,
    pub ttl_seconds: u64,
}

/// Hiddify panel API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PanelConfig {
    pub base_url: String,
    pub api_key: String,
    pub proxy_path: String,
    /// Path segment used in subscription links handed to users
    pub user_proxy_path: String,
    pub timeout_seconds: u64,
    pub requests_per_second: u32,
    pub max_retries: u32,
    pub breaker_threshold: u32,
    pub breaker_cooldown_seconds: u64,
}

/// Storefront business rules
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShopConfig {
    pub currency: String,
    pub referral_commission_percent: i64,
    pub min_topup: i64,
    pub max_topup: i64,
    #[serde(default)]
    pub card_number: Option<String>,
    #[serde(default)]
    pub card_holder: Option<String>,
    #[serde(default)]
    pub support_username: Option<String>,
}

/// Backup file location
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackupConfig {
    pub directory: String,
}

/// Internationalization configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct I18nConfig {
    pub default_language: String,
    pub supported_languages: Vec<String>,
    pub translations_dir: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub directory: String,
    pub file_prefix: String,
}

/// Per-user update throttling
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_seconds: u64,
}

/// Feature flags configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeaturesConfig {
    pub agent_requests: bool,
    pub manual_payments: bool,
    pub referrals: bool,
}

impl Settings {
    /// Load settings from defaults, `config.toml` and `HIDDYSHOP__*` variables
    pub fn new() -> Result<Self, config::ConfigError> {
        Self::load_from("config")
    }

    /// Load settings using a specific configuration file stem
    pub fn load_from(file_stem: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&Settings::default())?)
            .add_source(config::File::with_name(file_stem).required(false))
            .add_source(
                config::Environment::with_prefix("HIDDYSHOP")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("bot.admin_ids")
                    .with_list_parse_key("i18n.supported_languages")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), crate::utils::errors::ShopError> {
        super::validation::validate_settings(self)
    }

    /// Check whether a Telegram id is listed as a configured admin
    pub fn is_config_admin(&self, telegram_id: i64) -> bool {
        self.bot.admin_ids.contains(&telegram_id)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bot: BotConfig {
                token: String::new(),
                bot_name: "HiddyShop Bot".to_string(),
                webhook_url: None,
                admin_ids: vec![],
            },
            database: DatabaseConfig {
                url: "postgresql://localhost/hiddyshop".to_string(),
                max_connections: 10,
                min_connections: 1,
            },
            redis: RedisConfig {
                url: "redis://localhost:6379".to_string(),
                prefix: "hiddyshop:".to_string(),
                ttl_seconds: 3600,
            },
            panel: PanelConfig {
                base_url: "http://localhost:8080".to_string(),
                api_key: String::new(),
                proxy_path: "admin".to_string(),
                user_proxy_path: "sub".to_string(),
                timeout_seconds: 30,
                requests_per_second: 5,
                max_retries: 2,
                breaker_threshold: 5,
                breaker_cooldown_seconds: 60,
            },
            shop: ShopConfig {
                currency: "Toman".to_string(),
                referral_commission_percent: 10,
                min_topup: 10_000,
                max_topup: 10_000_000,
                card_number: None,
                card_holder: None,
                support_username: None,
            },
            backup: BackupConfig {
                directory: "backups".to_string(),
            },
            i18n: I18nConfig {
                default_language: "fa".to_string(),
                supported_languages: vec!["fa".to_string(), "en".to_string()],
                translations_dir: "translations".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                directory: "logs".to_string(),
                file_prefix: "hiddyshop.log".to_string(),
            },
            rate_limit: RateLimitConfig {
                max_requests: 20,
                window_seconds: 60,
            },
            features: FeaturesConfig {
                agent_requests: true,
                manual_payments: true,
                referrals: true,
            },
        }
    }
}
