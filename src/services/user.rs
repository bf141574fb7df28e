//! User service implementation
//!
//! This service handles user registration, referral code assignment,
//! profile updates and the admin toggles on user accounts.

use tracing::{info, warn, debug};
use crate::config::settings::Settings;
use crate::database::repositories::UserRepository;
use crate::models::user::{User, CreateUserRequest, UpdateUserRequest, UserPanelLink};
use crate::utils::errors::{ShopError, Result};
use crate::utils::helpers::{calculate_offset, generate_referral_code};
use crate::utils::validators::validate_phone;

pub const USERS_PER_PAGE: i64 = 10;
pub const SEARCH_LIMIT: i64 = 20;
const REFERRAL_CODE_LENGTH: usize = 8;
const REFERRAL_CODE_ATTEMPTS: usize = 10;

/// User service for managing user operations
#[derive(Clone)]
pub struct UserService {
    user_repository: UserRepository,
    settings: Settings,
}

impl UserService {
    /// Create a new UserService instance
    pub fn new(user_repository: UserRepository, settings: Settings) -> Self {
        Self {
            user_repository,
            settings,
        }
    }

    /// Register a new user or get existing user
    ///
    /// The flag in the result is `true` when the user was created by this call.
    pub async fn register_or_get_user(
        &self,
        telegram_id: i64,
        username: Option<String>,
        first_name: Option<String>,
        last_name: Option<String>,
        language: Option<String>,
    ) -> Result<(User, bool)> {
        debug!(telegram_id = telegram_id, "Attempting to register or get user");

        if let Some(existing_user) = self.user_repository.find_by_telegram_id(telegram_id).await? {
            if existing_user.username != username {
                let update = UpdateUserRequest {
                    username: username.clone(),
                    ..Default::default()
                };
                let user = self.user_repository.update(existing_user.id, update).await?;
                return Ok((user, false));
            }
            return Ok((existing_user, false));
        }

        let referral_code = self.unique_referral_code().await?;
        let language_code = language
            .filter(|lang| self.settings.i18n.supported_languages.contains(lang))
            .unwrap_or_else(|| self.settings.i18n.default_language.clone());

        let create_request = CreateUserRequest {
            telegram_id,
            username,
            first_name,
            last_name,
            language_code: Some(language_code),
            referral_code,
            is_admin: self.settings.is_config_admin(telegram_id),
        };

        let user = self.user_repository.create(create_request).await?;
        info!(user_id = user.id, telegram_id = telegram_id, is_admin = user.is_admin, "New user registered");

        Ok((user, true))
    }

    async fn unique_referral_code(&self) -> Result<String> {
        for _ in 0..REFERRAL_CODE_ATTEMPTS {
            let code = generate_referral_code(REFERRAL_CODE_LENGTH);
            if !self.user_repository.referral_code_exists(&code).await? {
                return Ok(code);
            }
            debug!(code = %code, "Referral code collision, regenerating");
        }

        Err(ShopError::ServiceUnavailable(
            "could not allocate a unique referral code".to_string(),
        ))
    }

    pub async fn get_user_by_telegram_id(&self, telegram_id: i64) -> Result<Option<User>> {
        self.user_repository.find_by_telegram_id(telegram_id).await
    }

    pub async fn get_user(&self, user_id: i64) -> Result<User> {
        self.user_repository
            .find_by_id(user_id)
            .await?
            .ok_or(ShopError::UserNotFound { user_id })
    }

    pub async fn get_user_by_referral_code(&self, code: &str) -> Result<Option<User>> {
        self.user_repository.find_by_referral_code(code.trim()).await
    }

    /// List users, newest first, ten per page (pages start at 1)
    pub async fn list_users(&self, page: i64) -> Result<Vec<User>> {
        debug!(page = page, "Listing users");
        self.user_repository
            .list(USERS_PER_PAGE, calculate_offset(page, USERS_PER_PAGE))
            .await
    }

    pub async fn count_users(&self) -> Result<i64> {
        self.user_repository.count().await
    }

    /// Search by name or username, or by exact telegram id for numeric queries
    pub async fn search_users(&self, query: &str) -> Result<Vec<User>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ShopError::InvalidInput("Search query is empty".to_string()));
        }

        self.user_repository.search(query, SEARCH_LIMIT).await
    }

    pub async fn set_blocked(&self, user_id: i64, blocked: bool, admin_id: i64) -> Result<User> {
        let update = UpdateUserRequest {
            is_blocked: Some(blocked),
            ..Default::default()
        };
        let user = self.user_repository.update(user_id, update).await?;

        if blocked {
            warn!(user_id = user_id, admin_id = admin_id, "User blocked");
        } else {
            info!(user_id = user_id, admin_id = admin_id, "User unblocked");
        }

        Ok(user)
    }

    pub async fn toggle_admin(&self, user_id: i64, admin_id: i64) -> Result<User> {
        let user = self.get_user(user_id).await?;
        let update = UpdateUserRequest {
            is_admin: Some(!user.is_admin),
            ..Default::default()
        };
        let user = self.user_repository.update(user_id, update).await?;
        info!(user_id = user_id, admin_id = admin_id, is_admin = user.is_admin, "Admin flag toggled");
        Ok(user)
    }

    pub async fn toggle_agent(&self, user_id: i64, admin_id: i64) -> Result<User> {
        let user = self.get_user(user_id).await?;
        let update = UpdateUserRequest {
            is_agent: Some(!user.is_agent),
            ..Default::default()
        };
        let user = self.user_repository.update(user_id, update).await?;
        info!(user_id = user_id, admin_id = admin_id, is_agent = user.is_agent, "Agent flag toggled");
        Ok(user)
    }

    pub async fn update_phone(&self, user_id: i64, phone: &str) -> Result<User> {
        let phone = phone.trim();
        if !validate_phone(phone) {
            return Err(ShopError::InvalidInput(format!("Invalid phone number: {}", phone)));
        }

        let update = UpdateUserRequest {
            phone: Some(phone.to_string()),
            ..Default::default()
        };
        self.user_repository.update(user_id, update).await
    }

    /// Set user language preference
    pub async fn set_language(&self, user_id: i64, language_code: &str) -> Result<User> {
        if !self.settings.i18n.supported_languages.iter().any(|l| l == language_code) {
            warn!(user_id = user_id, language_code = %language_code, "Unsupported language code");
            return Err(ShopError::InvalidInput(format!("Unsupported language: {}", language_code)));
        }

        let update = UpdateUserRequest {
            language_code: Some(language_code.to_string()),
            ..Default::default()
        };
        let user = self.user_repository.update(user_id, update).await?;
        info!(user_id = user_id, language_code = %language_code, "User language updated");
        Ok(user)
    }

    pub async fn panel_links(&self, user_id: i64) -> Result<Vec<UserPanelLink>> {
        self.user_repository.panel_links(user_id).await
    }

    /// Telegram ids of every admin, configured or promoted in the database
    pub async fn admin_telegram_ids(&self) -> Result<Vec<i64>> {
        let mut ids = self.settings.bot.admin_ids.clone();
        for id in self.user_repository.admin_telegram_ids().await? {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    /// Whether a user may use the admin console
    pub fn is_admin(&self, user: &User) -> bool {
        user.is_admin || self.settings.is_config_admin(user.telegram_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn service(admin_ids: Vec<i64>) -> UserService {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgresql://localhost/hiddyshop_test")
            .unwrap();
        let mut settings = Settings::default();
        settings.bot.admin_ids = admin_ids;
        UserService::new(UserRepository::new(pool), settings)
    }

    fn user(telegram_id: i64, is_admin: bool) -> User {
        User {
            id: 1,
            telegram_id,
            username: None,
            first_name: Some("Sara".to_string()),
            last_name: None,
            phone: None,
            language_code: "fa".to_string(),
            is_admin,
            is_agent: false,
            is_active: true,
            is_blocked: false,
            wallet_balance: 0,
            referral_code: "ABCD1234".to_string(),
            referred_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_is_admin_from_config_or_flag() {
        let service = service(vec![42]);
        assert!(service.is_admin(&user(42, false)));
        assert!(service.is_admin(&user(7, true)));
        assert!(!service.is_admin(&user(7, false)));
    }

    #[tokio::test]
    async fn test_empty_search_rejected() {
        let service = service(vec![]);
        assert!(matches!(
            service.search_users("   ").await,
            Err(ShopError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_bad_phone_rejected_before_query() {
        let service = service(vec![]);
        assert!(matches!(
            service.update_phone(1, "12345").await,
            Err(ShopError::InvalidInput(_))
        ));
    }
}
