//! Authentication service implementation
//!
//! Decides who may use the bot and who may open the admin console. Admins
//! come from two places: the configured `bot.admin_ids` and users flagged
//! `is_admin` in the database.

use std::collections::HashSet;
use tracing::{info, warn, debug};
use crate::config::settings::Settings;
use crate::database::repositories::UserRepository;
use crate::models::User;
use crate::utils::errors::{ShopError, Result};

/// Permission levels for different operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Permission {
    /// Browse and buy
    User,
    /// Approved reseller
    Agent,
    /// Admin console access
    Admin,
    /// First configured admin; may restore backups
    SuperAdmin,
}

/// Authentication context for a user
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub telegram_id: i64,
    pub permissions: HashSet<Permission>,
    pub is_blocked: bool,
}

impl AuthContext {
    pub fn has(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    pub fn is_admin(&self) -> bool {
        self.has(Permission::Admin)
    }
}

#[derive(Clone)]
pub struct AuthService {
    user_repository: UserRepository,
    settings: Settings,
}

impl AuthService {
    pub fn new(user_repository: UserRepository, settings: Settings) -> Self {
        Self { user_repository, settings }
    }

    pub fn is_config_admin(&self, telegram_id: i64) -> bool {
        self.settings.is_config_admin(telegram_id)
    }

    /// Check if user is a super admin (first admin in the list)
    pub fn is_super_admin(&self, telegram_id: i64) -> bool {
        self.settings.bot.admin_ids.first() == Some(&telegram_id)
    }

    /// Build the context from an already loaded user row
    pub fn context_for(&self, telegram_id: i64, user: Option<&User>) -> AuthContext {
        let mut permissions = HashSet::new();
        permissions.insert(Permission::User);

        let db_admin = user.map(|u| u.is_admin).unwrap_or(false);
        if self.is_config_admin(telegram_id) || db_admin {
            permissions.insert(Permission::Admin);
        }
        if self.is_super_admin(telegram_id) {
            permissions.insert(Permission::SuperAdmin);
        }
        if user.map(|u| u.is_agent).unwrap_or(false) {
            permissions.insert(Permission::Agent);
        }

        AuthContext {
            telegram_id,
            permissions,
            is_blocked: user.map(|u| u.is_blocked).unwrap_or(false),
        }
    }

    pub async fn get_auth_context(&self, telegram_id: i64) -> Result<AuthContext> {
        let user = self.user_repository.find_by_telegram_id(telegram_id).await?;
        let context = self.context_for(telegram_id, user.as_ref());
        debug!(telegram_id = telegram_id, permissions = ?context.permissions, "Authentication context created");
        Ok(context)
    }

    pub async fn is_admin(&self, telegram_id: i64) -> Result<bool> {
        if self.is_config_admin(telegram_id) {
            return Ok(true);
        }
        Ok(self.get_auth_context(telegram_id).await?.is_admin())
    }

    /// Require specific permission or return `PermissionDenied`
    pub async fn require_permission(&self, telegram_id: i64, permission: Permission) -> Result<AuthContext> {
        let context = self.get_auth_context(telegram_id).await?;

        if !context.has(permission) {
            self.log_auth_event(telegram_id, &format!("{:?}", permission), false);
            return Err(ShopError::PermissionDenied(format!(
                "user {} lacks {:?}",
                telegram_id, permission
            )));
        }

        Ok(context)
    }

    pub async fn require_admin(&self, telegram_id: i64) -> Result<AuthContext> {
        self.require_permission(telegram_id, Permission::Admin).await
    }

    /// Blocked users may not do anything but read the blocked notice
    pub fn ensure_not_blocked(&self, user: &User) -> Result<()> {
        if user.is_blocked && !self.is_config_admin(user.telegram_id) {
            warn!(user_id = user.id, "Blocked user attempted an action");
            return Err(ShopError::UserBlocked { user_id: user.id });
        }
        Ok(())
    }

    pub fn log_auth_event(&self, telegram_id: i64, action: &str, success: bool) {
        if success {
            info!(telegram_id = telegram_id, action = action, "Authentication event: success");
        } else {
            warn!(telegram_id = telegram_id, action = action, "Authentication event: failure");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;

    fn service(admin_ids: Vec<i64>) -> AuthService {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgresql://localhost/hiddyshop_test")
            .unwrap();
        let mut settings = Settings::default();
        settings.bot.admin_ids = admin_ids;
        AuthService::new(UserRepository::new(pool), settings)
    }

    fn user(telegram_id: i64) -> User {
        User {
            id: 1,
            telegram_id,
            username: None,
            first_name: Some("Sara".to_string()),
            last_name: None,
            phone: None,
            language_code: "fa".to_string(),
            is_admin: false,
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
    async fn test_context_from_config_and_database() {
        let auth = service(vec![100, 200]);

        let ctx = auth.context_for(100, None);
        assert!(ctx.is_admin());
        assert!(ctx.has(Permission::SuperAdmin));

        let ctx = auth.context_for(200, None);
        assert!(ctx.is_admin());
        assert!(!ctx.has(Permission::SuperAdmin));

        let mut db_admin = user(300);
        db_admin.is_admin = true;
        db_admin.is_agent = true;
        let ctx = auth.context_for(300, Some(&db_admin));
        assert!(ctx.is_admin());
        assert!(ctx.has(Permission::Agent));

        let ctx = auth.context_for(400, Some(&user(400)));
        assert!(!ctx.is_admin());
        assert!(ctx.has(Permission::User));
    }

    #[tokio::test]
    async fn test_blocked_users_are_rejected() {
        let auth = service(vec![100]);

        let mut blocked = user(500);
        blocked.is_blocked = true;
        assert_matches!(auth.ensure_not_blocked(&blocked), Err(ShopError::UserBlocked { user_id: 1 }));

        let mut blocked_admin = user(100);
        blocked_admin.is_blocked = true;
        assert!(auth.ensure_not_blocked(&blocked_admin).is_ok());

        assert!(auth.ensure_not_blocked(&user(600)).is_ok());
    }
}
