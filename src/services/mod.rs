//! Services module
//!
//! This module contains business logic services

pub mod agent;
pub mod auth;
pub mod backup;
pub mod discount;
pub mod notification;
pub mod order;
pub mod panel;
pub mod payment;
pub mod plan;
pub mod referral;
pub mod stats;
pub mod user;
pub mod wallet;

// Re-export commonly used services
pub use agent::{AgentService, AgentRequestCounts};
pub use auth::{AuthService, AuthContext, Permission};
pub use backup::{BackupService, BackupInfo};
pub use discount::DiscountService;
pub use notification::NotificationService;
pub use order::{OrderService, Quote, Subscription};
pub use panel::PanelClient;
pub use payment::{PaymentService, PaymentStatistics, PaymentStatusCounts};
pub use plan::PlanService;
pub use referral::ReferralService;
pub use stats::{StatsService, ShopOverview};
pub use user::UserService;
pub use wallet::WalletService;

use std::sync::Arc;

use crate::config::settings::Settings;
use crate::database::DatabaseService;
use crate::i18n::I18n;
use crate::state::StateStorage;
use crate::utils::errors::Result;
use teloxide::Bot;

/// Service factory for creating and managing all services
#[derive(Clone)]
pub struct ServiceFactory {
    pub user_service: UserService,
    pub auth_service: AuthService,
    pub wallet_service: WalletService,
    pub plan_service: PlanService,
    pub discount_service: DiscountService,
    pub referral_service: ReferralService,
    pub order_service: OrderService,
    pub payment_service: PaymentService,
    pub agent_service: AgentService,
    pub backup_service: BackupService,
    pub stats_service: StatsService,
    pub notification_service: NotificationService,
    pub panel_client: PanelClient,
    database: DatabaseService,
}

impl ServiceFactory {
    /// Create a new ServiceFactory with all services initialized
    pub fn new(
        bot: Bot,
        settings: Settings,
        database: DatabaseService,
        i18n: Arc<I18n>,
    ) -> Result<Self> {
        let panel_client = PanelClient::new(&settings.panel)?;
        let notification_service =
            NotificationService::new(bot, i18n, settings.clone(), database.users.clone());

        let user_service = UserService::new(database.users.clone(), settings.clone());
        let auth_service = AuthService::new(database.users.clone(), settings.clone());
        let wallet_service = WalletService::new(database.wallet.clone());
        let plan_service = PlanService::new(database.plans.clone());
        let discount_service = DiscountService::new(database.discounts.clone());
        let referral_service = ReferralService::new(
            database.referrals.clone(),
            database.users.clone(),
            notification_service.clone(),
            settings.clone(),
        );
        let order_service = OrderService::new(
            database.orders.clone(),
            database.payments.clone(),
            database.wallet.clone(),
            database.users.clone(),
            plan_service.clone(),
            discount_service.clone(),
            referral_service.clone(),
            panel_client.clone(),
            notification_service.clone(),
            settings.clone(),
        );
        let payment_service = PaymentService::new(
            database.payments.clone(),
            database.users.clone(),
            order_service.clone(),
            notification_service.clone(),
            settings.clone(),
        );
        let agent_service = AgentService::new(
            database.agent_requests.clone(),
            database.users.clone(),
            notification_service.clone(),
            settings.clone(),
        );
        let backup_service = BackupService::new(database.backup.clone(), &settings.backup.directory);
        let stats_service = StatsService::new(database.clone());

        Ok(Self {
            user_service,
            auth_service,
            wallet_service,
            plan_service,
            discount_service,
            referral_service,
            order_service,
            payment_service,
            agent_service,
            backup_service,
            stats_service,
            notification_service,
            panel_client,
            database,
        })
    }

    /// Health check for all services
    pub async fn health_check(&self, storage: &StateStorage) -> ServiceHealthStatus {
        let database_healthy = self.database.health_check().await.is_ok();
        let redis_healthy = storage.health_check().await.unwrap_or(false);
        let panel_circuit_closed = !self.panel_client.is_circuit_open();

        ServiceHealthStatus {
            database_healthy,
            redis_healthy,
            panel_circuit_closed,
        }
    }
}

/// Health status for all services
#[derive(Debug, Clone)]
pub struct ServiceHealthStatus {
    pub database_healthy: bool,
    pub redis_healthy: bool,
    pub panel_circuit_closed: bool,
}

impl ServiceHealthStatus {
    /// The bot cannot serve anything without the database and Redis
    pub fn is_healthy(&self) -> bool {
        self.database_healthy && self.redis_healthy
    }

    /// Get list of unhealthy services
    pub fn get_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if !self.database_healthy {
            issues.push("Database connection failed".to_string());
        }
        if !self.redis_healthy {
            issues.push("Redis connection failed".to_string());
        }
        if !self.panel_circuit_closed {
            issues.push("Panel circuit breaker is open".to_string());
        }

        issues
    }
}
