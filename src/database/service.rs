//! Database service layer
//!
//! Bundles one repository per table behind a single cloneable handle.

use crate::database::{
    DatabasePool, UserRepository, PlanRepository, OrderRepository, PaymentRepository,
    WalletRepository, ReferralRepository, DiscountRepository, AgentRequestRepository,
    BackupRepository,
};
use crate::utils::errors::ShopError;

#[derive(Debug, Clone)]
pub struct DatabaseService {
    pub users: UserRepository,
    pub plans: PlanRepository,
    pub orders: OrderRepository,
    pub payments: PaymentRepository,
    pub wallet: WalletRepository,
    pub referrals: ReferralRepository,
    pub discounts: DiscountRepository,
    pub agent_requests: AgentRequestRepository,
    pub backup: BackupRepository,
    pool: DatabasePool,
}

impl DatabaseService {
    pub fn new(pool: DatabasePool) -> Self {
        Self {
            users: UserRepository::new(pool.clone()),
            plans: PlanRepository::new(pool.clone()),
            orders: OrderRepository::new(pool.clone()),
            payments: PaymentRepository::new(pool.clone()),
            wallet: WalletRepository::new(pool.clone()),
            referrals: ReferralRepository::new(pool.clone()),
            discounts: DiscountRepository::new(pool.clone()),
            agent_requests: AgentRequestRepository::new(pool.clone()),
            backup: BackupRepository::new(pool.clone()),
            pool,
        }
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    /// Check the database answers queries
    pub async fn health_check(&self) -> Result<(), ShopError> {
        super::connection::health_check(&self.pool).await
    }
}
