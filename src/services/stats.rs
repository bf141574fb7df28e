//! Shop-wide statistics for the admin console

use chrono::Utc;
use tracing::debug;

use crate::database::DatabaseService;
use crate::models::referral::TopReferrer;
use crate::utils::errors::Result;
use crate::utils::helpers::start_of_day;

const TOP_REFERRERS: i64 = 5;

#[derive(Debug, Clone)]
pub struct ShopOverview {
    pub users_total: i64,
    pub users_active: i64,
    pub users_admins: i64,
    pub users_today: i64,
    pub plans_total: i64,
    pub plans_active: i64,
    pub orders_total: i64,
    pub orders_today: i64,
    /// Sum of `final_price` over completed orders
    pub revenue_total: i64,
    pub revenue_today: i64,
    pub top_referrers: Vec<TopReferrer>,
}

#[derive(Clone)]
pub struct StatsService {
    database: DatabaseService,
}

impl StatsService {
    pub fn new(database: DatabaseService) -> Self {
        Self { database }
    }

    pub async fn overview(&self) -> Result<ShopOverview> {
        debug!("Collecting shop overview");
        let since = start_of_day(Utc::now());
        let db = &self.database;

        let (users_total, users_active, users_admins, users_today) = futures::try_join!(
            db.users.count(),
            db.users.count_active(),
            db.users.count_admins(),
            db.users.count_created_since(since),
        )?;

        let (plans_total, plans_active, orders_total, orders_today) = futures::try_join!(
            db.plans.count(),
            db.plans.count_active(),
            db.orders.count(),
            db.orders.count_since(since),
        )?;

        let (revenue_total, revenue_today, top_referrers) = futures::try_join!(
            db.orders.revenue_since(None),
            db.orders.revenue_since(Some(since)),
            db.referrals.top_referrers(TOP_REFERRERS),
        )?;

        Ok(ShopOverview {
            users_total,
            users_active,
            users_admins,
            users_today,
            plans_total,
            plans_active,
            orders_total,
            orders_today,
            revenue_total,
            revenue_today,
            top_referrers,
        })
    }
}
