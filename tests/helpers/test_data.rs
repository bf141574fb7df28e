//! Test data helpers
//!
//! Builders for users, plans and discount codes with realistic values.

use fake::faker::internet::en::Username;
use fake::faker::name::en::{FirstName, LastName};
use fake::Fake;

use hiddyshop::models::discount::{CreateDiscountRequest, DiscountType};
use hiddyshop::models::plan::{CreatePlanRequest, Plan};
use hiddyshop::models::User;

use super::TestContext;

pub const TEST_ADMIN_TELEGRAM_ID: i64 = 555_666_777;

impl TestContext {
    /// Register a user with a random name through the user service
    pub async fn create_user(&self, telegram_id: i64) -> User {
        let username: String = Username().fake();
        let first_name: String = FirstName().fake();
        let last_name: String = LastName().fake();

        let (user, created) = self
            .services
            .user_service
            .register_or_get_user(
                telegram_id,
                Some(username),
                Some(first_name),
                Some(last_name),
                Some("en".to_string()),
            )
            .await
            .expect("register test user");
        assert!(created, "telegram id {} was already registered", telegram_id);
        user
    }

    /// Register a user and put `balance` in their wallet
    pub async fn create_funded_user(&self, telegram_id: i64, balance: i64) -> User {
        let user = self.create_user(telegram_id).await;
        if balance > 0 {
            self.services
                .wallet_service
                .credit(user.id, balance, "test funds")
                .await
                .expect("fund test wallet");
        }
        self.reload_user(user.id).await
    }

    pub async fn reload_user(&self, user_id: i64) -> User {
        self.services.user_service.get_user(user_id).await.expect("reload user")
    }

    pub async fn create_plan(&self, name: &str, price: i64) -> Plan {
        self.services
            .plan_service
            .create_plan(plan_request(name, price))
            .await
            .expect("create test plan")
    }

    pub async fn create_discount(&self, code: &str, kind: DiscountType, value: i64, max_uses: i32) {
        self.services
            .discount_service
            .create(CreateDiscountRequest {
                code: code.to_string(),
                description: None,
                discount_type: kind,
                discount_value: value,
                max_uses,
                valid_from: None,
                valid_until: None,
            })
            .await
            .expect("create test discount");
    }
}

pub fn plan_request(name: &str, price: i64) -> CreatePlanRequest {
    CreatePlanRequest {
        name: name.to_string(),
        description: Some(format!("{} test plan", name)),
        days: 30,
        traffic_gb: 50,
        price,
        panel_mode: None,
        product_name: None,
        max_ips: None,
        monthly_package: false,
        sort_order: None,
    }
}
