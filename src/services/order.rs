//! Order service
//!
//! Quotes plans, takes payment (wallet debit or a pending manual payment),
//! provisions the account on the panel and records the result.

use chrono::Utc;
use futures::future::join_all;
use tracing::{info, warn, error, debug};

use crate::config::settings::Settings;
use crate::database::repositories::{
    OrderRepository, PaymentRepository, UserRepository, WalletRepository,
};
use crate::handlers::keyboards;
use crate::i18n::params;
use crate::models::order::{Order, CreateOrderRequest, OrderStatus};
use crate::models::payment::{Payment, CreatePaymentRequest, PaymentMethod, PaymentStatus};
use crate::models::plan::Plan;
use crate::models::user::{User, UserPanelLink};
use crate::services::discount::{DiscountService, calculate_discount};
use crate::services::notification::NotificationService;
use crate::services::panel::{PanelClient, PanelProfile, PanelUserRequest};
use crate::services::plan::{PlanService, DEFAULT_PANEL_MODE};
use crate::services::referral::ReferralService;
use crate::utils::errors::{ShopError, Result};
use crate::utils::helpers::{escape_html, format_price, generate_uuid, start_of_day};
use crate::utils::logging::log_payment_event;

pub const ORDERS_PER_PAGE: i64 = 10;

/// Price breakdown for a plan with an optional discount code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub plan_id: i64,
    pub list_price: i64,
    pub discount_amount: i64,
    pub final_price: i64,
    pub discount_code: Option<String>,
    pub discount_id: Option<i64>,
}

impl Quote {
    pub fn without_discount(plan: &Plan) -> Self {
        Self {
            plan_id: plan.id,
            list_price: plan.price,
            discount_amount: 0,
            final_price: plan.price,
            discount_code: None,
            discount_id: None,
        }
    }

    fn with_discount(plan: &Plan, code: String, discount_id: i64, discount_amount: i64) -> Self {
        let discount_amount = discount_amount.clamp(0, plan.price);
        Self {
            plan_id: plan.id,
            list_price: plan.price,
            discount_amount,
            final_price: plan.price - discount_amount,
            discount_code: Some(code),
            discount_id: Some(discount_id),
        }
    }
}

/// A provisioned account with its subscription link and live usage
#[derive(Debug, Clone)]
pub struct Subscription {
    pub link: UserPanelLink,
    pub url: String,
    pub profile: Option<PanelProfile>,
}

#[derive(Clone)]
pub struct OrderService {
    order_repository: OrderRepository,
    payment_repository: PaymentRepository,
    wallet_repository: WalletRepository,
    user_repository: UserRepository,
    plan_service: PlanService,
    discount_service: DiscountService,
    referral_service: ReferralService,
    panel_client: PanelClient,
    notification_service: NotificationService,
    settings: Settings,
}

impl OrderService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        order_repository: OrderRepository,
        payment_repository: PaymentRepository,
        wallet_repository: WalletRepository,
        user_repository: UserRepository,
        plan_service: PlanService,
        discount_service: DiscountService,
        referral_service: ReferralService,
        panel_client: PanelClient,
        notification_service: NotificationService,
        settings: Settings,
    ) -> Self {
        Self {
            order_repository,
            payment_repository,
            wallet_repository,
            user_repository,
            plan_service,
            discount_service,
            referral_service,
            panel_client,
            notification_service,
            settings,
        }
    }

    /// Price a plan, validating the discount code when one is given
    pub async fn quote(&self, plan: &Plan, discount_code: Option<&str>) -> Result<Quote> {
        let Some(code) = discount_code.map(str::trim).filter(|c| !c.is_empty()) else {
            return Ok(Quote::without_discount(plan));
        };

        let discount = self.discount_service.validate(code, Utc::now()).await?;
        let amount = calculate_discount(&discount, plan.price);
        Ok(Quote::with_discount(plan, discount.code.clone(), discount.id, amount))
    }

    async fn purchasable_plan(&self, plan_id: i64) -> Result<Plan> {
        let plan = self.plan_service.get_plan(plan_id).await?;
        if !plan.is_active {
            return Err(ShopError::PlanNotFound { plan_id });
        }
        Ok(plan)
    }

    async fn create_order(&self, user: &User, plan: &Plan, quote: &Quote) -> Result<Order> {
        let order = self
            .order_repository
            .create(CreateOrderRequest {
                user_id: user.id,
                plan_id: plan.id,
                plan_name: plan.name.clone(),
                days: plan.days,
                traffic_gb: plan.traffic_gb,
                price: quote.list_price,
                discount_code: quote.discount_code.clone(),
                discount_amount: quote.discount_amount,
                final_price: quote.final_price,
            })
            .await?;
        debug!(order_id = order.id, user_id = user.id, plan_id = plan.id, "Order created");
        Ok(order)
    }

    /// Create the order and hold one use of its discount code
    ///
    /// The use is given back by `release_discount` when the order fails.
    async fn open_order(&self, user: &User, plan: &Plan, quote: &Quote) -> Result<Order> {
        if let Some(discount_id) = quote.discount_id {
            self.discount_service.use_code(discount_id).await?;
        }

        match self.create_order(user, plan, quote).await {
            Ok(order) => Ok(order),
            Err(e) => {
                if let Some(code) = &quote.discount_code {
                    self.release_code(code, None).await;
                }
                Err(e)
            }
        }
    }

    /// Buy a plan with the wallet balance
    pub async fn purchase_with_wallet(&self, user: &User, plan_id: i64, discount_code: Option<&str>) -> Result<Order> {
        let plan = self.purchasable_plan(plan_id).await?;
        let quote = self.quote(&plan, discount_code).await?;
        let order = self.open_order(user, &plan, &quote).await?;

        if quote.final_price > 0 {
            let description = format!("Purchase order #{}", order.id);
            if let Err(e) = self
                .wallet_repository
                .debit(user.id, quote.final_price, &description, Some(order.id))
                .await
            {
                self.fail_unpaid_order(&order).await?;
                info!(order_id = order.id, user_id = user.id, error = %e, "Wallet purchase declined");
                return Err(e);
            }
            log_payment_event(user.id, -quote.final_price, "wallet", "debit", Some(order.id));
        }

        let order = match self.order_repository.set_status(order.id, OrderStatus::Paid).await {
            Ok(order) => order,
            Err(e) => {
                self.refund_failed_order(&order, quote.final_price).await?;
                return Err(e);
            }
        };

        match self.provision(user, &plan, &order).await {
            Ok(completed) => {
                info!(order_id = completed.id, user_id = user.id, amount = completed.final_price, "Wallet purchase completed");
                self.accrue_referral(user, &completed).await;
                Ok(completed)
            }
            Err(e) => {
                self.refund_failed_order(&order, quote.final_price).await?;
                Err(e)
            }
        }
    }

    /// Create a pending order and manual payment for an admin to confirm
    pub async fn request_manual_payment(
        &self,
        user: &User,
        plan_id: i64,
        discount_code: Option<&str>,
    ) -> Result<(Order, Payment)> {
        if !self.settings.features.manual_payments {
            return Err(ShopError::ServiceUnavailable("manual payments are disabled".to_string()));
        }

        let plan = self.purchasable_plan(plan_id).await?;
        let quote = self.quote(&plan, discount_code).await?;
        if quote.final_price <= 0 {
            return Err(ShopError::InvalidAmount(
                "free orders are paid from the wallet".to_string(),
            ));
        }

        let order = self.open_order(user, &plan, &quote).await?;
        let created = self
            .payment_repository
            .create(CreatePaymentRequest {
                user_id: user.id,
                order_id: Some(order.id),
                amount: quote.final_price,
                currency: self.settings.shop.currency.clone(),
                payment_method: PaymentMethod::Manual,
                payment_gateway: Some("card".to_string()),
                status: PaymentStatus::Pending,
                description: Some(format!("Order #{} ({})", order.id, plan.name)),
            })
            .await;
        let payment = match created {
            Ok(payment) => payment,
            Err(e) => {
                self.fail_unpaid_order(&order).await?;
                return Err(e);
            }
        };

        log_payment_event(user.id, payment.amount, "manual", "pending", Some(payment.id));

        let p = params([
            ("user", escape_html(&user.display_name())),
            ("telegram_id", user.telegram_id.to_string()),
            ("plan", escape_html(&plan.name)),
            ("amount", format_price(payment.amount)),
            ("payment_id", payment.id.to_string()),
        ]);
        let keyboard = keyboards::payment_review(
            self.notification_service.i18n(),
            self.notification_service.admin_language(),
            payment.id,
        );
        if let Err(e) = self
            .notification_service
            .notify_admins("admin.notify.order_payment", Some(&p), Some(keyboard))
            .await
        {
            warn!(payment_id = payment.id, error = %e, "Could not notify admins about manual payment");
        }

        Ok((order, payment))
    }

    /// The pending order a manual payment pays for
    pub async fn pending_order_for(&self, payment: &Payment) -> Result<Order> {
        let order_id = payment
            .order_id
            .ok_or_else(|| ShopError::InvalidInput(format!("payment {} has no order", payment.id)))?;
        let order = self.get_order(order_id).await?;

        if order.status() != Some(OrderStatus::Pending) {
            return Err(ShopError::InvalidStateTransition {
                from: order.status.clone(),
                to: OrderStatus::Paid.to_string(),
            });
        }
        Ok(order)
    }

    /// Settle an order whose manual payment an admin confirmed
    ///
    /// Returns the completed order, or the failed order once the payment was
    /// credited to the wallet. `Err` means nothing was settled.
    pub async fn complete_manual_order(&self, payment: &Payment) -> Result<Order> {
        let order = self.pending_order_for(payment).await?;

        match self.fulfil_manual_order(&order).await {
            Ok(completed) => {
                info!(order_id = completed.id, payment_id = payment.id, "Manual order completed");
                Ok(completed)
            }
            Err(e) => {
                error!(order_id = order.id, payment_id = payment.id, error = %e, "Manual order could not be fulfilled");
                // money was received, so it goes back to the wallet
                self.refund_failed_order(&order, payment.amount).await?;
                self.get_order(order.id).await
            }
        }
    }

    async fn fulfil_manual_order(&self, order: &Order) -> Result<Order> {
        let user = self
            .user_repository
            .find_by_id(order.user_id)
            .await?
            .ok_or(ShopError::UserNotFound { user_id: order.user_id })?;
        let order = self.order_repository.set_status(order.id, OrderStatus::Paid).await?;

        let plan = match order.plan_id {
            Some(plan_id) => self.plan_service.get_plan(plan_id).await.ok(),
            None => None,
        };

        let completed = self.provision_with_mode(&user, plan.as_ref(), &order).await?;
        self.accrue_referral(&user, &completed).await;
        Ok(completed)
    }

    /// Give up on a pending order nobody paid for
    pub async fn cancel_pending_order(&self, order_id: i64) -> Result<Order> {
        let order = self.get_order(order_id).await?;
        if order.status() != Some(OrderStatus::Pending) {
            return Err(ShopError::InvalidStateTransition {
                from: order.status.clone(),
                to: OrderStatus::Failed.to_string(),
            });
        }
        self.fail_unpaid_order(&order).await?;
        self.get_order(order_id).await
    }

    async fn provision(&self, user: &User, plan: &Plan, order: &Order) -> Result<Order> {
        self.provision_with_mode(user, Some(plan), order).await
    }

    async fn provision_with_mode(&self, user: &User, plan: Option<&Plan>, order: &Order) -> Result<Order> {
        let mode = plan
            .map(|p| p.panel_mode.clone())
            .unwrap_or_else(|| DEFAULT_PANEL_MODE.to_string());

        let request = PanelUserRequest {
            uuid: generate_uuid(),
            name: format!("{}-{}", user.telegram_id, order.id),
            package_days: order.days,
            usage_limit_gb: f64::from(order.traffic_gb),
            mode,
            comment: Some(format!("order #{} {}", order.id, order.plan_name)),
            telegram_id: Some(user.telegram_id),
            enable: true,
        };

        let created = self.panel_client.create_user(&request).await.map_err(|e| {
            error!(order_id = order.id, user_id = user.id, error = %e, "Panel provisioning failed");
            ShopError::Panel(e)
        })?;

        // Hiddify addresses a user's subscription by the same uuid
        let secret_uuid = created.uuid.clone();
        self.user_repository
            .create_panel_link(user.id, Some(order.id), &created.uuid, &secret_uuid)
            .await?;

        self.order_repository
            .mark_completed(order.id, &created.uuid, &secret_uuid)
            .await
    }

    async fn refund_failed_order(&self, order: &Order, amount: i64) -> Result<()> {
        if amount > 0 {
            let description = format!("Refund for order #{}", order.id);
            self.wallet_repository
                .credit(order.user_id, amount, &description, Some(order.id))
                .await?;
            log_payment_event(order.user_id, amount, "wallet", "refund", Some(order.id));
        }
        self.order_repository.set_status(order.id, OrderStatus::Failed).await?;
        self.release_discount(order).await;
        warn!(order_id = order.id, amount = amount, "Order failed and refunded to wallet");
        Ok(())
    }

    async fn fail_unpaid_order(&self, order: &Order) -> Result<()> {
        self.order_repository.set_status(order.id, OrderStatus::Failed).await?;
        self.release_discount(order).await;
        Ok(())
    }

    async fn release_discount(&self, order: &Order) {
        if let Some(code) = &order.discount_code {
            self.release_code(code, Some(order.id)).await;
        }
    }

    async fn release_code(&self, code: &str, order_id: Option<i64>) {
        if let Err(e) = self.discount_service.release_code(code).await {
            warn!(code = %code, order_id = ?order_id, error = %e, "Could not release discount use");
        }
    }

    async fn accrue_referral(&self, user: &User, order: &Order) {
        if !self.settings.features.referrals {
            return;
        }
        if let Err(e) = self.referral_service.accrue_commission(user.id, order).await {
            warn!(order_id = order.id, user_id = user.id, error = %e, "Could not accrue referral commission");
        }
    }

    pub async fn get_order(&self, order_id: i64) -> Result<Order> {
        self.order_repository
            .find_by_id(order_id)
            .await?
            .ok_or(ShopError::OrderNotFound { order_id })
    }

    pub async fn user_orders(&self, user_id: i64) -> Result<Vec<Order>> {
        self.order_repository.list_by_user(user_id, ORDERS_PER_PAGE).await
    }

    pub async fn count_orders(&self) -> Result<i64> {
        self.order_repository.count().await
    }

    /// Completed orders of one user
    pub async fn count_user_orders(&self, user_id: i64) -> Result<i64> {
        self.order_repository.count_by_user(user_id).await
    }

    pub async fn orders_today(&self) -> Result<i64> {
        self.order_repository.count_since(start_of_day(Utc::now())).await
    }

    /// Panel accounts of a user with live usage where the panel answers
    pub async fn subscription_links(&self, user_id: i64) -> Result<Vec<Subscription>> {
        let links = self.user_repository.panel_links(user_id).await?;

        let lookups = links.into_iter().map(|link| async move {
            let profile = match self.panel_client.user_profile(&link.secret_uuid).await {
                Ok(profile) => Some(profile),
                Err(e) => {
                    debug!(panel_uuid = %link.panel_uuid, error = %e, "Usage lookup failed");
                    None
                }
            };
            Subscription {
                url: self.panel_client.subscription_url(&link.secret_uuid),
                link,
                profile,
            }
        });

        Ok(join_all(lookups).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(price: i64) -> Plan {
        Plan {
            id: 3,
            name: "Silver".to_string(),
            description: None,
            days: 30,
            traffic_gb: 50,
            price,
            panel_mode: "no_reset".to_string(),
            product_name: None,
            max_ips: 1,
            monthly_package: false,
            is_active: true,
            sort_order: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_quote_without_discount() {
        let quote = Quote::without_discount(&plan(150_000));
        assert_eq!(quote.final_price, 150_000);
        assert_eq!(quote.discount_amount, 0);
        assert_eq!(quote.discount_code, None);
    }

    #[test]
    fn test_quote_discount_clamped_to_price() {
        let quote = Quote::with_discount(&plan(100_000), "BIG".to_string(), 1, 250_000);
        assert_eq!(quote.discount_amount, 100_000);
        assert_eq!(quote.final_price, 0);

        let quote = Quote::with_discount(&plan(100_000), "TEN".to_string(), 2, 10_000);
        assert_eq!(quote.final_price, 90_000);
        assert_eq!(quote.discount_id, Some(2));
    }
}
