//! Payment service
//!
//! Records payments, answers admin confirmations and computes payment
//! statistics. A payment only ever leaves `pending` once, so confirming the
//! same payment twice is rejected rather than applied twice.

use chrono::{Duration, Utc};
use tracing::{info, warn};

use crate::config::settings::Settings;
use crate::database::repositories::{PaymentRepository, UserRepository, PaymentWindowTotals};
use crate::handlers::keyboards;
use crate::i18n::params;
use crate::models::order::OrderStatus;
use crate::models::payment::{Payment, CreatePaymentRequest, PaymentMethod, PaymentStatus};
use crate::models::user::User;
use crate::services::notification::NotificationService;
use crate::services::order::OrderService;
use crate::utils::errors::{ShopError, Result};
use crate::utils::helpers::{calculate_offset, escape_html, format_price};
use crate::utils::logging::{log_admin_action, log_payment_event};
use crate::utils::validators::validate_amount;

pub const PAYMENTS_PER_PAGE: i64 = 10;
pub const PENDING_LIST_LIMIT: i64 = 20;

/// Number of non-wallet payments per status
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentStatusCounts {
    pub pending: i64,
    pub success: i64,
    pub failed: i64,
    pub cancelled: i64,
}

impl PaymentStatusCounts {
    pub fn from_rows(rows: &[(String, i64)]) -> Self {
        let mut counts = Self::default();
        for (status, count) in rows {
            match status.parse::<PaymentStatus>() {
                Ok(PaymentStatus::Pending) => counts.pending += count,
                Ok(PaymentStatus::Success) => counts.success += count,
                Ok(PaymentStatus::Failed) => counts.failed += count,
                Ok(PaymentStatus::Cancelled) => counts.cancelled += count,
                Err(_) => warn!(status = %status, "Unknown payment status in database"),
            }
        }
        counts
    }

    pub fn total(&self) -> i64 {
        self.pending + self.success + self.failed + self.cancelled
    }
}

/// Summary of money received over a window of days
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentStatistics {
    pub days: i64,
    pub success_count: i64,
    pub total_amount: i64,
    pub average_amount: i64,
    /// Successful payments as a percentage of all payments in the window
    pub conversion_rate: f64,
}

impl PaymentStatistics {
    pub fn from_totals(days: i64, totals: &PaymentWindowTotals) -> Self {
        let average_amount = if totals.success_count > 0 {
            totals.success_amount / totals.success_count
        } else {
            0
        };
        let conversion_rate = if totals.all_count > 0 {
            totals.success_count as f64 / totals.all_count as f64 * 100.0
        } else {
            0.0
        };

        Self {
            days,
            success_count: totals.success_count,
            total_amount: totals.success_amount,
            average_amount,
            conversion_rate,
        }
    }
}

#[derive(Clone)]
pub struct PaymentService {
    payment_repository: PaymentRepository,
    user_repository: UserRepository,
    order_service: OrderService,
    notification_service: NotificationService,
    settings: Settings,
}

impl PaymentService {
    pub fn new(
        payment_repository: PaymentRepository,
        user_repository: UserRepository,
        order_service: OrderService,
        notification_service: NotificationService,
        settings: Settings,
    ) -> Self {
        Self {
            payment_repository,
            user_repository,
            order_service,
            notification_service,
            settings,
        }
    }

    pub async fn create_payment(
        &self,
        user_id: i64,
        amount: i64,
        method: PaymentMethod,
        order_id: Option<i64>,
        description: Option<String>,
        gateway: Option<String>,
    ) -> Result<Payment> {
        validate_amount(amount).map_err(|reason| ShopError::InvalidAmount(reason.to_string()))?;

        let payment = self
            .payment_repository
            .create(CreatePaymentRequest {
                user_id,
                order_id,
                amount,
                currency: self.settings.shop.currency.clone(),
                payment_method: method,
                payment_gateway: gateway,
                status: PaymentStatus::Pending,
                description,
            })
            .await?;

        log_payment_event(user_id, amount, method.as_str(), "pending", Some(payment.id));
        Ok(payment)
    }

    pub async fn get_payment(&self, payment_id: i64) -> Result<Payment> {
        self.payment_repository
            .find_by_id(payment_id)
            .await?
            .ok_or(ShopError::PaymentNotFound { payment_id })
    }

    pub async fn get_by_transaction_id(&self, transaction_id: &str) -> Result<Option<Payment>> {
        self.payment_repository.find_by_transaction_id(transaction_id).await
    }

    /// Move a pending payment to its final status
    pub async fn update_status(
        &self,
        payment_id: i64,
        status: PaymentStatus,
        transaction_id: Option<&str>,
        authority: Option<&str>,
    ) -> Result<Payment> {
        let current = self.get_payment(payment_id).await?;
        let from = current.status.clone();

        let allowed = current.status().is_some_and(|s| s.can_transition_to(status));
        if !allowed {
            return Err(ShopError::InvalidStateTransition { from, to: status.to_string() });
        }

        let updated = self
            .payment_repository
            .transition_from_pending(payment_id, status, transaction_id, authority)
            .await?
            // lost a race with another confirmation
            .ok_or_else(|| ShopError::InvalidStateTransition { from, to: status.to_string() })?;

        log_payment_event(updated.user_id, updated.amount, &updated.payment_method, status.as_str(), Some(updated.id));
        Ok(updated)
    }

    pub async fn user_payments(&self, user_id: i64, page: i64) -> Result<Vec<Payment>> {
        self.payment_repository
            .list_by_user(user_id, PAYMENTS_PER_PAGE, calculate_offset(page, PAYMENTS_PER_PAGE))
            .await
    }

    pub async fn pending_payments(&self) -> Result<Vec<Payment>> {
        self.payment_repository.list_pending(PENDING_LIST_LIMIT).await
    }

    pub async fn count_by_status(&self) -> Result<PaymentStatusCounts> {
        let rows = self.payment_repository.count_by_status().await?;
        Ok(PaymentStatusCounts::from_rows(&rows))
    }

    /// Statistics over the last `days` days
    pub async fn statistics(&self, days: i64) -> Result<PaymentStatistics> {
        let since = Utc::now() - Duration::days(days.max(1));
        let totals = self.payment_repository.window_totals(since).await?;
        Ok(PaymentStatistics::from_totals(days, &totals))
    }

    /// Admin decision on a pending manual payment
    pub async fn verify_payment(&self, payment_id: i64, approved: bool, admin_id: i64) -> Result<Payment> {
        let payment = self.get_payment(payment_id).await?;
        if payment.status() != Some(PaymentStatus::Pending) {
            return Err(ShopError::InvalidStateTransition {
                from: payment.status.clone(),
                to: if approved { "success" } else { "failed" }.to_string(),
            });
        }

        let user = self
            .user_repository
            .find_by_id(payment.user_id)
            .await?
            .ok_or(ShopError::UserNotFound { user_id: payment.user_id })?;

        let (payment, notice_key) = if approved {
            self.approve(payment).await?
        } else {
            self.reject(payment).await?
        };

        log_admin_action(
            admin_id,
            if approved { "payment_approved" } else { "payment_rejected" },
            Some(&payment.id.to_string()),
            None,
        );

        let p = params([
            ("amount", format_price(payment.amount)),
            ("payment_id", payment.id.to_string()),
        ]);
        if let Err(e) = self
            .notification_service
            .notify_user(user.telegram_id, &user.language_code, notice_key, Some(&p), None)
            .await
        {
            warn!(payment_id = payment.id, error = %e, "Could not notify user about payment decision");
        }

        Ok(payment)
    }

    async fn approve(&self, payment: Payment) -> Result<(Payment, &'static str)> {
        match payment.order_id {
            None => {
                let approved = self
                    .payment_repository
                    .approve_topup(payment.id)
                    .await?
                    .ok_or_else(|| ShopError::InvalidStateTransition {
                        from: payment.status.clone(),
                        to: PaymentStatus::Success.to_string(),
                    })?;
                info!(payment_id = approved.id, user_id = approved.user_id, amount = approved.amount, "Top-up approved");
                Ok((approved, "payment.topup_approved"))
            }
            Some(_) => {
                // the order must still be payable before the money is accepted
                self.order_service.pending_order_for(&payment).await?;
                let approved = self
                    .update_status(payment.id, PaymentStatus::Success, None, None)
                    .await?;

                let order = self.order_service.complete_manual_order(&approved).await?;
                if order.status() == Some(OrderStatus::Completed) {
                    Ok((approved, "payment.order_approved"))
                } else {
                    warn!(payment_id = approved.id, order_id = order.id, "Order refunded to wallet after failed fulfilment");
                    Ok((approved, "payment.order_refunded"))
                }
            }
        }
    }

    async fn reject(&self, payment: Payment) -> Result<(Payment, &'static str)> {
        let rejected = self
            .update_status(payment.id, PaymentStatus::Failed, None, None)
            .await?;

        if let Some(order_id) = rejected.order_id {
            self.order_service.cancel_pending_order(order_id).await?;
        }

        info!(payment_id = rejected.id, user_id = rejected.user_id, "Payment rejected");
        Ok((rejected, "payment.rejected"))
    }

    /// Open a card-to-card top-up for an admin to confirm
    pub async fn request_topup(&self, user: &User, amount: i64) -> Result<Payment> {
        if !self.settings.features.manual_payments {
            return Err(ShopError::ServiceUnavailable("manual payments are disabled".to_string()));
        }

        check_topup_bounds(amount, self.settings.shop.min_topup, self.settings.shop.max_topup)?;

        let payment = self
            .create_payment(
                user.id,
                amount,
                PaymentMethod::Manual,
                None,
                Some("Wallet top-up".to_string()),
                Some("card".to_string()),
            )
            .await?;

        let p = params([
            ("user", escape_html(&user.display_name())),
            ("telegram_id", user.telegram_id.to_string()),
            ("amount", format_price(amount)),
            ("payment_id", payment.id.to_string()),
        ]);
        let keyboard = keyboards::payment_review(
            self.notification_service.i18n(),
            self.notification_service.admin_language(),
            payment.id,
        );
        if let Err(e) = self
            .notification_service
            .notify_admins("admin.notify.topup_request", Some(&p), Some(keyboard))
            .await
        {
            warn!(payment_id = payment.id, error = %e, "Could not notify admins about top-up");
        }

        Ok(payment)
    }
}

fn check_topup_bounds(amount: i64, min: i64, max: i64) -> Result<()> {
    if amount < min {
        return Err(ShopError::InvalidAmount(format!("minimum top-up is {}", format_price(min))));
    }
    if amount > max {
        return Err(ShopError::InvalidAmount(format!("maximum top-up is {}", format_price(max))));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_status_counts_from_rows() {
        let rows = vec![
            ("pending".to_string(), 2),
            ("success".to_string(), 7),
            ("failed".to_string(), 1),
            ("weird".to_string(), 9),
        ];
        let counts = PaymentStatusCounts::from_rows(&rows);
        assert_eq!(counts.pending, 2);
        assert_eq!(counts.success, 7);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.cancelled, 0);
        assert_eq!(counts.total(), 10);
    }

    #[test]
    fn test_statistics_from_totals() {
        let totals = PaymentWindowTotals {
            success_count: 3,
            success_amount: 450_000,
            all_count: 4,
        };
        let stats = PaymentStatistics::from_totals(30, &totals);
        assert_eq!(stats.average_amount, 150_000);
        assert_eq!(stats.conversion_rate, 75.0);

        let empty = PaymentStatistics::from_totals(30, &PaymentWindowTotals {
            success_count: 0,
            success_amount: 0,
            all_count: 0,
        });
        assert_eq!(empty.average_amount, 0);
        assert_eq!(empty.conversion_rate, 0.0);
    }

    #[test]
    fn test_topup_bounds() {
        assert!(check_topup_bounds(50_000, 10_000, 10_000_000).is_ok());
        assert_matches!(check_topup_bounds(5_000, 10_000, 10_000_000), Err(ShopError::InvalidAmount(_)));
        assert_matches!(check_topup_bounds(20_000_000, 10_000, 10_000_000), Err(ShopError::InvalidAmount(_)));
    }
}
