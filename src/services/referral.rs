//! Referral service
//!
//! Links new users to the referrer whose code they arrived with, accrues a
//! commission on the referred user's first completed order and pays it out
//! to the referrer's wallet.

use tracing::{info, warn, debug};
use crate::config::settings::Settings;
use crate::database::repositories::{ReferralRepository, UserRepository};
use crate::i18n::params;
use crate::models::order::Order;
use crate::models::referral::{Referral, ReferralStats, ReferredUser, TopReferrer};
use crate::models::user::User;
use crate::services::notification::NotificationService;
use crate::utils::errors::{ShopError, Result};
use crate::utils::helpers::format_price;

#[derive(Clone)]
pub struct ReferralService {
    referral_repository: ReferralRepository,
    user_repository: UserRepository,
    notification_service: NotificationService,
    settings: Settings,
}

impl ReferralService {
    pub fn new(
        referral_repository: ReferralRepository,
        user_repository: UserRepository,
        notification_service: NotificationService,
        settings: Settings,
    ) -> Self {
        Self {
            referral_repository,
            user_repository,
            notification_service,
            settings,
        }
    }

    /// Attach a freshly registered user to the owner of `code`
    ///
    /// Unknown codes, self-referrals and users that already have a referrer
    /// are ignored and yield `None`.
    pub async fn handle_start_referral(&self, new_user: &User, code: &str) -> Result<Option<Referral>> {
        if !self.settings.features.referrals {
            return Ok(None);
        }

        let Some(referrer) = self.user_repository.find_by_referral_code(code.trim()).await? else {
            debug!(code = %code, "Unknown referral code");
            return Ok(None);
        };

        if referrer.id == new_user.id {
            debug!(user_id = new_user.id, "Ignoring self-referral");
            return Ok(None);
        }

        if new_user.referred_by.is_some()
            || self.referral_repository.find_by_referred(new_user.id).await?.is_some()
        {
            debug!(user_id = new_user.id, "User already has a referrer");
            return Ok(None);
        }

        if !self.user_repository.set_referred_by(new_user.id, referrer.id).await? {
            return Ok(None);
        }

        let Some(referral) = self.referral_repository.create(referrer.id, new_user.id).await? else {
            return Ok(None);
        };

        info!(referrer_id = referrer.id, referred_id = new_user.id, "Referral recorded");

        let p = params([("name", crate::utils::helpers::escape_html(&new_user.display_name()))]);
        if let Err(e) = self
            .notification_service
            .notify_user(referrer.telegram_id, &referrer.language_code, "referral.new_referral", Some(&p), None)
            .await
        {
            warn!(referrer_id = referrer.id, error = %e, "Could not notify referrer");
        }

        Ok(Some(referral))
    }

    /// Set the commission for the buyer's referral from their first order
    pub async fn accrue_commission(&self, referred_user_id: i64, order: &Order) -> Result<Option<Referral>> {
        let Some(referral) = self.referral_repository.find_by_referred(referred_user_id).await? else {
            return Ok(None);
        };

        if referral.commission_amount != 0 {
            return Ok(None);
        }

        let amount = calculate_commission(order.final_price, self.settings.shop.referral_commission_percent);
        if amount <= 0 {
            return Ok(None);
        }

        let updated = self.referral_repository.set_commission(referral.id, amount, order.id).await?;
        if let Some(updated) = &updated {
            info!(
                referral_id = updated.id,
                referrer_id = updated.referrer_id,
                order_id = order.id,
                amount = amount,
                "Referral commission accrued"
            );
        }
        Ok(updated)
    }

    /// Credit a pending commission to the referrer's wallet
    pub async fn pay_commission(&self, referral_id: i64) -> Result<Referral> {
        let Some(referral) = self.referral_repository.pay_commission(referral_id).await? else {
            let existing = self
                .referral_repository
                .find_by_id(referral_id)
                .await?
                .ok_or_else(|| ShopError::InvalidInput(format!("referral {} not found", referral_id)))?;
            let from = if existing.commission_amount == 0 {
                "unaccrued".to_string()
            } else {
                existing.commission_status
            };
            return Err(ShopError::InvalidStateTransition {
                from,
                to: "paid".to_string(),
            });
        };

        info!(
            referral_id = referral.id,
            referrer_id = referral.referrer_id,
            amount = referral.commission_amount,
            "Referral commission paid"
        );

        if let Some(referrer) = self.user_repository.find_by_id(referral.referrer_id).await? {
            let p = params([("amount", format_price(referral.commission_amount))]);
            if let Err(e) = self
                .notification_service
                .notify_user(referrer.telegram_id, &referrer.language_code, "referral.commission_paid", Some(&p), None)
                .await
            {
                warn!(referrer_id = referrer.id, error = %e, "Could not notify referrer about payout");
            }
        }

        Ok(referral)
    }

    pub async fn stats(&self, user_id: i64) -> Result<ReferralStats> {
        self.referral_repository.stats(user_id).await
    }

    pub async fn referred_users(&self, user_id: i64, limit: i64) -> Result<Vec<ReferredUser>> {
        self.referral_repository.referred_users(user_id, limit).await
    }

    pub async fn pending_commissions(&self, limit: i64) -> Result<Vec<Referral>> {
        self.referral_repository.pending_commissions(limit).await
    }

    pub async fn top_referrers(&self, limit: i64) -> Result<Vec<TopReferrer>> {
        self.referral_repository.top_referrers(limit).await
    }
}

/// Commission on `amount` at `percent`, floored to whole tomans
pub fn calculate_commission(amount: i64, percent: i64) -> i64 {
    if amount <= 0 {
        return 0;
    }
    amount * percent.clamp(0, 100) / 100
}

/// Deep link that starts the bot with a referral code
pub fn referral_link(bot_username: &str, code: &str) -> String {
    format!("https://t.me/{}?start={}", bot_username.trim_start_matches('@'), code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_calculate_commission() {
        assert_eq!(calculate_commission(150_000, 10), 15_000);
        assert_eq!(calculate_commission(99_999, 10), 9_999);
        assert_eq!(calculate_commission(1_000, 0), 0);
        assert_eq!(calculate_commission(0, 10), 0);
        assert_eq!(calculate_commission(-500, 10), 0);
        assert_eq!(calculate_commission(1_000, 250), 1_000);
    }

    #[test]
    fn test_referral_link() {
        assert_eq!(
            referral_link("hiddy_shop_bot", "AB12CD34"),
            "https://t.me/hiddy_shop_bot?start=AB12CD34"
        );
        assert_eq!(
            referral_link("@hiddy_shop_bot", "X"),
            "https://t.me/hiddy_shop_bot?start=X"
        );
    }

    proptest! {
        #[test]
        fn prop_commission_bounded(amount in 0i64..1_000_000_000_000, percent in -50i64..200) {
            let commission = calculate_commission(amount, percent);
            prop_assert!(commission >= 0);
            prop_assert!(commission <= amount);
        }
    }
}
