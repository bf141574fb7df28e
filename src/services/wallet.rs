//! Wallet service
//!
//! Balance movements go through the ledger repository, which writes the
//! balance change and its `payments` row in one transaction.

use tracing::{info, debug};
use crate::database::repositories::WalletRepository;
use crate::models::payment::Payment;
use crate::utils::errors::{ShopError, Result};
use crate::utils::helpers::calculate_offset;
use crate::utils::logging::log_payment_event;
use crate::utils::validators::validate_amount;

pub const HISTORY_PER_PAGE: i64 = 10;

#[derive(Clone)]
pub struct WalletService {
    wallet_repository: WalletRepository,
}

impl WalletService {
    pub fn new(wallet_repository: WalletRepository) -> Self {
        Self { wallet_repository }
    }

    pub async fn balance(&self, user_id: i64) -> Result<i64> {
        self.wallet_repository.balance(user_id).await
    }

    pub async fn credit(&self, user_id: i64, amount: i64, description: &str) -> Result<Payment> {
        check_amount(amount)?;
        let entry = self.wallet_repository.credit(user_id, amount, description, None).await?;
        log_payment_event(user_id, amount, "wallet", "credit", Some(entry.id));
        Ok(entry)
    }

    pub async fn debit(&self, user_id: i64, amount: i64, description: &str, order_id: Option<i64>) -> Result<Payment> {
        check_amount(amount)?;
        let entry = self.wallet_repository.debit(user_id, amount, description, order_id).await?;
        log_payment_event(user_id, -amount, "wallet", "debit", Some(entry.id));
        Ok(entry)
    }

    pub async fn transfer(&self, from_user: i64, to_user: i64, amount: i64) -> Result<(Payment, Payment)> {
        check_amount(amount)?;
        let description = format!("Transfer {} -> {}", from_user, to_user);
        let entries = self.wallet_repository.transfer(from_user, to_user, amount, &description).await?;
        info!(from_user = from_user, to_user = to_user, amount = amount, "Wallet transfer completed");
        Ok(entries)
    }

    /// Overwrite the balance; negative targets clamp to zero
    pub async fn set_balance(&self, user_id: i64, amount: i64, admin_id: i64) -> Result<Option<Payment>> {
        let description = format!("Balance set by admin {}", admin_id);
        let entry = self.wallet_repository.set_balance(user_id, amount.max(0), &description).await?;
        info!(user_id = user_id, admin_id = admin_id, new_balance = amount.max(0), "Wallet balance set");
        Ok(entry)
    }

    /// Ledger rows, newest first (pages start at 1)
    pub async fn history(&self, user_id: i64, page: i64) -> Result<Vec<Payment>> {
        debug!(user_id = user_id, page = page, "Loading wallet history");
        self.wallet_repository
            .history(user_id, HISTORY_PER_PAGE, calculate_offset(page, HISTORY_PER_PAGE))
            .await
    }
}

fn check_amount(amount: i64) -> Result<()> {
    validate_amount(amount).map_err(|reason| ShopError::InvalidAmount(reason.to_string()))
}
