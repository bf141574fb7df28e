//! Wallet screens: balance, ledger history and card-to-card top-up

use teloxide::Bot;
use tracing::info;

use crate::handlers::commands::shop::card_params;
use crate::handlers::{begin_scenario, keyboards, Reply};
use crate::i18n::params;
use crate::models::{Payment, User};
use crate::services::wallet::HISTORY_PER_PAGE;
use crate::state::{scenario_ids, AppContext};
use crate::utils::errors::Result;
use crate::utils::helpers::{escape_html, format_price, format_timestamp};
use crate::utils::validators::parse_amount;

pub async fn show_wallet(bot: &Bot, ctx: &AppContext, reply: Reply, user: &User) -> Result<()> {
    let lang = &user.language_code;
    let balance = ctx.services.wallet_service.balance(user.id).await?;
    let shop = &ctx.settings.shop;

    let text = ctx.tr(
        "wallet.title",
        lang,
        &params([
            ("balance", format_price(balance)),
            ("min", format_price(shop.min_topup)),
            ("max", format_price(shop.max_topup)),
        ]),
    );
    let keyboard = keyboards::wallet_menu(&ctx.i18n, lang, ctx.settings.features.manual_payments);
    reply.send(bot, text, Some(keyboard)).await
}

fn history_line(entry: &Payment) -> String {
    let sign = if entry.amount >= 0 { "➕" } else { "➖" };
    format!(
        "{} {} | {}\n<i>{}</i>",
        sign,
        format_price(entry.amount.abs()),
        format_timestamp(entry.created_at),
        escape_html(entry.description.as_deref().unwrap_or("")),
    )
}

/// One page of the wallet ledger
///
/// The total is not counted; a full page implies another may follow.
pub async fn show_history(bot: &Bot, ctx: &AppContext, reply: Reply, user: &User, page: i64) -> Result<()> {
    let lang = &user.language_code;
    let page = page.max(1);
    let entries = ctx.services.wallet_service.history(user.id, page).await?;

    let pages = if entries.len() as i64 == HISTORY_PER_PAGE { page + 1 } else { page };
    let text = if entries.is_empty() {
        ctx.t("wallet.history_empty", lang)
    } else {
        let lines: Vec<String> = entries.iter().map(history_line).collect();
        format!("{}\n\n{}", ctx.t("wallet.history_title", lang), lines.join("\n\n"))
    };

    reply
        .send(bot, text, Some(keyboards::wallet_history(&ctx.i18n, lang, page, pages)))
        .await
}

pub async fn start_topup(bot: &Bot, ctx: &AppContext, reply: Reply, user: &User) -> Result<()> {
    if !ctx.settings.features.manual_payments {
        return Err(crate::utils::errors::ShopError::ServiceUnavailable(
            "manual payments are disabled".to_string(),
        ));
    }
    begin_scenario(bot, ctx, reply, user, scenario_ids::TOPUP, &[]).await
}

/// Amount typed during the top-up scenario
pub async fn submit_topup(bot: &Bot, ctx: &AppContext, reply: Reply, user: &User, input: &str) -> Result<()> {
    let lang = &user.language_code;
    let amount = parse_amount(input).ok_or_else(|| {
        crate::utils::errors::ShopError::InvalidAmount(format!("unreadable amount: {}", input))
    })?;

    let payment = ctx.services.payment_service.request_topup(user, amount).await?;
    ctx.clear_context(user.telegram_id).await?;
    info!(user_id = user.id, payment_id = payment.id, amount = amount, "Top-up requested");

    let text = ctx.tr("wallet.topup_instructions", lang, &card_params(ctx, payment.amount, payment.id));
    reply.send(bot, text, Some(keyboards::back_to_main(&ctx.i18n, lang))).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(amount: i64, description: &str) -> Payment {
        Payment {
            id: 1,
            user_id: 1,
            order_id: None,
            amount,
            currency: "IRT".to_string(),
            payment_method: "wallet".to_string(),
            payment_gateway: None,
            transaction_id: None,
            authority: None,
            status: "success".to_string(),
            description: Some(description.to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_history_line_sign_and_escaping() {
        let debit = history_line(&entry(-20_000, "Purchase <order> #3"));
        assert!(debit.starts_with("➖"));
        assert!(debit.contains("&lt;order&gt;"));
        assert!(history_line(&entry(50_000, "Top-up")).starts_with("➕"));
    }
}
