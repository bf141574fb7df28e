//! Admin user management: listing, search, flags and wallet adjustments

use teloxide::Bot;
use tracing::warn;

use crate::handlers::commands::admin::require_admin;
use crate::handlers::{begin_scenario, keyboards, Reply};
use crate::i18n::params;
use crate::models::User;
use crate::services::user::USERS_PER_PAGE;
use crate::state::{scenario_ids, AppContext, ConversationContext};
use crate::utils::errors::{ShopError, Result};
use crate::utils::helpers::{escape_html, format_date, format_price, total_pages, truncate_text};
use crate::utils::logging::log_admin_action;
use crate::utils::validators::parse_amount;

/// How an admin changes a wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletAdjustment {
    Add,
    Deduct,
    Set,
}

impl WalletAdjustment {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletAdjustment::Add => "add",
            WalletAdjustment::Deduct => "deduct",
            WalletAdjustment::Set => "set",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "add" => Some(WalletAdjustment::Add),
            "deduct" => Some(WalletAdjustment::Deduct),
            "set" => Some(WalletAdjustment::Set),
            _ => None,
        }
    }
}

pub async fn show_users(bot: &Bot, ctx: &AppContext, reply: Reply, admin: &User, page: i64) -> Result<()> {
    require_admin(ctx, admin).await?;
    let lang = &admin.language_code;
    let users = &ctx.services.user_service;

    let total = users.count_users().await?;
    let pages = total_pages(total, USERS_PER_PAGE);
    let page = page.clamp(1, pages);
    let list = users.list_users(page).await?;

    let text = ctx.tr("admin.users.title", lang, &params([("total", total.to_string())]));
    reply
        .send(bot, text, Some(keyboards::admin_users(&ctx.i18n, lang, &list, page, pages)))
        .await
}

fn yes_no(ctx: &AppContext, lang: &str, value: bool) -> String {
    ctx.t(if value { "common.yes" } else { "common.no" }, lang)
}

pub async fn show_user(bot: &Bot, ctx: &AppContext, reply: Reply, admin: &User, user_id: i64) -> Result<()> {
    require_admin(ctx, admin).await?;
    let lang = &admin.language_code;
    let user = ctx.services.user_service.get_user(user_id).await?;
    let orders = ctx.services.order_service.count_user_orders(user.id).await?;

    let text = ctx.tr(
        "admin.users.details",
        lang,
        &params([
            ("id", user.id.to_string()),
            ("name", escape_html(&user.display_name())),
            ("telegram_id", user.telegram_id.to_string()),
            ("username", escape_html(user.username.as_deref().unwrap_or("-"))),
            ("phone", escape_html(user.phone.as_deref().unwrap_or("-"))),
            ("balance", format_price(user.wallet_balance)),
            ("orders", orders.to_string()),
            ("admin", yes_no(ctx, lang, user.is_admin)),
            ("agent", yes_no(ctx, lang, user.is_agent)),
            ("blocked", yes_no(ctx, lang, user.is_blocked)),
            ("joined", format_date(user.created_at)),
        ]),
    );
    reply
        .send(bot, text, Some(keyboards::admin_user_actions(&ctx.i18n, lang, &user)))
        .await
}

pub async fn start_search(bot: &Bot, ctx: &AppContext, reply: Reply, admin: &User) -> Result<()> {
    require_admin(ctx, admin).await?;
    begin_scenario(bot, ctx, reply, admin, scenario_ids::ADMIN_USER_SEARCH, &[]).await
}

/// Search by name, username, phone or telegram id
pub async fn submit_search(bot: &Bot, ctx: &AppContext, reply: Reply, admin: &User, query: &str) -> Result<()> {
    require_admin(ctx, admin).await?;
    let lang = &admin.language_code;
    let found = ctx.services.user_service.search_users(query.trim()).await?;
    ctx.clear_context(admin.telegram_id).await?;

    if found.is_empty() {
        return reply
            .send(bot, ctx.t("admin.users.search_empty", lang), Some(keyboards::admin_back(&ctx.i18n, lang)))
            .await;
    }

    let text = ctx.tr(
        "admin.users.search_results",
        lang,
        &params([
            ("query", escape_html(&truncate_text(query.trim(), 40))),
            ("count", found.len().to_string()),
        ]),
    );
    reply
        .send(bot, text, Some(keyboards::admin_users(&ctx.i18n, lang, &found, 1, 1)))
        .await
}

pub async fn set_blocked(bot: &Bot, ctx: &AppContext, reply: Reply, admin: &User, user_id: i64, blocked: bool) -> Result<()> {
    require_admin(ctx, admin).await?;
    let target = ctx.services.user_service.get_user(user_id).await?;
    if blocked && ctx.services.auth_service.is_config_admin(target.telegram_id) {
        return Err(ShopError::PermissionDenied("configured admins cannot be blocked".to_string()));
    }

    ctx.services.user_service.set_blocked(user_id, blocked, admin.id).await?;
    log_admin_action(
        admin.id,
        if blocked { "block_user" } else { "unblock_user" },
        Some(&user_id.to_string()),
        None,
    );
    show_user(bot, ctx, reply, admin, user_id).await
}

pub async fn toggle_admin(bot: &Bot, ctx: &AppContext, reply: Reply, admin: &User, user_id: i64) -> Result<()> {
    require_admin(ctx, admin).await?;
    if user_id == admin.id {
        return Err(ShopError::PermissionDenied("admins cannot change their own role".to_string()));
    }
    ctx.services.user_service.toggle_admin(user_id, admin.id).await?;
    log_admin_action(admin.id, "toggle_admin", Some(&user_id.to_string()), None);
    show_user(bot, ctx, reply, admin, user_id).await
}

pub async fn toggle_agent(bot: &Bot, ctx: &AppContext, reply: Reply, admin: &User, user_id: i64) -> Result<()> {
    require_admin(ctx, admin).await?;
    ctx.services.user_service.toggle_agent(user_id, admin.id).await?;
    log_admin_action(admin.id, "toggle_agent", Some(&user_id.to_string()), None);
    show_user(bot, ctx, reply, admin, user_id).await
}

pub async fn start_wallet_adjust(
    bot: &Bot,
    ctx: &AppContext,
    reply: Reply,
    admin: &User,
    user_id: i64,
    adjustment: WalletAdjustment,
) -> Result<()> {
    require_admin(ctx, admin).await?;
    ctx.services.user_service.get_user(user_id).await?;
    begin_scenario(
        bot,
        ctx,
        reply,
        admin,
        scenario_ids::ADMIN_WALLET_ADJUST,
        &[
            ("user_id", serde_json::json!(user_id)),
            ("mode", serde_json::json!(adjustment.as_str())),
        ],
    )
    .await
}

/// Amount typed during a wallet adjustment; the owner is told the new balance
pub async fn submit_wallet_adjust(
    bot: &Bot,
    ctx: &AppContext,
    reply: Reply,
    admin: &User,
    context: &ConversationContext,
    input: &str,
) -> Result<()> {
    require_admin(ctx, admin).await?;
    let user_id = context.require_i64("user_id")?;
    let adjustment = context
        .get_string("mode")
        .as_deref()
        .and_then(WalletAdjustment::parse)
        .ok_or_else(|| ShopError::InvalidInput("missing wallet adjustment mode".to_string()))?;
    let amount = parse_amount(input)
        .ok_or_else(|| ShopError::InvalidAmount(format!("unreadable amount: {}", input)))?;

    let wallet = &ctx.services.wallet_service;
    let description = format!("Adjusted by admin {}", admin.id);
    match adjustment {
        WalletAdjustment::Add => {
            wallet.credit(user_id, amount, &description).await?;
        }
        WalletAdjustment::Deduct => {
            wallet.debit(user_id, amount, &description, None).await?;
        }
        WalletAdjustment::Set => {
            wallet.set_balance(user_id, amount, admin.id).await?;
        }
    }
    ctx.clear_context(admin.telegram_id).await?;
    log_admin_action(
        admin.id,
        "wallet_adjust",
        Some(&user_id.to_string()),
        Some(&format!("{} {}", adjustment.as_str(), amount)),
    );

    let target = ctx.services.user_service.get_user(user_id).await?;
    let p = params([("balance", format_price(target.wallet_balance))]);
    if let Err(e) = ctx
        .services
        .notification_service
        .notify_user(target.telegram_id, &target.language_code, "wallet.adjusted", Some(&p), None)
        .await
    {
        warn!(user_id = user_id, error = %e, "Could not notify user about wallet adjustment");
    }

    show_user(bot, ctx, reply, admin, user_id).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_adjustment_text() {
        for adjustment in [WalletAdjustment::Add, WalletAdjustment::Deduct, WalletAdjustment::Set] {
            assert_eq!(WalletAdjustment::parse(adjustment.as_str()), Some(adjustment));
        }
        assert_eq!(WalletAdjustment::parse("double"), None);
    }
}
