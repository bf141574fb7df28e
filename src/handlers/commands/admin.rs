//! Admin command handlers
//!
//! The admin console: statistics, payment review, agent applications,
//! referral payouts, backups and panel status. User and catalogue
//! management live in `admin_users` and `admin_catalog`.

use teloxide::Bot;
use tracing::{info, debug};

use crate::handlers::{begin_scenario, keyboards, Reply};
use crate::i18n::params;
use crate::models::{Payment, User};
use crate::services::panel::summarize_server_status;
use crate::services::{AuthContext, Permission};
use crate::state::{scenario_ids, AppContext, ConversationContext};
use crate::utils::errors::Result;
use crate::utils::helpers::{escape_html, format_price, format_timestamp, truncate_text};
use crate::utils::logging::log_admin_action;

/// Window of the payment statistics screen
const STATS_WINDOW_DAYS: i64 = 30;
/// Pending commissions listed for payout
const PENDING_COMMISSIONS: i64 = 20;

/// Refuse anyone without the admin permission
pub async fn require_admin(ctx: &AppContext, user: &User) -> Result<AuthContext> {
    let auth = ctx.services.auth_service.require_admin(user.telegram_id).await;
    ctx.services.auth_service.log_auth_event(user.telegram_id, "admin", auth.is_ok());
    auth
}

async fn require_super_admin(ctx: &AppContext, user: &User) -> Result<AuthContext> {
    let auth = ctx
        .services
        .auth_service
        .require_permission(user.telegram_id, Permission::SuperAdmin)
        .await;
    ctx.services.auth_service.log_auth_event(user.telegram_id, "super_admin", auth.is_ok());
    auth
}

/// Handle /admin and the admin menu button
pub async fn show_admin_menu(bot: &Bot, ctx: &AppContext, reply: Reply, user: &User) -> Result<()> {
    require_admin(ctx, user).await?;
    ctx.clear_context(user.telegram_id).await?;

    let lang = &user.language_code;
    reply
        .send(bot, ctx.t("admin.menu.title", lang), Some(keyboards::admin_menu(&ctx.i18n, lang)))
        .await
}

/// Shop-wide counters and the top referrers
pub async fn show_stats(bot: &Bot, ctx: &AppContext, reply: Reply, user: &User) -> Result<()> {
    require_admin(ctx, user).await?;
    let lang = &user.language_code;
    let overview = ctx.services.stats_service.overview().await?;

    let mut text = ctx.tr(
        "admin.stats.text",
        lang,
        &params([
            ("users_total", overview.users_total.to_string()),
            ("users_active", overview.users_active.to_string()),
            ("users_admins", overview.users_admins.to_string()),
            ("users_today", overview.users_today.to_string()),
            ("plans_total", overview.plans_total.to_string()),
            ("plans_active", overview.plans_active.to_string()),
            ("orders_total", overview.orders_total.to_string()),
            ("orders_today", overview.orders_today.to_string()),
            ("revenue_total", format_price(overview.revenue_total)),
            ("revenue_today", format_price(overview.revenue_today)),
        ]),
    );

    if !overview.top_referrers.is_empty() {
        let lines: Vec<String> = overview
            .top_referrers
            .iter()
            .enumerate()
            .map(|(index, r)| {
                let name = r
                    .username
                    .as_deref()
                    .map(|u| format!("@{}", u))
                    .or_else(|| r.first_name.clone())
                    .unwrap_or_else(|| r.telegram_id.to_string());
                format!(
                    "{}. {} | {} | {}",
                    index + 1,
                    escape_html(&name),
                    r.referral_count,
                    format_price(r.total_commission)
                )
            })
            .collect();
        text.push_str(&format!("\n\n{}\n{}", ctx.t("admin.stats.top_referrers", lang), lines.join("\n")));
    }

    reply.send(bot, text, Some(keyboards::admin_back(&ctx.i18n, lang))).await
}

fn payment_line(payment: &Payment) -> String {
    let kind = if payment.order_id.is_some() { "🛒" } else { "💰" };
    format!(
        "{} #{} | user {} | {} | {}",
        kind,
        payment.id,
        payment.user_id,
        format_price(payment.amount),
        format_timestamp(payment.created_at)
    )
}

/// Pending manual payments with approve/reject buttons
pub async fn show_payments(bot: &Bot, ctx: &AppContext, reply: Reply, user: &User) -> Result<()> {
    require_admin(ctx, user).await?;
    let lang = &user.language_code;
    let pending = ctx.services.payment_service.pending_payments().await?;

    let text = if pending.is_empty() {
        ctx.t("admin.payments.none", lang)
    } else {
        let lines: Vec<String> = pending.iter().map(payment_line).collect();
        format!("{}\n\n{}", ctx.t("admin.payments.title", lang), lines.join("\n"))
    };
    reply
        .send(bot, text, Some(keyboards::admin_payments(&ctx.i18n, lang, &pending)))
        .await
}

/// Approve or reject a pending manual payment
pub async fn verify_payment(
    bot: &Bot,
    ctx: &AppContext,
    reply: Reply,
    user: &User,
    payment_id: i64,
    approved: bool,
) -> Result<()> {
    require_admin(ctx, user).await?;
    let lang = &user.language_code;
    let payment = ctx
        .services
        .payment_service
        .verify_payment(payment_id, approved, user.id)
        .await?;
    log_admin_action(
        user.id,
        if approved { "approve_payment" } else { "reject_payment" },
        Some(&payment_id.to_string()),
        Some(&payment.status),
    );

    let key = if approved { "admin.payments.approved" } else { "admin.payments.rejected" };
    let text = ctx.tr(
        key,
        lang,
        &params([
            ("id", payment.id.to_string()),
            ("amount", format_price(payment.amount)),
            ("status", payment.status.clone()),
        ]),
    );
    reply.send(bot, text, Some(keyboards::admin_back(&ctx.i18n, lang))).await
}

pub async fn show_payment_stats(bot: &Bot, ctx: &AppContext, reply: Reply, user: &User) -> Result<()> {
    require_admin(ctx, user).await?;
    let lang = &user.language_code;
    let payments = &ctx.services.payment_service;
    let (stats, counts) = futures::try_join!(payments.statistics(STATS_WINDOW_DAYS), payments.count_by_status())?;

    let text = ctx.tr(
        "admin.payments.stats_text",
        lang,
        &params([
            ("days", stats.days.to_string()),
            ("success_count", stats.success_count.to_string()),
            ("total", format_price(stats.total_amount)),
            ("average", format_price(stats.average_amount)),
            ("conversion", format!("{:.1}", stats.conversion_rate)),
            ("pending", counts.pending.to_string()),
            ("success", counts.success.to_string()),
            ("failed", counts.failed.to_string()),
            ("cancelled", counts.cancelled.to_string()),
        ]),
    );
    reply.send(bot, text, Some(keyboards::admin_back(&ctx.i18n, lang))).await
}

/// Pending agent applications
pub async fn show_agents(bot: &Bot, ctx: &AppContext, reply: Reply, user: &User) -> Result<()> {
    require_admin(ctx, user).await?;
    let lang = &user.language_code;
    let agents = &ctx.services.agent_service;
    let (pending, counts) = futures::try_join!(agents.pending_requests(), agents.count_by_status())?;

    let mut text = ctx.tr(
        "admin.agents.title",
        lang,
        &params([
            ("pending", counts.pending.to_string()),
            ("approved", counts.approved.to_string()),
            ("rejected", counts.rejected.to_string()),
        ]),
    );
    for request in &pending {
        text.push_str("\n\n");
        text.push_str(&ctx.tr(
            "admin.agents.item",
            lang,
            &params([
                ("id", request.id.to_string()),
                ("name", escape_html(&request.full_name)),
                ("phone", escape_html(&request.phone)),
                ("email", escape_html(request.email.as_deref().unwrap_or("-"))),
                ("experience", escape_html(&truncate_text(request.experience.as_deref().unwrap_or("-"), 200))),
            ]),
        ));
    }

    reply
        .send(bot, text, Some(keyboards::admin_agents(&ctx.i18n, lang, &pending)))
        .await
}

pub async fn approve_agent(bot: &Bot, ctx: &AppContext, reply: Reply, user: &User, request_id: i64) -> Result<()> {
    require_admin(ctx, user).await?;
    let request = ctx.services.agent_service.approve(request_id, user.id).await?;
    log_admin_action(user.id, "approve_agent", Some(&request.user_id.to_string()), None);

    let text = ctx.tr(
        "admin.agents.approved",
        &user.language_code,
        &params([("id", request.id.to_string()), ("name", escape_html(&request.full_name))]),
    );
    reply
        .send(bot, text, Some(keyboards::admin_back(&ctx.i18n, &user.language_code)))
        .await
}

/// Ask for the reason before rejecting
pub async fn start_agent_reject(bot: &Bot, ctx: &AppContext, reply: Reply, user: &User, request_id: i64) -> Result<()> {
    require_admin(ctx, user).await?;
    ctx.services.agent_service.get_request(request_id).await?;
    begin_scenario(
        bot,
        ctx,
        reply,
        user,
        scenario_ids::ADMIN_AGENT_REJECT,
        &[("request_id", serde_json::json!(request_id))],
    )
    .await
}

pub async fn submit_agent_reject(
    bot: &Bot,
    ctx: &AppContext,
    reply: Reply,
    user: &User,
    context: &ConversationContext,
    reason: &str,
) -> Result<()> {
    require_admin(ctx, user).await?;
    let request_id = context.require_i64("request_id")?;
    let request = ctx.services.agent_service.reject(request_id, reason, user.id).await?;
    ctx.clear_context(user.telegram_id).await?;
    log_admin_action(user.id, "reject_agent", Some(&request.user_id.to_string()), Some(reason.trim()));

    let text = ctx.tr(
        "admin.agents.rejected",
        &user.language_code,
        &params([("id", request.id.to_string()), ("name", escape_html(&request.full_name))]),
    );
    reply
        .send(bot, text, Some(keyboards::admin_back(&ctx.i18n, &user.language_code)))
        .await
}

/// Accrued commissions waiting for payout
pub async fn show_referrals(bot: &Bot, ctx: &AppContext, reply: Reply, user: &User) -> Result<()> {
    require_admin(ctx, user).await?;
    let lang = &user.language_code;
    let pending = ctx.services.referral_service.pending_commissions(PENDING_COMMISSIONS).await?;

    let key = if pending.is_empty() { "admin.referrals.none" } else { "admin.referrals.title" };
    let text = ctx.tr(key, lang, &params([("count", pending.len().to_string())]));
    reply
        .send(bot, text, Some(keyboards::admin_referrals(&ctx.i18n, lang, &pending)))
        .await
}

pub async fn pay_commission(bot: &Bot, ctx: &AppContext, reply: Reply, user: &User, referral_id: i64) -> Result<()> {
    require_admin(ctx, user).await?;
    let referral = ctx.services.referral_service.pay_commission(referral_id).await?;
    log_admin_action(
        user.id,
        "pay_commission",
        Some(&referral.referrer_id.to_string()),
        Some(&referral.commission_amount.to_string()),
    );
    show_referrals(bot, ctx, reply, user).await
}

pub async fn show_backups(bot: &Bot, ctx: &AppContext, reply: Reply, user: &User) -> Result<()> {
    require_admin(ctx, user).await?;
    let lang = &user.language_code;
    let backups = ctx.services.backup_service.list_backups().await?;

    let text = ctx.tr("admin.backup.title", lang, &params([("count", backups.len().to_string())]));
    reply
        .send(bot, text, Some(keyboards::admin_backups(&ctx.i18n, lang, &backups)))
        .await
}

pub async fn create_backup(bot: &Bot, ctx: &AppContext, reply: Reply, user: &User) -> Result<()> {
    require_admin(ctx, user).await?;
    let backup = ctx.services.backup_service.create_backup().await?;
    log_admin_action(user.id, "create_backup", Some(&backup.name), None);
    info!(backup = %backup.name, size = backup.size_bytes, "Backup created from the admin console");
    show_backups(bot, ctx, reply, user).await
}

pub async fn confirm_restore(bot: &Bot, ctx: &AppContext, reply: Reply, user: &User, name: &str) -> Result<()> {
    require_super_admin(ctx, user).await?;
    let lang = &user.language_code;
    let text = ctx.tr("admin.backup.confirm_restore", lang, &params([("name", escape_html(name))]));
    reply
        .send(bot, text, Some(keyboards::confirm_restore(&ctx.i18n, lang, name)))
        .await
}

pub async fn restore_backup(bot: &Bot, ctx: &AppContext, reply: Reply, user: &User, name: &str) -> Result<()> {
    require_super_admin(ctx, user).await?;
    let rows = ctx.services.backup_service.restore_backup(name).await?;
    log_admin_action(user.id, "restore_backup", Some(name), Some(&rows.to_string()));

    let text = ctx.tr(
        "admin.backup.restored",
        &user.language_code,
        &params([("name", escape_html(name)), ("rows", rows.to_string())]),
    );
    reply
        .send(bot, text, Some(keyboards::admin_back(&ctx.i18n, &user.language_code)))
        .await
}

pub async fn delete_backup(bot: &Bot, ctx: &AppContext, reply: Reply, user: &User, name: &str) -> Result<()> {
    require_super_admin(ctx, user).await?;
    ctx.services.backup_service.delete_backup(name).await?;
    log_admin_action(user.id, "delete_backup", Some(name), None);
    show_backups(bot, ctx, reply, user).await
}

/// Live server status from the panel
pub async fn show_panel_status(bot: &Bot, ctx: &AppContext, reply: Reply, user: &User) -> Result<()> {
    require_admin(ctx, user).await?;
    let lang = &user.language_code;

    let status = ctx.services.panel_client.server_status().await?;
    let lines = summarize_server_status(&status);
    debug!(fields = lines.len(), "Panel status fetched");

    let body = if lines.is_empty() {
        ctx.t("admin.panel.no_data", lang)
    } else {
        lines
            .iter()
            .map(|(label, value)| format!("<b>{}</b>: {}", escape_html(label), escape_html(value)))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let text = format!("{}\n\n{}", ctx.t("admin.panel.title", lang), body);
    reply.send(bot, text, Some(keyboards::admin_back(&ctx.i18n, lang))).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_payment_line_marks_orders() {
        let mut payment = Payment {
            id: 12,
            user_id: 4,
            order_id: Some(30),
            amount: 150_000,
            currency: "IRT".to_string(),
            payment_method: "manual".to_string(),
            payment_gateway: Some("card".to_string()),
            transaction_id: None,
            authority: None,
            status: "pending".to_string(),
            description: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(payment_line(&payment).starts_with("🛒 #12"));
        payment.order_id = None;
        assert!(payment_line(&payment).starts_with("💰 #12"));
    }
}
