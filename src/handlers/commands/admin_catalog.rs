//! Admin catalogue management: plans and discount codes

use teloxide::Bot;

use crate::handlers::commands::admin::require_admin;
use crate::handlers::{begin_scenario, keyboards, Reply};
use crate::i18n::params;
use crate::models::{DiscountCode, DiscountType, Plan, User};
use crate::services::discount::{parse_discount_edit, parse_discount_form, DISCOUNTS_PER_PAGE};
use crate::services::plan::{parse_plan_edit, parse_plan_form, PLANS_PER_PAGE};
use crate::state::{scenario_ids, AppContext, ConversationContext};
use crate::utils::errors::Result;
use crate::utils::helpers::{escape_html, format_days, format_price, format_timestamp, format_traffic, total_pages};
use crate::utils::logging::log_admin_action;

pub async fn show_plans(bot: &Bot, ctx: &AppContext, reply: Reply, admin: &User, page: i64) -> Result<()> {
    require_admin(ctx, admin).await?;
    let lang = &admin.language_code;
    let plans = &ctx.services.plan_service;

    let total = plans.count_plans().await?;
    let pages = total_pages(total, PLANS_PER_PAGE);
    let page = page.clamp(1, pages);
    let list = plans.list_plans(page).await?;

    let text = ctx.tr("admin.plans.title", lang, &params([("total", total.to_string())]));
    reply
        .send(bot, text, Some(keyboards::admin_plans(&ctx.i18n, lang, &list, page, pages)))
        .await
}

fn plan_details(ctx: &AppContext, lang: &str, plan: &Plan) -> String {
    ctx.tr(
        "admin.plans.details",
        lang,
        &params([
            ("id", plan.id.to_string()),
            ("name", escape_html(&plan.name)),
            ("description", escape_html(plan.description.as_deref().unwrap_or("-"))),
            ("days", format_days(plan.days)),
            ("traffic", format_traffic(f64::from(plan.traffic_gb))),
            ("price", format_price(plan.price)),
            ("mode", escape_html(&plan.panel_mode)),
            ("product", escape_html(plan.product_name.as_deref().unwrap_or("-"))),
            ("max_ips", plan.max_ips.to_string()),
            ("monthly", ctx.t(if plan.monthly_package { "common.yes" } else { "common.no" }, lang)),
            ("active", ctx.t(if plan.is_active { "common.yes" } else { "common.no" }, lang)),
        ]),
    )
}

pub async fn show_plan(bot: &Bot, ctx: &AppContext, reply: Reply, admin: &User, plan_id: i64) -> Result<()> {
    require_admin(ctx, admin).await?;
    let lang = &admin.language_code;
    let plan = ctx.services.plan_service.get_plan(plan_id).await?;
    reply
        .send(bot, plan_details(ctx, lang, &plan), Some(keyboards::admin_plan_actions(&ctx.i18n, lang, &plan)))
        .await
}

pub async fn start_plan_create(bot: &Bot, ctx: &AppContext, reply: Reply, admin: &User) -> Result<()> {
    require_admin(ctx, admin).await?;
    begin_scenario(bot, ctx, reply, admin, scenario_ids::ADMIN_PLAN_CREATE, &[]).await
}

pub async fn submit_plan_create(bot: &Bot, ctx: &AppContext, reply: Reply, admin: &User, form: &str) -> Result<()> {
    require_admin(ctx, admin).await?;
    let request = parse_plan_form(form)?;
    let plan = ctx.services.plan_service.create_plan(request).await?;
    ctx.clear_context(admin.telegram_id).await?;
    log_admin_action(admin.id, "create_plan", Some(&plan.id.to_string()), Some(&plan.name));

    reply
        .send(bot, ctx.t("admin.plans.created", &admin.language_code), None)
        .await?;
    show_plan(bot, ctx, Reply::new_message(reply.chat_id), admin, plan.id).await
}

pub async fn start_plan_edit(bot: &Bot, ctx: &AppContext, reply: Reply, admin: &User, plan_id: i64) -> Result<()> {
    require_admin(ctx, admin).await?;
    ctx.services.plan_service.get_plan(plan_id).await?;
    begin_scenario(
        bot,
        ctx,
        reply,
        admin,
        scenario_ids::ADMIN_PLAN_EDIT,
        &[("plan_id", serde_json::json!(plan_id))],
    )
    .await
}

/// One `N. value` line typed during a plan edit
pub async fn submit_plan_edit(
    bot: &Bot,
    ctx: &AppContext,
    reply: Reply,
    admin: &User,
    context: &ConversationContext,
    input: &str,
) -> Result<()> {
    require_admin(ctx, admin).await?;
    let plan_id = context.require_i64("plan_id")?;
    let request = parse_plan_edit(input)?;
    ctx.services.plan_service.update_plan(plan_id, request).await?;
    ctx.clear_context(admin.telegram_id).await?;
    log_admin_action(admin.id, "edit_plan", Some(&plan_id.to_string()), Some(input.trim()));

    show_plan(bot, ctx, reply, admin, plan_id).await
}

pub async fn toggle_plan(bot: &Bot, ctx: &AppContext, reply: Reply, admin: &User, plan_id: i64) -> Result<()> {
    require_admin(ctx, admin).await?;
    let plan = ctx.services.plan_service.toggle_active(plan_id).await?;
    log_admin_action(admin.id, "toggle_plan", Some(&plan_id.to_string()), Some(&plan.is_active.to_string()));
    show_plan(bot, ctx, reply, admin, plan_id).await
}

pub async fn delete_plan(bot: &Bot, ctx: &AppContext, reply: Reply, admin: &User, plan_id: i64) -> Result<()> {
    require_admin(ctx, admin).await?;
    ctx.services.plan_service.delete_plan(plan_id).await?;
    log_admin_action(admin.id, "delete_plan", Some(&plan_id.to_string()), None);
    show_plans(bot, ctx, reply, admin, 1).await
}

fn discount_line(ctx: &AppContext, lang: &str, discount: &DiscountCode) -> String {
    let value = match discount.kind() {
        Some(DiscountType::Percentage) => format!("{}%", discount.discount_value),
        _ => format_price(discount.discount_value),
    };
    let uses = if discount.max_uses == 0 {
        format!("{}/∞", discount.used_count)
    } else {
        format!("{}/{}", discount.used_count, discount.max_uses)
    };
    let until = discount
        .valid_until
        .map(format_timestamp)
        .unwrap_or_else(|| "-".to_string());

    ctx.tr(
        "admin.discounts.item",
        lang,
        &params([
            ("code", escape_html(&discount.code)),
            ("value", value),
            ("uses", uses),
            ("until", until),
        ]),
    )
}

pub async fn show_discounts(bot: &Bot, ctx: &AppContext, reply: Reply, admin: &User, page: i64) -> Result<()> {
    require_admin(ctx, admin).await?;
    let lang = &admin.language_code;
    let discounts = &ctx.services.discount_service;

    let total = discounts.count().await?;
    let pages = total_pages(total, DISCOUNTS_PER_PAGE);
    let page = page.clamp(1, pages);
    let list = discounts.list(page).await?;

    let mut text = ctx.tr("admin.discounts.title", lang, &params([("total", total.to_string())]));
    if !list.is_empty() {
        let lines: Vec<String> = list.iter().map(|d| discount_line(ctx, lang, d)).collect();
        text.push_str("\n\n");
        text.push_str(&lines.join("\n"));
    }

    reply
        .send(bot, text, Some(keyboards::admin_discounts(&ctx.i18n, lang, &list, page, pages)))
        .await
}

pub async fn start_discount_create(bot: &Bot, ctx: &AppContext, reply: Reply, admin: &User) -> Result<()> {
    require_admin(ctx, admin).await?;
    begin_scenario(bot, ctx, reply, admin, scenario_ids::ADMIN_DISCOUNT_CREATE, &[]).await
}

pub async fn submit_discount_create(bot: &Bot, ctx: &AppContext, reply: Reply, admin: &User, form: &str) -> Result<()> {
    require_admin(ctx, admin).await?;
    let request = parse_discount_form(form)?;
    let discount = ctx.services.discount_service.create(request).await?;
    ctx.clear_context(admin.telegram_id).await?;
    log_admin_action(admin.id, "create_discount", Some(&discount.code), None);

    let text = ctx.tr(
        "admin.discounts.created",
        &admin.language_code,
        &params([("code", escape_html(&discount.code))]),
    );
    reply.send(bot, text, None).await?;
    show_discounts(bot, ctx, Reply::new_message(reply.chat_id), admin, 1).await
}

pub async fn start_discount_edit(bot: &Bot, ctx: &AppContext, reply: Reply, admin: &User, discount_id: i64) -> Result<()> {
    require_admin(ctx, admin).await?;
    ctx.services.discount_service.get(discount_id).await?;
    begin_scenario(
        bot,
        ctx,
        reply,
        admin,
        scenario_ids::ADMIN_DISCOUNT_EDIT,
        &[("discount_id", serde_json::json!(discount_id))],
    )
    .await
}

/// One `N. value` line typed during a discount edit
pub async fn submit_discount_edit(
    bot: &Bot,
    ctx: &AppContext,
    reply: Reply,
    admin: &User,
    context: &ConversationContext,
    input: &str,
) -> Result<()> {
    require_admin(ctx, admin).await?;
    let discount_id = context.require_i64("discount_id")?;
    let request = parse_discount_edit(input)?;
    let discount = ctx.services.discount_service.update(discount_id, request).await?;
    ctx.clear_context(admin.telegram_id).await?;
    log_admin_action(admin.id, "edit_discount", Some(&discount.code), Some(input.trim()));

    let text = ctx.tr(
        "admin.discounts.updated",
        &admin.language_code,
        &params([("code", escape_html(&discount.code))]),
    );
    reply.send(bot, text, None).await?;
    show_discounts(bot, ctx, Reply::new_message(reply.chat_id), admin, 1).await
}

pub async fn toggle_discount(bot: &Bot, ctx: &AppContext, reply: Reply, admin: &User, discount_id: i64) -> Result<()> {
    require_admin(ctx, admin).await?;
    let discount = ctx.services.discount_service.toggle_active(discount_id).await?;
    log_admin_action(admin.id, "toggle_discount", Some(&discount.code), Some(&discount.is_active.to_string()));
    show_discounts(bot, ctx, reply, admin, 1).await
}

pub async fn delete_discount(bot: &Bot, ctx: &AppContext, reply: Reply, admin: &User, discount_id: i64) -> Result<()> {
    require_admin(ctx, admin).await?;
    ctx.services.discount_service.delete(discount_id).await?;
    log_admin_action(admin.id, "delete_discount", Some(&discount_id.to_string()), None);
    show_discounts(bot, ctx, reply, admin, 1).await
}
