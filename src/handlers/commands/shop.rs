//! Shop screens: plan catalogue, quotes, checkout and the user's services

use teloxide::Bot;
use tracing::{info, debug};

use crate::handlers::{begin_scenario, keyboards, report_error, Reply};
use crate::i18n::params;
use crate::models::{Plan, User};
use crate::services::order::Quote;
use crate::state::{scenario_ids, AppContext};
use crate::utils::errors::Result;
use crate::utils::helpers::{escape_html, format_days, format_price, format_traffic};
use crate::utils::logging::log_user_action;

/// Active plans, one button each
pub async fn show_plans(bot: &Bot, ctx: &AppContext, reply: Reply, user: &User) -> Result<()> {
    let lang = &user.language_code;
    let plans = ctx.services.plan_service.active_plans().await?;

    if plans.is_empty() {
        return reply
            .send(bot, ctx.t("shop.no_plans", lang), Some(keyboards::back_to_main(&ctx.i18n, lang)))
            .await;
    }

    reply
        .send(bot, ctx.t("shop.title", lang), Some(keyboards::plans_list(&ctx.i18n, lang, &plans)))
        .await
}

fn plan_text(ctx: &AppContext, lang: &str, plan: &Plan) -> String {
    let description = plan
        .description
        .as_deref()
        .map(escape_html)
        .unwrap_or_default();
    ctx.tr(
        "shop.plan_details",
        lang,
        &params([
            ("name", escape_html(&plan.name)),
            ("days", format_days(plan.days)),
            ("traffic", format_traffic(f64::from(plan.traffic_gb))),
            ("price", format_price(plan.price)),
            ("description", description),
        ]),
    )
}

pub async fn show_plan(bot: &Bot, ctx: &AppContext, reply: Reply, user: &User, plan_id: i64) -> Result<()> {
    let lang = &user.language_code;
    let plan = active_plan(ctx, plan_id).await?;
    reply
        .send(bot, plan_text(ctx, lang, &plan), Some(keyboards::plan_details(&ctx.i18n, lang, plan.id)))
        .await
}

async fn active_plan(ctx: &AppContext, plan_id: i64) -> Result<Plan> {
    let plan = ctx.services.plan_service.get_plan(plan_id).await?;
    if !plan.is_active {
        return Err(crate::utils::errors::ShopError::PlanNotFound { plan_id });
    }
    Ok(plan)
}

/// Price breakdown with the payment buttons
pub async fn show_quote(
    bot: &Bot,
    ctx: &AppContext,
    reply: Reply,
    user: &User,
    plan_id: i64,
    discount_code: Option<&str>,
) -> Result<()> {
    let plan = active_plan(ctx, plan_id).await?;
    let quote = ctx.services.order_service.quote(&plan, discount_code).await?;
    send_quote(bot, ctx, reply, user, &plan, &quote).await
}

async fn send_quote(bot: &Bot, ctx: &AppContext, reply: Reply, user: &User, plan: &Plan, quote: &Quote) -> Result<()> {
    let lang = &user.language_code;
    let balance = ctx.services.wallet_service.balance(user.id).await?;

    let text = ctx.tr(
        "shop.quote",
        lang,
        &params([
            ("plan", escape_html(&plan.name)),
            ("price", format_price(quote.list_price)),
            ("discount", format_price(quote.discount_amount)),
            ("final", format_price(quote.final_price)),
            ("balance", format_price(balance)),
        ]),
    );
    let keyboard = keyboards::payment_methods(
        &ctx.i18n,
        lang,
        plan.id,
        quote.discount_code.as_deref(),
        ctx.settings.features.manual_payments,
    );
    reply.send(bot, text, Some(keyboard)).await
}

/// Ask for a discount code for the plan being bought
pub async fn start_discount_entry(bot: &Bot, ctx: &AppContext, reply: Reply, user: &User, plan_id: i64) -> Result<()> {
    active_plan(ctx, plan_id).await?;
    begin_scenario(
        bot,
        ctx,
        reply,
        user,
        scenario_ids::DISCOUNT_ENTRY,
        &[("plan_id", serde_json::json!(plan_id))],
    )
    .await
}

/// A code typed during discount entry; a rejected code falls back to the plain quote
pub async fn apply_discount_code(bot: &Bot, ctx: &AppContext, reply: Reply, user: &User, plan_id: i64, code: &str) -> Result<()> {
    ctx.clear_context(user.telegram_id).await?;
    let plan = active_plan(ctx, plan_id).await?;
    let code = code.trim().to_uppercase();

    let quote = match ctx.services.order_service.quote(&plan, Some(&code)).await {
        Ok(quote) => quote,
        Err(e) => {
            debug!(user_id = user.id, code = %code, error = %e, "Discount code rejected");
            report_error(bot, ctx, reply.chat_id, &user.language_code, &e, "discount_entry", Some(user.id)).await;
            Quote::without_discount(&plan)
        }
    };
    send_quote(bot, ctx, reply, user, &plan, &quote).await
}

/// Pay from the wallet and hand out the subscription link
pub async fn pay_with_wallet(
    bot: &Bot,
    ctx: &AppContext,
    reply: Reply,
    user: &User,
    plan_id: i64,
    discount_code: Option<&str>,
) -> Result<()> {
    let lang = &user.language_code;
    let order = ctx
        .services
        .order_service
        .purchase_with_wallet(user, plan_id, discount_code)
        .await?;
    log_user_action(user.id, "purchase_wallet", Some(&format!("order={}", order.id)));

    let url = order
        .secret_uuid
        .as_deref()
        .map(|secret| ctx.services.panel_client.subscription_url(secret))
        .unwrap_or_default();
    let text = ctx.tr(
        "shop.purchase_success",
        lang,
        &params([
            ("plan", escape_html(&order.plan_name)),
            ("days", format_days(order.days)),
            ("traffic", format_traffic(f64::from(order.traffic_gb))),
            ("price", format_price(order.final_price)),
            ("url", escape_html(&url)),
        ]),
    );
    reply.send(bot, text, Some(keyboards::back_to_main(&ctx.i18n, lang))).await
}

/// Open a card-to-card payment for an admin to confirm
pub async fn pay_manually(
    bot: &Bot,
    ctx: &AppContext,
    reply: Reply,
    user: &User,
    plan_id: i64,
    discount_code: Option<&str>,
) -> Result<()> {
    let lang = &user.language_code;
    let (order, payment) = ctx
        .services
        .order_service
        .request_manual_payment(user, plan_id, discount_code)
        .await?;
    info!(user_id = user.id, order_id = order.id, payment_id = payment.id, "Manual payment requested");

    let text = ctx.tr("shop.manual_instructions", lang, &card_params(ctx, payment.amount, payment.id));
    reply.send(bot, text, Some(keyboards::back_to_main(&ctx.i18n, lang))).await
}

/// Card details shown for manual payments and top-ups
pub fn card_params(ctx: &AppContext, amount: i64, payment_id: i64) -> crate::i18n::TranslationParams {
    let shop = &ctx.settings.shop;
    params([
        ("amount", format_price(amount)),
        ("card_number", escape_html(shop.card_number.as_deref().unwrap_or("-"))),
        ("card_holder", escape_html(shop.card_holder.as_deref().unwrap_or("-"))),
        ("payment_id", payment_id.to_string()),
    ])
}

/// Provisioned accounts with their links and live usage
pub async fn show_services(bot: &Bot, ctx: &AppContext, reply: Reply, user: &User) -> Result<()> {
    let lang = &user.language_code;
    let subscriptions = ctx.services.order_service.subscription_links(user.id).await?;

    if subscriptions.is_empty() {
        return reply
            .send(bot, ctx.t("services.empty", lang), Some(keyboards::back_to_main(&ctx.i18n, lang)))
            .await;
    }

    let items: Vec<String> = subscriptions
        .iter()
        .enumerate()
        .map(|(index, sub)| match &sub.profile {
            Some(profile) => ctx.tr(
                "services.item",
                lang,
                &params([
                    ("index", (index + 1).to_string()),
                    ("title", escape_html(profile.profile_title.as_deref().unwrap_or("-"))),
                    ("used", format_traffic(profile.profile_usage_current)),
                    ("total", format_traffic(profile.profile_usage_total)),
                    ("days", profile.profile_remaining_days.unwrap_or(0).to_string()),
                    ("url", escape_html(&sub.url)),
                ]),
            ),
            None => ctx.tr(
                "services.item_offline",
                lang,
                &params([
                    ("index", (index + 1).to_string()),
                    ("url", escape_html(&sub.url)),
                ]),
            ),
        })
        .collect();

    let text = format!("{}\n\n{}", ctx.t("services.title", lang), items.join("\n\n"));
    reply.send(bot, text, Some(keyboards::back_to_main(&ctx.i18n, lang))).await
}
