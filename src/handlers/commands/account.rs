//! Account screens: profile, referral programme and agent applications

use teloxide::prelude::*;
use tracing::{info, debug};

use crate::handlers::{begin_scenario, keyboards, prompt, Reply};
use crate::i18n::params;
use crate::models::{AgentRequestStatus, CreateAgentRequest, User};
use crate::services::referral::referral_link;
use crate::state::{scenario_ids, AppContext, ConversationContext, SKIP_MARKER};
use crate::utils::errors::{ShopError, Result};
use crate::utils::helpers::{display_name, escape_html, format_date, format_price};
use crate::utils::validators::normalize_digit;

/// Referred users listed on the referral page
const REFERRED_PREVIEW: i64 = 5;

/// Agent request fields collected in order, as stored in the context
const AGENT_FIELDS: [&str; 5] = ["full_name", "phone", "email", "address", "experience"];

pub async fn show_profile(bot: &Bot, ctx: &AppContext, reply: Reply, user: &User) -> Result<()> {
    let lang = &user.language_code;
    let orders = ctx.services.order_service.count_user_orders(user.id).await?;
    let role = if user.is_agent { "profile.role_agent" } else { "profile.role_user" };

    let text = ctx.tr(
        "profile.text",
        lang,
        &params([
            ("name", escape_html(&user.display_name())),
            ("telegram_id", user.telegram_id.to_string()),
            ("phone", escape_html(user.phone.as_deref().unwrap_or("-"))),
            ("balance", format_price(user.wallet_balance)),
            ("orders", orders.to_string()),
            ("role", ctx.t(role, lang)),
            ("joined", format_date(user.created_at)),
        ]),
    );
    reply.send(bot, text, Some(keyboards::profile_menu(&ctx.i18n, lang))).await
}

pub async fn start_phone_update(bot: &Bot, ctx: &AppContext, reply: Reply, user: &User) -> Result<()> {
    begin_scenario(bot, ctx, reply, user, scenario_ids::PROFILE_PHONE, &[]).await
}

/// Persian and Arabic digits become ASCII, separators are dropped
pub fn normalize_phone(input: &str) -> String {
    input
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-'))
        .map(normalize_digit)
        .collect()
}

pub async fn submit_phone(bot: &Bot, ctx: &AppContext, reply: Reply, user: &User, input: &str) -> Result<()> {
    let lang = &user.language_code;
    let updated = ctx
        .services
        .user_service
        .update_phone(user.id, &normalize_phone(input))
        .await?;
    ctx.clear_context(user.telegram_id).await?;
    info!(user_id = user.id, "Phone number updated");

    reply
        .send(bot, ctx.t("profile.phone_saved", lang), None)
        .await?;
    show_profile(bot, ctx, Reply::new_message(reply.chat_id), &updated).await
}

pub async fn show_referral(bot: &Bot, ctx: &AppContext, reply: Reply, user: &User) -> Result<()> {
    let lang = &user.language_code;
    if !ctx.settings.features.referrals {
        return reply
            .send(bot, ctx.t("referral.disabled", lang), Some(keyboards::back_to_main(&ctx.i18n, lang)))
            .await;
    }

    let referral = &ctx.services.referral_service;
    let (stats, referred) = futures::try_join!(
        referral.stats(user.id),
        referral.referred_users(user.id, REFERRED_PREVIEW),
    )?;

    let me = bot.get_me().await?;
    let username = me.user.username.clone().unwrap_or_else(|| ctx.settings.bot.bot_name.clone());
    let link = referral_link(&username, &user.referral_code);

    let mut text = ctx.tr(
        "referral.text",
        lang,
        &params([
            ("link", escape_html(&link)),
            ("percent", ctx.settings.shop.referral_commission_percent.to_string()),
            ("count", stats.referred_count.to_string()),
            ("earned", format_price(stats.total_commission)),
            ("pending", format_price(stats.pending_commission)),
        ]),
    );

    if !referred.is_empty() {
        let lines: Vec<String> = referred
            .iter()
            .map(|r| {
                let name = display_name(
                    r.first_name.as_deref(),
                    r.last_name.as_deref(),
                    r.username.as_deref(),
                    r.telegram_id,
                );
                format!("• {} ({})", escape_html(&name), format_date(r.referred_at))
            })
            .collect();
        text.push_str(&format!("\n\n{}\n{}", ctx.t("referral.recent", lang), lines.join("\n")));
    }

    reply.send(bot, text, Some(keyboards::back_to_main(&ctx.i18n, lang))).await
}

/// Open the agent application unless one is pending or the user already is an agent
pub async fn start_agent_request(bot: &Bot, ctx: &AppContext, reply: Reply, user: &User) -> Result<()> {
    let lang = &user.language_code;
    if !ctx.settings.features.agent_requests {
        return Err(ShopError::ServiceUnavailable("agent requests are disabled".to_string()));
    }
    if user.is_agent {
        return reply
            .send(bot, ctx.t("agent.already_agent", lang), Some(keyboards::back_to_main(&ctx.i18n, lang)))
            .await;
    }

    let latest = ctx.services.agent_service.get_user_request(user.id).await?;
    if latest.map_or(false, |r| r.status.parse::<AgentRequestStatus>().ok() == Some(AgentRequestStatus::Pending)) {
        return reply
            .send(bot, ctx.t("agent.already_pending", lang), Some(keyboards::back_to_main(&ctx.i18n, lang)))
            .await;
    }

    reply.send(bot, ctx.t("agent.intro", lang), None).await?;
    begin_scenario(
        bot,
        ctx,
        Reply::new_message(reply.chat_id),
        user,
        scenario_ids::AGENT_REQUEST,
        &[],
    )
    .await
}

/// Store one answer of the application and ask the next question
pub async fn agent_request_input(
    bot: &Bot,
    ctx: &AppContext,
    reply: Reply,
    user: &User,
    mut context: ConversationContext,
    input: &str,
) -> Result<()> {
    let lang = &user.language_code;
    let field = context.step.clone().unwrap_or_default();
    let value = input.trim();

    if value != SKIP_MARKER {
        let value = if field == "phone" { normalize_phone(value) } else { value.to_string() };
        context.set_data(&field, value)?;
    }

    let next = ctx.scenarios.advance(&mut context)?;
    ctx.storage.save_context(&context).await?;
    debug!(user_id = user.id, field = %field, next = ?next.as_ref().map(|s| s.id.clone()), "Agent request answer stored");

    match next {
        Some(step) if step.requires_input => prompt(bot, ctx, reply, lang, &step.prompt_key).await,
        _ => {
            let text = agent_summary(ctx, lang, &context);
            reply.send(bot, text, Some(keyboards::agent_confirm(&ctx.i18n, lang))).await
        }
    }
}

fn agent_summary(ctx: &AppContext, lang: &str, context: &ConversationContext) -> String {
    let value = |key: &str| escape_html(&context.get_string(key).unwrap_or_else(|| "-".to_string()));
    ctx.tr(
        "agent.summary",
        lang,
        &params([
            ("full_name", value("full_name")),
            ("phone", value("phone")),
            ("email", value("email")),
            ("address", value("address")),
            ("experience", value("experience")),
        ]),
    )
}

/// Build the request from collected answers
pub fn agent_request_from_context(user_id: i64, context: &ConversationContext) -> Result<CreateAgentRequest> {
    let full_name = context
        .get_string(AGENT_FIELDS[0])
        .ok_or_else(|| ShopError::InvalidInput("missing full name".to_string()))?;
    let phone = context
        .get_string(AGENT_FIELDS[1])
        .ok_or_else(|| ShopError::InvalidInput("missing phone".to_string()))?;

    Ok(CreateAgentRequest {
        user_id,
        full_name,
        phone,
        email: context.get_string(AGENT_FIELDS[2]),
        address: context.get_string(AGENT_FIELDS[3]),
        experience: context.get_string(AGENT_FIELDS[4]),
    })
}

/// The confirm button of the application summary
pub async fn submit_agent_request(bot: &Bot, ctx: &AppContext, reply: Reply, user: &User) -> Result<()> {
    let lang = &user.language_code;
    let context = ctx.context(user.telegram_id).await?;
    if !context.is_at(scenario_ids::AGENT_REQUEST, "confirm") {
        return reply
            .send(bot, ctx.t("common.session_expired", lang), Some(keyboards::back_to_main(&ctx.i18n, lang)))
            .await;
    }

    let request = agent_request_from_context(user.id, &context)?;
    let created = ctx.services.agent_service.create_request(request).await?;
    ctx.clear_context(user.telegram_id).await?;

    let text = ctx.tr("agent.submitted", lang, &params([("request_id", created.id.to_string())]));
    reply.send(bot, text, Some(keyboards::back_to_main(&ctx.i18n, lang))).await
}
