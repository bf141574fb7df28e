//! Message handlers module
//!
//! Plain text in a private chat is either input for the user's current
//! scenario or a stray message that gets the main menu.

use teloxide::{Bot, types::Message, prelude::*};
use tracing::{debug, warn};

use crate::handlers::commands::{account, admin, admin_catalog, admin_users, shop, start, wallet};
use crate::handlers::{keyboards, report_error, resolve_user, sender_language, Reply};
use crate::models::User;
use crate::state::{scenario_ids, AppContext, ConversationContext};
use crate::utils::errors::{ShopError, Result};

/// Handle incoming text messages
pub async fn handle_message(bot: Bot, msg: Message, ctx: AppContext) -> Result<()> {
    let (Some(from), Some(text)) = (msg.from.as_ref(), msg.text()) else {
        return Ok(());
    };
    if !msg.chat.id.is_user() {
        return Ok(());
    }

    let lang = sender_language(&ctx, from);
    let (user, _) = match resolve_user(&ctx, from).await {
        Ok(resolved) => resolved,
        Err(e) => {
            report_error(&bot, &ctx, msg.chat.id, &lang, &e, "resolve_user", Some(from.id.0 as i64)).await;
            return Ok(());
        }
    };

    let reply = Reply::new_message(msg.chat.id);
    let context = match ctx.storage.load_context(user.telegram_id).await {
        Ok(context) => context,
        Err(e) => {
            report_error(&bot, &ctx, msg.chat.id, &user.language_code, &e, "load_context", Some(user.id)).await;
            return Ok(());
        }
    };

    let result = match context {
        Some(context) if context.scenario.is_some() => {
            handle_conversation_message(&bot, &ctx, reply, &user, context, text).await
        }
        _ => handle_regular_message(&bot, &ctx, reply, &user).await,
    };

    if let Err(e) = result {
        report_error(&bot, &ctx, msg.chat.id, &user.language_code, &e, "message", Some(user.id)).await;
    }
    Ok(())
}

/// Validate input against the current step, then hand it to the scenario's handler
async fn handle_conversation_message(
    bot: &Bot,
    ctx: &AppContext,
    reply: Reply,
    user: &User,
    context: ConversationContext,
    text: &str,
) -> Result<()> {
    let lang = &user.language_code;
    let (scenario, step) = match context.current_state() {
        (Some(scenario), Some(step)) => (scenario.to_string(), step.to_string()),
        _ => return handle_regular_message(bot, ctx, reply, user).await,
    };
    debug!(user_id = user.id, scenario = %scenario, step = %step, "Handling conversation message");

    match ctx.scenarios.validate_input(&context, text) {
        Ok(()) => {}
        Err(ShopError::InvalidInput(key)) if key.starts_with("scenario.") => {
            return reply
                .send(bot, ctx.t(&key, lang), Some(keyboards::cancel(&ctx.i18n, lang)))
                .await;
        }
        Err(e) => {
            warn!(user_id = user.id, scenario = %scenario, error = %e, "Dropping unusable conversation state");
            ctx.clear_context(user.telegram_id).await?;
            return handle_regular_message(bot, ctx, reply, user).await;
        }
    }

    let input = text.trim();
    match scenario.as_str() {
        scenario_ids::DISCOUNT_ENTRY => {
            let plan_id = context.require_i64("plan_id")?;
            shop::apply_discount_code(bot, ctx, reply, user, plan_id, input).await
        }
        scenario_ids::TOPUP => wallet::submit_topup(bot, ctx, reply, user, input).await,
        scenario_ids::PROFILE_PHONE => account::submit_phone(bot, ctx, reply, user, input).await,
        scenario_ids::AGENT_REQUEST => {
            if step == "confirm" {
                return reply
                    .send(bot, ctx.t("agent.use_buttons", lang), Some(keyboards::agent_confirm(&ctx.i18n, lang)))
                    .await;
            }
            account::agent_request_input(bot, ctx, reply, user, context, input).await
        }
        scenario_ids::ADMIN_PLAN_CREATE => admin_catalog::submit_plan_create(bot, ctx, reply, user, text).await,
        scenario_ids::ADMIN_PLAN_EDIT => admin_catalog::submit_plan_edit(bot, ctx, reply, user, &context, input).await,
        scenario_ids::ADMIN_DISCOUNT_CREATE => {
            admin_catalog::submit_discount_create(bot, ctx, reply, user, text).await
        }
        scenario_ids::ADMIN_DISCOUNT_EDIT => {
            admin_catalog::submit_discount_edit(bot, ctx, reply, user, &context, input).await
        }
        scenario_ids::ADMIN_USER_SEARCH => admin_users::submit_search(bot, ctx, reply, user, input).await,
        scenario_ids::ADMIN_WALLET_ADJUST => {
            admin_users::submit_wallet_adjust(bot, ctx, reply, user, &context, input).await
        }
        scenario_ids::ADMIN_AGENT_REJECT => admin::submit_agent_reject(bot, ctx, reply, user, &context, input).await,
        other => {
            warn!(scenario = other, step = %step, "Unknown conversation state");
            ctx.clear_context(user.telegram_id).await?;
            handle_regular_message(bot, ctx, reply, user).await
        }
    }
}

/// Handle regular messages (no active conversation)
async fn handle_regular_message(bot: &Bot, ctx: &AppContext, reply: Reply, user: &User) -> Result<()> {
    let lang = &user.language_code;
    reply
        .send(bot, ctx.t("common.use_menu", lang), Some(start::main_menu_keyboard(ctx, user)))
        .await
}
