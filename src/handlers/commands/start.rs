//! Start command handler
//!
//! Handles /start (with an optional referral code), the main menu and /cancel

use teloxide::Bot;
use tracing::{info, debug, warn};

use crate::handlers::{keyboards, Reply};
use crate::i18n::params;
use crate::models::User;
use crate::state::AppContext;
use crate::utils::errors::Result;
use crate::utils::helpers::escape_html;

/// Handle /start - register, attribute a referral, greet with the main menu
pub async fn handle_start(
    bot: &Bot,
    ctx: &AppContext,
    reply: Reply,
    user: &User,
    created: bool,
    payload: &str,
) -> Result<()> {
    let code = payload.trim();
    debug!(user_id = user.id, created = created, payload = code, "Processing /start command");

    // registered users without a referrer may still follow a link later
    if !code.is_empty() && ctx.settings.features.referrals {
        match ctx.services.referral_service.handle_start_referral(user, code).await {
            Ok(Some(referral)) => {
                info!(user_id = user.id, referrer_id = referral.referrer_id, "User joined through a referral link")
            }
            Ok(None) => debug!(user_id = user.id, code = code, "Referral code not applied"),
            Err(e) => warn!(user_id = user.id, error = %e, "Referral attribution failed"),
        }
    }

    ctx.clear_context(user.telegram_id).await?;

    let lang = &user.language_code;
    let text = ctx.tr(
        "start.welcome",
        lang,
        &params([("name", escape_html(&user.display_name()))]),
    );
    reply.send(bot, text, Some(main_menu_keyboard(ctx, user))).await
}

/// Main menu shown by the "back" buttons
pub async fn show_main_menu(bot: &Bot, ctx: &AppContext, reply: Reply, user: &User) -> Result<()> {
    let lang = &user.language_code;
    reply
        .send(bot, ctx.t("menu.title", lang), Some(main_menu_keyboard(ctx, user)))
        .await
}

/// Leave whatever scenario the user is in
pub async fn handle_cancel(bot: &Bot, ctx: &AppContext, reply: Reply, user: &User) -> Result<()> {
    ctx.clear_context(user.telegram_id).await?;
    let lang = &user.language_code;
    reply
        .send(bot, ctx.t("common.cancelled", lang), Some(main_menu_keyboard(ctx, user)))
        .await
}

pub fn main_menu_keyboard(ctx: &AppContext, user: &User) -> teloxide::types::InlineKeyboardMarkup {
    let auth = ctx.services.auth_service.context_for(user.telegram_id, Some(user));
    keyboards::main_menu(
        &ctx.i18n,
        &user.language_code,
        auth.is_admin(),
        ctx.settings.features.agent_requests && !user.is_agent,
    )
}
